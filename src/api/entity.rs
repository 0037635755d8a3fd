use serde::{Deserialize, Serialize};

use crate::db;

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Entity {
    pub id: i64,
    pub name: String,
    pub parent_id: Option<i64>,
    pub completename: Option<String>,
}

impl From<db::Entity> for Entity {
    fn from(e: db::Entity) -> Self {
        Self {
            id: e.id,
            name: e.name,
            parent_id: e.parent_id,
            completename: e.complete_name,
        }
    }
}

/// Where the entities of `GET /api/db/my-entities` came from.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    /// Listed by GLPI for the caller's API session.
    GlpiApiToken,
    /// Resolved from the profiles of the user owning an e-mail address.
    Email,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MyEntities {
    pub success: bool,
    pub data: Vec<Entity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<Source>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl MyEntities {
    pub fn new(data: Vec<Entity>) -> Self {
        Self {
            success: true,
            data,
            source: None,
            user_email: None,
            user_id: None,
            message: None,
        }
    }

    /// Nothing visible, and why.
    pub fn none(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            ..Self::new(Vec::new())
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Category {
    pub id: i64,
    pub name: String,
}

impl From<db::Category> for Category {
    fn from(c: db::Category) -> Self {
        Self {
            id: c.id,
            name: c.name,
        }
    }
}
