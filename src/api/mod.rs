//! JSON shapes of the HTTP API.

pub mod computer;
pub mod entity;
pub mod ticket;

use serde::{Deserialize, Serialize};

pub use self::{computer::Computer, entity::Entity, ticket::Ticket};

/// `{success: true, data}`.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Data<T> {
    pub success: bool,
    pub data: T,
}

impl<T> Data<T> {
    pub fn new(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Failure {
    pub success: bool,
    pub message: String,
    /// Tells the dashboard to send the user back to the login screen.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub require_login: bool,
}

impl Failure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            require_login: false,
        }
    }

    pub fn require_login(message: impl Into<String>) -> Self {
        Self {
            require_login: true,
            ..Self::new(message)
        }
    }
}

#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
pub struct Success {
    pub success: bool,
}

impl Success {
    pub const OK: Self = Self { success: true };
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct SessionToken {
    pub success: bool,
    pub session_token: Option<String>,
}

#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
pub struct Count {
    pub success: bool,
    pub count: u64,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Root {
    pub message: String,
    pub version: String,
}
