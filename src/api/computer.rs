use serde::{Deserialize, Serialize};

use crate::db;

/// An inventoried computer with its software licences.
///
/// Column names follow the GLPI schema; the aggregated licence columns are
/// kept raw next to their parsed form.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Computer {
    pub id: i64,
    pub entities_id: Option<i64>,
    pub name: Option<String>,
    pub serial: Option<String>,
    pub users_id: Option<i64>,
    pub locations_id: Option<i64>,
    pub computermodels_id: Option<i64>,
    pub manufacturers_id: Option<i64>,
    pub date_creation: Option<String>,
    pub last_boot: Option<String>,
    pub last_inventory_update: Option<String>,
    pub comment: Option<String>,
    pub license_ids: Option<String>,
    pub license_states: Option<String>,
    pub license_states_parent4: Option<String>,
    pub licensed_software: Option<String>,
    pub license_type_info: Option<String>,
    pub license_types: Vec<LicenseType>,
    pub m365: M365,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct LicenseType {
    pub parent_id: i64,
    pub type_id: i64,
    pub name: String,
}

/// Microsoft 365 licensing summary.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct M365 {
    pub licensed: bool,
    /// Licence type names, `, ` separated.
    pub details: Option<String>,
}

impl From<db::Computer> for Computer {
    fn from(c: db::Computer) -> Self {
        let m365 = c.m365_licenses();
        let license_types = c
            .license_types()
            .into_iter()
            .map(|t| LicenseType {
                parent_id: t.parent_id,
                type_id: t.type_id,
                name: t.name,
            })
            .collect();
        Self {
            id: c.id,
            entities_id: c.entity_id,
            name: c.name,
            serial: c.serial,
            users_id: c.user_id,
            locations_id: c.location_id,
            computermodels_id: c.model_id,
            manufacturers_id: c.manufacturer_id,
            date_creation: c.date_creation,
            last_boot: c.last_boot,
            last_inventory_update: c.last_inventory_update,
            comment: c.comment,
            license_ids: c.license_ids,
            license_states: c.license_states,
            license_states_parent4: c.license_states_m365,
            licensed_software: c.licensed_software,
            license_type_info: c.license_type_info,
            license_types,
            m365: M365 {
                licensed: !m365.is_empty(),
                details: (!m365.is_empty()).then(|| m365.join(", ")),
            },
        }
    }
}
