use constcat::concat;
use sqlx::{mysql::MySqlRow, Row as _};

use super::{Client, Error};

/// Licence type category holding the Microsoft 365 licence types.
pub const M365_LICENSE_PARENT: i64 = 4;

#[derive(Clone, Debug, PartialEq)]
pub struct Computer {
    pub id: i64,
    pub entity_id: Option<i64>,
    pub name: Option<String>,
    pub serial: Option<String>,
    pub user_id: Option<i64>,
    pub location_id: Option<i64>,
    pub model_id: Option<i64>,
    pub manufacturer_id: Option<i64>,
    pub date_creation: Option<String>,
    pub last_boot: Option<String>,
    pub last_inventory_update: Option<String>,
    pub comment: Option<String>,
    /// Comma separated.
    pub license_ids: Option<String>,
    /// Comma separated state ids of every licence.
    pub license_states: Option<String>,
    /// Comma separated state ids of the Microsoft 365 licences.
    pub license_states_m365: Option<String>,
    /// `|` separated software names.
    pub licensed_software: Option<String>,
    /// `parent|type|name` entries separated by `||`.
    pub license_type_info: Option<String>,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LicenseType {
    pub parent_id: i64,
    pub type_id: i64,
    pub name: String,
}

impl Computer {
    pub fn license_types(&self) -> Vec<LicenseType> {
        self.license_type_info
            .as_deref()
            .map(parse_license_types)
            .unwrap_or_default()
    }

    /// Names of the Microsoft 365 licence types installed on the computer.
    pub fn m365_licenses(&self) -> Vec<String> {
        self.license_types()
            .into_iter()
            .filter(|t| t.parent_id == M365_LICENSE_PARENT && !t.name.is_empty())
            .map(|t| t.name)
            .collect()
    }

    fn from_row(row: &MySqlRow) -> Result<Self, Error> {
        Ok(Self {
            id: row.try_get("id")?,
            entity_id: row.try_get("entities_id")?,
            name: row.try_get("name")?,
            serial: row.try_get("serial")?,
            user_id: row.try_get("users_id")?,
            location_id: row.try_get("locations_id")?,
            model_id: row.try_get("computermodels_id")?,
            manufacturer_id: row.try_get("manufacturers_id")?,
            date_creation: row.try_get("date_creation")?,
            last_boot: row.try_get("last_boot")?,
            last_inventory_update: row.try_get("last_inventory_update")?,
            comment: row.try_get("comment")?,
            license_ids: row.try_get("license_ids")?,
            license_states: row.try_get("license_states")?,
            license_states_m365: row.try_get("license_states_parent4")?,
            licensed_software: row.try_get("licensed_software")?,
            license_type_info: row.try_get("license_type_info")?,
        })
    }
}

/// Malformed entries are skipped.
pub fn parse_license_types(raw: &str) -> Vec<LicenseType> {
    raw.split("||")
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .filter_map(|entry| {
            let mut parts = entry.splitn(3, '|');
            let parent_id = parts.next()?.trim().parse().ok()?;
            let type_id = parts.next()?.trim().parse().ok()?;
            let name = parts.next().unwrap_or_default().trim().to_owned();
            Some(LicenseType {
                parent_id,
                type_id,
                name,
            })
        })
        .collect()
}

const DATETIME: &str = "'%Y-%m-%d %H:%i:%s'";

const COMPUTER_SELECT: &str = concat!(
    "SELECT CAST(c.id AS SIGNED) AS id, ",
    "CAST(c.entities_id AS SIGNED) AS entities_id, c.name, c.serial, ",
    "CAST(c.users_id AS SIGNED) AS users_id, ",
    "CAST(c.locations_id AS SIGNED) AS locations_id, ",
    "CAST(c.computermodels_id AS SIGNED) AS computermodels_id, ",
    "CAST(c.manufacturers_id AS SIGNED) AS manufacturers_id, ",
    "DATE_FORMAT(c.date_creation, ", DATETIME, ") AS date_creation, ",
    "DATE_FORMAT(c.last_boot, ", DATETIME, ") AS last_boot, ",
    "DATE_FORMAT(c.last_inventory_update, ", DATETIME, ") AS last_inventory_update, ",
    "c.comment, ",
    "GROUP_CONCAT(DISTINCT sl.id SEPARATOR ',') AS license_ids, ",
    "GROUP_CONCAT(DISTINCT sl.states_id SEPARATOR ',') AS license_states, ",
    "GROUP_CONCAT(DISTINCT CASE WHEN COALESCE(pst.id, 0) = 4 ",
    "THEN sl.states_id END SEPARATOR ',') AS license_states_parent4, ",
    "GROUP_CONCAT(DISTINCT s.name SEPARATOR '|') AS licensed_software, ",
    "GROUP_CONCAT(DISTINCT CONCAT(COALESCE(pst.id, 0), '|', st.id, '|', ",
    "REPLACE(st.name, '|', ' ')) SEPARATOR '||') AS license_type_info ",
    "FROM glpi_computers c ",
    "LEFT JOIN glpi_items_softwarelicenses isl ",
    "ON isl.items_id = c.id AND isl.itemtype = 'Computer' ",
    "LEFT JOIN glpi_softwarelicenses sl ON sl.id = isl.softwarelicenses_id ",
    "LEFT JOIN glpi_softwares s ON s.id = sl.softwares_id ",
    "LEFT JOIN glpi_softwarelicensetypes st ",
    "ON st.id = sl.softwarelicensetypes_id ",
    "LEFT JOIN glpi_softwarelicensetypes pst ",
    "ON pst.id = st.softwarelicensetypes_id ",
);

impl Client {
    pub async fn get_computers_by_entity(
        &self,
        entity_id: i64,
    ) -> Result<Vec<Computer>, Error> {
        const SQL: &str = concat!(
            COMPUTER_SELECT,
            "WHERE c.entities_id = ? AND c.is_deleted = 0 ",
            "GROUP BY c.id ORDER BY c.name LIMIT 2000",
        );
        sqlx::query(SQL)
            .bind(entity_id)
            .fetch_all(&self.0)
            .await?
            .iter()
            .map(Computer::from_row)
            .collect()
    }

    /// Substring match on name or serial number.
    pub async fn search_computers(
        &self,
        term: &str,
    ) -> Result<Vec<Computer>, Error> {
        const SQL: &str = concat!(
            COMPUTER_SELECT,
            "WHERE (c.name LIKE ? OR c.serial LIKE ?) AND c.is_deleted = 0 ",
            "GROUP BY c.id ORDER BY c.name LIMIT 500",
        );
        let pattern = format!("%{term}%");
        sqlx::query(SQL)
            .bind(&pattern)
            .bind(&pattern)
            .fetch_all(&self.0)
            .await?
            .iter()
            .map(Computer::from_row)
            .collect()
    }

    /// Non-deleted computers, of one entity or overall.
    pub async fn count_computers(
        &self,
        entity_id: Option<i64>,
    ) -> Result<u64, Error> {
        let row = match entity_id {
            Some(id) => {
                sqlx::query(
                    "SELECT COUNT(*) AS cnt FROM glpi_computers \
                     WHERE entities_id = ? AND is_deleted = 0",
                )
                .bind(id)
                .fetch_one(&self.0)
                .await?
            }
            None => {
                sqlx::query(
                    "SELECT COUNT(*) AS cnt FROM glpi_computers \
                     WHERE is_deleted = 0",
                )
                .fetch_one(&self.0)
                .await?
            }
        };
        let count: i64 = row.try_get("cnt")?;
        Ok(u64::try_from(count).unwrap_or_default())
    }
}
