use sqlx::{mysql::MySqlRow, Row as _};

use super::{
    sql::{self, in_list},
    Client, Error,
};

#[derive(Clone, Debug, PartialEq)]
pub struct Entity {
    pub id: i64,
    pub name: String,
    /// `None` for the root entity.
    pub parent_id: Option<i64>,
    pub complete_name: Option<String>,
}

impl Entity {
    fn from_row(row: &MySqlRow) -> Result<Self, Error> {
        Ok(Self {
            id: row.try_get("id")?,
            name: row
                .try_get::<Option<String>, _>("name")?
                .unwrap_or_default(),
            // Older GLPI versions give the root entity a parent of -1.
            parent_id: row
                .try_get::<Option<i64>, _>("entities_id")?
                .filter(|id| *id >= 0),
            complete_name: row.try_get("completename")?,
        })
    }
}

/// A profile assignment of a user on an entity.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ProfileEntity {
    pub entity_id: i64,
    pub is_recursive: bool,
}

const ENTITY_COLUMNS: &str = "\
    CAST(id AS SIGNED) AS id, name, \
    CAST(entities_id AS SIGNED) AS entities_id, completename";

impl Client {
    pub async fn get_entities(&self) -> Result<Vec<Entity>, Error> {
        let sql =
            format!("SELECT {ENTITY_COLUMNS} FROM glpi_entities ORDER BY name");
        sqlx::query(&sql)
            .fetch_all(&self.0)
            .await?
            .iter()
            .map(Entity::from_row)
            .collect()
    }

    /// Direct children only.
    pub async fn get_entity_children(
        &self,
        parent_id: i64,
    ) -> Result<Vec<Entity>, Error> {
        let sql = format!(
            "SELECT {ENTITY_COLUMNS} FROM glpi_entities \
             WHERE entities_id = ? \
             ORDER BY name"
        );
        sqlx::query(&sql)
            .bind(parent_id)
            .fetch_all(&self.0)
            .await?
            .iter()
            .map(Entity::from_row)
            .collect()
    }

    pub async fn get_entities_by_ids(
        &self,
        ids: &[i64],
    ) -> Result<Vec<Entity>, Error> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let (ph, params) = in_list(ids.iter().copied());
        let sql = format!(
            "SELECT {ENTITY_COLUMNS} FROM glpi_entities \
             WHERE id IN ({ph}) \
             ORDER BY name"
        );
        sql::bind(sqlx::query(&sql), &params)
            .fetch_all(&self.0)
            .await?
            .iter()
            .map(Entity::from_row)
            .collect()
    }

    /// Every entity below `root`, at any depth.
    pub async fn get_entity_descendants(
        &self,
        root: i64,
    ) -> Result<Vec<i64>, Error> {
        const SQL: &str = "\
            WITH RECURSIVE entity_tree AS ( \
                SELECT id FROM glpi_entities WHERE entities_id = ? \
                UNION ALL \
                SELECT e.id FROM glpi_entities e \
                INNER JOIN entity_tree et ON e.entities_id = et.id \
            ) \
            SELECT CAST(id AS SIGNED) AS id FROM entity_tree";
        sqlx::query(SQL)
            .bind(root)
            .fetch_all(&self.0)
            .await?
            .iter()
            .map(|row| row.try_get("id"))
            .collect()
    }

    /// Looks a user up by e-mail address, or by login when the login is the
    /// local part of that address.
    pub async fn find_user_id_by_email(
        &self,
        email: &str,
    ) -> Result<Option<i64>, Error> {
        const SQL: &str = "\
            SELECT CAST(u.id AS SIGNED) AS id \
            FROM glpi_users u \
            LEFT JOIN glpi_useremails ue ON ue.users_id = u.id \
            WHERE LOWER(TRIM(ue.email)) = LOWER(TRIM(?)) \
               OR LOWER(TRIM(u.name)) = LOWER(TRIM(?)) \
            ORDER BY u.id \
            LIMIT 1";
        let login = email.split('@').next().unwrap_or(email);
        sqlx::query(SQL)
            .bind(email)
            .bind(login)
            .fetch_optional(&self.0)
            .await?
            .map(|row| row.try_get("id"))
            .transpose()
    }

    pub async fn get_profile_entities(
        &self,
        user_id: i64,
    ) -> Result<Vec<ProfileEntity>, Error> {
        const SQL: &str = "\
            SELECT DISTINCT CAST(entities_id AS SIGNED) AS entities_id, \
                   CAST(is_recursive AS SIGNED) AS is_recursive \
            FROM glpi_profiles_users \
            WHERE users_id = ?";
        sqlx::query(SQL)
            .bind(user_id)
            .fetch_all(&self.0)
            .await?
            .iter()
            .map(|row| {
                Ok(ProfileEntity {
                    entity_id: row.try_get("entities_id")?,
                    is_recursive: row.try_get::<i64, _>("is_recursive")? == 1,
                })
            })
            .collect()
    }
}
