use sqlx::Row as _;

use super::{Client, Error};

#[derive(Clone, Debug, PartialEq)]
pub struct Category {
    pub id: i64,
    pub name: String,
}

impl Client {
    pub async fn get_categories(&self) -> Result<Vec<Category>, Error> {
        const SQL: &str = "SELECT CAST(id AS SIGNED) AS id, name \
                           FROM glpi_itilcategories \
                           ORDER BY name";
        sqlx::query(SQL)
            .fetch_all(&self.0)
            .await?
            .iter()
            .map(|row| {
                Ok(Category {
                    id: row.try_get("id")?,
                    name: row
                        .try_get::<Option<String>, _>("name")?
                        .unwrap_or_default(),
                })
            })
            .collect()
    }
}
