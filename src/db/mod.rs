pub mod category;
pub mod computer;
pub mod entity;
pub mod sql;
pub mod ticket;

use sqlx::mysql::{MySqlConnectOptions, MySqlPool, MySqlPoolOptions};

use crate::config;

pub use sqlx::Error;

pub use self::{
    category::Category, computer::Computer, entity::Entity, ticket::Ticket,
};

/// Builds the shared pool without connecting, so a misconfigured database
/// surfaces on the first query instead of at startup.
pub fn connect(config: &config::Db) -> Client {
    let options = MySqlConnectOptions::new()
        .host(&config.host)
        .port(config.port)
        .username(&config.user)
        .password(&config.password)
        .database(&config.name);

    Client(
        MySqlPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout)
            .connect_lazy_with(options),
    )
}

/// Read-only access to the GLPI schema.
#[derive(Clone, Debug)]
pub struct Client(MySqlPool);

impl Client {
    pub fn new(pool: MySqlPool) -> Self {
        Self(pool)
    }
}

/// Display name of a GLPI user as the report shows it: the real name,
/// falling back to the login.
pub(crate) const USER_DISPLAY_NAME: &str =
    "TRIM(COALESCE(NULLIF(COALESCE(u.realname, ''), ''), COALESCE(u.name, '')))";
