use std::{
    env, io,
    net::{self, Ipv4Addr, SocketAddr},
    path::{Path, PathBuf},
    str::FromStr,
    time,
};

use derive_more::{Display, From};
use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub db: Db,
    pub http: Http,
    pub glpi: Glpi,
    pub session: Session,
    pub dev: Dev,
    pub client_log: ClientLog,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Db {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub name: String,
    pub max_connections: u32,
    /// How long a query waits for a connection before failing.
    #[serde(with = "humantime_serde")]
    pub acquire_timeout: time::Duration,
}

impl Default for Db {
    fn default() -> Self {
        Self {
            host: "localhost".into(),
            port: 3306,
            user: "root".into(),
            password: String::new(),
            name: "glpi".into(),
            max_connections: 5,
            acquire_timeout: time::Duration::from_secs(3),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Http {
    pub server: Server,
    pub cors: Cors,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Server {
    pub addr: net::SocketAddr,
}

impl Default for Server {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, 5001)),
        }
    }
}

/// Empty `allowed_origins` mirrors the request origin.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Cors {
    pub allowed_origins: Vec<String>,
}

/// GLPI REST API access. Both values are required by the first API call,
/// not at startup.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct Glpi {
    pub base_url: Option<String>,
    pub app_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Session {
    pub secret: String,
    #[serde(with = "humantime_serde")]
    pub expiration_time: time::Duration,
    pub mirror_cookie: bool,
    #[serde(with = "humantime_serde")]
    pub mirror_cookie_max_age: time::Duration,
    pub secure: bool,
}

impl Default for Session {
    fn default() -> Self {
        Self {
            secret: "change-this-secret".into(),
            expiration_time: time::Duration::from_secs(24 * 60 * 60),
            mirror_cookie: true,
            mirror_cookie_max_age: time::Duration::from_secs(
                7 * 24 * 60 * 60,
            ),
            secure: false,
        }
    }
}

/// Development helpers. Never enable `bypass_auth` in production.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Dev {
    pub bypass_auth: bool,
    pub fake_session: String,
    pub bypass_cookie: bool,
    pub api_key: Option<String>,
}

impl Default for Dev {
    fn default() -> Self {
        Self {
            bypass_auth: false,
            fake_session: "dev-bypass-session".into(),
            bypass_cookie: false,
            api_key: None,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ClientLog {
    pub path: PathBuf,
}

impl Default for ClientLog {
    fn default() -> Self {
        Self {
            path: PathBuf::from("logs").join("client.log"),
        }
    }
}

#[derive(Debug, Display, From)]
pub enum Error {
    #[display("failed to read config file: {_0}")]
    #[from]
    Io(io::Error),
    #[display("invalid config file: {_0}")]
    #[from]
    Toml(toml::de::Error),
    #[display("invalid value for {var}: {value:?}")]
    Env { var: &'static str, value: String },
}

impl std::error::Error for Error {}

impl Config {
    /// Reads `CONFIG_FILE` (default `config.toml`) when it exists, then
    /// applies environment overrides.
    pub async fn load() -> Result<Self, Error> {
        let path = env::var("CONFIG_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config.toml"));

        let mut config = Self::from_file(&path).await?;
        config.apply_env(|var| env::var(var).ok())?;
        Ok(config)
    }

    async fn from_file(path: &Path) -> Result<Self, Error> {
        match tokio::fs::read_to_string(path).await {
            Ok(raw) => Ok(toml::from_str(&raw)?),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Ok(Self::default())
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn apply_env(
        &mut self,
        var: impl Fn(&str) -> Option<String>,
    ) -> Result<(), Error> {
        let var = |name: &str| var(name).filter(|v| !v.trim().is_empty());

        if let Some(v) = var("GLPI_DB_HOST") {
            self.db.host = v;
        }
        if let Some(v) = var("GLPI_DB_PORT") {
            self.db.port = parse("GLPI_DB_PORT", &v)?;
        }
        if let Some(v) = var("GLPI_DB_USER") {
            self.db.user = v;
        }
        if let Some(v) = var("GLPI_DB_PASSWORD") {
            self.db.password = v;
        }
        if let Some(v) = var("GLPI_DB_NAME") {
            self.db.name = v;
        }
        if let Some(v) = var("GLPI_DB_POOL_SIZE") {
            self.db.max_connections = parse("GLPI_DB_POOL_SIZE", &v)?;
        }

        if let Some(v) = var("PORT") {
            self.http.server.addr.set_port(parse("PORT", &v)?);
        }
        if let Some(v) = var("CORS_ORIGINS") {
            self.http.cors.allowed_origins = v
                .split(',')
                .map(str::trim)
                .filter(|o| !o.is_empty())
                .map(String::from)
                .collect();
        }

        if let Some(v) = var("GLPI_BASE_URL") {
            self.glpi.base_url = Some(v);
        }
        if let Some(v) = var("GLPI_APP_TOKEN") {
            self.glpi.app_token = Some(v);
        }

        if let Some(v) = var("SESSION_SECRET") {
            self.session.secret = v;
        }
        if let Some(v) = var("SESSION_SECURE_COOKIE") {
            self.session.secure = flag("SESSION_SECURE_COOKIE", &v)?;
        }

        if let Some(v) = var("DEV_BYPASS_AUTH") {
            self.dev.bypass_auth = flag("DEV_BYPASS_AUTH", &v)?;
        }
        if let Some(v) = var("DEV_FAKE_SESSION") {
            self.dev.fake_session = v;
        }
        if let Some(v) = var("DEV_BYPASS_COOKIE") {
            self.dev.bypass_cookie = flag("DEV_BYPASS_COOKIE", &v)?;
        }
        if let Some(v) = var("DEV_API_KEY") {
            self.dev.api_key = Some(v.trim().to_owned());
        }

        if let Some(v) = var("CLIENT_LOG_PATH") {
            self.client_log.path = PathBuf::from(v);
        }

        Ok(())
    }
}

fn parse<T: FromStr>(var: &'static str, value: &str) -> Result<T, Error> {
    value.trim().parse().map_err(|_| Error::Env {
        var,
        value: value.to_owned(),
    })
}

fn flag(var: &'static str, value: &str) -> Result<bool, Error> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(Error::Env {
            var,
            value: value.to_owned(),
        }),
    }
}
