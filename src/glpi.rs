//! Client of the GLPI REST API (`apirest.php`).

use derive_more::{Display, From};
use reqwest::{Response, StatusCode};
use serde::Deserialize;
use serde_json::json;

use crate::config;

const APP_TOKEN: &str = "App-Token";
const SESSION_TOKEN: &str = "Session-Token";

#[derive(Clone, Debug)]
pub struct Client {
    http: reqwest::Client,
    base_url: Option<String>,
    app_token: Option<String>,
}

/// An entity the session user has access to, as listed by `getMyEntities`.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct MyEntity {
    pub id: i64,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Display, From)]
pub enum Error {
    /// `base_url` or `app_token` is not set.
    #[display("GLPI_BASE_URL and GLPI_APP_TOKEN must be set")]
    NotConfigured,
    #[display("GLPI did not return a session token")]
    MissingToken,
    /// GLPI rejected the credentials or the session token.
    #[display("GLPI answered 401 Unauthorized")]
    Unauthorized,
    #[display("GLPI answered {_0}")]
    Status(StatusCode),
    #[display("GLPI request failed: {_0}")]
    #[from]
    Request(reqwest::Error),
}

impl std::error::Error for Error {}

#[derive(Deserialize)]
struct InitSession {
    session_token: Option<String>,
    session: Option<NestedSession>,
}

#[derive(Deserialize)]
struct NestedSession {
    session_token: Option<String>,
}

#[derive(Deserialize)]
struct MyEntities {
    #[serde(default)]
    myentities: Vec<MyEntity>,
}

impl Client {
    pub fn new(config: &config::Glpi) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: config
                .base_url
                .as_deref()
                .map(|url| url.trim_end_matches('/').to_owned()),
            app_token: config.app_token.clone(),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.base_url.is_some() && self.app_token.is_some()
    }

    fn endpoint(&self, name: &str) -> Result<(String, &str), Error> {
        match (&self.base_url, &self.app_token) {
            (Some(base), Some(token)) => Ok((format!("{base}/{name}"), token)),
            _ => Err(Error::NotConfigured),
        }
    }

    /// Opens a GLPI session with user credentials and returns its token.
    ///
    /// Older GLPI versions only accept the credentials as query parameters,
    /// so a failed JSON `POST` is retried as a `GET`.
    pub async fn init_session(
        &self,
        login: &str,
        password: &str,
    ) -> Result<String, Error> {
        let (url, app_token) = self.endpoint("initSession")?;

        let posted = self
            .http
            .post(&url)
            .header(APP_TOKEN, app_token)
            .json(&json!({ "login": login, "password": password }))
            .send()
            .await;
        let err = match read_session_token(posted).await {
            Ok(token) => return Ok(token),
            Err(e) => e,
        };
        tracing::warn!("initSession POST failed, retrying as GET: {err}");

        let legacy = self
            .http
            .get(&url)
            .header(APP_TOKEN, app_token)
            .query(&[("login", login), ("password", password)])
            .send()
            .await;
        read_session_token(legacy).await.map_err(|e| match e {
            Error::MissingToken => err,
            e => e,
        })
    }

    /// Closes a GLPI session. Failures are only reported through the
    /// returned flag.
    pub async fn kill_session(&self, session_token: &str) -> bool {
        if session_token.is_empty() {
            return false;
        }
        let Ok((url, app_token)) = self.endpoint("killSession") else {
            return false;
        };

        let resp = self
            .http
            .get(&url)
            .header(APP_TOKEN, app_token)
            .header(SESSION_TOKEN, session_token)
            .send()
            .await;
        match resp {
            Ok(resp) if resp.status().is_success() => true,
            Ok(resp) => {
                tracing::warn!("killSession answered {}", resp.status());
                false
            }
            Err(e) => {
                tracing::warn!("killSession failed: {e}");
                false
            }
        }
    }

    /// Entities visible to the session user, sub-entities included.
    pub async fn get_my_entities(
        &self,
        session_token: &str,
    ) -> Result<Vec<MyEntity>, Error> {
        let (url, app_token) = self.endpoint("getMyEntities")?;

        let resp = self
            .http
            .get(&url)
            .header(APP_TOKEN, app_token)
            .header(SESSION_TOKEN, session_token)
            .query(&[("is_recursive", "true")])
            .send()
            .await?;
        Ok(check_status(resp)?.json::<MyEntities>().await?.myentities)
    }
}

fn check_status(resp: Response) -> Result<Response, Error> {
    match resp.status() {
        StatusCode::UNAUTHORIZED => Err(Error::Unauthorized),
        s if !s.is_success() => Err(Error::Status(s)),
        _ => Ok(resp),
    }
}

async fn read_session_token(
    resp: reqwest::Result<Response>,
) -> Result<String, Error> {
    let body = check_status(resp?)?.json::<InitSession>().await?;
    body.session_token
        .or(body.session.and_then(|s| s.session_token))
        .filter(|token| !token.is_empty())
        .ok_or(Error::MissingToken)
}
