//! `/api/glpi`: opening, inspecting and closing GLPI sessions.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use axum_extra::extract::CookieJar;
use derive_more::From;
use serde::Deserialize;

use crate::{
    api, glpi,
    session::{self, GlpiSession, Source},
};

use super::SharedAppState;

#[derive(Deserialize)]
pub struct LoginInput {
    #[serde(default)]
    login: Option<String>,
    #[serde(default)]
    password: Option<String>,
}

#[tracing::instrument(skip_all)]
pub async fn login(
    State(state): State<SharedAppState>,
    jar: CookieJar,
    Json(LoginInput { login, password }): Json<LoginInput>,
) -> Result<(CookieJar, Json<api::SessionToken>), LoginError> {
    use LoginError as E;

    let (login, password) = login
        .filter(|l| !l.trim().is_empty())
        .zip(password.filter(|p| !p.is_empty()))
        .ok_or(E::MissingCredentials)?;

    let token = state.glpi.init_session(login.trim(), &password).await?;
    let jar = state.sessions.establish(jar, &token)?;
    tracing::info!(login = login.trim(), "GLPI session opened");

    Ok((
        jar,
        Json(api::SessionToken {
            success: true,
            session_token: Some(token),
        }),
    ))
}

#[derive(Debug, From)]
pub enum LoginError {
    #[from]
    Glpi(glpi::Error),
    #[from]
    Signing(jsonwebtoken::errors::Error),
    MissingCredentials,
}

impl IntoResponse for LoginError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            Self::MissingCredentials => (
                StatusCode::BAD_REQUEST,
                api::Failure::new("login and password required"),
            ),
            Self::Glpi(glpi::Error::Unauthorized) => (
                StatusCode::UNAUTHORIZED,
                api::Failure::require_login("invalid GLPI credentials"),
            ),
            Self::Glpi(e) => {
                tracing::error!("GLPI login failed: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    api::Failure::new(e.to_string()),
                )
            }
            Self::Signing(e) => {
                tracing::error!("failed to sign session cookie: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    api::Failure::new("login failed"),
                )
            }
        };
        (status, Json(body)).into_response()
    }
}

#[derive(Deserialize)]
pub struct SetSessionInput {
    #[serde(default)]
    session_token: Option<String>,
}

/// Adopts a session token obtained elsewhere, e.g. by another GLPI front.
#[tracing::instrument(skip_all)]
pub async fn set_session(
    State(state): State<SharedAppState>,
    jar: CookieJar,
    Json(SetSessionInput { session_token }): Json<SetSessionInput>,
) -> Result<(CookieJar, Json<api::SessionToken>), SetSessionError> {
    use SetSessionError as E;

    let token = session_token
        .map(|t| t.trim().to_owned())
        .filter(|t| !t.is_empty())
        .ok_or(E::MissingToken)?;
    let jar = state.sessions.establish(jar, &token)?;

    Ok((
        jar,
        Json(api::SessionToken {
            success: true,
            session_token: Some(token),
        }),
    ))
}

#[derive(Debug, From)]
pub enum SetSessionError {
    #[from]
    Signing(jsonwebtoken::errors::Error),
    MissingToken,
}

impl IntoResponse for SetSessionError {
    fn into_response(self) -> Response {
        match self {
            Self::MissingToken => (
                StatusCode::BAD_REQUEST,
                Json(api::Failure::new("session_token required")),
            ),
            Self::Signing(e) => {
                tracing::error!("failed to sign session cookie: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(api::Failure::new("failed to store session")),
                )
            }
        }
        .into_response()
    }
}

pub async fn get_session(
    session: Option<GlpiSession>,
) -> Json<api::SessionToken> {
    let session_token = session.map(|s| s.token);
    Json(api::SessionToken {
        success: session_token.is_some(),
        session_token,
    })
}

#[tracing::instrument(skip_all)]
pub async fn logout(
    State(state): State<SharedAppState>,
    session: Option<GlpiSession>,
    jar: CookieJar,
) -> (CookieJar, Json<api::Success>) {
    // Only API tokens can be killed; web cookies belong to GLPI's own UI.
    if let Some(GlpiSession {
        token,
        source: Source::Bearer | Source::SignedCookie | Source::MirrorCookie,
    }) = session
    {
        let killed = state.glpi.kill_session(&token).await;
        tracing::info!(killed, "GLPI session closed");
    }

    (session::clear(jar), Json(api::Success::OK))
}
