//! HTTP surface: the router, its shared state and middleware.

pub mod auth;
pub mod client_log;
pub mod report;

use std::{path::PathBuf, sync::Arc, time::Duration};

use axum::{
    extract::{Query, Request, State},
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE, SET_COOKIE, WWW_AUTHENTICATE},
        HeaderName, HeaderValue, Method, StatusCode,
    },
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use axum_extra::extract::CookieJar;
use serde::Deserialize;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

use crate::{api, config, db, glpi, session, Config};

const API_KEY_HEADER: &str = "x-api-key";

const DEV_BYPASS_COOKIE_MAX_AGE: Duration = Duration::from_secs(7 * 24 * 60 * 60);

pub type SharedAppState = Arc<AppState>;

pub struct AppState {
    pub db_client: db::Client,
    pub glpi: glpi::Client,
    pub sessions: session::Keys,
    pub dev: config::Dev,
    pub client_log_path: PathBuf,
}

impl AppState {
    pub fn new(config: &Config, db_client: db::Client) -> Self {
        Self {
            db_client,
            glpi: glpi::Client::new(&config.glpi),
            sessions: session::Keys::new(&config.session),
            dev: config.dev.clone(),
            client_log_path: config.client_log.path.clone(),
        }
    }
}

pub fn router(
    state: SharedAppState,
    cors: &config::Cors,
) -> Result<Router, axum::http::header::InvalidHeaderValue> {
    let glpi_routes = Router::new()
        .route("/login", post(auth::login))
        .route("/session", get(auth::get_session).post(auth::set_session))
        .route("/logout", post(auth::logout));

    let db_routes = Router::new()
        .route("/entities", get(report::list_entities))
        .route("/my-entities", get(report::my_entities))
        .route(
            "/entities/children/:parent_id",
            get(report::list_entity_children),
        )
        .route("/entities/:id/computers", get(report::list_entity_computers))
        .route("/computers/count", get(report::count_computers))
        .route("/computers/search", get(report::search_computers))
        .route("/tickets", get(report::list_tickets))
        .route("/tickets/details", get(report::get_ticket_details))
        .route("/tickets/nps", get(report::get_nps_summary))
        .route("/tickets/tma", get(report::get_tma_summary))
        .route("/tickets/report", get(report::get_report))
        .route("/categories", get(report::list_categories))
        .route("/technicians", get(report::list_technicians))
        .route("/client-logs", post(client_log::append))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_api_key,
        ));

    Ok(Router::new()
        .route("/", get(root))
        .nest("/api/glpi", glpi_routes)
        .nest("/api/db", db_routes)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            set_dev_bypass_cookie,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(cors)?)
        .with_state(state))
}

/// Without configured origins the request origin is mirrored, so the
/// dashboard works from any host during development.
fn cors_layer(
    config: &config::Cors,
) -> Result<CorsLayer, axum::http::header::InvalidHeaderValue> {
    let origin = if config.allowed_origins.is_empty() {
        AllowOrigin::mirror_request()
    } else {
        AllowOrigin::list(
            config
                .allowed_origins
                .iter()
                .map(|o| o.parse::<HeaderValue>())
                .collect::<Result<Vec<_>, _>>()?,
        )
    };
    Ok(CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([
            AUTHORIZATION,
            CONTENT_TYPE,
            HeaderName::from_static(API_KEY_HEADER),
        ])
        .allow_credentials(true))
}

async fn root() -> Json<api::Root> {
    Json(api::Root {
        message: "GLPI report backend".into(),
        version: env!("CARGO_PKG_VERSION").into(),
    })
}

#[derive(Deserialize)]
struct ApiKeyQuery {
    #[serde(rename = "apiKey")]
    api_key: Option<String>,
}

/// Guards `/api/db` when an API key is configured.
async fn require_api_key(
    State(state): State<SharedAppState>,
    Query(ApiKeyQuery { api_key }): Query<ApiKeyQuery>,
    req: Request,
    next: Next,
) -> Response {
    let Some(expected) = &state.dev.api_key else {
        return next.run(req).await;
    };

    let provided = req
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned)
        .or(api_key)
        .unwrap_or_default();
    if provided.trim() == expected {
        return next.run(req).await;
    }

    (
        StatusCode::UNAUTHORIZED,
        [(WWW_AUTHENTICATE, r#"ApiKey realm="Dev""#)],
        Json(api::Failure::new("invalid api key")),
    )
        .into_response()
}

/// With the development bypass, exposes the fake session token in a cookie
/// scripts can read. Real sessions and responses managing the mirror cookie
/// themselves are left alone.
async fn set_dev_bypass_cookie(
    State(state): State<SharedAppState>,
    jar: CookieJar,
    req: Request,
    next: Next,
) -> Response {
    if !(state.dev.bypass_auth && state.dev.bypass_cookie) {
        return next.run(req).await;
    }

    let token = state
        .sessions
        .find(None, req.headers(), &state.dev)
        .filter(|s| s.source == session::Source::DevBypass)
        .map(|s| s.token);
    let resp = next.run(req).await;
    match token {
        Some(token) if !sets_cookie(&resp, session::MIRROR_COOKIE) => (
            jar.add(session::dev_bypass_cookie(
                &token,
                DEV_BYPASS_COOKIE_MAX_AGE,
            )),
            resp,
        )
            .into_response(),
        _ => resp,
    }
}

fn sets_cookie(resp: &Response, name: &str) -> bool {
    resp.headers()
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .any(|v| v.split_once('=').is_some_and(|(n, _)| n.trim() == name))
}
