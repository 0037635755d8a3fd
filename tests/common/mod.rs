#![allow(dead_code)]

use std::{
    path::PathBuf,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use axum::{
    body::{self, Body},
    http::{header, Method, Request, Response},
    Router,
};
use glpi_dashboard::{db, server, Config};
use serde_json::Value;
use tower::ServiceExt as _;
use wiremock::MockServer;

pub const APP_TOKEN: &str = "app-token";

/// The router under test, wired to a mocked GLPI API.
///
/// The database pool is lazy and points nowhere: only requests that fail
/// before touching the database may be sent.
pub struct App {
    router: Router,
    pub glpi: MockServer,
    pub client_log: PathBuf,
}

pub async fn app() -> App {
    app_with(|_| {}).await
}

pub async fn app_with(configure: impl FnOnce(&mut Config)) -> App {
    static COUNTER: AtomicUsize = AtomicUsize::new(0);

    let glpi = MockServer::start().await;

    let mut config = Config::default();
    config.glpi.base_url = Some(glpi.uri());
    config.glpi.app_token = Some(APP_TOKEN.into());
    config.db.host = "127.0.0.1".into();
    config.db.port = 9;
    config.db.acquire_timeout = Duration::from_millis(500);
    config.client_log.path = std::env::temp_dir()
        .join(format!("glpi-dashboard-{}", std::process::id()))
        .join(format!(
            "client-{}.log",
            COUNTER.fetch_add(1, Ordering::Relaxed),
        ));
    configure(&mut config);

    let state = Arc::new(server::AppState::new(
        &config,
        db::connect(&config.db),
    ));
    let router = server::router(state, &config.http.cors)
        .expect("invalid CORS origins");

    App {
        router,
        glpi,
        client_log: config.client_log.path,
    }
}

impl App {
    pub async fn send(&self, req: Request<Body>) -> Response<Body> {
        self.router
            .clone()
            .oneshot(req)
            .await
            .expect("router never fails")
    }

    pub async fn get(&self, uri: &str) -> Response<Body> {
        self.send(get(uri).body(Body::empty()).unwrap()).await
    }

    pub async fn post_json(&self, uri: &str, body: Value) -> Response<Body> {
        self.send(
            Request::builder()
                .method(Method::POST)
                .uri(uri)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }
}

pub fn get(uri: &str) -> axum::http::request::Builder {
    Request::builder().method(Method::GET).uri(uri)
}

pub fn post(uri: &str) -> axum::http::request::Builder {
    Request::builder().method(Method::POST).uri(uri)
}

pub async fn json(resp: Response<Body>) -> Value {
    let bytes = body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("failed to read the body");
    serde_json::from_slice(&bytes).expect("body is not JSON")
}

/// `Set-Cookie` headers of the response.
pub fn set_cookies(resp: &Response<Body>) -> Vec<String> {
    resp.headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .map(|v| v.to_str().unwrap().to_owned())
        .collect()
}

/// Value a response cookie was set to.
pub fn cookie_value(resp: &Response<Body>, name: &str) -> Option<String> {
    set_cookies(resp).into_iter().find_map(|c| {
        let pair = c.split(';').next()?;
        let (n, v) = pair.split_once('=')?;
        (n == name).then(|| v.to_owned())
    })
}
