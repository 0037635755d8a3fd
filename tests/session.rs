mod common;

use axum::{
    body::Body,
    http::{header, StatusCode},
};
use glpi_dashboard::session::{MIRROR_COOKIE, SESSION_COOKIE};
use serde_json::json;
use wiremock::{
    matchers::{header as has_header, method, path},
    Mock, ResponseTemplate,
};

use common::{cookie_value, json, set_cookies, APP_TOKEN};

async fn mock_login(app: &common::App, token: &str) {
    Mock::given(method("POST"))
        .and(path("/initSession"))
        .and(has_header("App-Token", APP_TOKEN))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "session_token": token })),
        )
        .mount(&app.glpi)
        .await;
}

#[tokio::test]
async fn login_establishes_session() {
    let app = common::app().await;
    mock_login(&app, "tok-1").await;

    let resp = app
        .post_json(
            "/api/glpi/login",
            json!({ "login": "ana", "password": "s3cret" }),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::OK);

    let signed = cookie_value(&resp, SESSION_COOKIE).expect("no session cookie");
    assert!(!signed.is_empty());
    assert_eq!(cookie_value(&resp, MIRROR_COOKIE).as_deref(), Some("tok-1"));
    assert!(set_cookies(&resp).iter().all(|c| c.contains("HttpOnly")));
    assert_eq!(
        json(resp).await,
        json!({ "success": true, "session_token": "tok-1" }),
    );

    let resp = app
        .send(
            common::get("/api/glpi/session")
                .header(header::COOKIE, format!("{SESSION_COOKIE}={signed}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(
        json(resp).await,
        json!({ "success": true, "session_token": "tok-1" }),
    );
}

#[tokio::test]
async fn login_requires_credentials() {
    let app = common::app().await;

    for body in [
        json!({ "login": "ana" }),
        json!({ "login": " ", "password": "s3cret" }),
        json!({}),
    ] {
        let resp = app.post_json("/api/glpi/login", body).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json(resp).await["success"], false);
    }
}

#[tokio::test]
async fn rejected_credentials_require_login() {
    let app = common::app().await;
    Mock::given(path("/initSession"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&app.glpi)
        .await;

    let resp = app
        .post_json(
            "/api/glpi/login",
            json!({ "login": "ana", "password": "wrong" }),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert!(set_cookies(&resp).is_empty());

    let body = json(resp).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["requireLogin"], true);
}

#[tokio::test]
async fn login_without_glpi_settings_fails() {
    let app = common::app_with(|c| c.glpi.app_token = None).await;

    let resp = app
        .post_json(
            "/api/glpi/login",
            json!({ "login": "ana", "password": "s3cret" }),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let body = json(resp).await;
    assert_eq!(body["success"], false);
    assert!(body["message"].as_str().unwrap().contains("GLPI_APP_TOKEN"));
}

#[tokio::test]
async fn adopts_external_session_token() {
    let app = common::app().await;

    let resp = app.post_json("/api/glpi/session", json!({})).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = app
        .post_json("/api/glpi/session", json!({ "session_token": "ext" }))
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(cookie_value(&resp, MIRROR_COOKIE).as_deref(), Some("ext"));
    assert!(cookie_value(&resp, SESSION_COOKIE).is_some());
}

#[tokio::test]
async fn reports_missing_session() {
    let app = common::app().await;

    let resp = app.get("/api/glpi/session").await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        json(resp).await,
        json!({ "success": false, "session_token": null }),
    );
}

#[tokio::test]
async fn recognises_glpi_web_cookie() {
    let app = common::app().await;

    let resp = app
        .send(
            common::get("/api/glpi/session")
                .header(header::COOKIE, "lang=pt; glpi_8ac3914e=web-sess")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(json(resp).await["session_token"], "web-sess");
}

#[tokio::test]
async fn logout_kills_session_and_drops_cookies() {
    let app = common::app().await;
    Mock::given(method("GET"))
        .and(path("/killSession"))
        .and(has_header("Session-Token", "tok-1"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&app.glpi)
        .await;

    let resp = app
        .send(
            common::post("/api/glpi/logout")
                .header(header::COOKIE, format!("{MIRROR_COOKIE}=tok-1"))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(cookie_value(&resp, MIRROR_COOKIE).as_deref(), Some(""));
    assert_eq!(json(resp).await, json!({ "success": true }));
}

#[tokio::test]
async fn logout_leaves_glpi_web_session_alone() {
    let app = common::app().await;
    Mock::given(path("/killSession"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&app.glpi)
        .await;

    let resp = app
        .send(
            common::post("/api/glpi/logout")
                .header(header::COOKIE, "glpi_8ac3914e=web-sess")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn expired_session_requires_login() {
    let app = common::app().await;
    Mock::given(method("GET"))
        .and(path("/getMyEntities"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&app.glpi)
        .await;

    let resp = app
        .send(
            common::get("/api/db/my-entities")
                .header(header::COOKIE, format!("{MIRROR_COOKIE}=stale"))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(cookie_value(&resp, MIRROR_COOKIE).as_deref(), Some(""));
    assert_eq!(json(resp).await["requireLogin"], true);
}

#[tokio::test]
async fn my_entities_needs_session_or_email() {
    let app = common::app().await;

    let resp = app.get("/api/db/my-entities").await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(json(resp).await["requireLogin"], true);
}

#[tokio::test]
async fn dev_bypass_provides_fake_session() {
    let app = common::app_with(|c| {
        c.dev.bypass_auth = true;
        c.dev.bypass_cookie = true;
        c.dev.fake_session = "local-dev".into();
    })
    .await;

    let resp = app.get("/api/glpi/session").await;
    let cookies = set_cookies(&resp);
    assert_eq!(cookie_value(&resp, MIRROR_COOKIE).as_deref(), Some("local-dev"));
    assert!(cookies.iter().all(|c| !c.contains("HttpOnly")));
    assert_eq!(
        json(resp).await,
        json!({ "success": true, "session_token": "local-dev" }),
    );
}

#[tokio::test]
async fn dev_bypass_cookie_does_not_undo_logout() {
    let app = common::app_with(|c| {
        c.dev.bypass_auth = true;
        c.dev.bypass_cookie = true;
    })
    .await;
    Mock::given(method("GET"))
        .and(path("/killSession"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&app.glpi)
        .await;

    let resp = app
        .send(
            common::post("/api/glpi/logout")
                .header(header::COOKIE, format!("{MIRROR_COOKIE}=real-tok"))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::OK);

    let mirrors = set_cookies(&resp)
        .into_iter()
        .filter(|c| c.starts_with(&format!("{MIRROR_COOKIE}=")))
        .collect::<Vec<_>>();
    assert_eq!(mirrors.len(), 1, "{mirrors:?}");
    assert_eq!(cookie_value(&resp, MIRROR_COOKIE).as_deref(), Some(""));
}

#[tokio::test]
async fn dev_bypass_cookie_leaves_real_sessions_alone() {
    let app = common::app_with(|c| {
        c.dev.bypass_auth = true;
        c.dev.bypass_cookie = true;
    })
    .await;

    let resp = app
        .send(
            common::get("/api/glpi/session")
                .header(header::COOKIE, format!("{MIRROR_COOKIE}=real-tok"))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert!(set_cookies(&resp).is_empty());
    assert_eq!(json(resp).await["session_token"], "real-tok");
}
