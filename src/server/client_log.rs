//! Sink for diagnostics the dashboard sends from the browser.

use std::{io, path::Path};

use axum::{body::Bytes, extract::State, Json};
use serde_json::{json, Value};
use time::{format_description::well_known::Rfc3339, OffsetDateTime};
use tokio::{fs, io::AsyncWriteExt as _};

use crate::api;

use super::SharedAppState;

/// Appends the body as one JSON line. Never fails the request; a malformed
/// body is recorded as `null`.
pub async fn append(
    State(state): State<SharedAppState>,
    body: Bytes,
) -> Json<api::Success> {
    let body = serde_json::from_slice::<Value>(&body).unwrap_or(Value::Null);

    let source = body.get("source").and_then(Value::as_str).unwrap_or("");
    let logs = body.get("logs").and_then(Value::as_array).map(Vec::len);
    tracing::info!(source, logs, "client log received");

    let line = json!({
        "received": OffsetDateTime::now_utc().format(&Rfc3339).ok(),
        "body": body,
    })
    .to_string();
    let path = state.client_log_path.clone();
    tokio::spawn(async move {
        if let Err(e) = append_line(&path, &line).await {
            tracing::error!(path = %path.display(), "failed to write client log: {e}");
        }
    });

    Json(api::Success::OK)
}

async fn append_line(path: &Path, line: &str) -> io::Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir).await?;
    }
    let mut file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await?;
    file.write_all(format!("{line}\n").as_bytes()).await?;
    file.flush().await
}
