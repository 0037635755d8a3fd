use std::{error::Error, sync::Arc};

use tokio::net;
use tracing_subscriber::{
    layer::SubscriberExt as _, util::SubscriberInitExt as _, EnvFilter,
};

use glpi_dashboard::{db, server, Config};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "glpi_dashboard=info,tower_http=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().await?;

    if config.dev.bypass_auth {
        tracing::warn!(
            fake_session = %config.dev.fake_session,
            "DEV_BYPASS_AUTH is on: requests without a session use a fake \
             GLPI session token",
        );
    }
    if config.glpi.base_url.is_none() || config.glpi.app_token.is_none() {
        tracing::warn!(
            "GLPI_BASE_URL or GLPI_APP_TOKEN is not set, GLPI login will fail",
        );
    }

    let db_client = db::connect(&config.db);
    let state = Arc::new(server::AppState::new(&config, db_client));
    let app = server::router(state, &config.http.cors)?;

    let listener = net::TcpListener::bind(config.http.server.addr).await?;
    tracing::info!(addr = %config.http.server.addr, "listening");
    axum::serve(listener, app).await?;

    Ok(())
}
