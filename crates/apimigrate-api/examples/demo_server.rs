//! In-memory migration server with instant simulated steps and no AI
//! provider. Handy for exercising the REST API from a browser or curl.
//!
//! Run with: `cargo run -p apimigrate-api --example demo_server`

use apimigrate_api::{create_router, AppState};
use apimigrate_core::{ConfigManager, MigrationConfig, Settings};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::{info, Level};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_max_level(Level::INFO).init();

    let mut settings = Settings::default();
    settings.llm.provider = "disabled".to_string();
    settings.migration = MigrationConfig::instant();
    let config = ConfigManager::from_settings(settings)?;

    let state = AppState::new(config).await?;
    let app = create_router(state);

    let addr = SocketAddr::from(([127, 0, 0, 1], 8001));
    let listener = TcpListener::bind(addr).await?;

    info!("Demo migration server on http://{}", addr);
    info!("  - Health: http://{}/health", addr);
    info!("  - OpenAPI: http://{}/api/openapi.json", addr);
    info!("  - Upload: curl -F file=@proxy.xml http://{}/api/upload-proxy", addr);

    axum::serve(listener, app).await?;
    Ok(())
}
