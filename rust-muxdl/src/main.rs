use rust_muxdl::api::{ApiServer, ApiServerConfig, AppState};
use rust_muxdl::config::AppConfig;
use rust_muxdl::logging::init_logging;
use rust_muxdl::services::ServiceContainer;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let config = AppConfig::from_env_or_default();
    let _log_guard = init_logging(&config.log_dir)?;

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Starting rust-muxdl");

    let container = ServiceContainer::from_config(&config).await?;
    let state = AppState::new(container.download_service.clone());
    let server = ApiServer::new(ApiServerConfig::from_env_or_default(), state);

    let cancel_token = server.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Received Ctrl-C");
            cancel_token.cancel();
        }
    });

    server.run().await?;

    tracing::info!("rust-muxdl stopped");
    Ok(())
}
