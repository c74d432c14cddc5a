use anyhow::Context;
use tokio::net::TcpListener;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use page_extractor::{ArtifactStore, Extractor};
use server::{app, config::Config, state::AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "info,page_extractor=debug,server=debug,tower_http=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env().context("Failed to load configuration")?;
    tracing::info!(mode = %config.extractor.default_mode, "configuration loaded");

    let store = ArtifactStore::open(&config.results_dir)
        .await
        .with_context(|| format!("Cannot use results directory {}", config.results_dir.display()))?;
    let state = AppState::new(Extractor::new(config.extractor.clone()), store);
    let app = app(state, &config)?;

    let listener = TcpListener::bind((config.host.as_str(), config.port))
        .await
        .with_context(|| format!("Cannot bind {}:{}", config.host, config.port))?;
    tracing::info!("listening on http://{}", listener.local_addr()?);
    match &config.frontend_dir {
        Some(dir) => tracing::info!("front-end served from {}", dir.display()),
        None => tracing::info!("no FRONTEND_DIR set, serving the API only"),
    }

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
