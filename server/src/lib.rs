pub mod config;
pub mod handlers;
pub mod routes;
pub mod state;

use anyhow::{Context, Result};
use axum::http::{header, HeaderValue, Method};
use axum::{Extension, Router};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use config::Config;
use routes::{extract::extract_routes, files::file_routes};
use state::AppState;

/// API routes with the shared state attached.
pub fn router(state: AppState) -> Router {
    Router::new()
        .merge(extract_routes())
        .merge(file_routes())
        .layer(Extension(state))
}

/// The full application: API, optional front-end files, request tracing and CORS.
pub fn app(state: AppState, config: &Config) -> Result<Router> {
    let origins = config
        .allowed_origins
        .iter()
        .map(|origin| {
            origin
                .parse::<HeaderValue>()
                .with_context(|| format!("invalid origin in ALLOWED_ORIGINS: {origin}"))
        })
        .collect::<Result<Vec<_>>>()?;

    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    let mut app = router(state);
    if let Some(dir) = &config.frontend_dir {
        app = app.fallback_service(ServeDir::new(dir));
    }

    Ok(app.layer(TraceLayer::new_for_http()).layer(cors))
}
