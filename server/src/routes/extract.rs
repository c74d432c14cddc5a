use axum::{routing::post, Router};

use crate::handlers::extract_handlers::extract;

pub fn extract_routes() -> Router {
    Router::new().route("/extract", post(extract))
}
