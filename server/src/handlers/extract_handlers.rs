use axum::{extract::rejection::JsonRejection, http::StatusCode, response::IntoResponse, Extension, Json};
use tokio::runtime::Handle;
use tracing::{error, info};

use page_extractor::{ExtractionRequest, ExtractionResult};

use crate::state::AppState;

/// POST /extract
///
/// Always answers 200; failures are reported inside the result.
pub async fn extract(
    Extension(state): Extension<AppState>,
    payload: Result<Json<ExtractionRequest>, JsonRejection>,
) -> impl IntoResponse {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            let result = ExtractionResult::failed("URL is required", Some(rejection.body_text()));
            return (StatusCode::OK, Json(result));
        }
    };
    info!(url = %request.url, mode = ?request.mode, "extraction requested");

    // The page document is not Send, so the whole extraction runs on a
    // blocking worker driving its own future.
    let handle = Handle::current();
    let result = tokio::task::spawn_blocking(move || {
        handle.block_on(state.extractor.process(&request, &state.store))
    })
    .await;

    let result = match result {
        Ok(result) => result,
        Err(e) => {
            error!(error = %e, "extraction worker failed");
            ExtractionResult::failed("Internal error", Some(format!("Thread join error: {e}")))
        }
    };
    (StatusCode::OK, Json(result))
}
