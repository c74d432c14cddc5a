use axum::{
    body::Bytes,
    extract::Path,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde::Deserialize;
use serde_json::json;
use tracing::error;

use page_extractor::StoreError;

use crate::state::AppState;

const ZIP_NAME: &str = "extracted_files.zip";

#[derive(Deserialize, Default)]
pub struct BulkDeletePayload {
    pub days: Option<u32>,
}

fn store_error(err: StoreError) -> Response {
    match err {
        StoreError::NotFound(_) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "success": false, "error": "File not found" })),
        )
            .into_response(),
        StoreError::InvalidName(name) => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "success": false, "error": format!("Invalid file name: {name}") })),
        )
            .into_response(),
        err => {
            error!(error = %err, "artifact store failure");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "success": false, "error": "Internal error" })),
            )
                .into_response()
        }
    }
}

fn attachment(content_type: &str, filename: &str, bytes: Vec<u8>) -> Response {
    (
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        bytes,
    )
        .into_response()
}

/// GET /files
pub async fn list_files(Extension(state): Extension<AppState>) -> Response {
    match state.store.list().await {
        Ok(files) => {
            let total = files.len();
            Json(json!({ "success": true, "files": files, "total": total })).into_response()
        }
        Err(err) => store_error(err),
    }
}

/// GET /download/{filename}
pub async fn download_file(
    Extension(state): Extension<AppState>,
    Path(filename): Path<String>,
) -> Response {
    match state.store.read(&filename).await {
        Ok(bytes) => attachment("text/plain; charset=utf-8", &filename, bytes),
        Err(err) => store_error(err),
    }
}

/// GET /download-all
pub async fn download_all(Extension(state): Extension<AppState>) -> Response {
    match state.store.zip_all().await {
        Ok(bytes) => attachment("application/zip", ZIP_NAME, bytes),
        Err(err) => store_error(err),
    }
}

/// DELETE /delete/{filename}
pub async fn delete_file(
    Extension(state): Extension<AppState>,
    Path(filename): Path<String>,
) -> Response {
    match state.store.delete(&filename).await {
        Ok(()) => Json(json!({ "success": true, "message": "File deleted successfully" }))
            .into_response(),
        Err(err) => store_error(err),
    }
}

/// POST /bulk-delete
///
/// An empty body means the default of one day.
pub async fn bulk_delete(Extension(state): Extension<AppState>, body: Bytes) -> Response {
    let payload = if body.iter().all(u8::is_ascii_whitespace) {
        BulkDeletePayload::default()
    } else {
        match serde_json::from_slice::<BulkDeletePayload>(&body) {
            Ok(payload) => payload,
            Err(e) => {
                return (
                    StatusCode::BAD_REQUEST,
                    Json(json!({ "success": false, "error": format!("Invalid body: {e}") })),
                )
                    .into_response()
            }
        }
    };
    let days = payload.days.unwrap_or(1);

    match state.store.delete_older_than(days).await {
        Ok(report) => {
            let deleted = report.deleted.len();
            let details: Vec<_> = report
                .deleted
                .iter()
                .map(|d| {
                    json!({
                        "name": d.name,
                        "modified": d.modified.format("%d/%m/%Y %H:%M:%S").to_string(),
                    })
                })
                .collect();
            Json(json!({
                "success": true,
                "deleted": deleted,
                "total": report.total,
                "details": details,
                "message": format!("{deleted} file(s) older than {days} day(s) deleted"),
            }))
            .into_response()
        }
        Err(err) => store_error(err),
    }
}
