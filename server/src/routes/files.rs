use axum::routing::{delete, get, post};
use axum::Router;

use crate::handlers::file_handlers::{bulk_delete, delete_file, download_all, download_file, list_files};

pub fn file_routes() -> Router {
    Router::new()
        .route("/files", get(list_files))
        .route("/download/{filename}", get(download_file))
        .route("/download-all", get(download_all))
        .route("/delete/{filename}", delete(delete_file))
        .route("/bulk-delete", post(bulk_delete))
}
