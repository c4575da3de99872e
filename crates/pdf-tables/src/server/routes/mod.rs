//! API routes

pub mod data;
pub mod ingest;
pub mod upload;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

use crate::error::{Error, Result};
use crate::server::state::AppState;

/// Build all API routes
pub fn api_routes(max_upload_size: usize) -> Router<AppState> {
    Router::new()
        // Ingestion
        .route(
            "/upload",
            post(upload::upload_pdf).layer(DefaultBodyLimit::max(max_upload_size)),
        )
        .route(
            "/ingest",
            post(ingest::ingest_tables).layer(DefaultBodyLimit::max(max_upload_size)),
        )
        // Document records
        .route("/raw/data", get(data::raw_data))
        .route("/raw/row/:id", get(data::raw_row))
        // Dynamic tables
        .route("/tables", get(data::list_tables))
        .route("/table/:name", get(data::get_table))
        .route("/analytics/:name", get(data::table_analytics))
        // Full text
        .route("/text/:pdf_id", get(data::get_text))
        .route("/text/search/:keyword", get(data::search_text))
        // Info
        .route("/info", get(info))
}

/// Run blocking store or extraction work off the async runtime
pub(crate) async fn run_blocking<T, F>(work: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| Error::Internal(format!("Blocking task failed: {}", e)))?
}

/// API info endpoint
async fn info() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "name": "pdf-tables",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "PDF table extraction into dynamically shaped SQLite tables",
        "endpoints": {
            "POST /api/upload": "Upload a PDF (multipart field `file`)",
            "POST /api/ingest": "Ingest pre-extracted tables as JSON",
            "GET /api/raw/data": "List document records",
            "GET /api/raw/row/:id": "Get one document record",
            "GET /api/tables": "List dynamic tables",
            "GET /api/table/:name": "All rows of a dynamic table",
            "GET /api/analytics/:name": "Min/max/avg per numeric column",
            "GET /api/text/:pdf_id": "Full text of a document",
            "GET /api/text/search/:keyword": "Documents whose text contains a keyword"
        }
    }))
}
