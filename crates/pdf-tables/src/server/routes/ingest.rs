//! JSON ingestion of pre-extracted tables

use axum::{extract::State, Json};

use super::run_blocking;
use crate::error::Result;
use crate::server::state::AppState;
use crate::types::{request::IngestRequest, response::UploadResponse};

/// POST /api/ingest - Register a document from already extracted tables
pub async fn ingest_tables(
    State(state): State<AppState>,
    Json(request): Json<IngestRequest>,
) -> Result<Json<UploadResponse>> {
    let (filename, document) = request.into_parts();
    tracing::info!(
        "Ingesting {} pre-extracted tables ({})",
        document.tables.len(),
        filename.as_deref().unwrap_or("unnamed")
    );

    let (pdf_id, manifest) = run_blocking(move || state.process_document(filename, None, &document)).await?;

    Ok(Json(UploadResponse::new(pdf_id, None, manifest)))
}
