//! Browsing endpoints for document records, dynamic tables and full text

use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use super::run_blocking;
use crate::error::{Error, Result};
use crate::server::state::AppState;
use crate::storage::{ColumnStats, DocumentStore};
use crate::types::document::{DocumentId, DocumentRecord, FullTextRecord};
use crate::types::response::{TableListResponse, TextSearchResponse};

/// GET /api/raw/data - All document records
pub async fn raw_data(State(state): State<AppState>) -> Result<Json<Vec<DocumentRecord>>> {
    let records = run_blocking(move || state.store().list_documents()).await?;
    Ok(Json(records))
}

/// GET /api/raw/row/:id - One document record
pub async fn raw_row(
    State(state): State<AppState>,
    Path(id): Path<DocumentId>,
) -> Result<Json<DocumentRecord>> {
    let record = run_blocking(move || state.store().get_document(id)).await?;
    record.map(Json).ok_or(Error::DocumentNotFound(id))
}

/// GET /api/tables - Dynamic table names
pub async fn list_tables(State(state): State<AppState>) -> Result<Json<TableListResponse>> {
    let prefix = state.config().ingestion.table_prefix.clone();
    let tables = run_blocking(move || state.store().list_dynamic_tables(&prefix)).await?;
    Ok(Json(TableListResponse { tables }))
}

/// GET /api/table/:name - All rows of one dynamic table
pub async fn get_table(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<Vec<Map<String, Value>>>> {
    let rows = run_blocking(move || state.store().fetch_table_rows(&name)).await?;
    Ok(Json(rows))
}

/// GET /api/analytics/:name - Numeric summary per column
pub async fn table_analytics(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<BTreeMap<String, ColumnStats>>> {
    let stats = run_blocking(move || state.store().table_analytics(&name)).await?;
    Ok(Json(stats))
}

/// GET /api/text/:pdf_id - Stored full text
pub async fn get_text(
    State(state): State<AppState>,
    Path(pdf_id): Path<DocumentId>,
) -> Result<Json<FullTextRecord>> {
    let text = run_blocking(move || state.store().get_full_text(pdf_id)).await?;
    text.map(Json).ok_or(Error::DocumentNotFound(pdf_id))
}

/// GET /api/text/search/:keyword - Documents whose text contains a keyword
pub async fn search_text(
    State(state): State<AppState>,
    Path(keyword): Path<String>,
) -> Result<Json<TextSearchResponse>> {
    let query = keyword.clone();
    let pdf_ids = run_blocking(move || state.store().search_full_text(&query)).await?;
    Ok(Json(TextSearchResponse { keyword, pdf_ids }))
}
