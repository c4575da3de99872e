//! pdf-tables: PDF table extraction with dynamic relational storage
//!
//! Extracted tables arrive with unpredictable column sets. This crate
//! sanitizes their labels into safe identifiers, drops placeholder noise,
//! and grows one SQLite table per logical table on demand, appending
//! columns as new labels appear. An axum server exposes upload and
//! browsing endpoints on top.

pub mod config;
pub mod error;
pub mod ingestion;
pub mod schema;
pub mod server;
pub mod storage;
pub mod types;

pub use config::AppConfig;
pub use error::{Error, Result};
pub use ingestion::{PdfExtractor, TableIngestor};
pub use schema::{sanitize, ColumnType, NormalizedTable, SchemaSynthesizer};
pub use storage::{DocumentStore, SchemaStore, SqliteStore};
pub use types::{
    document::{DocumentId, DocumentRecord, ExtractedDocument},
    response::{IngestManifest, TableFailure},
    table::ExtractedTable,
};
