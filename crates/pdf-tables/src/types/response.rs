//! Response types for ingestion and browsing

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::document::DocumentId;
use crate::error::Error;

/// What happened to each table of one document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IngestManifest {
    /// Physical tables created or extended, in processing order
    pub created_tables: Vec<String>,
    /// Rows inserted per physical table
    pub rows_inserted: BTreeMap<String, usize>,
    /// Logical keys of tables dropped as vacuous
    pub discarded_tables: Vec<String>,
    /// Tables that could not be ingested
    pub failures: Vec<TableFailure>,
}

impl IngestManifest {
    /// Total rows inserted across all tables
    pub fn total_rows(&self) -> usize {
        self.rows_inserted.values().sum()
    }

    /// Whether every table was either ingested or discarded
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Category of a per-table failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    MalformedInput,
    SchemaConflict,
    InsertFailure,
}

/// One table that failed to ingest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableFailure {
    /// Logical table key
    pub table: String,
    pub kind: FailureKind,
    pub reason: String,
}

impl TableFailure {
    /// Classify an error raised while ingesting `table`
    pub fn from_error(table: impl Into<String>, err: &Error) -> Self {
        let kind = match err {
            Error::MalformedInput { .. } => FailureKind::MalformedInput,
            Error::SchemaConflict { .. } | Error::InvalidIdentifier(_) => FailureKind::SchemaConflict,
            _ => FailureKind::InsertFailure,
        };

        Self {
            table: table.into(),
            kind,
            reason: err.to_string(),
        }
    }
}

/// Response to a PDF upload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadResponse {
    pub message: String,
    pub pdf_id: DocumentId,
    /// Same as `manifest.created_tables`
    pub created_tables: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_pages: Option<u32>,
    pub manifest: IngestManifest,
}

impl UploadResponse {
    pub fn new(pdf_id: DocumentId, total_pages: Option<u32>, manifest: IngestManifest) -> Self {
        let message = if manifest.is_clean() {
            "Document processed successfully".to_string()
        } else {
            format!(
                "Document processed with {} table failure(s)",
                manifest.failures.len()
            )
        };

        Self {
            message,
            pdf_id,
            created_tables: manifest.created_tables.clone(),
            total_pages,
            manifest,
        }
    }
}

/// Dynamic table listing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableListResponse {
    pub tables: Vec<String>,
}

/// Full-text keyword search result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextSearchResponse {
    pub keyword: String,
    pub pdf_ids: Vec<DocumentId>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_failure_kinds() {
        let malformed = TableFailure::from_error("table_1", &Error::malformed("table_1", "bad"));
        assert_eq!(malformed.kind, FailureKind::MalformedInput);

        let conflict = TableFailure::from_error("table_2", &Error::schema_conflict("pdf_t", "x"));
        assert_eq!(conflict.kind, FailureKind::SchemaConflict);

        let insert = TableFailure::from_error(
            "table_3",
            &Error::UnknownColumn {
                table: "pdf_t".to_string(),
                column: "c".to_string(),
            },
        );
        assert_eq!(insert.kind, FailureKind::InsertFailure);
    }

    #[test]
    fn test_manifest_serializes_with_snake_case_kinds() {
        let mut manifest = IngestManifest::default();
        manifest.created_tables.push("pdf_table_1_7".to_string());
        manifest.rows_inserted.insert("pdf_table_1_7".to_string(), 3);
        manifest.failures.push(TableFailure {
            table: "table_2".to_string(),
            kind: FailureKind::InsertFailure,
            reason: "boom".to_string(),
        });

        let value = serde_json::to_value(&manifest).unwrap();
        assert_eq!(value["rows_inserted"], json!({"pdf_table_1_7": 3}));
        assert_eq!(value["failures"][0]["kind"], json!("insert_failure"));
        assert_eq!(manifest.total_rows(), 3);
        assert!(!manifest.is_clean());

        let upload = UploadResponse::new(7, None, manifest);
        assert_eq!(upload.created_tables, vec!["pdf_table_1_7"]);
        assert!(upload.message.contains("1 table failure"));
    }
}
