//! Document record types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Opaque id of an ingested document, assigned by the record store
pub type DocumentId = i64;

/// Supported upload types
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    /// PDF document
    Pdf,
    /// Anything else, with its extension
    Unsupported(String),
}

impl FileType {
    /// Detect file type from a filename's extension
    pub fn from_filename(filename: &str) -> Self {
        let extension = filename
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_lowercase())
            .unwrap_or_default();

        match extension.as_str() {
            "pdf" => Self::Pdf,
            _ => Self::Unsupported(extension),
        }
    }

    pub fn is_supported(&self) -> bool {
        matches!(self, Self::Pdf)
    }
}

/// Everything the extractor pulled out of one document
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractedDocument {
    /// Logical table key (`table_1`, ...) to row- or column-oriented data
    #[serde(default)]
    pub tables: BTreeMap<String, Value>,
    /// Sanitized key to coerced value
    #[serde(default)]
    pub text_fields: Map<String, Value>,
    /// Full document text
    #[serde(default)]
    pub full_text: String,
    /// Page count, when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_pages: Option<u32>,
}

/// Document record about to be inserted
#[derive(Debug, Clone)]
pub struct NewDocument {
    pub filename: Option<String>,
    pub content_hash: Option<String>,
    pub tables: Value,
    pub text_fields: Value,
}

impl NewDocument {
    /// Build from an extraction result
    pub fn from_extracted(
        filename: Option<String>,
        content_hash: Option<String>,
        extracted: &ExtractedDocument,
    ) -> Self {
        Self {
            filename,
            content_hash,
            tables: Value::Object(extracted.tables.clone().into_iter().collect()),
            text_fields: Value::Object(extracted.text_fields.clone()),
        }
    }
}

/// Stored document record (`pdf_data` row)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub id: DocumentId,
    pub uploaded_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_hash: Option<String>,
    pub tables: Value,
    pub text_fields: Value,
}

/// Full text of a document (`pdf_full_text` row)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FullTextRecord {
    pub pdf_id: DocumentId,
    pub full_text: String,
    pub text_fields: Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_type_detection() {
        assert_eq!(FileType::from_filename("report.PDF"), FileType::Pdf);
        assert_eq!(
            FileType::from_filename("notes.txt"),
            FileType::Unsupported("txt".to_string())
        );
        assert!(!FileType::from_filename("no_extension").is_supported());
    }
}
