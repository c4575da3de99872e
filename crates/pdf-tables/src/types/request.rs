//! Request types

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use super::document::ExtractedDocument;

/// Pre-extracted document submitted as JSON
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestRequest {
    /// Source filename, recorded on the document record
    #[serde(default)]
    pub filename: Option<String>,
    /// Logical table key to row- or column-oriented table
    pub tables: BTreeMap<String, Value>,
    #[serde(default)]
    pub text_fields: Map<String, Value>,
    #[serde(default)]
    pub full_text: String,
}

impl IngestRequest {
    /// Split into the filename and an extraction result
    pub fn into_parts(self) -> (Option<String>, ExtractedDocument) {
        let document = ExtractedDocument {
            tables: self.tables,
            text_fields: self.text_fields,
            full_text: self.full_text,
            total_pages: None,
        };
        (self.filename, document)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_optional_fields_default() {
        let request: IngestRequest =
            serde_json::from_value(json!({"tables": {"table_1": [{"a": 1}]}})).unwrap();
        let (filename, document) = request.into_parts();

        assert!(filename.is_none());
        assert_eq!(document.tables.len(), 1);
        assert!(document.text_fields.is_empty());
        assert!(document.full_text.is_empty());
    }
}
