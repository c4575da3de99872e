//! Per-document table ingestion
//!
//! Each table is parsed, normalized, given a physical shape and inserted
//! independently. A failing table is recorded in the manifest and the rest
//! of the document carries on.

use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::config::{IngestionConfig, TableLayout};
use crate::error::{Error, Result};
use crate::schema::sanitizer::{is_safe_identifier, sanitize, truncate_identifier, MAX_IDENTIFIER_LEN};
use crate::schema::{normalize, SchemaSynthesizer, DOCUMENT_ID_COLUMN};
use crate::storage::SchemaStore;
use crate::types::document::DocumentId;
use crate::types::response::{FailureKind, IngestManifest, TableFailure};
use crate::types::table::{ExtractedTable, Row};

/// Drives extracted tables of one document into dynamic tables
pub struct TableIngestor {
    store: Arc<dyn SchemaStore>,
    synthesizer: SchemaSynthesizer,
    layout: TableLayout,
    table_prefix: String,
}

impl TableIngestor {
    /// Create an ingestor writing through `store`
    pub fn new(store: Arc<dyn SchemaStore>, config: &IngestionConfig) -> Self {
        Self {
            synthesizer: SchemaSynthesizer::new(store.clone(), config.table_prefix.clone()),
            store,
            layout: config.table_layout,
            table_prefix: config.table_prefix.clone(),
        }
    }

    /// Logical table name for a table key of a document.
    ///
    /// Per-document layout appends the document id, shortening the key so
    /// the id survives the identifier length limit.
    pub fn logical_name(&self, key: &str, document_id: DocumentId) -> String {
        let mut base = sanitize(key);

        match self.layout {
            TableLayout::Shared => base,
            TableLayout::PerDocument => {
                let suffix = format!("_{}", document_id);
                let budget = MAX_IDENTIFIER_LEN
                    .saturating_sub(self.table_prefix.len())
                    .saturating_sub(suffix.len());

                if base.len() > budget {
                    base.truncate(budget);
                    truncate_identifier(&mut base);
                }
                if base.is_empty() {
                    base.push_str("table");
                }

                format!("{}{}", base, suffix)
            }
        }
    }

    /// Ingest every table of one document.
    ///
    /// Only a bad prefix or an unreachable store is returned as `Err`;
    /// per-table problems end up in [`IngestManifest::failures`].
    pub fn ingest(&self, document_id: DocumentId, tables: &BTreeMap<String, Value>) -> Result<IngestManifest> {
        let mut manifest = IngestManifest::default();
        if tables.is_empty() {
            return Ok(manifest);
        }

        if !is_safe_identifier(self.table_prefix.trim_end_matches('_')) {
            return Err(Error::Config(format!(
                "table prefix {:?} is not a safe identifier",
                self.table_prefix
            )));
        }

        let snapshot = self.store.reflect()?;
        tracing::debug!(
            "Ingesting {} tables of document {} into {} ({} tables present)",
            tables.len(),
            document_id,
            self.store.name(),
            snapshot.table_names().count()
        );

        for (key, value) in tables {
            if let Err(failure) = self.ingest_table(document_id, key, value, &mut manifest) {
                tracing::warn!(
                    "Table {} of document {} failed ({:?}): {}",
                    failure.table,
                    document_id,
                    failure.kind,
                    failure.reason
                );
                manifest.failures.push(failure);
            }
        }

        tracing::info!(
            "Document {}: {} tables written, {} rows, {} discarded, {} failed",
            document_id,
            manifest.created_tables.len(),
            manifest.total_rows(),
            manifest.discarded_tables.len(),
            manifest.failures.len()
        );

        Ok(manifest)
    }

    fn ingest_table(
        &self,
        document_id: DocumentId,
        key: &str,
        value: &Value,
        manifest: &mut IngestManifest,
    ) -> std::result::Result<(), TableFailure> {
        let extracted = ExtractedTable::from_value(key, value).map_err(|e| TableFailure::from_error(key, &e))?;

        let normalized = normalize(&extracted);
        if normalized.should_discard {
            tracing::info!("Discarding vacuous table {} of document {}", key, document_id);
            manifest.discarded_tables.push(key.to_string());
            return Ok(());
        }

        let logical = self.logical_name(key, document_id);
        let columns: Vec<(String, Value)> = normalized
            .columns
            .iter()
            .map(|c| (c.name.clone(), normalized.sample_for(&c.name)))
            .collect();

        let ensured = self
            .synthesizer
            .ensure_table(&logical, &columns)
            .map_err(|e| TableFailure::from_error(key, &e))?;

        if !manifest.created_tables.contains(&ensured.name) {
            manifest.created_tables.push(ensured.name.clone());
        }

        let left_out: Vec<&str> = normalized
            .column_names()
            .into_iter()
            .filter(|name| !ensured.columns.contains(*name))
            .collect();
        if !left_out.is_empty() {
            tracing::warn!("Leaving unnamed columns {:?} of {} out of {}", left_out, key, ensured.name);
        }

        let rows: Vec<Row> = normalized
            .to_rows()
            .into_iter()
            .map(|mut row| {
                row.retain(|column, _| ensured.columns.contains(column));
                row.insert(DOCUMENT_ID_COLUMN.to_string(), json!(document_id));
                row
            })
            .collect();

        let inserted = self
            .store
            .insert_rows(&ensured.name, &rows)
            .map_err(|e| TableFailure {
                table: key.to_string(),
                kind: FailureKind::InsertFailure,
                reason: e.to_string(),
            })?;

        tracing::info!("Inserted {} rows into {}", inserted, ensured.name);
        *manifest.rows_inserted.entry(ensured.name).or_insert(0) += inserted;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ColumnType;
    use crate::storage::{ColumnSpec, SchemaSnapshot, SqliteStore};
    use std::collections::BTreeSet;

    fn ingestor(layout: TableLayout) -> (Arc<SqliteStore>, TableIngestor) {
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        let config = IngestionConfig {
            table_layout: layout,
            ..IngestionConfig::default()
        };
        let ingestor = TableIngestor::new(store.clone(), &config);
        (store, ingestor)
    }

    fn tables(value: Value) -> BTreeMap<String, Value> {
        serde_json::from_value(value).unwrap()
    }

    fn set(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_ingest_per_document_table() {
        let (store, ingestor) = ingestor(TableLayout::PerDocument);
        let manifest = ingestor
            .ingest(
                7,
                &tables(json!({
                    "table_1": [
                        {"Name": "Alice", "Total Assets (%)": "1,234.50"},
                        {"Name": "", "Total Assets (%)": "n/a"}
                    ]
                })),
            )
            .unwrap();

        assert_eq!(manifest.created_tables, vec!["pdf_table_1_7"]);
        assert_eq!(manifest.rows_inserted["pdf_table_1_7"], 2);
        assert!(manifest.failures.is_empty());

        assert_eq!(
            store.table_columns("pdf_table_1_7").unwrap().unwrap(),
            set(&["id", "pdf_id", "name", "total_assets"])
        );

        let rows = store.fetch_table_rows("pdf_table_1_7").unwrap();
        assert_eq!(rows[0]["name"], json!("Alice"));
        assert_eq!(rows[0]["total_assets"], json!(1234.5));
        assert_eq!(rows[0]["pdf_id"], json!(7));
        assert_eq!(rows[1]["total_assets"], json!("n/a"));
    }

    #[test]
    fn test_shared_layout_grows_report_table() {
        let (store, ingestor) = ingestor(TableLayout::Shared);

        ingestor
            .ingest(1, &tables(json!({"report": [{"Revenue": 100}]})))
            .unwrap();
        let manifest = ingestor
            .ingest(2, &tables(json!({"report": {"Revenue": [5], "Expenses": [2]}})))
            .unwrap();

        assert_eq!(manifest.created_tables, vec!["pdf_report"]);
        assert_eq!(
            store.table_columns("pdf_report").unwrap().unwrap(),
            set(&["id", "pdf_id", "revenue", "expenses"])
        );

        let rows = store.fetch_table_rows("pdf_report").unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["expenses"], Value::Null);
        assert_eq!(rows[1]["pdf_id"], json!(2));
    }

    #[test]
    fn test_vacuous_and_malformed_tables() {
        let (store, ingestor) = ingestor(TableLayout::PerDocument);
        let manifest = ingestor
            .ingest(
                3,
                &tables(json!({
                    "table_1": [{"A": "N/A", "B": " - "}, {"A": "unknown", "B": ""}],
                    "table_2": "not a table",
                    "table_3": [{"Qty": 1}]
                })),
            )
            .unwrap();

        assert_eq!(manifest.discarded_tables, vec!["table_1"]);
        assert_eq!(manifest.failures.len(), 1);
        assert_eq!(manifest.failures[0].table, "table_2");
        assert_eq!(manifest.failures[0].kind, FailureKind::MalformedInput);
        assert_eq!(manifest.created_tables, vec!["pdf_table_3_3"]);
        assert!(store.table_columns("pdf_table_1_3").unwrap().is_none());
    }

    #[test]
    fn test_unnamed_column_left_out_of_rows() {
        let (store, ingestor) = ingestor(TableLayout::PerDocument);
        let manifest = ingestor
            .ingest(4, &tables(json!({"t": [{"n/a": "value", "Qty": 1}]})))
            .unwrap();

        assert_eq!(manifest.rows_inserted["pdf_t_4"], 1);
        assert_eq!(store.table_columns("pdf_t_4").unwrap().unwrap(), set(&["id", "pdf_id", "qty"]));
    }

    #[test]
    fn test_wrapped_placeholder_label_keeps_other_values() {
        let (store, ingestor) = ingestor(TableLayout::PerDocument);
        let manifest = ingestor
            .ingest(5, &tables(json!({"table_1": [{"(None)": "x", "Qty": 1}]})))
            .unwrap();

        assert!(manifest.failures.is_empty());
        assert_eq!(manifest.rows_inserted["pdf_table_1_5"], 1);
        assert_eq!(
            store.table_columns("pdf_table_1_5").unwrap().unwrap(),
            set(&["id", "pdf_id", "qty"])
        );
        let rows = store.fetch_table_rows("pdf_table_1_5").unwrap();
        assert_eq!(rows[0]["qty"], json!(1));
    }

    #[test]
    fn test_table_of_unnamed_columns_discarded() {
        let (store, ingestor) = ingestor(TableLayout::PerDocument);
        let manifest = ingestor
            .ingest(1, &tables(json!({"table_1": [{"n/a": "real data"}, {"": "more"}]})))
            .unwrap();

        assert_eq!(manifest.discarded_tables, vec!["table_1"]);
        assert!(manifest.created_tables.is_empty());
        assert!(manifest.rows_inserted.is_empty());
        assert!(store.table_columns("pdf_table_1_1").unwrap().is_none());
    }

    #[test]
    fn test_long_key_keeps_document_id() {
        let (_, ingestor) = ingestor(TableLayout::PerDocument);
        let key = "a very long table caption ".repeat(5);

        let logical = ingestor.logical_name(&key, 123456);
        assert!(logical.ends_with("_123456"));
        assert!(format!("pdf_{}", logical).len() <= MAX_IDENTIFIER_LEN);
        assert_eq!(sanitize(&format!("pdf_{}", logical)), format!("pdf_{}", logical));
    }

    #[test]
    fn test_empty_input_is_empty_manifest() {
        let (_, ingestor) = ingestor(TableLayout::PerDocument);
        let manifest = ingestor.ingest(1, &BTreeMap::new()).unwrap();
        assert_eq!(manifest, IngestManifest::default());
    }

    /// Delegates to SQLite but refuses inserts into one table
    struct FailingInserts {
        inner: SqliteStore,
        fail_table: &'static str,
    }

    impl SchemaStore for FailingInserts {
        fn reflect(&self) -> Result<SchemaSnapshot> {
            self.inner.reflect()
        }

        fn table_columns(&self, table: &str) -> Result<Option<BTreeSet<String>>> {
            self.inner.table_columns(table)
        }

        fn create_table(&self, table: &str, columns: &[ColumnSpec]) -> Result<bool> {
            self.inner.create_table(table, columns)
        }

        fn add_column_if_absent(&self, table: &str, column: &str, column_type: ColumnType) -> Result<bool> {
            self.inner.add_column_if_absent(table, column, column_type)
        }

        fn insert_rows(&self, table: &str, rows: &[Row]) -> Result<usize> {
            if table == self.fail_table {
                return Err(Error::insert_failure(table, "disk I/O error"));
            }
            self.inner.insert_rows(table, rows)
        }

        fn name(&self) -> &str {
            "failing"
        }
    }

    #[test]
    fn test_insert_failure_does_not_stop_other_tables() {
        let store = Arc::new(FailingInserts {
            inner: SqliteStore::in_memory().unwrap(),
            fail_table: "pdf_table_1_9",
        });
        let ingestor = TableIngestor::new(store.clone(), &IngestionConfig::default());

        let manifest = ingestor
            .ingest(
                9,
                &tables(json!({
                    "table_1": [{"a": 1}],
                    "table_2": [{"b": 2}]
                })),
            )
            .unwrap();

        assert_eq!(manifest.failures.len(), 1);
        assert_eq!(manifest.failures[0].table, "table_1");
        assert_eq!(manifest.failures[0].kind, FailureKind::InsertFailure);
        assert_eq!(manifest.rows_inserted.get("pdf_table_2_9"), Some(&1));
        assert!(!manifest.rows_inserted.contains_key("pdf_table_1_9"));
        // the table stays behind even though its rows were refused
        assert!(store.table_columns("pdf_table_1_9").unwrap().is_some());
    }

    #[test]
    fn test_unreachable_store_is_an_error() {
        struct Offline;

        impl SchemaStore for Offline {
            fn reflect(&self) -> Result<SchemaSnapshot> {
                Err(Error::internal("connection refused"))
            }
            fn table_columns(&self, _: &str) -> Result<Option<BTreeSet<String>>> {
                Err(Error::internal("connection refused"))
            }
            fn create_table(&self, _: &str, _: &[ColumnSpec]) -> Result<bool> {
                Err(Error::internal("connection refused"))
            }
            fn add_column_if_absent(&self, _: &str, _: &str, _: ColumnType) -> Result<bool> {
                Err(Error::internal("connection refused"))
            }
            fn insert_rows(&self, _: &str, _: &[Row]) -> Result<usize> {
                Err(Error::internal("connection refused"))
            }
            fn name(&self) -> &str {
                "offline"
            }
        }

        let ingestor = TableIngestor::new(Arc::new(Offline), &IngestionConfig::default());
        let result = ingestor.ingest(1, &tables(json!({"t": [{"a": 1}]})));
        assert!(matches!(result, Err(Error::Internal(_))));
    }
}
