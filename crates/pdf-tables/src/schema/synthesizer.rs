//! Schema synthesis: make a physical table fit a set of columns
//!
//! Tables and columns are only ever added. Every call reflects the
//! current shape from the store first, so several writers may race on the
//! same table without a shared cache going stale.

use serde_json::Value;
use std::collections::BTreeSet;
use std::sync::Arc;

use super::classifier::{classify_type, ColumnType};
use super::sanitizer::{is_placeholder_identifier, sanitize};
use super::{DOCUMENT_ID_COLUMN, ROW_ID_COLUMN, SYSTEM_COLUMNS};
use crate::error::{Error, Result};
use crate::storage::{ColumnSpec, SchemaStore, BASE_TABLES};

/// Outcome of [`SchemaSynthesizer::ensure_table`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnsuredTable {
    /// Physical table name
    pub name: String,
    /// Whether this call created the table
    pub created: bool,
    /// Columns this call added, in request order
    pub added_columns: Vec<String>,
    /// Every data column now present (system columns excluded)
    pub columns: BTreeSet<String>,
}

/// Creates and extends dynamic tables through a [`SchemaStore`]
pub struct SchemaSynthesizer {
    store: Arc<dyn SchemaStore>,
    table_prefix: String,
}

impl SchemaSynthesizer {
    /// Create a synthesizer naming tables `<prefix><logical name>`
    pub fn new(store: Arc<dyn SchemaStore>, table_prefix: impl Into<String>) -> Self {
        Self {
            store,
            table_prefix: table_prefix.into(),
        }
    }

    /// Physical name for a logical table name
    pub fn physical_name(&self, logical_name: &str) -> String {
        sanitize(&format!("{}{}", self.table_prefix, logical_name))
    }

    /// Ensure a table named after `logical_name` exists with at least the
    /// requested columns. Each column is `(name, sample)`; the sample
    /// decides the type of a column that has to be added.
    pub fn ensure_table(&self, logical_name: &str, columns: &[(String, Value)]) -> Result<EnsuredTable> {
        let table = self.physical_name(logical_name);
        if BASE_TABLES.contains(&table.as_str()) {
            return Err(Error::schema_conflict(
                &table,
                "name collides with a base table",
            ));
        }

        let requested = self.requested_columns(&table, columns);

        let existing = self
            .store
            .table_columns(&table)
            .map_err(|e| as_conflict(&table, e))?;

        let mut created = false;
        if existing.is_none() {
            let mut specs = vec![
                ColumnSpec::row_id(ROW_ID_COLUMN),
                ColumnSpec::new(DOCUMENT_ID_COLUMN, ColumnType::Integer).not_null(),
            ];
            specs.extend(
                requested
                    .iter()
                    .map(|(name, column_type)| ColumnSpec::new(name.clone(), *column_type)),
            );

            created = self
                .store
                .create_table(&table, &specs)
                .map_err(|e| as_conflict(&table, e))?;
            if created {
                tracing::info!("Created table {} with {} data columns", table, requested.len());
            } else {
                tracing::debug!("Table {} was created concurrently", table);
            }
        }

        // Re-read after a create too: a concurrent creator may have won
        // with a different column set.
        let present = self
            .store
            .table_columns(&table)
            .map_err(|e| as_conflict(&table, e))?
            .ok_or_else(|| Error::schema_conflict(&table, "table vanished after creation"))?;

        let mut added_columns = if created {
            requested
                .iter()
                .filter(|(name, _)| present.contains(name))
                .map(|(name, _)| name.clone())
                .collect()
        } else {
            Vec::new()
        };

        for (name, column_type) in &requested {
            if present.contains(name) {
                continue;
            }
            let added = self
                .store
                .add_column_if_absent(&table, name, *column_type)
                .map_err(|e| as_conflict(&table, e))?;
            if added {
                tracing::info!("Added column {} ({}) to {}", name, column_type.sql_type(), table);
                added_columns.push(name.clone());
            }
        }

        let columns = self
            .store
            .table_columns(&table)
            .map_err(|e| as_conflict(&table, e))?
            .unwrap_or_default()
            .into_iter()
            .filter(|c| !SYSTEM_COLUMNS.contains(&c.as_str()))
            .collect();

        Ok(EnsuredTable {
            name: table,
            created,
            added_columns,
            columns,
        })
    }

    /// Sanitized, typed, de-duplicated request; placeholder and system
    /// names are skipped
    fn requested_columns(&self, table: &str, columns: &[(String, Value)]) -> Vec<(String, ColumnType)> {
        let mut requested: Vec<(String, ColumnType)> = Vec::with_capacity(columns.len());

        for (raw_name, sample) in columns {
            let name = sanitize(raw_name);
            if is_placeholder_identifier(&name) || SYSTEM_COLUMNS.contains(&name.as_str()) {
                tracing::warn!("Not creating column {:?} on {}", raw_name, table);
                continue;
            }

            let column_type = classify_type(sample);
            match requested.iter_mut().find(|(existing, _)| *existing == name) {
                Some(entry) => entry.1 = column_type,
                None => requested.push((name, column_type)),
            }
        }

        requested
    }

    /// Store name for logging
    pub fn store_name(&self) -> &str {
        self.store.name()
    }
}

fn as_conflict(table: &str, err: Error) -> Error {
    match err {
        Error::SchemaConflict { .. } => err,
        other => Error::schema_conflict(table, other.to_string()),
    }
}
