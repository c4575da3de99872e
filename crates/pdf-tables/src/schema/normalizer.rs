//! Table normalization: column-oriented, sanitized, pruned

use serde_json::Value;

use super::classifier::{all_meaningless, coerce_scalar, is_meaningless};
use super::sanitizer::{is_placeholder_identifier, sanitize, DIGIT_PREFIX};
use super::SYSTEM_COLUMNS;
use crate::types::table::{ExtractedTable, Row};

/// A sanitized column and its (coerced) cell values
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedColumn {
    pub name: String,
    pub values: Vec<Value>,
}

/// Result of normalizing one extracted table
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedTable {
    /// Surviving columns in source order
    pub columns: Vec<NormalizedColumn>,
    /// No named column holds a meaningful value, so nothing worth storing
    /// would reach a physical table
    pub should_discard: bool,
}

impl NormalizedTable {
    /// Column identifiers in order
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Look up a column by identifier
    pub fn column(&self, name: &str) -> Option<&NormalizedColumn> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Sample used for type inference: first meaningful value, else first value, else null
    pub fn sample_for(&self, name: &str) -> Value {
        let Some(column) = self.column(name) else {
            return Value::Null;
        };

        column
            .values
            .iter()
            .find(|v| !is_meaningless(v))
            .or_else(|| column.values.first())
            .cloned()
            .unwrap_or(Value::Null)
    }

    /// Length of the longest column
    pub fn row_count(&self) -> usize {
        self.columns.iter().map(|c| c.values.len()).max().unwrap_or(0)
    }

    /// Rebuild rows, padding short columns with null
    pub fn to_rows(&self) -> Vec<Row> {
        (0..self.row_count())
            .map(|i| {
                self.columns
                    .iter()
                    .map(|c| (c.name.clone(), c.values.get(i).cloned().unwrap_or(Value::Null)))
                    .collect()
            })
            .collect()
    }
}

/// Normalize an extracted table into sanitized columns.
///
/// Placeholder-named columns holding only placeholder values are dropped;
/// named columns are kept even when empty. Two labels that sanitize to the
/// same identifier collide and the later one wins.
pub fn normalize(table: &ExtractedTable) -> NormalizedTable {
    let mut columns: Vec<NormalizedColumn> = Vec::new();

    for (raw_name, raw_values) in table.clone().into_raw_columns() {
        let values: Vec<Value> = raw_values.iter().map(coerce_scalar).collect();
        let mut name = sanitize(&raw_name);

        if is_placeholder_identifier(&name) && all_meaningless(&values) {
            tracing::debug!("Dropping unnamed empty column {:?}", raw_name);
            continue;
        }

        if SYSTEM_COLUMNS.contains(&name.as_str()) {
            name = format!("{}{}", DIGIT_PREFIX, name);
        }

        match columns.iter_mut().find(|c| c.name == name) {
            Some(existing) => {
                tracing::warn!(
                    "Column label {:?} collides with an earlier label as '{}'; keeping the later values",
                    raw_name,
                    name
                );
                existing.values = values;
            }
            None => columns.push(NormalizedColumn { name, values }),
        }
    }

    // unnamed columns are never persisted, so they cannot keep a table alive
    let should_discard = !columns
        .iter()
        .any(|c| !is_placeholder_identifier(&c.name) && !all_meaningless(&c.values));

    NormalizedTable {
        columns,
        should_discard,
    }
}
