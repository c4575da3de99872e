//! Read-only browsing of dynamic tables

use rusqlite::types::ValueRef;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};

use super::database::read_columns;
use super::{SchemaStore, SqliteStore, BASE_TABLES};
use crate::error::{Error, Result};
use crate::schema::sanitizer::quote_identifier;
use crate::schema::SYSTEM_COLUMNS;

/// Numeric summary of one column
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnStats {
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub avg: Option<f64>,
    /// Number of numeric cells the summary is over
    pub count: i64,
}

impl SqliteStore {
    /// Dynamic tables whose name starts with `prefix`, base tables excluded
    pub fn list_dynamic_tables(&self, prefix: &str) -> Result<Vec<String>> {
        let snapshot = self.reflect()?;
        Ok(snapshot
            .table_names()
            .filter(|name| name.starts_with(prefix) && !BASE_TABLES.contains(name))
            .map(str::to_string)
            .collect())
    }

    /// All rows of a dynamic table, ordered by row id
    pub fn fetch_table_rows(&self, table: &str) -> Result<Vec<Map<String, Value>>> {
        let table = self.resolve_dynamic_table(table)?;
        let conn = self.conn.lock();

        let mut stmt = conn.prepare(&format!(
            "SELECT * FROM {} ORDER BY rowid",
            quote_identifier(&table)
        ))?;
        let names: Vec<String> = stmt.column_names().into_iter().map(str::to_string).collect();

        let rows = stmt
            .query_map([], |row| {
                let mut map = Map::new();
                for (idx, name) in names.iter().enumerate() {
                    map.insert(name.clone(), sql_to_json(row.get_ref(idx)?));
                }
                Ok(map)
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(rows)
    }

    /// Min, max and average of every data column, over numeric cells only
    pub fn table_analytics(&self, table: &str) -> Result<BTreeMap<String, ColumnStats>> {
        let table = self.resolve_dynamic_table(table)?;
        let conn = self.conn.lock();

        let columns: BTreeSet<String> = read_columns(&conn, &table)?;
        let mut stats = BTreeMap::new();

        for column in columns.iter().filter(|c| !SYSTEM_COLUMNS.contains(&c.as_str())) {
            let quoted = quote_identifier(column);
            let sql = format!(
                "SELECT MIN(CAST({c} AS REAL)), MAX(CAST({c} AS REAL)), AVG(CAST({c} AS REAL)), COUNT({c})
                 FROM {t} WHERE typeof({c}) IN ('integer', 'real')",
                c = quoted,
                t = quote_identifier(&table),
            );

            let column_stats = conn.query_row(&sql, [], |row| {
                Ok(ColumnStats {
                    min: row.get(0)?,
                    max: row.get(1)?,
                    avg: row.get(2)?,
                    count: row.get(3)?,
                })
            })?;

            stats.insert(column.clone(), column_stats);
        }

        Ok(stats)
    }

    /// Match a caller-supplied name against the reflected dynamic tables
    fn resolve_dynamic_table(&self, table: &str) -> Result<String> {
        let snapshot = self.reflect()?;
        if BASE_TABLES.contains(&table) || !snapshot.contains_table(table) {
            return Err(Error::TableNotFound(table.to_string()));
        }
        Ok(table.to_string())
    }
}

fn sql_to_json(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        ValueRef::Text(bytes) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => Value::String(hex::encode(bytes)),
    }
}
