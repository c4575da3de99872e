//! SQLite database for document records and dynamic tables
//!
//! The connection sits behind a mutex; every call locks it for the
//! duration of one statement or one transaction.

use parking_lot::Mutex;
use rusqlite::{params_from_iter, types::Value as SqlValue, Connection};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::Arc;

use super::{ColumnSpec, SchemaSnapshot, SchemaStore, DOCUMENTS_TABLE, FULL_TEXT_TABLE};
use crate::error::{Error, Result};
use crate::schema::sanitizer::{is_safe_identifier, quote_identifier};
use crate::schema::ColumnType;
use crate::types::table::Row;

/// SQLite-backed store
pub struct SqliteStore {
    pub(super) conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Create or open the database at the given path
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)
            .map_err(|e| Error::Internal(format!("Failed to open database {}: {}", path.display(), e)))?;

        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };

        store.migrate()?;
        tracing::info!("Opened database at {}", path.display());
        Ok(store)
    }

    /// Create an in-memory database (for testing)
    #[cfg(test)]
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| Error::Internal(format!("Failed to open in-memory database: {}", e)))?;

        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };

        store.migrate()?;
        Ok(store)
    }

    /// Create the base tables
    fn migrate(&self) -> Result<()> {
        let conn = self.conn.lock();

        conn.execute_batch(r#"
            PRAGMA journal_mode=WAL;
            PRAGMA synchronous=NORMAL;
            PRAGMA foreign_keys=ON;
        "#).map_err(|e| Error::Internal(format!("Failed to set pragmas: {}", e)))?;

        conn.execute_batch(&format!(
            r#"
            -- Raw extraction output, one row per uploaded document
            CREATE TABLE IF NOT EXISTS {documents} (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                uploaded_at TEXT NOT NULL,
                filename TEXT,
                content_hash TEXT,
                tables TEXT NOT NULL DEFAULT '{{}}',
                text_fields TEXT NOT NULL DEFAULT '{{}}'
            );

            CREATE INDEX IF NOT EXISTS idx_pdf_data_content_hash ON {documents}(content_hash);

            -- Full text and key-value fields
            CREATE TABLE IF NOT EXISTS {full_text} (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                pdf_id INTEGER NOT NULL REFERENCES {documents}(id) ON DELETE CASCADE,
                full_text TEXT,
                text_fields TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_pdf_full_text_pdf_id ON {full_text}(pdf_id);
            "#,
            documents = DOCUMENTS_TABLE,
            full_text = FULL_TEXT_TABLE,
        ))
        .map_err(|e| Error::Internal(format!("Failed to run migrations: {}", e)))?;

        tracing::info!("Database migrations complete");
        Ok(())
    }
}

impl SchemaStore for SqliteStore {
    fn reflect(&self) -> Result<SchemaSnapshot> {
        let conn = self.conn.lock();

        let mut stmt = conn.prepare(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )?;
        let names: Vec<String> = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<_>>()?;

        let mut tables = BTreeMap::new();
        for name in names {
            let columns = read_columns(&conn, &name)?;
            tables.insert(name, columns);
        }

        tracing::debug!("Reflected {} tables", tables.len());
        Ok(SchemaSnapshot::new(tables))
    }

    fn table_columns(&self, table: &str) -> Result<Option<BTreeSet<String>>> {
        let conn = self.conn.lock();
        let columns = read_columns(&conn, table)?;
        Ok(if columns.is_empty() { None } else { Some(columns) })
    }

    fn create_table(&self, table: &str, columns: &[ColumnSpec]) -> Result<bool> {
        ensure_safe(table)?;
        for column in columns {
            ensure_safe(&column.name)?;
        }

        let definitions: Vec<String> = columns.iter().map(column_definition).collect();
        let sql = format!(
            "CREATE TABLE IF NOT EXISTS {} ({})",
            quote_identifier(table),
            definitions.join(", ")
        );

        let conn = self.conn.lock();
        if !read_columns(&conn, table)?.is_empty() {
            return Ok(false);
        }

        conn.execute(&sql, [])
            .map_err(|e| Error::schema_conflict(table, format!("create table failed: {}", e)))?;

        Ok(true)
    }

    fn add_column_if_absent(&self, table: &str, column: &str, column_type: ColumnType) -> Result<bool> {
        ensure_safe(table)?;
        ensure_safe(column)?;

        let conn = self.conn.lock();

        let existing = read_columns(&conn, table)?;
        if existing.is_empty() {
            return Err(Error::TableNotFound(table.to_string()));
        }
        if existing.contains(column) {
            return Ok(false);
        }

        alter_add_column(&conn, table, column, column_type)
    }

    fn insert_rows(&self, table: &str, rows: &[Row]) -> Result<usize> {
        ensure_safe(table)?;
        if rows.is_empty() {
            return Ok(0);
        }

        let mut conn = self.conn.lock();

        let existing = read_columns(&conn, table)?;
        if existing.is_empty() {
            return Err(Error::TableNotFound(table.to_string()));
        }
        for row in rows {
            if let Some(unknown) = row.keys().find(|key| !existing.contains(key.as_str())) {
                return Err(Error::UnknownColumn {
                    table: table.to_string(),
                    column: unknown.clone(),
                });
            }
        }

        let tx = conn
            .transaction()
            .map_err(|e| Error::insert_failure(table, format!("failed to begin transaction: {}", e)))?;

        for row in rows {
            let sql = insert_statement(table, row);
            let mut stmt = tx
                .prepare_cached(&sql)
                .map_err(|e| Error::insert_failure(table, format!("failed to prepare insert: {}", e)))?;
            stmt.execute(params_from_iter(row.values().map(json_to_sql)))
                .map_err(|e| Error::insert_failure(table, e.to_string()))?;
        }

        tx.commit()
            .map_err(|e| Error::insert_failure(table, format!("failed to commit: {}", e)))?;

        Ok(rows.len())
    }

    fn name(&self) -> &str {
        "sqlite"
    }
}

/// `ALTER TABLE .. ADD COLUMN`; a column that already exists is `Ok(false)`
fn alter_add_column(conn: &Connection, table: &str, column: &str, column_type: ColumnType) -> Result<bool> {
    let sql = format!(
        "ALTER TABLE {} ADD COLUMN {} {}",
        quote_identifier(table),
        quote_identifier(column),
        column_type.sql_type()
    );

    match conn.execute(&sql, []) {
        Ok(_) => Ok(true),
        // another connection added it between reflection and ALTER
        Err(e) if e.to_string().contains("duplicate column name") => Ok(false),
        Err(e) => Err(Error::schema_conflict(
            table,
            format!("add column {} failed: {}", column, e),
        )),
    }
}

/// Column names of a table, empty when it does not exist
pub(super) fn read_columns(conn: &Connection, table: &str) -> Result<BTreeSet<String>> {
    let mut stmt = conn.prepare_cached("SELECT name FROM pragma_table_info(?1)")?;
    let columns = stmt
        .query_map([table], |row| row.get::<_, String>(0))?
        .collect::<rusqlite::Result<BTreeSet<String>>>()?;
    Ok(columns)
}

fn ensure_safe(ident: &str) -> Result<()> {
    if is_safe_identifier(ident) {
        Ok(())
    } else {
        Err(Error::InvalidIdentifier(ident.to_string()))
    }
}

fn column_definition(spec: &ColumnSpec) -> String {
    let mut def = format!("{} {}", quote_identifier(&spec.name), spec.column_type.sql_type());
    if spec.primary_key {
        def.push_str(" PRIMARY KEY AUTOINCREMENT");
    } else if spec.not_null {
        def.push_str(" NOT NULL");
    }
    def
}

/// `INSERT INTO "t" ("a", "b") VALUES (?1, ?2)` for the row's key set
fn insert_statement(table: &str, row: &Row) -> String {
    if row.is_empty() {
        return format!("INSERT INTO {} DEFAULT VALUES", quote_identifier(table));
    }

    let columns: Vec<String> = row.keys().map(|k| quote_identifier(k)).collect();
    let placeholders: Vec<String> = (1..=row.len()).map(|i| format!("?{}", i)).collect();

    format!(
        "INSERT INTO {} ({}) VALUES ({})",
        quote_identifier(table),
        columns.join(", "),
        placeholders.join(", ")
    )
}

/// Bind a JSON scalar as an SQLite value
fn json_to_sql(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Number(n) => match n.as_i64() {
            Some(i) => SqlValue::Integer(i),
            None => n.as_f64().map(SqlValue::Real).unwrap_or(SqlValue::Null),
        },
        Value::String(s) => SqlValue::Text(s.clone()),
        other => SqlValue::Text(other.to_string()),
    }
}
