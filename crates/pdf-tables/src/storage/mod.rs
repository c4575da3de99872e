//! Storage module for persistent data storage
//!
//! SQLite-backed persistence for document records and dynamic tables.
//! Schema mutation goes through [`SchemaStore`]; document bookkeeping
//! through [`DocumentStore`].

mod browse;
mod database;
mod documents;

pub use browse::ColumnStats;
pub use database::SqliteStore;

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

use crate::error::Result;
use crate::schema::ColumnType;
use crate::types::document::{DocumentId, DocumentRecord, FullTextRecord, NewDocument};
use crate::types::table::Row;

/// Raw document records table
pub const DOCUMENTS_TABLE: &str = "pdf_data";

/// Full text and key-value fields table
pub const FULL_TEXT_TABLE: &str = "pdf_full_text";

/// Tables owned by the service itself, never treated as dynamic tables
pub const BASE_TABLES: [&str; 2] = [DOCUMENTS_TABLE, FULL_TEXT_TABLE];

/// Column definition used when creating a table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSpec {
    pub name: String,
    pub column_type: ColumnType,
    pub primary_key: bool,
    pub not_null: bool,
}

impl ColumnSpec {
    /// Plain nullable data column
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
            primary_key: false,
            not_null: false,
        }
    }

    /// Auto-assigned integer row identifier
    pub fn row_id(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            column_type: ColumnType::Integer,
            primary_key: true,
            not_null: true,
        }
    }

    pub fn not_null(mut self) -> Self {
        self.not_null = true;
        self
    }
}

/// Reflected schema: table name to column names
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SchemaSnapshot {
    tables: BTreeMap<String, BTreeSet<String>>,
}

impl SchemaSnapshot {
    pub fn new(tables: BTreeMap<String, BTreeSet<String>>) -> Self {
        Self { tables }
    }

    pub fn contains_table(&self, table: &str) -> bool {
        self.tables.contains_key(table)
    }

    pub fn columns(&self, table: &str) -> Option<&BTreeSet<String>> {
        self.tables.get(table)
    }

    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }
}

/// Schema reflection, additive DDL and parameterized inserts
///
/// Implementations:
/// - `SqliteStore`: local SQLite database
///
/// Implementations must quote every identifier they place in a statement
/// and must reject identifiers that fail `is_safe_identifier`.
pub trait SchemaStore: Send + Sync {
    /// Current tables and their columns
    fn reflect(&self) -> Result<SchemaSnapshot>;

    /// Columns of one table, `None` if it does not exist
    fn table_columns(&self, table: &str) -> Result<Option<BTreeSet<String>>>;

    /// Create a table unless it exists; returns whether this call created it
    fn create_table(&self, table: &str, columns: &[ColumnSpec]) -> Result<bool>;

    /// Add a nullable column unless present; returns whether it was added
    fn add_column_if_absent(&self, table: &str, column: &str, column_type: ColumnType) -> Result<bool>;

    /// Insert rows in one transaction; every key must be an existing column
    fn insert_rows(&self, table: &str, rows: &[Row]) -> Result<usize>;

    /// Insert a single row
    fn insert_row(&self, table: &str, row: &Row) -> Result<()> {
        self.insert_rows(table, std::slice::from_ref(row)).map(|_| ())
    }

    /// Store name for logging
    fn name(&self) -> &str;
}

/// Document record bookkeeping
pub trait DocumentStore: Send + Sync {
    /// Insert a document record and return its id
    fn insert_document(&self, document: &NewDocument) -> Result<DocumentId>;

    /// Get one document record
    fn get_document(&self, id: DocumentId) -> Result<Option<DocumentRecord>>;

    /// All document records, oldest first
    fn list_documents(&self) -> Result<Vec<DocumentRecord>>;

    /// Store the full text and key-value fields of a document
    fn insert_full_text(&self, record: &FullTextRecord) -> Result<()>;

    /// Full text of a document
    fn get_full_text(&self, id: DocumentId) -> Result<Option<FullTextRecord>>;

    /// Documents whose full text contains `keyword` (case-insensitive)
    fn search_full_text(&self, keyword: &str) -> Result<Vec<DocumentId>>;
}
