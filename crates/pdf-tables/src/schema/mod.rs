//! Dynamic schema handling
//!
//! Turns extracted labels into safe identifiers, classifies sample values
//! into column types, cleans extracted tables and grows physical tables
//! to fit them.

pub mod classifier;
pub mod normalizer;
pub mod sanitizer;
pub mod synthesizer;

pub use classifier::{classify_type, coerce_scalar, is_meaningless, ColumnType};
pub use normalizer::{normalize, NormalizedColumn, NormalizedTable};
pub use sanitizer::{sanitize, PLACEHOLDER_IDENTIFIER};
pub use synthesizer::{EnsuredTable, SchemaSynthesizer};

/// Auto-assigned row identifier of every dynamic table
pub const ROW_ID_COLUMN: &str = "id";

/// Document record reference of every dynamic table
pub const DOCUMENT_ID_COLUMN: &str = "pdf_id";

/// Columns the system owns; extracted data never lands in them
pub const SYSTEM_COLUMNS: [&str; 2] = [ROW_ID_COLUMN, DOCUMENT_ID_COLUMN];
