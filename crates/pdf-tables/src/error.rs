//! Error types for extraction, schema synthesis and storage

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Result type alias for pdf-tables operations
pub type Result<T> = std::result::Result<T, Error>;

/// pdf-tables errors
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Extracted table is neither row- nor column-oriented
    #[error("Malformed table '{table}': {message}")]
    MalformedInput { table: String, message: String },

    /// Storage rejected a create/alter operation
    #[error("Schema synthesis failed for '{table}': {message}")]
    SchemaConflict { table: String, message: String },

    /// A row batch could not be inserted
    #[error("Insert into '{table}' failed: {message}")]
    InsertFailure { table: String, message: String },

    /// Insert referenced a column the table does not have
    #[error("Unknown column '{column}' for table '{table}'")]
    UnknownColumn { table: String, column: String },

    /// Identifier did not pass the safe-identifier check
    #[error("Invalid identifier: {0:?}")]
    InvalidIdentifier(String),

    /// Table not found
    #[error("Table not found: {0}")]
    TableNotFound(String),

    /// Document not found
    #[error("Document not found: {0}")]
    DocumentNotFound(i64),

    /// File parsing error
    #[error("Failed to parse file '{filename}': {message}")]
    FileParse { filename: String, message: String },

    /// Unsupported file type
    #[error("Unsupported file type: {0}")]
    UnsupportedFileType(String),

    /// Request is missing something it needs
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// SQLite error
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a malformed input error
    pub fn malformed(table: impl Into<String>, message: impl Into<String>) -> Self {
        Self::MalformedInput {
            table: table.into(),
            message: message.into(),
        }
    }

    /// Create a schema conflict error
    pub fn schema_conflict(table: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SchemaConflict {
            table: table.into(),
            message: message.into(),
        }
    }

    /// Create an insert failure error
    pub fn insert_failure(table: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InsertFailure {
            table: table.into(),
            message: message.into(),
        }
    }

    /// Create a file parse error
    pub fn file_parse(filename: impl Into<String>, message: impl Into<String>) -> Self {
        Self::FileParse {
            filename: filename.into(),
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match &self {
            Error::Config(msg) => (StatusCode::BAD_REQUEST, "config_error", msg.clone()),
            Error::MalformedInput { .. } => {
                (StatusCode::BAD_REQUEST, "malformed_input", self.to_string())
            }
            Error::SchemaConflict { .. } => {
                (StatusCode::CONFLICT, "schema_conflict", self.to_string())
            }
            Error::InsertFailure { .. } | Error::UnknownColumn { .. } => {
                (StatusCode::UNPROCESSABLE_ENTITY, "insert_failure", self.to_string())
            }
            Error::InvalidIdentifier(_) => {
                (StatusCode::BAD_REQUEST, "invalid_identifier", self.to_string())
            }
            Error::TableNotFound(name) => (
                StatusCode::NOT_FOUND,
                "not_found",
                format!("Table does not exist: {}", name),
            ),
            Error::DocumentNotFound(id) => (
                StatusCode::NOT_FOUND,
                "not_found",
                format!("Document not found: {}", id),
            ),
            Error::FileParse { filename, message } => (
                StatusCode::BAD_REQUEST,
                "parse_error",
                format!("Failed to parse '{}': {}", filename, message),
            ),
            Error::UnsupportedFileType(ext) => (
                StatusCode::BAD_REQUEST,
                "unsupported_type",
                format!("Unsupported file type: {}", ext),
            ),
            Error::InvalidRequest(msg) => (StatusCode::BAD_REQUEST, "invalid_request", msg.clone()),
            Error::Database(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "database_error",
                err.to_string(),
            ),
            Error::Io(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "io_error",
                err.to_string(),
            ),
            Error::Json(err) => (StatusCode::BAD_REQUEST, "json_error", err.to_string()),
            Error::Internal(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", msg.clone())
            }
        };

        let body = Json(json!({
            "error": {
                "type": error_type,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}
