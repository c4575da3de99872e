//! Core types for documents, tables and API payloads

pub mod document;
pub mod request;
pub mod response;
pub mod table;

pub use document::{DocumentId, DocumentRecord, ExtractedDocument, FileType, FullTextRecord, NewDocument};
pub use request::IngestRequest;
pub use response::{
    FailureKind, IngestManifest, TableFailure, TableListResponse, TextSearchResponse, UploadResponse,
};
pub use table::{ExtractedTable, Row};
