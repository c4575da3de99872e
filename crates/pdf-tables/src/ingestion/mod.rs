//! Document ingestion: PDF extraction and dynamic table loading

pub mod extractor;
mod orchestrator;

pub use extractor::{content_hash, PdfExtractor};
pub use orchestrator::TableIngestor;
