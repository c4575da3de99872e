//! Application state for the HTTP server

use std::sync::Arc;

use crate::config::AppConfig;
use crate::error::Result;
use crate::ingestion::{PdfExtractor, TableIngestor};
use crate::storage::{DocumentStore, SqliteStore};
use crate::types::document::{DocumentId, ExtractedDocument, FullTextRecord, NewDocument};
use crate::types::response::IngestManifest;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: AppConfig,
    store: Arc<SqliteStore>,
    extractor: PdfExtractor,
    ingestor: TableIngestor,
}

impl AppState {
    /// Open the database and prepare the upload directory
    pub fn new(config: AppConfig) -> Result<Self> {
        tracing::info!("Initializing application state...");

        std::fs::create_dir_all(&config.storage.upload_dir)?;
        let store = Arc::new(SqliteStore::new(&config.storage.database_path)?);

        Ok(Self::with_store(config, store))
    }

    /// Build state around an already opened store
    pub fn with_store(config: AppConfig, store: Arc<SqliteStore>) -> Self {
        let extractor = PdfExtractor::new(config.extraction.clone());
        let ingestor = TableIngestor::new(store.clone(), &config.ingestion);

        tracing::info!(
            "Table layout {:?}, prefix {:?}",
            config.ingestion.table_layout,
            config.ingestion.table_prefix
        );

        Self {
            inner: Arc::new(AppStateInner {
                config,
                store,
                extractor,
                ingestor,
            }),
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.inner.config
    }

    pub fn store(&self) -> &Arc<SqliteStore> {
        &self.inner.store
    }

    pub fn extractor(&self) -> &PdfExtractor {
        &self.inner.extractor
    }

    /// Record a document, its full text and its tables.
    ///
    /// Blocking; call from `spawn_blocking`.
    pub fn process_document(
        &self,
        filename: Option<String>,
        content_hash: Option<String>,
        document: &ExtractedDocument,
    ) -> Result<(DocumentId, IngestManifest)> {
        let store = &self.inner.store;

        let pdf_id = store.insert_document(&NewDocument::from_extracted(filename, content_hash, document))?;
        store.insert_full_text(&FullTextRecord {
            pdf_id,
            full_text: document.full_text.clone(),
            text_fields: serde_json::Value::Object(document.text_fields.clone()),
        })?;

        let manifest = self.inner.ingestor.ingest(pdf_id, &document.tables)?;
        Ok((pdf_id, manifest))
    }
}
