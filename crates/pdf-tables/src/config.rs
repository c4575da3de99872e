//! Configuration for the extraction and ingestion service

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::schema::sanitizer::is_safe_identifier;

/// Environment variable naming a TOML config file
pub const CONFIG_ENV: &str = "PDF_TABLES_CONFIG";

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// Database and upload locations
    #[serde(default)]
    pub storage: StorageConfig,
    /// PDF extraction configuration
    #[serde(default)]
    pub extraction: ExtractionConfig,
    /// Dynamic table ingestion configuration
    #[serde(default)]
    pub ingestion: IngestionConfig,
}

impl AppConfig {
    /// Parse a TOML configuration file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&raw)
            .map_err(|e| Error::Config(format!("Invalid config file {}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `PDF_TABLES_CONFIG` (or defaults), then apply env overrides
    pub fn load() -> Result<Self> {
        let mut config = match std::env::var_os(CONFIG_ENV) {
            Some(path) => Self::from_file(PathBuf::from(path))?,
            None => Self::default(),
        };

        if let Ok(host) = std::env::var("PDF_TABLES_HOST") {
            config.server.host = host;
        }
        if let Ok(port) = std::env::var("PDF_TABLES_PORT") {
            config.server.port = port
                .parse()
                .map_err(|e| Error::Config(format!("Invalid PDF_TABLES_PORT: {}", e)))?;
        }
        if let Ok(db) = std::env::var("PDF_TABLES_DB") {
            config.storage.database_path = PathBuf::from(db);
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject settings that would make every request fail
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(Error::Config("server.port must be non-zero".to_string()));
        }

        let prefix = self.ingestion.table_prefix.trim_end_matches('_');
        if !is_safe_identifier(prefix) {
            return Err(Error::Config(format!(
                "ingestion.table_prefix {:?} is not a safe identifier",
                self.ingestion.table_prefix
            )));
        }

        Ok(())
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host address
    pub host: String,
    /// Port number
    pub port: u16,
    /// Enable CORS
    pub enable_cors: bool,
    /// Maximum upload size in bytes (default: 50MB)
    pub max_upload_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            enable_cors: true,
            max_upload_size: 50 * 1024 * 1024, // 50MB
        }
    }
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// SQLite database file
    pub database_path: PathBuf,
    /// Directory for uploaded PDFs
    pub upload_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        // Use absolute path so the server can be started from anywhere
        let base = dirs::data_local_dir()
            .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from("/")))
            .join("pdf-tables");

        Self {
            database_path: base.join("pdf_tables.db"),
            upload_dir: base.join("uploads"),
        }
    }
}

/// PDF extraction configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionConfig {
    /// Write a JSON preview of every extraction here (disabled when unset)
    #[serde(default)]
    pub json_output_dir: Option<PathBuf>,
    /// Text extraction timeout in seconds
    #[serde(default = "default_extraction_timeout")]
    pub timeout_secs: u64,
    /// Lines longer than this are never key-value candidates
    #[serde(default = "default_max_kv_line_len")]
    pub max_kv_line_len: usize,
    /// Sanitized keys longer than this are dropped
    #[serde(default = "default_max_kv_key_len")]
    pub max_kv_key_len: usize,
}

fn default_extraction_timeout() -> u64 { 60 }
fn default_max_kv_line_len() -> usize { 160 }
fn default_max_kv_key_len() -> usize { 60 }

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            json_output_dir: None,
            timeout_secs: 60,
            max_kv_line_len: 160,
            max_kv_key_len: 60,
        }
    }
}

/// How logical tables map onto physical tables
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TableLayout {
    /// One physical table per document per logical table (`pdf_table_1_42`)
    #[default]
    PerDocument,
    /// One physical table per logical table, rows keyed by `pdf_id`
    Shared,
}

/// Dynamic table ingestion configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestionConfig {
    /// Physical table naming policy
    #[serde(default)]
    pub table_layout: TableLayout,
    /// Prefix of every dynamic table
    #[serde(default = "default_table_prefix")]
    pub table_prefix: String,
}

fn default_table_prefix() -> String {
    "pdf_".to_string()
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            table_layout: TableLayout::PerDocument,
            table_prefix: default_table_prefix(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.server.port, 5000);
        assert_eq!(config.ingestion.table_layout, TableLayout::PerDocument);
        assert_eq!(config.ingestion.table_prefix, "pdf_");
    }

    #[test]
    fn test_from_file_partial_sections() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[server]
host = "127.0.0.1"
port = 8088
enable_cors = false
max_upload_size = 1024

[ingestion]
table_layout = "shared"
"#
        )
        .unwrap();

        let config = AppConfig::from_file(file.path()).unwrap();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 8088);
        assert_eq!(config.ingestion.table_layout, TableLayout::Shared);
        assert_eq!(config.ingestion.table_prefix, "pdf_");
        assert_eq!(config.extraction.max_kv_line_len, 160);
    }

    #[test]
    fn test_rejects_unsafe_prefix() {
        let mut config = AppConfig::default();
        config.ingestion.table_prefix = "pdf\"; --".to_string();
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }
}
