//! PDF upload endpoint

use axum::{
    extract::{Multipart, State},
    Json,
};
use std::path::{Path, PathBuf};

use super::run_blocking;
use crate::error::{Error, Result};
use crate::ingestion::content_hash;
use crate::schema::sanitize;
use crate::server::state::AppState;
use crate::types::{document::FileType, response::UploadResponse};

/// Multipart field carrying the PDF
const FILE_FIELD: &str = "file";

/// POST /api/upload - Store, extract and ingest one PDF
pub async fn upload_pdf(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>> {
    let mut upload = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| Error::InvalidRequest(format!("Failed to read multipart field: {}", e)))?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let filename = field
            .file_name()
            .map(|s| s.to_string())
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| Error::InvalidRequest("No selected file".to_string()))?;

        let data = field
            .bytes()
            .await
            .map_err(|e| Error::InvalidRequest(format!("Failed to read file: {}", e)))?;

        upload = Some((filename, data));
        break;
    }

    let (filename, data) =
        upload.ok_or_else(|| Error::InvalidRequest(format!("No `{}` field in upload", FILE_FIELD)))?;

    if let FileType::Unsupported(ext) = FileType::from_filename(&filename) {
        return Err(Error::UnsupportedFileType(ext));
    }

    tracing::info!("Processing upload: {} ({} bytes)", filename, data.len());

    let hash = content_hash(&data);
    let saved = stored_path(&state.config().storage.upload_dir, &filename, &hash);
    tokio::fs::write(&saved, &data).await?;
    tracing::info!("Saved upload to {}", saved.display());

    let result = run_blocking(move || {
        let extracted = state.extractor().extract(&filename, &data)?;
        let (pdf_id, manifest) = state.process_document(Some(filename), Some(hash), &extracted)?;
        Ok((pdf_id, extracted.total_pages, manifest))
    })
    .await;

    if result.is_err() {
        if let Err(e) = tokio::fs::remove_file(&saved).await {
            tracing::warn!("Could not remove failed upload {}: {}", saved.display(), e);
        }
    }
    let (pdf_id, total_pages, manifest) = result?;

    Ok(Json(UploadResponse::new(pdf_id, total_pages, manifest)))
}

/// `<upload_dir>/<unix_ts>_<sanitized stem>_<hash prefix>.pdf`
fn stored_path(upload_dir: &Path, filename: &str, hash: &str) -> PathBuf {
    let stem = Path::new(filename)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("document");

    upload_dir.join(format!(
        "{}_{}_{}.pdf",
        chrono::Utc::now().timestamp(),
        sanitize(stem),
        &hash[..hash.len().min(12)]
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stored_path_is_sanitized() {
        let hash = content_hash(b"first");
        let path = stored_path(Path::new("/uploads"), "../../etc/Q1 Report (final).pdf", &hash);
        let name = path.file_name().unwrap().to_str().unwrap();

        assert_eq!(path.parent().unwrap(), Path::new("/uploads"));
        assert!(name.ends_with(&format!("_q1_report_final_{}.pdf", &hash[..12])));
        assert!(name.split('_').next().unwrap().parse::<i64>().is_ok());
    }

    #[test]
    fn test_same_name_different_content_kept_apart() {
        let first = stored_path(Path::new("/uploads"), "report.pdf", &content_hash(b"first"));
        let second = stored_path(Path::new("/uploads"), "report.pdf", &content_hash(b"second"));
        assert_ne!(first.file_name(), second.file_name());
    }
}
