//! Document record persistence on the SQLite store

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row as SqlRow};
use serde_json::Value;

use super::{DocumentStore, SqliteStore, DOCUMENTS_TABLE, FULL_TEXT_TABLE};
use crate::error::{Error, Result};
use crate::types::document::{DocumentId, DocumentRecord, FullTextRecord, NewDocument};

impl DocumentStore for SqliteStore {
    fn insert_document(&self, document: &NewDocument) -> Result<DocumentId> {
        let conn = self.conn.lock();

        conn.execute(
            &format!(
                "INSERT INTO {} (uploaded_at, filename, content_hash, tables, text_fields)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                DOCUMENTS_TABLE
            ),
            params![
                Utc::now().to_rfc3339(),
                document.filename,
                document.content_hash,
                serde_json::to_string(&document.tables)?,
                serde_json::to_string(&document.text_fields)?,
            ],
        )?;

        let id = conn.last_insert_rowid();
        tracing::info!(
            "Stored document {} ({})",
            id,
            document.filename.as_deref().unwrap_or("unnamed")
        );
        Ok(id)
    }

    fn get_document(&self, id: DocumentId) -> Result<Option<DocumentRecord>> {
        let conn = self.conn.lock();

        let raw = conn
            .query_row(
                &format!(
                    "SELECT id, uploaded_at, filename, content_hash, tables, text_fields
                     FROM {} WHERE id = ?1",
                    DOCUMENTS_TABLE
                ),
                params![id],
                RawDocument::from_row,
            )
            .optional()?;

        raw.map(RawDocument::into_record).transpose()
    }

    fn list_documents(&self) -> Result<Vec<DocumentRecord>> {
        let conn = self.conn.lock();

        let mut stmt = conn.prepare(&format!(
            "SELECT id, uploaded_at, filename, content_hash, tables, text_fields
             FROM {} ORDER BY id",
            DOCUMENTS_TABLE
        ))?;

        let raws = stmt
            .query_map([], RawDocument::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        raws.into_iter().map(RawDocument::into_record).collect()
    }

    fn insert_full_text(&self, record: &FullTextRecord) -> Result<()> {
        let conn = self.conn.lock();

        conn.execute(
            &format!(
                "INSERT INTO {} (pdf_id, full_text, text_fields) VALUES (?1, ?2, ?3)",
                FULL_TEXT_TABLE
            ),
            params![
                record.pdf_id,
                record.full_text,
                serde_json::to_string(&record.text_fields)?,
            ],
        )?;

        Ok(())
    }

    fn get_full_text(&self, id: DocumentId) -> Result<Option<FullTextRecord>> {
        let conn = self.conn.lock();

        let raw = conn
            .query_row(
                &format!(
                    "SELECT pdf_id, full_text, text_fields FROM {}
                     WHERE pdf_id = ?1 ORDER BY id DESC LIMIT 1",
                    FULL_TEXT_TABLE
                ),
                params![id],
                |row| {
                    Ok((
                        row.get::<_, DocumentId>(0)?,
                        row.get::<_, Option<String>>(1)?,
                        row.get::<_, Option<String>>(2)?,
                    ))
                },
            )
            .optional()?;

        raw.map(|(pdf_id, full_text, text_fields)| {
            Ok(FullTextRecord {
                pdf_id,
                full_text: full_text.unwrap_or_default(),
                text_fields: parse_json_column(text_fields)?,
            })
        })
        .transpose()
    }

    fn search_full_text(&self, keyword: &str) -> Result<Vec<DocumentId>> {
        let conn = self.conn.lock();

        // instr keeps `%` and `_` in the keyword literal
        let mut stmt = conn.prepare(&format!(
            "SELECT DISTINCT pdf_id FROM {}
             WHERE instr(lower(full_text), lower(?1)) > 0
             ORDER BY pdf_id",
            FULL_TEXT_TABLE
        ))?;

        let ids = stmt
            .query_map(params![keyword], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<DocumentId>>>()?;

        Ok(ids)
    }
}

/// `pdf_data` row before JSON columns are parsed
struct RawDocument {
    id: DocumentId,
    uploaded_at: String,
    filename: Option<String>,
    content_hash: Option<String>,
    tables: Option<String>,
    text_fields: Option<String>,
}

impl RawDocument {
    fn from_row(row: &SqlRow<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            uploaded_at: row.get(1)?,
            filename: row.get(2)?,
            content_hash: row.get(3)?,
            tables: row.get(4)?,
            text_fields: row.get(5)?,
        })
    }

    fn into_record(self) -> Result<DocumentRecord> {
        let uploaded_at = DateTime::parse_from_rfc3339(&self.uploaded_at)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| Error::Internal(format!("Bad uploaded_at for document {}: {}", self.id, e)))?;

        Ok(DocumentRecord {
            id: self.id,
            uploaded_at,
            filename: self.filename,
            content_hash: self.content_hash,
            tables: parse_json_column(self.tables)?,
            text_fields: parse_json_column(self.text_fields)?,
        })
    }
}

fn parse_json_column(raw: Option<String>) -> Result<Value> {
    match raw {
        Some(text) if !text.is_empty() => Ok(serde_json::from_str(&text)?),
        _ => Ok(Value::Object(Default::default())),
    }
}
