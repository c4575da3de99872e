//! PDF extraction: full text, layout tables and key-value fields

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Map, Value};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;
use unicode_normalization::UnicodeNormalization;

use crate::config::ExtractionConfig;
use crate::error::{Error, Result};
use crate::schema::classifier::coerce_scalar;
use crate::schema::sanitizer::{is_placeholder_identifier, sanitize};
use crate::types::document::{ExtractedDocument, FileType};

/// Tabs or runs of two or more spaces separate table cells
static CELL_SEPARATOR: Lazy<Regex> = Lazy::new(|| Regex::new(r"\t+| {2,}").unwrap());

/// Pulls tables, key-value fields and full text out of PDF bytes
#[derive(Debug, Clone)]
pub struct PdfExtractor {
    config: ExtractionConfig,
}

impl PdfExtractor {
    pub fn new(config: ExtractionConfig) -> Self {
        Self { config }
    }

    /// Extract everything from one uploaded file
    pub fn extract(&self, filename: &str, data: &[u8]) -> Result<ExtractedDocument> {
        let file_type = FileType::from_filename(filename);
        if let FileType::Unsupported(ext) = file_type {
            return Err(Error::UnsupportedFileType(if ext.is_empty() {
                "no extension".to_string()
            } else {
                ext
            }));
        }

        let raw = self.extract_text_with_timeout(filename, data)?;
        let full_text = normalize_text(&raw);

        if full_text.trim().is_empty() {
            return Err(Error::file_parse(filename, "No text content could be extracted from PDF"));
        }

        let total_pages = match lopdf::Document::load_mem(data) {
            Ok(doc) => Some(doc.get_pages().len() as u32),
            Err(e) => {
                tracing::debug!("Could not count pages of {}: {}", filename, e);
                None
            }
        };

        let tables = detect_tables(&full_text);
        let text_fields = text_to_fields(
            &full_text,
            self.config.max_kv_line_len,
            self.config.max_kv_key_len,
        );

        tracing::info!(
            "Extracted {} tables and {} text fields from {}",
            tables.len(),
            text_fields.len(),
            filename
        );

        let document = ExtractedDocument {
            tables,
            text_fields,
            full_text,
            total_pages,
        };

        if self.config.json_output_dir.is_some() {
            // a failed preview never fails the upload
            if let Err(e) = self.save_preview(filename, &document) {
                tracing::warn!("Could not write JSON preview for {}: {}", filename, e);
            }
        }

        Ok(document)
    }

    /// Write `<stem>.json` with the extracted tables and fields
    pub fn save_preview(&self, filename: &str, document: &ExtractedDocument) -> Result<Option<PathBuf>> {
        let Some(dir) = &self.config.json_output_dir else {
            return Ok(None);
        };

        std::fs::create_dir_all(dir)?;

        let stem = Path::new(filename)
            .file_stem()
            .and_then(|s| s.to_str())
            .map(sanitize)
            .unwrap_or_else(|| "document".to_string());
        let path = dir.join(format!("{}.json", stem));

        let preview = json!({
            "tables": document.tables,
            "text_fields": document.text_fields,
        });
        std::fs::write(&path, serde_json::to_string_pretty(&preview)?)?;

        tracing::info!("Saved extraction preview to {}", path.display());
        Ok(Some(path))
    }

    /// pdf-extract on a worker thread, lopdf scan on error or timeout
    fn extract_text_with_timeout(&self, filename: &str, data: &[u8]) -> Result<String> {
        let data_vec = data.to_vec();
        let (tx, rx) = mpsc::channel();

        let handle = thread::spawn(move || {
            let result = pdf_extract::extract_text_from_mem(&data_vec);
            let _ = tx.send(result);
        });

        let timeout = Duration::from_secs(self.config.timeout_secs);
        match rx.recv_timeout(timeout) {
            Ok(Ok(text)) => {
                let _ = handle.join();
                Ok(text)
            }
            Ok(Err(e)) => {
                let _ = handle.join();
                tracing::warn!("pdf-extract failed on {}: {}, trying fallback", filename, e);
                extract_text_fallback(filename, data)
            }
            Err(mpsc::RecvTimeoutError::Timeout) => {
                // the worker cannot be cancelled; it is left to finish on its own
                tracing::error!(
                    "PDF extraction of {} timed out after {}s, trying fallback",
                    filename,
                    self.config.timeout_secs
                );
                extract_text_fallback(filename, data)
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                tracing::error!("PDF extraction thread for {} crashed", filename);
                extract_text_fallback(filename, data)
            }
        }
    }
}

/// SHA-256 of the uploaded bytes, hex encoded
pub fn content_hash(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Scan page content streams for text-show operators
fn extract_text_fallback(filename: &str, data: &[u8]) -> Result<String> {
    let doc = lopdf::Document::load_mem(data)
        .map_err(|e| Error::file_parse(filename, format!("Failed to load PDF: {}", e)))?;

    let mut pages_text = Vec::new();
    for (page_num, page_id) in doc.get_pages() {
        match doc.get_page_content(page_id) {
            Ok(content) => {
                let text = text_from_content_stream(&content);
                if !text.trim().is_empty() {
                    pages_text.push(text);
                }
            }
            Err(e) => tracing::debug!("No content for page {} of {}: {}", page_num, filename, e),
        }
    }

    if pages_text.is_empty() {
        return Err(Error::file_parse(
            filename,
            "PDF appears to be image-based or has no extractable text",
        ));
    }

    Ok(pages_text.join("\n"))
}

/// Text of `Tj`/`TJ` operands inside `BT`..`ET` blocks, one line per block
fn text_from_content_stream(content: &[u8]) -> String {
    let stream = String::from_utf8_lossy(content);
    let mut lines = Vec::new();
    let mut current = String::new();
    let mut in_text = false;

    for line in stream.lines().map(str::trim) {
        match line {
            "BT" => in_text = true,
            "ET" => {
                in_text = false;
                if !current.is_empty() {
                    lines.push(std::mem::take(&mut current));
                }
            }
            _ if in_text && (line.ends_with("Tj") || line.ends_with("TJ")) => {
                if let (Some(start), Some(end)) = (line.find('('), line.rfind(')')) {
                    if start < end {
                        current.push_str(&unescape_pdf_string(&line[start + 1..end]));
                    }
                }
            }
            _ => {}
        }
    }

    lines.join("\n")
}

fn unescape_pdf_string(raw: &str) -> String {
    raw.replace("\\n", "\n")
        .replace("\\r", "\r")
        .replace("\\t", "\t")
        .replace("\\(", "(")
        .replace("\\)", ")")
        .replace("\\\\", "\\")
}

/// NFKC (ligatures, non-breaking spaces), ASCII quotes, no NULs, no blank
/// lines. Interior spacing is kept since it separates table cells.
pub fn normalize_text(text: &str) -> String {
    let composed: String = text
        .nfkc()
        .map(|c| match c {
            '\u{2018}' | '\u{2019}' => '\'',
            '\u{201C}' | '\u{201D}' => '"',
            '\u{2010}' | '\u{2011}' | '\u{2013}' | '\u{2212}' => '-',
            other => other,
        })
        .filter(|c| *c != '\0')
        .collect();

    composed
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Cells of one layout line; fewer than two means "not a table row"
pub fn split_cells(line: &str) -> Vec<String> {
    CELL_SEPARATOR
        .split(line.trim())
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_string)
        .collect()
}

/// Tables from runs of consecutive lines with the same cell count.
///
/// The first line of a run is the header; a run needs at least one data
/// row. Tables are keyed `table_1`, `table_2`, ... in document order.
pub fn detect_tables(text: &str) -> BTreeMap<String, Value> {
    let mut tables = BTreeMap::new();
    let mut run: Vec<Vec<String>> = Vec::new();

    let flush = |run: &mut Vec<Vec<String>>, tables: &mut BTreeMap<String, Value>| {
        if run.len() >= 2 {
            let key = format!("table_{}", tables.len() + 1);
            tables.insert(key, rows_from_run(run));
        }
        run.clear();
    };

    for line in text.lines() {
        let cells = split_cells(line);
        if cells.len() < 2 {
            flush(&mut run, &mut tables);
            continue;
        }
        if run.first().map_or(false, |header| header.len() != cells.len()) {
            flush(&mut run, &mut tables);
        }
        run.push(cells);
    }
    flush(&mut run, &mut tables);

    tables
}

fn rows_from_run(run: &[Vec<String>]) -> Value {
    let header: Vec<String> = run[0].iter().map(|cell| sanitize(cell)).collect();

    let rows: Vec<Value> = run[1..]
        .iter()
        .map(|cells| {
            let row: Map<String, Value> = header
                .iter()
                .zip(cells)
                .map(|(name, cell)| (name.clone(), coerce_scalar(&Value::String(cell.clone()))))
                .collect();
            Value::Object(row)
        })
        .collect();

    Value::Array(rows)
}

/// `key: value` lines as sanitized fields with coerced values
pub fn text_to_fields(text: &str, max_line_len: usize, max_key_len: usize) -> Map<String, Value> {
    let mut fields = Map::new();

    for line in text.lines().map(str::trim) {
        if line.is_empty() || line.chars().count() >= max_line_len {
            continue;
        }
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let (key, value) = (key.trim(), value.trim());
        if key.is_empty() || value.is_empty() {
            continue;
        }

        let key = sanitize(key);
        if is_placeholder_identifier(&key) || key.len() > max_key_len {
            continue;
        }

        fields.insert(key, coerce_scalar(&Value::String(value.to_string())));
    }

    fields
}

#[cfg(test)]
mod tests {
    use super::*;

    const INVOICE: &str = "\
ACME Corp
Invoice No: 1042
Date: 2024-03-01
Item        Qty     Unit Price
Widget      2       $1,200.00
Gadget      10      15.5
Total: 2,555.00
Notes
Region\tQ1\tQ2
North\t10\t12
";

    #[test]
    fn test_split_cells() {
        assert_eq!(split_cells("Widget      2       $1,200.00"), vec!["Widget", "2", "$1,200.00"]);
        assert_eq!(split_cells("a\tb"), vec!["a", "b"]);
        assert_eq!(split_cells("plain sentence with single spaces"), vec!["plain sentence with single spaces"]);
    }

    #[test]
    fn test_detect_tables() {
        let tables = detect_tables(INVOICE);
        assert_eq!(tables.len(), 2);

        assert_eq!(
            tables["table_1"],
            json!([
                {"item": "Widget", "qty": 2, "unit_price": 1200.0},
                {"item": "Gadget", "qty": 10, "unit_price": 15.5}
            ])
        );
        assert_eq!(tables["table_2"], json!([{"region": "North", "q1": 10, "q2": 12}]));
    }

    #[test]
    fn test_header_without_rows_is_not_a_table() {
        let tables = detect_tables("Name    Value\nJust a sentence\n");
        assert!(tables.is_empty());
    }

    #[test]
    fn test_text_to_fields() {
        let fields = text_to_fields(INVOICE, 160, 60);
        assert_eq!(fields["invoice_no"], json!(1042));
        assert_eq!(fields["date"], json!("2024-03-01"));
        assert_eq!(fields["total"], json!(2555.0));
        assert!(!fields.contains_key("acme_corp"));
    }

    #[test]
    fn test_text_to_fields_limits() {
        let long_line = format!("Key: {}", "x".repeat(200));
        assert!(text_to_fields(&long_line, 160, 60).is_empty());

        let long_key = format!("{}: value", "k".repeat(61));
        assert!(text_to_fields(&long_key, 160, 60).is_empty());

        assert!(text_to_fields(": value\nKey:\nN/A: 3", 160, 60).is_empty());
    }

    #[test]
    fn test_normalize_text() {
        let text = "  \u{FB01}nance\u{00A0}report \n\n\u{201C}Q1\u{201D}\0 ";
        assert_eq!(normalize_text(text), "finance report\n\"Q1\"");
    }

    #[test]
    fn test_content_stream_fallback() {
        let stream = b"BT\n/F1 12 Tf\n(Invoice No: 7) Tj\nET\nBT\n(Total \\(net\\)) Tj\nET\n";
        assert_eq!(text_from_content_stream(stream), "Invoice No: 7\nTotal (net)");
    }

    #[test]
    fn test_rejects_non_pdf() {
        let extractor = PdfExtractor::new(ExtractionConfig::default());
        assert!(matches!(
            extractor.extract("notes.txt", b"hello"),
            Err(Error::UnsupportedFileType(ref ext)) if ext == "txt"
        ));
    }

    #[test]
    fn test_content_hash_is_stable() {
        assert_eq!(content_hash(b"abc"), content_hash(b"abc"));
        assert_eq!(content_hash(b"abc").len(), 64);
    }

    #[test]
    fn test_save_preview() {
        let dir = tempfile::tempdir().unwrap();
        let extractor = PdfExtractor::new(ExtractionConfig {
            json_output_dir: Some(dir.path().to_path_buf()),
            ..ExtractionConfig::default()
        });

        let document = ExtractedDocument {
            tables: detect_tables(INVOICE),
            text_fields: text_to_fields(INVOICE, 160, 60),
            full_text: INVOICE.to_string(),
            total_pages: Some(1),
        };

        let path = extractor.save_preview("Q1 Report.pdf", &document).unwrap().unwrap();
        assert_eq!(path.file_name().unwrap(), "q1_report.json");

        let saved: Value = serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(saved["text_fields"]["invoice_no"], json!(1042));
    }
}
