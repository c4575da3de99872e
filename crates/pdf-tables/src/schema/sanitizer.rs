//! Identifier sanitization for table and column names
//!
//! Every name that reaches a DDL or DML statement is produced here. The
//! output alphabet is `[a-z0-9_]`, so a sanitized identifier can never
//! close a quoted identifier or start a new statement.

use once_cell::sync::Lazy;
use regex::Regex;
use unicode_normalization::{char::is_combining_mark, UnicodeNormalization};

use super::classifier::PLACEHOLDER_TOKENS;

/// Identifier used for empty or placeholder labels
pub const PLACEHOLDER_IDENTIFIER: &str = "unknown";

/// Prefix for identifiers that would otherwise start with a digit
pub const DIGIT_PREFIX: &str = "col_";

/// Maximum identifier length in bytes
pub const MAX_IDENTIFIER_LEN: usize = 64;

static NON_IDENTIFIER: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-z0-9_]+").unwrap());
static UNDERSCORE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"_{2,}").unwrap());
static SAFE_IDENTIFIER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-z_][a-z0-9_]*$").unwrap());

/// Placeholder tokens as they look once punctuation is replaced (`n/a` is `n_a`)
static PLACEHOLDER_BODIES: Lazy<Vec<String>> = Lazy::new(|| {
    PLACEHOLDER_TOKENS
        .iter()
        .map(|token| identifier_body(token))
        .filter(|body| !body.is_empty())
        .collect()
});

/// Convert an arbitrary label into a safe storage identifier.
///
/// `"Total Assets (%)"` becomes `"total_assets"`, `"2023 Revenue"` becomes
/// `"col_2023_revenue"`, and empty or placeholder labels (`""`, `"n/a"`,
/// `"Unknown"`, `"(None)"`) become [`PLACEHOLDER_IDENTIFIER`]. Never fails,
/// and sanitizing an identifier again leaves it unchanged.
pub fn sanitize(raw: &str) -> String {
    // NFKD splits accented letters into base + mark; the marks are dropped
    // so "Café" reads as "cafe" rather than "caf_e"
    let decomposed: String = raw.nfkd().filter(|c| !is_combining_mark(*c)).collect();
    let trimmed = identifier_body(&decomposed.to_lowercase());

    // checked after punctuation is gone, so "(None)" and "none" agree
    if trimmed.is_empty() || PLACEHOLDER_BODIES.contains(&trimmed) {
        return PLACEHOLDER_IDENTIFIER.to_string();
    }

    let mut ident = if trimmed.starts_with(|c: char| c.is_ascii_digit()) {
        format!("{}{}", DIGIT_PREFIX, trimmed)
    } else {
        trimmed.to_string()
    };

    truncate_identifier(&mut ident);
    ident
}

/// Lowercase text reduced to `[a-z0-9_]` with single inner underscores
fn identifier_body(lowered: &str) -> String {
    let replaced = NON_IDENTIFIER.replace_all(lowered.trim(), "_");
    let collapsed = UNDERSCORE_RUN.replace_all(&replaced, "_");
    collapsed.trim_matches('_').to_string()
}

/// Cut an ASCII identifier to [`MAX_IDENTIFIER_LEN`] without a dangling `_`
pub(crate) fn truncate_identifier(ident: &mut String) {
    if ident.len() > MAX_IDENTIFIER_LEN {
        ident.truncate(MAX_IDENTIFIER_LEN);
    }
    while ident.ends_with('_') {
        ident.pop();
    }
}

/// Whether an identifier is the fallback for an unnamed label
pub fn is_placeholder_identifier(ident: &str) -> bool {
    ident == PLACEHOLDER_IDENTIFIER
}

/// Whether a string is usable as an identifier without further sanitizing
pub fn is_safe_identifier(ident: &str) -> bool {
    !ident.is_empty() && ident.len() <= MAX_IDENTIFIER_LEN && SAFE_IDENTIFIER.is_match(ident)
}

/// Quote an identifier for SQL, doubling embedded quotes
pub fn quote_identifier(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}
