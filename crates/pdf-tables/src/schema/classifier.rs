//! Value classification: placeholder detection, type inference, coercion

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};

/// Cell or label values that carry no information
pub const PLACEHOLDER_TOKENS: [&str; 8] = ["", "-", "--", "n/a", "none", "null", "nan", "unknown"];

/// Storage type inferred for a new column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Integer,
    Float,
    Boolean,
    Timestamp,
    Text,
}

impl ColumnType {
    /// SQLite declared type for this column type
    pub fn sql_type(&self) -> &'static str {
        match self {
            ColumnType::Integer => "INTEGER",
            ColumnType::Float => "REAL",
            ColumnType::Boolean => "BOOLEAN",
            ColumnType::Timestamp => "TIMESTAMP",
            ColumnType::Text => "TEXT",
        }
    }

    /// Map a declared type back, as reported by table reflection
    pub fn from_sql_type(declared: &str) -> Self {
        match declared.trim().to_uppercase().as_str() {
            "INTEGER" | "INT" | "BIGINT" => ColumnType::Integer,
            "REAL" | "FLOAT" | "DOUBLE" | "DOUBLE PRECISION" => ColumnType::Float,
            "BOOLEAN" | "BOOL" => ColumnType::Boolean,
            "TIMESTAMP" | "DATETIME" => ColumnType::Timestamp,
            _ => ColumnType::Text,
        }
    }
}

/// Whether a label or cell text is a placeholder token (case and whitespace insensitive)
pub fn is_placeholder_token(text: &str) -> bool {
    let normalized = text.trim().to_lowercase();
    PLACEHOLDER_TOKENS.contains(&normalized.as_str())
}

/// Whether a cell value counts as absent
pub fn is_meaningless(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => is_placeholder_token(s),
        Value::Bool(_) | Value::Number(_) => false,
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
    }
}

/// Whether every value is meaningless (true for an empty collection)
pub fn all_meaningless<'a, I>(values: I) -> bool
where
    I: IntoIterator<Item = &'a Value>,
{
    values.into_iter().all(is_meaningless)
}

/// Infer a column type from one representative sample.
///
/// Booleans are checked before numbers; null defers to text.
pub fn classify_type(value: &Value) -> ColumnType {
    match value {
        Value::Null => ColumnType::Text,
        Value::Bool(_) => ColumnType::Boolean,
        Value::Number(n) if n.is_i64() || n.is_u64() => ColumnType::Integer,
        Value::Number(_) => ColumnType::Float,
        Value::String(s) if is_iso_timestamp(s) => ColumnType::Timestamp,
        _ => ColumnType::Text,
    }
}

/// ISO-8601 date or date-time, with `T` or space separator
fn is_iso_timestamp(text: &str) -> bool {
    let s = text.trim();
    if s.len() < 10 {
        return false;
    }

    DateTime::parse_from_rfc3339(s).is_ok()
        || DateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f%:z").is_ok()
        || NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f").is_ok()
        || NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f").is_ok()
        || NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M").is_ok()
        || NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M").is_ok()
        || NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok()
}

static NUMERIC_TEXT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(-?)\s*[$€£¥₹]?\s*(-?\d+(?:\.\d+)?)\s*%?$").unwrap()
});

/// Turn numeric-looking text into a JSON number.
///
/// Thousands separators, a currency symbol and a trailing `%` are ignored:
/// `"1,234.50"` becomes `1234.5`. Everything else is returned unchanged.
pub fn coerce_scalar(value: &Value) -> Value {
    let Value::String(text) = value else {
        return value.clone();
    };

    let stripped = text.trim().replace(',', "");
    let Some(caps) = NUMERIC_TEXT.captures(&stripped) else {
        return value.clone();
    };

    let outer_sign = &caps[1];
    let digits = &caps[2];
    if !outer_sign.is_empty() && digits.starts_with('-') {
        return value.clone();
    }
    let literal = format!("{}{}", outer_sign, digits);

    let number = if literal.contains('.') {
        literal.parse::<f64>().ok().and_then(Number::from_f64)
    } else {
        literal.parse::<i64>().ok().map(Number::from)
    };

    number.map(Value::Number).unwrap_or_else(|| value.clone())
}
