//! Extracted table shapes

use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};

use crate::error::{Error, Result};

/// One row keyed by column identifier, ready for insertion
pub type Row = BTreeMap<String, Value>;

/// A table as handed over by the extraction collaborator
#[derive(Debug, Clone, PartialEq)]
pub enum ExtractedTable {
    /// `[{label: value}, ...]`
    Rows(Vec<Map<String, Value>>),
    /// `{label: [values]}`, columns in source order
    Columns(Vec<(String, Vec<Value>)>),
}

impl ExtractedTable {
    /// Recognize the shape of a JSON table payload.
    ///
    /// Arrays are row-oriented (non-object items are skipped), objects are
    /// column-oriented (a bare scalar is a one-value column). Anything else
    /// is `MalformedInput`.
    pub fn from_value(key: &str, value: &Value) -> Result<Self> {
        match value {
            Value::Array(items) => {
                let rows: Vec<Map<String, Value>> = items
                    .iter()
                    .filter_map(|item| item.as_object().cloned())
                    .collect();

                if rows.is_empty() && !items.is_empty() {
                    return Err(Error::malformed(key, "row-oriented table has no object rows"));
                }
                if rows.len() < items.len() {
                    tracing::debug!(
                        "Table {}: skipped {} non-object rows",
                        key,
                        items.len() - rows.len()
                    );
                }

                Ok(Self::Rows(rows))
            }
            Value::Object(map) => {
                let columns = map
                    .iter()
                    .map(|(label, cells)| {
                        let values = match cells {
                            Value::Array(values) => values.clone(),
                            scalar => vec![scalar.clone()],
                        };
                        (label.clone(), values)
                    })
                    .collect();

                Ok(Self::Columns(columns))
            }
            other => Err(Error::malformed(
                key,
                format!("expected an array of rows or an object of columns, got {}", json_kind(other)),
            )),
        }
    }

    /// Column-oriented view with raw labels, keys unioned in first-seen order.
    ///
    /// A row missing a key contributes nothing to that column, so columns
    /// may be shorter than the row count.
    pub fn into_raw_columns(self) -> Vec<(String, Vec<Value>)> {
        match self {
            Self::Columns(columns) => columns,
            Self::Rows(rows) => {
                let mut columns: Vec<(String, Vec<Value>)> = Vec::new();
                let mut positions: HashMap<String, usize> = HashMap::new();

                for row in rows {
                    for (label, value) in row {
                        match positions.get(&label) {
                            Some(&idx) => columns[idx].1.push(value),
                            None => {
                                positions.insert(label.clone(), columns.len());
                                columns.push((label, vec![value]));
                            }
                        }
                    }
                }

                columns
            }
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_row_oriented_union_is_ragged() {
        let table = ExtractedTable::from_value(
            "table_1",
            &json!([{"a": 1, "b": 2}, {"a": 3}, {"c": 4}]),
        )
        .unwrap();

        let columns = table.into_raw_columns();
        assert_eq!(columns.len(), 3);
        assert_eq!(columns[0], ("a".to_string(), vec![json!(1), json!(3)]));
        assert_eq!(columns[1], ("b".to_string(), vec![json!(2)]));
        assert_eq!(columns[2], ("c".to_string(), vec![json!(4)]));
    }

    #[test]
    fn test_column_oriented_scalar_becomes_single_value() {
        let table = ExtractedTable::from_value("t", &json!({"a": [1, 2], "b": "x"})).unwrap();
        let columns = table.into_raw_columns();
        assert_eq!(columns[1], ("b".to_string(), vec![json!("x")]));
    }

    #[test]
    fn test_malformed_shapes() {
        assert!(matches!(
            ExtractedTable::from_value("t", &json!("just text")),
            Err(Error::MalformedInput { .. })
        ));
        assert!(matches!(
            ExtractedTable::from_value("t", &json!([1, 2, 3])),
            Err(Error::MalformedInput { .. })
        ));
        assert_eq!(
            ExtractedTable::from_value("t", &json!([])).unwrap(),
            ExtractedTable::Rows(vec![])
        );
    }
}
