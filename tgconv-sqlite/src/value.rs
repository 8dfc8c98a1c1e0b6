//! Dynamically typed cell values and the rows that carry them.

use std::fmt;
use std::sync::Arc;

/// A single cell value, typed the way it is stored in the record format.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl Value {
    /// SQLite storage class name, for diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null       => "null",
            Self::Integer(_) => "integer",
            Self::Real(_)    => "real",
            Self::Text(_)    => "text",
            Self::Blob(_)    => "blob",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_blob(&self) -> Option<&[u8]> {
        match self {
            Self::Blob(b) => Some(b),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null       => write!(f, "NULL"),
            Self::Integer(v) => write!(f, "{v}"),
            Self::Real(v)    => write!(f, "{v}"),
            Self::Text(s)    => write!(f, "{s:?}"),
            Self::Blob(b)    => write!(f, "<blob, {} bytes>", b.len()),
        }
    }
}

/// One row of a scanned table: the column names shared by every row of the
/// table, plus this row's values in declaration order.
#[derive(Clone, Debug, PartialEq)]
pub struct Row {
    rowid:   i64,
    columns: Arc<[String]>,
    values:  Vec<Value>,
}

impl Row {
    pub(crate) fn new(rowid: i64, columns: Arc<[String]>, values: Vec<Value>) -> Self {
        debug_assert_eq!(columns.len(), values.len());
        Self { rowid, columns, values }
    }

    /// The row's integer key.
    pub fn rowid(&self) -> i64 { self.rowid }

    /// Column names, in declaration order.
    pub fn columns(&self) -> &[String] { &self.columns }

    /// Values, parallel to [`Row::columns`].
    pub fn values(&self) -> &[Value] { &self.values }

    /// Whether the table declares `name`. SQL identifiers compare case-insensitively.
    pub fn has_column(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    /// Look a value up by column name. `None` means the column does not exist;
    /// a present-but-empty cell is `Some(&Value::Null)`.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.position(name).map(|i| &self.values[i])
    }

    /// `(column, value)` pairs in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.columns.iter().map(String::as_str).zip(self.values.iter())
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.eq_ignore_ascii_case(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_is_case_insensitive() {
        let cols: Arc<[String]> = vec!["dc_id".to_string(), "Auth_Key".to_string()].into();
        let row = Row::new(1, cols, vec![Value::Integer(2), Value::Null]);
        assert_eq!(row.get("DC_ID"), Some(&Value::Integer(2)));
        assert_eq!(row.get("auth_key"), Some(&Value::Null));
        assert_eq!(row.get("port"), None);
        assert!(row.has_column("auth_KEY"));
    }

    #[test]
    fn display_hides_blob_contents() {
        assert_eq!(Value::Blob(vec![1, 2, 3]).to_string(), "<blob, 3 bytes>");
        assert_eq!(Value::Text("a".into()).to_string(), "\"a\"");
    }
}
