//! Key and document derivation
//!
//! Index rows become retrieval keys through a [`KeyDerivation`]; retrieved
//! rows become exported documents through a [`DocDerivation`].

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde_json::Value;

use crate::error::ConfigError;
use crate::transport::ViewRow;

pub type KeysFn = Arc<dyn Fn(&[ViewRow]) -> Vec<Value> + Send + Sync>;
pub type DocFn = Arc<dyn Fn(&ViewRow) -> Option<Value> + Send + Sync>;

/// Turns one index page into the keys used to retrieve documents
#[derive(Clone, Default)]
pub enum KeyDerivation {
    /// The row's sort key
    #[default]
    Key,
    /// The id of the document that emitted the row
    Id,
    /// The row's emitted value
    Value,
    /// A JSON pointer into the row's value
    ValuePointer(String),
    /// Caller-supplied function over the whole page
    Custom(KeysFn),
}

impl KeyDerivation {
    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(&[ViewRow]) -> Vec<Value> + Send + Sync + 'static,
    {
        KeyDerivation::Custom(Arc::new(f))
    }

    /// Derive keys from a page, keeping page order
    pub fn derive(&self, rows: &[ViewRow]) -> Vec<Value> {
        match self {
            KeyDerivation::Key => rows.iter().map(|r| r.key.clone()).collect(),
            KeyDerivation::Id => rows
                .iter()
                .filter_map(|r| r.id.clone().map(Value::String))
                .collect(),
            KeyDerivation::Value => rows.iter().map(|r| r.value.clone()).collect(),
            KeyDerivation::ValuePointer(ptr) => rows
                .iter()
                .filter_map(|r| r.value.pointer(ptr).cloned())
                .collect(),
            KeyDerivation::Custom(f) => f(rows),
        }
    }
}

impl FromStr for KeyDerivation {
    type Err = ConfigError;

    /// Parse `key`, `id`, `value` or a `/pointer` into the row value
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "key" => Ok(KeyDerivation::Key),
            "id" => Ok(KeyDerivation::Id),
            "value" => Ok(KeyDerivation::Value),
            ptr if ptr.starts_with('/') => Ok(KeyDerivation::ValuePointer(ptr.to_string())),
            other => Err(ConfigError::invalid("key_from", other)),
        }
    }
}

impl fmt::Debug for KeyDerivation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyDerivation::Key => write!(f, "Key"),
            KeyDerivation::Id => write!(f, "Id"),
            KeyDerivation::Value => write!(f, "Value"),
            KeyDerivation::ValuePointer(ptr) => write!(f, "ValuePointer({ptr:?})"),
            KeyDerivation::Custom(_) => write!(f, "Custom(..)"),
        }
    }
}

/// Turns one retrieved row into the document to export
#[derive(Clone, Default)]
pub enum DocDerivation {
    /// The included document
    #[default]
    Doc,
    /// The row's emitted value
    Value,
    /// Caller-supplied function
    Custom(DocFn),
}

impl DocDerivation {
    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(&ViewRow) -> Option<Value> + Send + Sync + 'static,
    {
        DocDerivation::Custom(Arc::new(f))
    }

    /// Derive the document; `None` (or JSON null) means the row is skipped
    pub fn derive(&self, row: &ViewRow) -> Option<Value> {
        let doc = match self {
            DocDerivation::Doc => row.doc.clone(),
            DocDerivation::Value => Some(row.value.clone()),
            DocDerivation::Custom(f) => f(row),
        };
        doc.filter(|d| !d.is_null())
    }
}

impl FromStr for DocDerivation {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "doc" => Ok(DocDerivation::Doc),
            "value" => Ok(DocDerivation::Value),
            other => Err(ConfigError::invalid("doc_from", other)),
        }
    }
}

impl fmt::Debug for DocDerivation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocDerivation::Doc => write!(f, "Doc"),
            DocDerivation::Value => write!(f, "Value"),
            DocDerivation::Custom(_) => write!(f, "Custom(..)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn page() -> Vec<ViewRow> {
        vec![
            ViewRow::new("1", json!("b"), json!({"ref": "x1"})),
            ViewRow::new("2", json!("a"), json!({"ref": "x2"})),
            ViewRow::new("3", json!("a"), json!({})),
        ]
    }

    #[test]
    fn test_key_derivations() {
        let rows = page();
        assert_eq!(
            KeyDerivation::Key.derive(&rows),
            vec![json!("b"), json!("a"), json!("a")]
        );
        assert_eq!(
            KeyDerivation::Id.derive(&rows),
            vec![json!("1"), json!("2"), json!("3")]
        );
        assert_eq!(
            "/ref".parse::<KeyDerivation>().unwrap().derive(&rows),
            vec![json!("x1"), json!("x2")]
        );
    }

    #[test]
    fn test_custom_key_derivation_sees_whole_page() {
        let dedupe = KeyDerivation::custom(|rows| {
            let mut keys: Vec<Value> = Vec::new();
            for row in rows {
                if !keys.contains(&row.key) {
                    keys.push(row.key.clone());
                }
            }
            keys
        });
        assert_eq!(dedupe.derive(&page()), vec![json!("b"), json!("a")]);
    }

    #[test]
    fn test_doc_derivation_skips_null() {
        let found = ViewRow::new("1", json!("1"), Value::Null).with_doc(json!({"a": 1}));
        let missing = ViewRow::new("2", json!("2"), Value::Null);
        let null_doc = ViewRow::new("3", json!("3"), Value::Null).with_doc(Value::Null);

        assert_eq!(DocDerivation::Doc.derive(&found), Some(json!({"a": 1})));
        assert_eq!(DocDerivation::Doc.derive(&missing), None);
        assert_eq!(DocDerivation::Doc.derive(&null_doc), None);
        assert_eq!(DocDerivation::Value.derive(&missing), None);
    }

    #[test]
    fn test_parse_rejects_unknown() {
        assert!("row".parse::<KeyDerivation>().is_err());
        assert!("key".parse::<DocDerivation>().is_err());
        assert!(matches!("id".parse::<KeyDerivation>(), Ok(KeyDerivation::Id)));
    }
}
