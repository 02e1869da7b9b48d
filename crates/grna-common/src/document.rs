//! Canonical document shape shared by every corpus.
//!
//! A [`Document`] is what the store adapter persists and what the query
//! layer hands back: a stable id, the text that gets embedded, and a flat
//! map of filterable scalar metadata. Construction validates all three so
//! malformed records are rejected here rather than by the vector store.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::DocumentError;

/// Filterable metadata, keyed by field name.
pub type Metadata = BTreeMap<String, MetadataValue>;

/// A store-representable scalar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl MetadataValue {
    /// True for the empty string; numbers and booleans are never empty.
    pub fn is_empty(&self) -> bool {
        matches!(self, MetadataValue::Str(s) if s.is_empty())
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            MetadataValue::Str(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Convert a JSON value, rejecting arrays, objects and null.
    pub fn from_json(value: &serde_json::Value) -> Result<Self, &'static str> {
        match value {
            serde_json::Value::Bool(b) => Ok(MetadataValue::Bool(*b)),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Ok(MetadataValue::Int(i))
                } else {
                    n.as_f64().map(MetadataValue::Float).ok_or("number")
                }
            }
            serde_json::Value::String(s) => Ok(MetadataValue::Str(s.clone())),
            serde_json::Value::Null => Err("null"),
            serde_json::Value::Array(_) => Err("array"),
            serde_json::Value::Object(_) => Err("object"),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            MetadataValue::Bool(b) => serde_json::Value::Bool(*b),
            MetadataValue::Int(i) => serde_json::Value::from(*i),
            MetadataValue::Float(f) => serde_json::Value::from(*f),
            MetadataValue::Str(s) => serde_json::Value::String(s.clone()),
        }
    }
}

impl fmt::Display for MetadataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetadataValue::Bool(b) => write!(f, "{b}"),
            MetadataValue::Int(i) => write!(f, "{i}"),
            MetadataValue::Float(x) => write!(f, "{x}"),
            MetadataValue::Str(s) => f.write_str(s),
        }
    }
}

impl From<&str> for MetadataValue {
    fn from(s: &str) -> Self { MetadataValue::Str(s.to_string()) }
}

impl From<String> for MetadataValue {
    fn from(s: String) -> Self { MetadataValue::Str(s) }
}

impl From<i64> for MetadataValue {
    fn from(i: i64) -> Self { MetadataValue::Int(i) }
}

impl From<f64> for MetadataValue {
    fn from(x: f64) -> Self { MetadataValue::Float(x) }
}

impl From<bool> for MetadataValue {
    fn from(b: bool) -> Self { MetadataValue::Bool(b) }
}

/// A validated corpus document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Document {
    id: String,
    text: String,
    metadata: Metadata,
}

impl Document {
    /// Build a document; `id` and `text` must be non-empty after trimming.
    pub fn new(
        id: impl Into<String>,
        text: impl Into<String>,
        metadata: Metadata,
    ) -> Result<Self, DocumentError> {
        let id = id.into();
        let text = text.into();
        if id.trim().is_empty() {
            return Err(DocumentError::EmptyId);
        }
        if text.trim().is_empty() {
            return Err(DocumentError::EmptyText(id));
        }
        Ok(Self { id, text, metadata })
    }

    /// Build a document from a JSON metadata object, rejecting nested values.
    pub fn from_json_metadata(
        id: impl Into<String>,
        text: impl Into<String>,
        metadata: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<Self, DocumentError> {
        let id = id.into();
        let mut out = Metadata::new();
        for (field, value) in metadata {
            let scalar = MetadataValue::from_json(value).map_err(|kind| {
                DocumentError::NonScalarMetadata {
                    id: id.clone(),
                    field: field.clone(),
                    kind,
                }
            })?;
            out.insert(field.clone(), scalar);
        }
        Self::new(id, text, out)
    }

    pub fn id(&self) -> &str { &self.id }
    pub fn text(&self) -> &str { &self.text }
    pub fn metadata(&self) -> &Metadata { &self.metadata }

    /// Metadata field as a string slice, if present and a string.
    pub fn field(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(MetadataValue::as_str)
    }

    pub fn into_parts(self) -> (String, String, Metadata) {
        (self.id, self.text, self.metadata)
    }
}
