//! The converter's intermediate document representation.

use serde_json::{Map, Value};

use crate::error::MappingError;
use crate::types::SeqNoPrimaryTerm;

/// An ordered field map plus the store metadata that travels with it.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Document {
    source: Map<String, Value>,
    id: Option<String>,
    index: Option<String>,
    version: Option<i64>,
    seq_no: Option<i64>,
    primary_term: Option<i64>,
    routing: Option<String>,
}

impl Document {
    /// Creates an empty document.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a document from a source map.
    pub fn from_source(source: Map<String, Value>) -> Self {
        Self {
            source,
            ..Default::default()
        }
    }

    /// Creates a document from a JSON object.
    pub fn from_json(value: Value) -> Result<Self, MappingError> {
        match value {
            Value::Object(source) => Ok(Self::from_source(source)),
            other => Err(MappingError::NotAnObject {
                type_name: "Document".to_string(),
                found: type_label(&other).to_string(),
            }),
        }
    }

    /// Sets the id.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Sets the index the document was read from or is written to.
    pub fn with_index(mut self, index: impl Into<String>) -> Self {
        self.index = Some(index.into());
        self
    }

    /// Sets the version.
    pub fn with_version(mut self, version: i64) -> Self {
        self.version = Some(version);
        self
    }

    /// Sets sequence number and primary term.
    pub fn with_seq_no_primary_term(mut self, seq: SeqNoPrimaryTerm) -> Self {
        self.seq_no = Some(seq.seq_no);
        self.primary_term = Some(seq.primary_term);
        self
    }

    /// Sets the routing value.
    pub fn with_routing(mut self, routing: impl Into<String>) -> Self {
        self.routing = Some(routing.into());
        self
    }

    /// The document id.
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// Replaces the document id.
    pub fn set_id(&mut self, id: Option<String>) {
        self.id = id;
    }

    /// The index name.
    pub fn index(&self) -> Option<&str> {
        self.index.as_deref()
    }

    /// The version.
    pub fn version(&self) -> Option<i64> {
        self.version
    }

    /// Replaces the version.
    pub fn set_version(&mut self, version: Option<i64>) {
        self.version = version;
    }

    /// Sequence number and primary term, when both are known.
    pub fn seq_no_primary_term(&self) -> Option<SeqNoPrimaryTerm> {
        match (self.seq_no, self.primary_term) {
            (Some(seq_no), Some(primary_term)) => Some(SeqNoPrimaryTerm::new(seq_no, primary_term)),
            _ => None,
        }
    }

    /// Replaces sequence number and primary term.
    pub fn set_seq_no_primary_term(&mut self, seq: Option<SeqNoPrimaryTerm>) {
        self.seq_no = seq.map(|s| s.seq_no);
        self.primary_term = seq.map(|s| s.primary_term);
    }

    /// The routing value.
    pub fn routing(&self) -> Option<&str> {
        self.routing.as_deref()
    }

    /// Replaces the routing value.
    pub fn set_routing(&mut self, routing: Option<String>) {
        self.routing = routing;
    }

    /// Returns a field value.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.source.get(field)
    }

    /// Sets a field value, returning the previous one.
    pub fn insert(&mut self, field: impl Into<String>, value: Value) -> Option<Value> {
        self.source.insert(field.into(), value)
    }

    /// Removes a field.
    pub fn remove(&mut self, field: &str) -> Option<Value> {
        self.source.remove(field)
    }

    /// Returns true if the field is present.
    pub fn contains_key(&self, field: &str) -> bool {
        self.source.contains_key(field)
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.source.len()
    }

    /// Returns true if the document has no fields.
    pub fn is_empty(&self) -> bool {
        self.source.is_empty()
    }

    /// The field map.
    pub fn source(&self) -> &Map<String, Value> {
        &self.source
    }

    /// Consumes the document, returning the field map.
    pub fn into_source(self) -> Map<String, Value> {
        self.source
    }

    /// The source as a JSON object.
    pub fn to_json(&self) -> Value {
        Value::Object(self.source.clone())
    }
}

pub(crate) fn type_label(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_field_order_preserved() {
        let doc = Document::from_json(json!({"z": 1, "a": 2, "m": 3})).unwrap();
        let keys: Vec<_> = doc.source().keys().cloned().collect();
        assert_eq!(keys, vec!["z", "a", "m"]);
    }

    #[test]
    fn test_metadata() {
        let doc = Document::new()
            .with_id("7")
            .with_version(3)
            .with_seq_no_primary_term(SeqNoPrimaryTerm::new(12, 1))
            .with_routing("p1");
        assert_eq!(doc.id(), Some("7"));
        assert_eq!(doc.version(), Some(3));
        assert_eq!(doc.seq_no_primary_term(), Some(SeqNoPrimaryTerm::new(12, 1)));
        assert_eq!(doc.routing(), Some("p1"));
        assert!(doc.is_empty());
    }

    #[test]
    fn test_from_non_object() {
        let err = Document::from_json(json!([1, 2])).unwrap_err();
        assert!(matches!(err, MappingError::NotAnObject { found, .. } if found == "array"));
    }
}
