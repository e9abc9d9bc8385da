//! Bulk requests and their per-item outcomes.

use serde_json::{Map, Value, json};

use crate::error::{BulkItemFailure, PartialBulkFailure};
use crate::types::SeqNoPrimaryTerm;

/// One action of a bulk request.
#[derive(Debug, Clone, PartialEq)]
pub enum BulkOperation {
    /// Index (create or replace) a document.
    Index {
        /// Target index.
        index: String,
        /// Document id; generated by the store when absent.
        id: Option<String>,
        /// Routing value.
        routing: Option<String>,
        /// External version.
        version: Option<i64>,
        /// Expected sequence number and primary term.
        if_seq_no_primary_term: Option<SeqNoPrimaryTerm>,
        /// The document source.
        source: Value,
    },
    /// Partially update a document.
    Update {
        /// Target index.
        index: String,
        /// Document id.
        id: String,
        /// Routing value.
        routing: Option<String>,
        /// Fields to merge into the stored source.
        doc: Value,
        /// Create the document from `doc` when it does not exist.
        doc_as_upsert: bool,
    },
    /// Delete a document.
    Delete {
        /// Target index.
        index: String,
        /// Document id.
        id: String,
        /// Routing value.
        routing: Option<String>,
    },
}

impl BulkOperation {
    /// The action and optional source lines for the bulk body.
    pub(crate) fn to_lines(&self) -> Vec<Value> {
        match self {
            BulkOperation::Index {
                index,
                id,
                routing,
                version,
                if_seq_no_primary_term,
                source,
            } => {
                let mut action = Map::new();
                action.insert("_index".to_string(), json!(index));
                if let Some(id) = id {
                    action.insert("_id".to_string(), json!(id));
                }
                if let Some(routing) = routing {
                    action.insert("routing".to_string(), json!(routing));
                }
                if let Some(seq) = if_seq_no_primary_term {
                    action.insert("if_seq_no".to_string(), json!(seq.seq_no));
                    action.insert("if_primary_term".to_string(), json!(seq.primary_term));
                } else if let Some(version) = version {
                    action.insert("version".to_string(), json!(version));
                    action.insert("version_type".to_string(), json!("external"));
                }
                vec![json!({ "index": action }), source.clone()]
            }
            BulkOperation::Update {
                index,
                id,
                routing,
                doc,
                doc_as_upsert,
            } => {
                let mut action = Map::new();
                action.insert("_index".to_string(), json!(index));
                action.insert("_id".to_string(), json!(id));
                if let Some(routing) = routing {
                    action.insert("routing".to_string(), json!(routing));
                }
                vec![
                    json!({ "update": action }),
                    json!({"doc": doc, "doc_as_upsert": doc_as_upsert}),
                ]
            }
            BulkOperation::Delete { index, id, routing } => {
                let mut action = Map::new();
                action.insert("_index".to_string(), json!(index));
                action.insert("_id".to_string(), json!(id));
                if let Some(routing) = routing {
                    action.insert("routing".to_string(), json!(routing));
                }
                vec![json!({ "delete": action })]
            }
        }
    }
}

/// The outcome of one bulk item, in submission order.
#[derive(Debug, Clone, PartialEq)]
pub struct BulkItem {
    /// Position in the submitted request.
    pub position: usize,
    /// Document id assigned or targeted.
    pub id: Option<String>,
    /// Status reported for the item.
    pub status: u16,
    /// Version after the operation.
    pub version: Option<i64>,
    /// Sequence number and primary term after the operation.
    pub seq_no_primary_term: Option<SeqNoPrimaryTerm>,
    /// The failure, if the item was rejected.
    pub failure: Option<BulkItemFailure>,
}

impl BulkItem {
    /// Returns true if the item succeeded.
    pub fn is_success(&self) -> bool {
        self.failure.is_none()
    }
}

/// Per-item outcomes of a bulk request.
///
/// A bulk call that reached the store always yields an outcome, even when some
/// items failed. Retrying failed items is left to the caller.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BulkOutcome {
    /// Items in submission order.
    pub items: Vec<BulkItem>,
}

impl BulkOutcome {
    pub(crate) fn from_response(body: &Value) -> Self {
        let items = body
            .get("items")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .enumerate()
                    .map(|(position, item)| parse_item(position, item))
                    .collect()
            })
            .unwrap_or_default();
        Self { items }
    }

    /// Returns true if any item failed.
    pub fn has_failures(&self) -> bool {
        self.items.iter().any(|i| !i.is_success())
    }

    /// The failed items.
    pub fn failures(&self) -> impl Iterator<Item = &BulkItemFailure> {
        self.items.iter().filter_map(|i| i.failure.as_ref())
    }

    /// The successful items.
    pub fn successes(&self) -> impl Iterator<Item = &BulkItem> {
        self.items.iter().filter(|i| i.is_success())
    }

    /// Converts to an error when any item failed.
    pub fn into_result(self) -> Result<Self, PartialBulkFailure> {
        if !self.has_failures() {
            return Ok(self);
        }
        Err(PartialBulkFailure {
            total: self.items.len(),
            failures: self.failures().cloned().collect(),
        })
    }
}

fn parse_item(position: usize, item: &Value) -> BulkItem {
    // {"index": {...}} | {"update": {...}} | {"delete": {...}} | {"create": {...}}
    let result = item
        .as_object()
        .and_then(|o| o.values().next())
        .cloned()
        .unwrap_or(Value::Null);

    let id = result.get("_id").and_then(Value::as_str).map(String::from);
    let status = result
        .get("status")
        .and_then(Value::as_u64)
        .and_then(|s| u16::try_from(s).ok())
        .unwrap_or(0);
    let seq_no_primary_term = match (
        result.get("_seq_no").and_then(Value::as_i64),
        result.get("_primary_term").and_then(Value::as_i64),
    ) {
        (Some(seq_no), Some(primary_term)) => Some(SeqNoPrimaryTerm::new(seq_no, primary_term)),
        _ => None,
    };

    let failure = result.get("error").map(|error| BulkItemFailure {
        position,
        id: id.clone(),
        status,
        error_type: error.get("type").and_then(Value::as_str).map(String::from),
        reason: error
            .get("reason")
            .and_then(Value::as_str)
            .map(String::from)
            .unwrap_or_else(|| error.to_string()),
    });

    BulkItem {
        position,
        id,
        status,
        version: result.get("_version").and_then(Value::as_i64),
        seq_no_primary_term,
        failure,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lines() {
        let op = BulkOperation::Index {
            index: "books".into(),
            id: Some("1".into()),
            routing: None,
            version: Some(3),
            if_seq_no_primary_term: None,
            source: json!({"name": "Foo"}),
        };
        assert_eq!(
            op.to_lines(),
            vec![
                json!({"index": {"_index": "books", "_id": "1", "version": 3, "version_type": "external"}}),
                json!({"name": "Foo"})
            ]
        );

        let op = BulkOperation::Delete {
            index: "books".into(),
            id: "2".into(),
            routing: Some("p".into()),
        };
        assert_eq!(op.to_lines(), vec![json!({"delete": {"_index": "books", "_id": "2", "routing": "p"}})]);
    }

    #[test]
    fn test_partial_failure() {
        let outcome = BulkOutcome::from_response(&json!({
            "errors": true,
            "items": [
                {"index": {"_id": "1", "status": 201, "_version": 1, "_seq_no": 0, "_primary_term": 1}},
                {"index": {"_id": "2", "status": 409, "error": {"type": "version_conflict_engine_exception", "reason": "conflict"}}},
                {"delete": {"_id": "3", "status": 200, "_version": 2}}
            ]
        }));

        assert_eq!(outcome.items.len(), 3);
        assert!(outcome.has_failures());
        assert_eq!(outcome.successes().count(), 2);
        assert_eq!(outcome.items[0].seq_no_primary_term, Some(SeqNoPrimaryTerm::new(0, 1)));

        let err = outcome.into_result().unwrap_err();
        assert_eq!(err.total, 3);
        assert_eq!(err.failures.len(), 1);
        assert_eq!(err.failures[0].position, 1);
        assert_eq!(err.failures[0].error_type.as_deref(), Some("version_conflict_engine_exception"));
    }
}
