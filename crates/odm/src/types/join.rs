//! Parent/child join values and document versioning metadata.

use serde::{Deserialize, Serialize};

/// The value of a join field: the relation name and, for children, the parent id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinField {
    /// The relation this document takes part in.
    pub name: String,
    /// The id of the parent document, for child relations.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
}

impl JoinField {
    /// A parent-side join value.
    pub fn parent(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent: None,
        }
    }

    /// A child-side join value pointing at its parent.
    pub fn child(name: impl Into<String>, parent: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent: Some(parent.into()),
        }
    }
}

/// Sequence number and primary term of a stored document.
///
/// A property of this type is never written to the source. It is filled from
/// store metadata on reads and used for `if_seq_no`/`if_primary_term` on writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SeqNoPrimaryTerm {
    /// Sequence number.
    pub seq_no: i64,
    /// Primary term.
    pub primary_term: i64,
}

impl SeqNoPrimaryTerm {
    /// Creates a new pair.
    pub fn new(seq_no: i64, primary_term: i64) -> Self {
        Self {
            seq_no,
            primary_term,
        }
    }
}
