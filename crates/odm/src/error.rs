//! Error types for the mapping layer.
//!
//! This module defines all error types used throughout the crate, following a
//! hierarchy that separates mapping errors, query derivation errors, concurrency
//! errors, transport errors and store-side failures.
//!
//! Mapping and derivation errors surface at metadata build or query registration
//! time. Concurrency and transport errors are handed to the caller untouched.

// Error enum variant fields are self-documenting via their #[error(...)] messages
#![allow(missing_docs)]

use std::fmt;

use thiserror::Error;

/// The primary error type for all operations.
#[derive(Error, Debug)]
pub enum OdmError {
    /// Type introspection or conversion errors
    #[error(transparent)]
    Mapping(#[from] MappingError),

    /// Query method derivation and compilation errors
    #[error(transparent)]
    Query(#[from] QueryDerivationError),

    /// Optimistic concurrency errors
    #[error(transparent)]
    Concurrency(#[from] ConcurrencyError),

    /// Failures reported by the document-store client
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Non-success responses from the store
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A bulk request that completed with failed items
    #[error(transparent)]
    PartialBulk(#[from] PartialBulkFailure),
}

impl OdmError {
    /// Returns true if this error is an optimistic concurrency conflict.
    pub fn is_version_conflict(&self) -> bool {
        matches!(self, OdmError::Concurrency(ConcurrencyError::VersionConflict { .. }))
    }
}

/// Errors raised while inspecting types or converting values.
#[derive(Error, Debug)]
pub enum MappingError {
    /// The type is stored as a document but declares no id property.
    #[error("type {type_name} has no identifier property")]
    MissingId { type_name: String },

    /// A creator parameter does not name a declared property.
    #[error("creator parameter '{parameter}' of {type_name} does not match any property")]
    UnmatchedCreatorParameter {
        type_name: String,
        parameter: String,
    },

    /// Two property options contradict each other.
    #[error("conflicting declaration on {type_name}.{property}: {message}")]
    ConflictingProperty {
        type_name: String,
        property: String,
        message: String,
    },

    /// The same property or field name was declared twice.
    #[error("duplicate property '{property}' on {type_name}")]
    DuplicateProperty { type_name: String, property: String },

    /// A referenced property is not declared on the type.
    #[error("unknown property '{property}' on {type_name}")]
    UnknownProperty { type_name: String, property: String },

    /// Map-typed properties require string keys.
    #[error("map property {type_name}.{property} has non-string key type {key_type}")]
    NonStringMapKey {
        type_name: String,
        property: String,
        key_type: String,
    },

    /// The value for a mapped type was not a JSON object.
    #[error("value for {type_name} is not an object: {found}")]
    NotAnObject { type_name: String, found: String },

    /// A temporal value could not be written or parsed.
    #[error("invalid date value for '{property}': {value} (formats: {formats})")]
    InvalidDate {
        property: String,
        value: String,
        formats: String,
    },

    /// A geo value does not have a recognizable shape.
    #[error("invalid geo value for '{property}': {message}")]
    InvalidGeo { property: String, message: String },

    /// A range value does not have a recognizable shape.
    #[error("invalid range value for '{property}': {message}")]
    InvalidRange { property: String, message: String },

    /// A join field names an undeclared relation.
    #[error("relation '{relation}' is not declared on {type_name}")]
    InvalidJoin { type_name: String, relation: String },

    /// A child relation was written without a routing value.
    #[error("child relation '{relation}' on {type_name} requires a routing value")]
    MissingRouting { type_name: String, relation: String },

    /// A custom converter rejected a value.
    #[error("conversion failed for '{property}': {message}")]
    Conversion { property: String, message: String },

    /// Serialization of an entity failed.
    #[error("serialization error: {message}")]
    Serialization { message: String },

    /// Instantiation of an entity from a document failed.
    #[error("cannot read {type_name} from document: {message}")]
    Deserialization { type_name: String, message: String },

    /// An index-name template is syntactically broken.
    #[error("invalid index name template '{template}': {message}")]
    InvalidIndexTemplate { template: String, message: String },

    /// An index-name template names an unknown variable.
    #[error("unresolved index name expression '{expression}'")]
    UnresolvedIndexExpression { expression: String },
}

/// Errors raised while deriving or compiling query methods.
#[derive(Error, Debug)]
pub enum QueryDerivationError {
    /// The method descriptor does not follow the method-name grammar.
    #[error("malformed query method '{method}': {message}")]
    Malformed { method: String, message: String },

    /// A property reference could not be resolved.
    #[error("query method '{method}' references unknown property '{property}'")]
    UnknownProperty { method: String, property: String },

    /// The keyword is recognized but not supported by this store.
    #[error("query method '{method}' uses unsupported keyword '{keyword}'")]
    UnsupportedKeyword { method: String, keyword: String },

    /// The operator cannot be applied to the property's field type.
    #[error("operator {operator} cannot be applied to '{property}' of type {field_type} in '{method}'")]
    IncompatibleOperator {
        method: String,
        property: String,
        operator: String,
        field_type: String,
    },

    /// The number of bound arguments does not match the declared arity.
    #[error("query method '{method}' expects {expected} arguments, got {actual}")]
    ArityMismatch {
        method: String,
        expected: usize,
        actual: usize,
    },

    /// A string query template is invalid.
    #[error("invalid query template for '{method}': {message}")]
    InvalidTemplate { method: String, message: String },

    /// A named placeholder has no bound value.
    #[error("query method '{method}' has no value for named parameter ':{name}'")]
    MissingNamedArgument { method: String, name: String },

    /// A paging cursor could not be decoded.
    #[error("invalid pagination cursor: {cursor}")]
    InvalidCursor { cursor: String },
}

/// Errors related to optimistic concurrency control.
#[derive(Error, Debug)]
pub enum ConcurrencyError {
    /// The store rejected a write because the document changed.
    #[error("version conflict on {index}/{id}: {reason}")]
    VersionConflict {
        index: String,
        id: String,
        reason: String,
    },
}

/// A failure reported by the document-store client.
///
/// The core never interprets or retries these.
#[derive(Error, Debug)]
#[error("transport error: {message}")]
pub struct TransportError {
    pub message: String,
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl TransportError {
    /// Creates a transport error with a message only.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a transport error wrapping a source error.
    pub fn with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}

/// Errors derived from store responses.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The store answered with a non-success status.
    #[error("{operation} failed with status {status}: {reason}")]
    Status {
        operation: String,
        status: u16,
        error_type: Option<String>,
        reason: String,
    },

    /// The target index does not exist.
    #[error("index not found: {index}")]
    IndexNotFound { index: String },

    /// The response body did not have the expected shape.
    #[error("malformed {operation} response: {message}")]
    MalformedResponse { operation: String, message: String },
}

/// A bulk request in which some items failed.
#[derive(Error, Debug)]
#[error("bulk request failed for {} of {total} items", .failures.len())]
pub struct PartialBulkFailure {
    pub total: usize,
    pub failures: Vec<BulkItemFailure>,
}

/// One failed item of a bulk request.
#[derive(Debug, Clone, PartialEq)]
pub struct BulkItemFailure {
    /// Position of the item in submission order.
    pub position: usize,
    /// Document id, if known.
    pub id: Option<String>,
    /// HTTP status reported for the item.
    pub status: u16,
    /// Error type reported by the store.
    pub error_type: Option<String>,
    /// Error reason reported by the store.
    pub reason: String,
}

impl fmt::Display for BulkItemFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.id {
            Some(id) => write!(f, "#{} ({}): {} {}", self.position, id, self.status, self.reason),
            None => write!(f, "#{}: {} {}", self.position, self.status, self.reason),
        }
    }
}

/// Result type alias for all operations.
pub type OdmResult<T> = Result<T, OdmError>;

impl From<serde_json::Error> for OdmError {
    fn from(err: serde_json::Error) -> Self {
        OdmError::Mapping(MappingError::Serialization {
            message: err.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mapping_error_display() {
        let err = OdmError::Mapping(MappingError::MissingId {
            type_name: "Book".to_string(),
        });
        assert_eq!(err.to_string(), "type Book has no identifier property");
    }

    #[test]
    fn test_arity_error_display() {
        let err = QueryDerivationError::ArityMismatch {
            method: "findByNameAndPrice".to_string(),
            expected: 2,
            actual: 1,
        };
        assert_eq!(
            err.to_string(),
            "query method 'findByNameAndPrice' expects 2 arguments, got 1"
        );
    }

    #[test]
    fn test_version_conflict_detection() {
        let err: OdmError = ConcurrencyError::VersionConflict {
            index: "books".to_string(),
            id: "1".to_string(),
            reason: "current version [3] is higher".to_string(),
        }
        .into();
        assert!(err.is_version_conflict());

        let other: OdmError = TransportError::new("connection reset").into();
        assert!(!other.is_version_conflict());
    }

    #[test]
    fn test_partial_bulk_display() {
        let err = PartialBulkFailure {
            total: 3,
            failures: vec![BulkItemFailure {
                position: 1,
                id: Some("b".to_string()),
                status: 409,
                error_type: Some("version_conflict_engine_exception".to_string()),
                reason: "conflict".to_string(),
            }],
        };
        assert_eq!(err.to_string(), "bulk request failed for 1 of 3 items");
        assert_eq!(err.failures[0].to_string(), "#1 (b): 409 conflict");
    }

    #[test]
    fn test_transport_error_source() {
        use std::error::Error as _;

        let io = std::io::Error::new(std::io::ErrorKind::TimedOut, "timed out");
        let err = TransportError::with_source("request timed out", io);
        assert!(err.source().is_some());
        assert_eq!(err.to_string(), "transport error: request timed out");
    }
}
