//! Range values for the store's range field types.

use serde::{Deserialize, Serialize};

/// A pair of optional bounds.
///
/// Serializes as `{"from": .., "to": ..}`; the converter rewrites it to the bound
/// names configured on the property (`gte`/`lte` by default). Ordering of the
/// bounds is not checked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeValue<T> {
    /// Lower bound.
    #[serde(default)]
    pub from: Option<T>,
    /// Upper bound.
    #[serde(default)]
    pub to: Option<T>,
}

impl<T> RangeValue<T> {
    /// A range with both bounds.
    pub fn between(from: T, to: T) -> Self {
        Self {
            from: Some(from),
            to: Some(to),
        }
    }

    /// A range open at the top.
    pub fn at_least(from: T) -> Self {
        Self {
            from: Some(from),
            to: None,
        }
    }

    /// A range open at the bottom.
    pub fn at_most(to: T) -> Self {
        Self {
            from: None,
            to: Some(to),
        }
    }
}

impl<T> Default for RangeValue<T> {
    fn default() -> Self {
        Self {
            from: None,
            to: None,
        }
    }
}

/// The names under which range bounds are written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeBounds {
    /// Name of the lower bound (`gte` or `gt`).
    pub lower: String,
    /// Name of the upper bound (`lte` or `lt`).
    pub upper: String,
}

impl RangeBounds {
    /// Inclusive bounds.
    pub fn inclusive() -> Self {
        Self {
            lower: "gte".to_string(),
            upper: "lte".to_string(),
        }
    }

    /// Exclusive bounds.
    pub fn exclusive() -> Self {
        Self {
            lower: "gt".to_string(),
            upper: "lt".to_string(),
        }
    }
}

impl Default for RangeBounds {
    fn default() -> Self {
        Self::inclusive()
    }
}
