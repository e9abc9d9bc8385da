//! The abstract predicate tree produced by query-method derivation.

use std::fmt;

use crate::mapping::{FieldType, PropertyMetadata};
use crate::types::Order;

/// A comparison applied to one property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    /// Equality (`Is`, `Equals`, or no keyword).
    Simple,
    /// Inequality (`Not`, `IsNot`).
    Negating,
    /// Inclusive range over two bounds.
    Between,
    /// `< value`.
    LessThan,
    /// `<= value`.
    LessThanEqual,
    /// `> value`.
    GreaterThan,
    /// `>= value`.
    GreaterThanEqual,
    /// `<= value`, for dates.
    Before,
    /// `>= value`, for dates.
    After,
    /// Prefix match, same as `StartingWith`.
    Like,
    /// Prefix match.
    StartingWith,
    /// Suffix match.
    EndingWith,
    /// Substring match.
    Containing,
    /// Negated substring match.
    NotContaining,
    /// Value is one of a collection.
    In,
    /// Value is none of a collection.
    NotIn,
    /// Boolean true.
    True,
    /// Boolean false.
    False,
    /// Field is absent.
    IsNull,
    /// Field is present.
    IsNotNull,
    /// Field is present, without a value check.
    Exists,
    /// Field is present but empty.
    IsEmpty,
    /// Field has a non-empty value.
    IsNotEmpty,
    /// Regular-expression match.
    Regex,
    /// Within a distance of a point.
    Within,
    /// Inside a bounding box.
    Near,
}

impl Operator {
    /// The number of arguments the operator consumes.
    pub fn arity(&self) -> usize {
        match self {
            Operator::True
            | Operator::False
            | Operator::IsNull
            | Operator::IsNotNull
            | Operator::Exists
            | Operator::IsEmpty
            | Operator::IsNotEmpty => 0,
            Operator::Between | Operator::Within | Operator::Near => 2,
            _ => 1,
        }
    }

    /// Returns true for operators that only apply to geo-point fields.
    pub fn is_geo(&self) -> bool {
        matches!(self, Operator::Within | Operator::Near)
    }

    /// Returns true for operators compiled into a negated clause.
    pub fn is_negating(&self) -> bool {
        matches!(
            self,
            Operator::Negating | Operator::NotContaining | Operator::NotIn | Operator::IsNull
        )
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// A resolved property path, possibly through embedded types.
#[derive(Debug, Clone)]
pub struct PropertyPath {
    /// Property names from the root type to the leaf.
    pub segments: Vec<String>,
    /// Dotted document field path.
    pub field_path: String,
    /// Field paths of enclosing `nested` fields, outermost first.
    pub nested_paths: Vec<String>,
    pub(crate) leaf: PropertyMetadata,
}

impl PropertyPath {
    /// The leaf property.
    pub fn leaf(&self) -> &PropertyMetadata {
        &self.leaf
    }

    /// The leaf's field type.
    pub fn field_type(&self) -> FieldType {
        self.leaf.field_type
    }

    /// The dotted property path, as written in the method name.
    pub fn dotted(&self) -> String {
        self.segments.join(".")
    }
}

impl PartialEq for PropertyPath {
    fn eq(&self, other: &Self) -> bool {
        self.segments == other.segments && self.field_path == other.field_path
    }
}

/// One property condition.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    /// The constrained property.
    pub path: PropertyPath,
    /// The comparison.
    pub operator: Operator,
}

impl Condition {
    /// The number of arguments the condition consumes.
    pub fn arity(&self) -> usize {
        self.operator.arity()
    }
}

/// A logical tree over conditions.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// A single condition.
    Condition(Condition),
    /// All children must hold.
    And(Vec<Predicate>),
    /// At least one child must hold.
    Or(Vec<Predicate>),
}

impl Predicate {
    /// Conditions in argument-binding order.
    pub fn conditions(&self) -> Vec<&Condition> {
        let mut out = Vec::new();
        self.collect(&mut out);
        out
    }

    fn collect<'a>(&'a self, out: &mut Vec<&'a Condition>) {
        match self {
            Predicate::Condition(c) => out.push(c),
            Predicate::And(children) | Predicate::Or(children) => {
                for child in children {
                    child.collect(out);
                }
            }
        }
    }

    /// Total number of arguments consumed.
    pub fn arity(&self) -> usize {
        self.conditions().iter().map(|c| c.arity()).sum()
    }

    pub(crate) fn and(self, next: Predicate) -> Predicate {
        match self {
            Predicate::And(mut children) => {
                children.push(next);
                Predicate::And(children)
            }
            other => Predicate::And(vec![other, next]),
        }
    }

    pub(crate) fn or(self, next: Predicate) -> Predicate {
        match self {
            Predicate::Or(mut children) => {
                children.push(next);
                Predicate::Or(children)
            }
            other => Predicate::Or(vec![other, next]),
        }
    }
}

/// What a derived method does with the matching documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Subject {
    /// Return matching entities.
    Find,
    /// Count matches.
    Count,
    /// Test for any match.
    Exists,
    /// Delete matches.
    Delete,
}

/// A derived query method: immutable and shared across invocations.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryMethod {
    /// The method name it was derived from.
    pub name: String,
    /// The action.
    pub subject: Subject,
    /// `Distinct` was requested.
    pub distinct: bool,
    /// `First<N>`/`Top<N>` limit.
    pub limit: Option<u32>,
    /// The conditions; `None` matches everything.
    pub predicate: Option<Predicate>,
    /// Orders from the `OrderBy` clause, as field paths.
    pub sort: Vec<Order>,
}

impl QueryMethod {
    /// Number of arguments an invocation must bind.
    pub fn arity(&self) -> usize {
        self.predicate.as_ref().map_or(0, Predicate::arity)
    }
}
