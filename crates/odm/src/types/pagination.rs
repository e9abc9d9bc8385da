//! Paging and sorting types for search requests.
//!
//! Supports offset windows (page number + size) and cursor continuation via
//! `search_after` tokens. Scroll and point-in-time ids are carried as plain
//! strings on the plan; they are produced by the store and never inspected.

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::QueryDerivationError;

/// Paging request for a query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageRequest {
    /// Zero-based page number (ignored in cursor mode).
    pub page: u32,

    /// Maximum number of hits per page.
    pub size: u32,

    /// Sort applied after the sort declared in the method name.
    pub sort: Sort,

    /// The cursor to continue from, if paging by cursor.
    pub cursor: Option<PageCursor>,
}

impl PageRequest {
    /// Creates an offset page request.
    pub fn of(page: u32, size: u32) -> Self {
        Self {
            page,
            size,
            sort: Sort::unsorted(),
            cursor: None,
        }
    }

    /// Creates a request for the first page of the given size.
    pub fn first(size: u32) -> Self {
        Self::of(0, size)
    }

    /// Creates a cursor request continuing after an opaque cursor token.
    pub fn after(cursor: &str, size: u32) -> Result<Self, QueryDerivationError> {
        Ok(Self {
            page: 0,
            size,
            sort: Sort::unsorted(),
            cursor: Some(PageCursor::decode(cursor)?),
        })
    }

    /// Sets the sort.
    pub fn with_sort(mut self, sort: Sort) -> Self {
        self.sort = sort;
        self
    }

    /// Returns the offset of the first hit of this page.
    pub fn offset(&self) -> u64 {
        u64::from(self.page) * u64::from(self.size)
    }

    /// Returns the request for the following page, keeping size and sort.
    pub fn next(&self) -> Self {
        Self {
            page: self.page + 1,
            size: self.size,
            sort: self.sort.clone(),
            cursor: None,
        }
    }

    /// Returns true if this request continues from a cursor.
    pub fn is_cursor(&self) -> bool {
        self.cursor.is_some()
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Ascending order.
    #[default]
    Asc,
    /// Descending order.
    Desc,
}

impl Direction {
    /// The store's name for this direction.
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Asc => "asc",
            Direction::Desc => "desc",
        }
    }
}

/// Where documents missing the sort field are placed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Missing {
    /// Missing values sort first.
    First,
    /// Missing values sort last.
    Last,
}

impl Missing {
    /// The store's name for this placement.
    pub fn as_str(&self) -> &'static str {
        match self {
            Missing::First => "_first",
            Missing::Last => "_last",
        }
    }
}

/// A single sort order on a property.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Order {
    /// Property name; names that do not resolve against the entity are used verbatim.
    pub property: String,
    /// Sort direction.
    pub direction: Direction,
    /// Placement of documents without a value.
    pub missing: Option<Missing>,
}

impl Order {
    /// Ascending order on a property.
    pub fn asc(property: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            direction: Direction::Asc,
            missing: None,
        }
    }

    /// Descending order on a property.
    pub fn desc(property: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            direction: Direction::Desc,
            missing: None,
        }
    }

    /// Sets the placement of missing values.
    pub fn with_missing(mut self, missing: Missing) -> Self {
        self.missing = Some(missing);
        self
    }
}

/// An ordered list of sort orders.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Sort {
    /// The orders, applied in sequence.
    pub orders: Vec<Order>,
}

impl Sort {
    /// No sorting.
    pub fn unsorted() -> Self {
        Self::default()
    }

    /// Sort by the given orders.
    pub fn by(orders: impl IntoIterator<Item = Order>) -> Self {
        Self {
            orders: orders.into_iter().collect(),
        }
    }

    /// Appends another sort's orders after this one.
    pub fn and(mut self, other: Sort) -> Self {
        self.orders.extend(other.orders);
        self
    }

    /// Returns true if no orders are set.
    pub fn is_unsorted(&self) -> bool {
        self.orders.is_empty()
    }
}

/// An opaque cursor for `search_after` continuation.
///
/// # Encoding
///
/// Cursors are URL-safe base64-encoded JSON containing the sort values of the last
/// hit of a page and, for point-in-time searches, the point-in-time id. Callers
/// must hand the token back unmodified.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageCursor {
    /// Cursor format version.
    version: u8,

    /// The sort values of the last hit.
    search_after: Vec<Value>,

    /// Point-in-time id the cursor belongs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    point_in_time: Option<String>,
}

impl PageCursor {
    /// Creates a cursor positioned after the given sort values.
    pub fn new(search_after: Vec<Value>) -> Self {
        Self {
            version: 1,
            search_after,
            point_in_time: None,
        }
    }

    /// Attaches a point-in-time id.
    pub fn with_point_in_time(mut self, id: impl Into<String>) -> Self {
        self.point_in_time = Some(id.into());
        self
    }

    /// Returns the sort values.
    pub fn search_after(&self) -> &[Value] {
        &self.search_after
    }

    /// Returns the point-in-time id, if any.
    pub fn point_in_time(&self) -> Option<&str> {
        self.point_in_time.as_deref()
    }

    /// Encodes the cursor to an opaque string.
    pub fn encode(&self) -> String {
        let json = serde_json::to_vec(self).unwrap_or_default();
        URL_SAFE_NO_PAD.encode(&json)
    }

    /// Decodes a cursor from an opaque string.
    pub fn decode(s: &str) -> Result<Self, QueryDerivationError> {
        let bytes = URL_SAFE_NO_PAD
            .decode(s)
            .map_err(|_| QueryDerivationError::InvalidCursor {
                cursor: s.to_string(),
            })?;

        serde_json::from_slice(&bytes).map_err(|_| QueryDerivationError::InvalidCursor {
            cursor: s.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_page_request_offset() {
        let page = PageRequest::of(3, 20);
        assert_eq!(page.offset(), 60);
        assert_eq!(page.next().offset(), 80);
        assert!(!page.is_cursor());
    }

    #[test]
    fn test_cursor_encode_decode() {
        let cursor = PageCursor::new(vec![json!(1_700_000_000_000_i64), json!("doc-7")])
            .with_point_in_time("pit-abc");

        let encoded = cursor.encode();
        let decoded = PageCursor::decode(&encoded).unwrap();

        assert_eq!(decoded, cursor);
        assert_eq!(decoded.point_in_time(), Some("pit-abc"));
        assert_eq!(decoded.search_after()[1], json!("doc-7"));
    }

    #[test]
    fn test_cursor_decode_invalid() {
        let result = PageCursor::decode("not-valid-base64!!!");
        assert!(matches!(
            result,
            Err(QueryDerivationError::InvalidCursor { .. })
        ));
    }

    #[test]
    fn test_page_request_after() {
        let token = PageCursor::new(vec![json!(5)]).encode();
        let page = PageRequest::after(&token, 10).unwrap();
        assert!(page.is_cursor());
        assert_eq!(page.size, 10);
    }

    #[test]
    fn test_sort_and() {
        let sort = Sort::by([Order::asc("name")]).and(Sort::by([Order::desc("price")]));
        assert_eq!(sort.orders.len(), 2);
        assert_eq!(sort.orders[1].direction, Direction::Desc);
        assert!(Sort::unsorted().is_unsorted());
    }
}
