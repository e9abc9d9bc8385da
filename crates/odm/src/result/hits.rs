//! Result containers.

use std::collections::HashMap;

use serde_json::Value;

use crate::types::{PageRequest, SeqNoPrimaryTerm};

use super::aggregation::Aggregations;

/// Whether a total-hit count is exact or a lower bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TotalHitsRelation {
    /// The count is exact.
    Equal,
    /// At least this many documents match.
    GreaterThanOrEqual,
}

/// The number of matching documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TotalHits {
    /// The reported count.
    pub value: u64,
    /// How to read `value`.
    pub relation: TotalHitsRelation,
}

impl TotalHits {
    /// An exact count.
    pub fn exact(value: u64) -> Self {
        Self {
            value,
            relation: TotalHitsRelation::Equal,
        }
    }

    /// A lower bound.
    pub fn at_least(value: u64) -> Self {
        Self {
            value,
            relation: TotalHitsRelation::GreaterThanOrEqual,
        }
    }

    /// Returns true if the count is exact.
    pub fn is_exact(&self) -> bool {
        self.relation == TotalHitsRelation::Equal
    }
}

/// One hit with its store metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit<T> {
    /// Index the hit came from.
    pub index: Option<String>,
    /// Document id.
    pub id: Option<String>,
    /// Relevance score; absent when sorting without scores.
    pub score: Option<f64>,
    /// Sort values, used for `search_after`.
    pub sort_values: Vec<Value>,
    /// Highlight fragments by field.
    pub highlight: HashMap<String, Vec<String>>,
    /// Document version.
    pub version: Option<i64>,
    /// Sequence number and primary term.
    pub seq_no_primary_term: Option<SeqNoPrimaryTerm>,
    /// Routing value.
    pub routing: Option<String>,
    /// Names of the named queries that matched.
    pub matched_queries: Vec<String>,
    /// The decoded entity.
    pub content: T,
}

impl<T> SearchHit<T> {
    /// Highlight fragments for one field.
    pub fn highlight_field(&self, field: &str) -> &[String] {
        self.highlight.get(field).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Maps the content, keeping the metadata.
    pub fn map<U, F>(self, f: F) -> SearchHit<U>
    where
        F: FnOnce(T) -> U,
    {
        SearchHit {
            index: self.index,
            id: self.id,
            score: self.score,
            sort_values: self.sort_values,
            highlight: self.highlight,
            version: self.version,
            seq_no_primary_term: self.seq_no_primary_term,
            routing: self.routing,
            matched_queries: self.matched_queries,
            content: f(self.content),
        }
    }
}

/// A batch of hits plus response-level metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHits<T> {
    /// The hits, in response order.
    pub hits: Vec<SearchHit<T>>,
    /// Total matches, when tracked.
    pub total: Option<TotalHits>,
    /// Highest score in the response.
    pub max_score: Option<f64>,
    /// Aggregation results by name.
    pub aggregations: Aggregations,
    /// Scroll id to continue a scroll.
    pub scroll_id: Option<String>,
    /// Point-in-time id returned with the response.
    pub point_in_time_id: Option<String>,
    /// Cursor positioned after the last hit, when hits carry sort values.
    pub next_cursor: Option<String>,
}

impl<T> SearchHits<T> {
    /// An empty result.
    pub fn empty() -> Self {
        Self {
            hits: Vec::new(),
            total: Some(TotalHits::exact(0)),
            max_score: None,
            aggregations: Aggregations::default(),
            scroll_id: None,
            point_in_time_id: None,
            next_cursor: None,
        }
    }

    /// Number of hits in this batch.
    pub fn len(&self) -> usize {
        self.hits.len()
    }

    /// Returns true if this batch has no hits.
    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    /// The entities, borrowing.
    pub fn contents(&self) -> Vec<&T> {
        self.hits.iter().map(|h| &h.content).collect()
    }

    /// The entities, dropping the metadata.
    pub fn into_contents(self) -> Vec<T> {
        self.hits.into_iter().map(|h| h.content).collect()
    }
}

impl<T> Default for SearchHits<T> {
    fn default() -> Self {
        Self::empty()
    }
}

/// Paging information for a [`Page`].
#[derive(Debug, Clone, PartialEq)]
pub struct PageInfo {
    /// Zero-based page number; always 0 in cursor mode.
    pub number: u32,
    /// Requested page size.
    pub size: u32,
    /// Total matches, when tracked.
    pub total: Option<TotalHits>,
    /// Cursor for the following page, in cursor mode.
    pub next_cursor: Option<String>,
    /// Whether more results follow.
    pub has_next: bool,
    /// Whether results precede this page.
    pub has_previous: bool,
}

impl PageInfo {
    pub(crate) fn for_request(request: &PageRequest, returned: usize, total: Option<TotalHits>, next_cursor: Option<String>) -> Self {
        let full = returned as u64 >= u64::from(request.size);
        let has_next = match total {
            Some(total) if !request.is_cursor() && total.is_exact() => {
                request.offset() + (returned as u64) < total.value
            }
            _ => full,
        };
        Self {
            number: request.page,
            size: request.size,
            total,
            next_cursor: if has_next { next_cursor } else { None },
            has_next,
            has_previous: request.is_cursor() || request.page > 0,
        }
    }

    /// Total number of pages, when the total is exact.
    pub fn total_pages(&self) -> Option<u64> {
        let total = self.total.filter(TotalHits::is_exact)?;
        if self.size == 0 {
            return Some(0);
        }
        Some(total.value.div_ceil(u64::from(self.size)))
    }
}

/// A page of entities.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    /// The entities in this page.
    pub items: Vec<T>,
    /// Paging information.
    pub page_info: PageInfo,
}

impl<T> Page<T> {
    /// Returns true if the page has no items.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Number of items.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Maps the items.
    pub fn map<U, F>(self, f: F) -> Page<U>
    where
        F: FnMut(T) -> U,
    {
        Page {
            items: self.items.into_iter().map(f).collect(),
            page_info: self.page_info,
        }
    }
}

/// What a query method returns, by method subject and requested container.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryResult<T> {
    /// Number of matches.
    Count(u64),
    /// Whether anything matched.
    Exists(bool),
    /// Number of deleted documents.
    Deleted(u64),
    /// The first match, if any.
    One(Option<T>),
    /// All returned matches.
    List(Vec<T>),
    /// One page of matches.
    Page(Page<T>),
    /// Matches with hit metadata.
    Hits(SearchHits<T>),
}

impl<T> QueryResult<T> {
    /// The entities carried by the result, in order; empty for scalar results.
    pub fn into_items(self) -> Vec<T> {
        match self {
            QueryResult::One(item) => item.into_iter().collect(),
            QueryResult::List(items) => items,
            QueryResult::Page(page) => page.items,
            QueryResult::Hits(hits) => hits.into_contents(),
            QueryResult::Count(_) | QueryResult::Exists(_) | QueryResult::Deleted(_) => Vec::new(),
        }
    }

    /// The count for `Count` and `Deleted` results.
    pub fn count(&self) -> Option<u64> {
        match self {
            QueryResult::Count(n) | QueryResult::Deleted(n) => Some(*n),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_info_from_total() {
        let info = PageInfo::for_request(&PageRequest::of(1, 10), 10, Some(TotalHits::exact(25)), None);
        assert!(info.has_next);
        assert!(info.has_previous);
        assert_eq!(info.total_pages(), Some(3));

        let info = PageInfo::for_request(&PageRequest::of(2, 10), 5, Some(TotalHits::exact(25)), None);
        assert!(!info.has_next);
    }

    #[test]
    fn test_page_info_lower_bound() {
        let info = PageInfo::for_request(&PageRequest::of(0, 10), 10, Some(TotalHits::at_least(10_000)), Some("c".into()));
        assert!(info.has_next);
        assert_eq!(info.next_cursor.as_deref(), Some("c"));
        assert_eq!(info.total_pages(), None);
    }

    #[test]
    fn test_query_result_items() {
        assert_eq!(QueryResult::One(Some(1)).into_items(), vec![1]);
        assert_eq!(QueryResult::<i32>::Count(4).count(), Some(4));
        assert!(QueryResult::<i32>::Exists(true).into_items().is_empty());
    }
}
