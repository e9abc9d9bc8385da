//! Bound arguments and compiled query plans.

use std::collections::HashMap;
use std::time::Duration;

use serde_json::{Map, Value, json};

use crate::config::OdmConfig;
use crate::types::{HighlightSpec, PageRequest, Sort, SourceFilter};

/// How the store counts total hits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackTotalHits {
    /// Count every match exactly.
    Exact,
    /// Count accurately up to the limit, then report a lower bound.
    UpTo(u64),
    /// Do not count.
    Disabled,
}

impl TrackTotalHits {
    fn to_json(self) -> Value {
        match self {
            TrackTotalHits::Exact => json!(true),
            TrackTotalHits::UpTo(limit) => json!(limit),
            TrackTotalHits::Disabled => json!(false),
        }
    }
}

/// A point-in-time reference for consistent paging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PointInTime {
    /// Id returned by the store when the point in time was opened.
    pub id: String,
    /// How long the store keeps it alive after each request.
    pub keep_alive: Duration,
}

impl PointInTime {
    /// Creates a point-in-time reference.
    pub fn new(id: impl Into<String>, keep_alive: Duration) -> Self {
        Self {
            id: id.into(),
            keep_alive,
        }
    }
}

/// Arguments bound to one invocation of a query method.
#[derive(Debug, Clone, Default)]
pub struct QueryArgs {
    pub(crate) positional: Vec<Value>,
    pub(crate) named: HashMap<String, Value>,
    pub(crate) page: Option<PageRequest>,
    pub(crate) sort: Sort,
    pub(crate) highlight: Option<HighlightSpec>,
    pub(crate) source: Option<SourceFilter>,
    pub(crate) routing: Option<String>,
    pub(crate) min_score: Option<f64>,
    pub(crate) track_total_hits: Option<TrackTotalHits>,
    pub(crate) point_in_time: Option<PointInTime>,
    pub(crate) cursor_paging: bool,
}

impl QueryArgs {
    /// No arguments.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a positional argument.
    pub fn arg(mut self, value: impl Into<Value>) -> Self {
        self.positional.push(value.into());
        self
    }

    /// Appends a positional argument serialized through serde.
    pub fn arg_serialized<V: serde::Serialize>(mut self, value: &V) -> Result<Self, serde_json::Error> {
        self.positional.push(serde_json::to_value(value)?);
        Ok(self)
    }

    /// Binds a named template argument.
    pub fn named(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.named.insert(name.into(), value.into());
        self
    }

    /// Sets the page. A page carrying a cursor switches to cursor paging.
    pub fn page(mut self, page: PageRequest) -> Self {
        self.cursor_paging |= page.is_cursor();
        self.page = Some(page);
        self
    }

    /// Requests `search_after` paging from the first page on, so that every page
    /// sorts with the same tie-breaker.
    pub fn cursor_paging(mut self) -> Self {
        self.cursor_paging = true;
        self
    }

    /// Appends a sort applied after the method's own ordering.
    pub fn sort(mut self, sort: Sort) -> Self {
        self.sort = self.sort.and(sort);
        self
    }

    /// Requests highlighting.
    pub fn highlight(mut self, highlight: HighlightSpec) -> Self {
        self.highlight = Some(highlight);
        self
    }

    /// Filters the returned source.
    pub fn source_filter(mut self, filter: SourceFilter) -> Self {
        self.source = Some(filter);
        self
    }

    /// Routes the search to the shard for `routing`.
    pub fn routing(mut self, routing: impl Into<String>) -> Self {
        self.routing = Some(routing.into());
        self
    }

    /// Drops hits scoring below `min_score`.
    pub fn min_score(mut self, min_score: f64) -> Self {
        self.min_score = Some(min_score);
        self
    }

    /// Sets total-hit tracking.
    pub fn track_total_hits(mut self, track: TrackTotalHits) -> Self {
        self.track_total_hits = Some(track);
        self
    }

    /// Searches within a point in time.
    pub fn point_in_time(mut self, pit: PointInTime) -> Self {
        self.point_in_time = Some(pit);
        self.cursor_paging = true;
        self
    }

    /// Number of positional arguments.
    pub fn len(&self) -> usize {
        self.positional.len()
    }

    /// Returns true if no positional arguments are bound.
    pub fn is_empty(&self) -> bool {
        self.positional.is_empty()
    }
}

/// A fully bound search request, ready to send.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryPlan {
    /// The query clause.
    pub query: Value,
    /// Sort clauses, in order.
    pub sort: Vec<Value>,
    /// Offset of the first hit.
    pub from: Option<u64>,
    /// Maximum number of hits.
    pub size: Option<u32>,
    /// Sort values to continue after.
    pub search_after: Option<Vec<Value>>,
    /// Point in time to search.
    pub point_in_time: Option<PointInTime>,
    /// Highlight request.
    pub highlight: Option<Value>,
    /// Source filter.
    pub source: Option<Value>,
    /// Total-hit tracking.
    pub track_total_hits: Option<TrackTotalHits>,
    /// Minimum score.
    pub min_score: Option<f64>,
    /// Shard routing.
    pub routing: Option<String>,
    /// Ask for sequence numbers and primary terms on hits.
    pub seq_no_primary_term: bool,
    /// Ask for versions on hits.
    pub version: bool,
    /// Aggregations, passed through as given.
    pub aggregations: Option<Value>,
}

impl QueryPlan {
    /// A plan running `query` with store defaults.
    pub fn new(query: Value) -> Self {
        Self {
            query,
            sort: Vec::new(),
            from: None,
            size: None,
            search_after: None,
            point_in_time: None,
            highlight: None,
            source: None,
            track_total_hits: None,
            min_score: None,
            routing: None,
            seq_no_primary_term: false,
            version: false,
            aggregations: None,
        }
    }

    /// A plan matching every document.
    pub fn match_all() -> Self {
        Self::new(json!({"match_all": {}}))
    }

    /// Adds aggregations to the request.
    pub fn with_aggregations(mut self, aggregations: Value) -> Self {
        self.aggregations = Some(aggregations);
        self
    }

    /// Sets the maximum number of hits.
    pub fn with_size(mut self, size: u32) -> Self {
        self.size = Some(size);
        self
    }

    /// The search request body.
    pub fn to_body(&self) -> Value {
        let mut body = Map::new();
        body.insert("query".to_string(), self.query.clone());
        if !self.sort.is_empty() {
            body.insert("sort".to_string(), Value::Array(self.sort.clone()));
        }
        if let Some(from) = self.from {
            body.insert("from".to_string(), json!(from));
        }
        if let Some(size) = self.size {
            body.insert("size".to_string(), json!(size));
        }
        if let Some(search_after) = &self.search_after {
            body.insert("search_after".to_string(), Value::Array(search_after.clone()));
        }
        if let Some(pit) = &self.point_in_time {
            body.insert(
                "pit".to_string(),
                json!({"id": pit.id, "keep_alive": OdmConfig::keep_alive_param(pit.keep_alive)}),
            );
        }
        if let Some(highlight) = &self.highlight {
            body.insert("highlight".to_string(), highlight.clone());
        }
        if let Some(source) = &self.source {
            body.insert("_source".to_string(), source.clone());
        }
        if let Some(track) = self.track_total_hits {
            body.insert("track_total_hits".to_string(), track.to_json());
        }
        if let Some(min_score) = self.min_score {
            body.insert("min_score".to_string(), json!(min_score));
        }
        if self.seq_no_primary_term {
            body.insert("seq_no_primary_term".to_string(), json!(true));
        }
        if self.version {
            body.insert("version".to_string(), json!(true));
        }
        if let Some(aggregations) = &self.aggregations {
            body.insert("aggs".to_string(), aggregations.clone());
        }
        Value::Object(body)
    }

    /// The body for count and delete-by-query requests.
    pub fn to_query_body(&self) -> Value {
        json!({"query": self.query})
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_body() {
        assert_eq!(QueryPlan::match_all().to_body(), json!({"query": {"match_all": {}}}));
    }

    #[test]
    fn test_full_body() {
        let mut plan = QueryPlan::new(json!({"term": {"name": "Foo"}}));
        plan.sort = vec![json!({"price": {"order": "asc"}})];
        plan.size = Some(20);
        plan.search_after = Some(vec![json!(10), json!("a")]);
        plan.point_in_time = Some(PointInTime::new("pit-1", Duration::from_secs(60)));
        plan.track_total_hits = Some(TrackTotalHits::UpTo(1000));
        plan.min_score = Some(0.5);
        plan.seq_no_primary_term = true;

        let body = plan.to_body();
        assert_eq!(body["size"], json!(20));
        assert_eq!(body["search_after"], json!([10, "a"]));
        assert_eq!(body["pit"], json!({"id": "pit-1", "keep_alive": "60s"}));
        assert_eq!(body["track_total_hits"], json!(1000));
        assert_eq!(body["min_score"], json!(0.5));
        assert_eq!(body["seq_no_primary_term"], json!(true));
        assert!(body.get("from").is_none());
        assert!(body.get("version").is_none());
        assert_eq!(plan.to_query_body(), json!({"query": {"term": {"name": "Foo"}}}));
    }

    #[test]
    fn test_args_builder() {
        let args = QueryArgs::new().arg("Foo").arg(10).named("x", true);
        assert_eq!(args.len(), 2);
        assert_eq!(args.positional, vec![json!("Foo"), json!(10)]);
        assert!(!args.cursor_paging);

        let args = QueryArgs::new().page(PageRequest::after(&crate::types::PageCursor::new(vec![json!(1)]).encode(), 5).unwrap());
        assert!(args.cursor_paging);
    }
}
