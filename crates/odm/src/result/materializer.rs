//! Turns raw store responses into typed results.

use std::collections::HashMap;

use serde_json::Value;

use crate::convert::{Document, DocumentConverter};
use crate::error::{MappingError, OdmResult, StoreError};
use crate::mapping::Entity;
use crate::types::{PageCursor, PageRequest, SeqNoPrimaryTerm};

use super::aggregation::Aggregations;
use super::hits::{Page, PageInfo, QueryResult, SearchHit, SearchHits, TotalHits};

/// The container a caller asked for.
#[derive(Debug, Clone, PartialEq)]
pub enum ResultKind {
    /// A match count.
    Count,
    /// Whether anything matched.
    Exists,
    /// A delete-by-query response.
    Deleted,
    /// The first hit.
    One,
    /// All hits as entities.
    List,
    /// One page of entities.
    Page(PageRequest),
    /// Hits with metadata.
    Hits,
}

/// Decodes search, get and count responses for one converter.
#[derive(Debug, Clone, Copy)]
pub struct ResultMaterializer<'a> {
    converter: &'a DocumentConverter,
}

impl<'a> ResultMaterializer<'a> {
    /// Creates a materializer reading entities with `converter`.
    pub fn new(converter: &'a DocumentConverter) -> Self {
        Self { converter }
    }

    /// Decodes a response into the requested container.
    pub fn materialize<T: Entity>(&self, body: &Value, kind: &ResultKind) -> OdmResult<QueryResult<T>> {
        Ok(match kind {
            ResultKind::Count => QueryResult::Count(count_of(body)),
            ResultKind::Exists => QueryResult::Exists(count_of(body) > 0 || hit_array(body).is_some_and(|h| !h.is_empty())),
            ResultKind::Deleted => QueryResult::Deleted(body.get("deleted").and_then(Value::as_u64).unwrap_or(0)),
            ResultKind::One => QueryResult::One(self.search_hits::<T>(body)?.into_contents().into_iter().next()),
            ResultKind::List => QueryResult::List(self.search_hits::<T>(body)?.into_contents()),
            ResultKind::Page(request) => QueryResult::Page(self.page(body, request)?),
            ResultKind::Hits => QueryResult::Hits(self.search_hits(body)?),
        })
    }

    /// Decodes a search response.
    pub fn search_hits<T: Entity>(&self, body: &Value) -> OdmResult<SearchHits<T>> {
        let envelope = body.get("hits");
        let mut hits = Vec::new();
        for raw in hit_array(body).unwrap_or(&[]) {
            hits.push(self.hit(raw)?);
        }

        let point_in_time_id = body.get("pit_id").and_then(Value::as_str).map(String::from);
        let next_cursor = hits.last().filter(|h: &&SearchHit<T>| !h.sort_values.is_empty()).map(|h| {
            let cursor = PageCursor::new(h.sort_values.clone());
            match &point_in_time_id {
                Some(pit) => cursor.with_point_in_time(pit.clone()).encode(),
                None => cursor.encode(),
            }
        });

        Ok(SearchHits {
            hits,
            total: envelope.and_then(|h| h.get("total")).and_then(total_hits),
            max_score: envelope.and_then(|h| h.get("max_score")).and_then(Value::as_f64),
            aggregations: body.get("aggregations").map(Aggregations::from_json).unwrap_or_default(),
            scroll_id: body.get("_scroll_id").and_then(Value::as_str).map(String::from),
            point_in_time_id,
            next_cursor,
        })
    }

    /// Decodes a search response as one page of `request`.
    pub fn page<T: Entity>(&self, body: &Value, request: &PageRequest) -> OdmResult<Page<T>> {
        let hits = self.search_hits::<T>(body)?;
        let page_info = PageInfo::for_request(request, hits.len(), hits.total, hits.next_cursor.clone());
        Ok(Page {
            items: hits.into_contents(),
            page_info,
        })
    }

    /// Decodes a get response; `None` when the document was not found.
    pub fn get<T: Entity>(&self, body: &Value) -> OdmResult<Option<T>> {
        if !body.get("found").and_then(Value::as_bool).unwrap_or(false) {
            return Ok(None);
        }
        let document = document_from_hit(body)?;
        Ok(Some(self.converter.read(&document)?))
    }

    fn hit<T: Entity>(&self, raw: &Value) -> OdmResult<SearchHit<T>> {
        let document = document_from_hit(raw)?;
        let content = self.converter.read(&document)?;

        let highlight = raw
            .get("highlight")
            .and_then(Value::as_object)
            .map(|fields| {
                fields
                    .iter()
                    .map(|(field, fragments)| {
                        let fragments = fragments
                            .as_array()
                            .map(|a| a.iter().filter_map(Value::as_str).map(String::from).collect())
                            .unwrap_or_default();
                        (field.clone(), fragments)
                    })
                    .collect::<HashMap<_, _>>()
            })
            .unwrap_or_default();

        let matched_queries = match raw.get("matched_queries") {
            Some(Value::Array(names)) => names.iter().filter_map(Value::as_str).map(String::from).collect(),
            // scored form: {"name": score}
            Some(Value::Object(scored)) => scored.keys().cloned().collect(),
            _ => Vec::new(),
        };

        Ok(SearchHit {
            index: document.index().map(String::from),
            id: document.id().map(String::from),
            score: raw.get("_score").and_then(Value::as_f64),
            sort_values: raw.get("sort").and_then(Value::as_array).cloned().unwrap_or_default(),
            highlight,
            version: document.version(),
            seq_no_primary_term: document.seq_no_primary_term(),
            routing: document.routing().map(String::from),
            matched_queries,
            content,
        })
    }
}

/// Builds a [`Document`] from a hit or get response, carrying its metadata.
pub fn document_from_hit(raw: &Value) -> Result<Document, MappingError> {
    let source = raw.get("_source").cloned().unwrap_or_else(|| Value::Object(Default::default()));
    let mut document = Document::from_json(source)?;

    if let Some(id) = raw.get("_id").and_then(Value::as_str) {
        document = document.with_id(id);
    }
    if let Some(index) = raw.get("_index").and_then(Value::as_str) {
        document = document.with_index(index);
    }
    if let Some(version) = raw.get("_version").and_then(Value::as_i64) {
        document = document.with_version(version);
    }
    if let (Some(seq_no), Some(primary_term)) = (
        raw.get("_seq_no").and_then(Value::as_i64),
        raw.get("_primary_term").and_then(Value::as_i64),
    ) {
        document = document.with_seq_no_primary_term(SeqNoPrimaryTerm::new(seq_no, primary_term));
    }
    if let Some(routing) = raw.get("_routing").and_then(Value::as_str) {
        document = document.with_routing(routing);
    }
    Ok(document)
}

/// Reads `hits.total`, in either object or integer form.
fn total_hits(total: &Value) -> Option<TotalHits> {
    match total {
        Value::Number(n) => n.as_u64().map(TotalHits::exact),
        Value::Object(o) => {
            let value = o.get("value")?.as_u64()?;
            Some(match o.get("relation").and_then(Value::as_str) {
                Some("gte") => TotalHits::at_least(value),
                _ => TotalHits::exact(value),
            })
        }
        _ => None,
    }
}

fn hit_array(body: &Value) -> Option<&[Value]> {
    body.get("hits")?.get("hits")?.as_array().map(Vec::as_slice)
}

fn count_of(body: &Value) -> u64 {
    body.get("count")
        .and_then(Value::as_u64)
        .or_else(|| body.get("hits")?.get("total").and_then(total_hits).map(|t| t.value))
        .unwrap_or(0)
}

/// Extracts the store's error type and reason from an error body.
pub(crate) fn store_error(operation: &str, status: u16, body: &Value) -> StoreError {
    let error = body.get("error");
    let error_type = error
        .and_then(|e| e.get("type"))
        .and_then(Value::as_str)
        .map(String::from);
    let reason = error
        .and_then(|e| e.get("reason"))
        .and_then(Value::as_str)
        .map(String::from)
        .or_else(|| error.and_then(Value::as_str).map(String::from))
        .unwrap_or_else(|| body.to_string());

    if error_type.as_deref() == Some("index_not_found_exception") {
        let index = error
            .and_then(|e| e.get("index"))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        return StoreError::IndexNotFound { index };
    }

    StoreError::Status {
        operation: operation.to_string(),
        status,
        error_type,
        reason,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde::{Deserialize, Serialize};
    use serde_json::json;

    use super::*;
    use crate::config::OdmConfig;
    use crate::mapping::{EntityDescriptor, Mapped, MetadataRegistry, Property};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Book {
        id: Option<String>,
        name: String,
        price: i32,
    }

    impl Mapped for Book {
        fn describe() -> EntityDescriptor {
            EntityDescriptor::of::<Self>()
                .index("books")
                .property(Property::keyword("id").id())
                .property(Property::text("name"))
                .property(Property::integer("price"))
        }
    }

    fn converter() -> DocumentConverter {
        DocumentConverter::new(Arc::new(MetadataRegistry::default()), &OdmConfig::default())
    }

    fn response() -> Value {
        json!({
            "took": 3,
            "pit_id": "pit-2",
            "hits": {
                "total": {"value": 1200, "relation": "gte"},
                "max_score": 2.5,
                "hits": [
                    {
                        "_index": "books", "_id": "1", "_score": 2.5, "_version": 4,
                        "_seq_no": 10, "_primary_term": 1,
                        "_source": {"_class": "Book", "name": "Foo", "price": 10},
                        "highlight": {"name": ["<em>Foo</em>"]},
                        "matched_queries": ["by_name"],
                        "sort": [10, "1"]
                    },
                    {
                        "_index": "books", "_id": "2", "_score": 1.0,
                        "_source": {"name": "Bar", "price": 12},
                        "sort": [12, "2"]
                    }
                ]
            },
            "aggregations": {"avg#avg_price": {"value": 11.0}}
        })
    }

    #[test]
    fn test_search_hits() {
        let converter = converter();
        let hits = ResultMaterializer::new(&converter).search_hits::<Book>(&response()).unwrap();

        assert_eq!(hits.len(), 2);
        assert_eq!(hits.total, Some(TotalHits::at_least(1200)));
        assert!(!hits.total.unwrap().is_exact());
        assert_eq!(hits.max_score, Some(2.5));

        let first = &hits.hits[0];
        assert_eq!(first.content, Book { id: Some("1".into()), name: "Foo".into(), price: 10 });
        assert_eq!(first.version, Some(4));
        assert_eq!(first.seq_no_primary_term, Some(SeqNoPrimaryTerm::new(10, 1)));
        assert_eq!(first.highlight_field("name"), &["<em>Foo</em>".to_string()]);
        assert_eq!(first.matched_queries, vec!["by_name"]);
        assert_eq!(hits.hits[1].content.id.as_deref(), Some("2"));

        let cursor = PageCursor::decode(hits.next_cursor.as_deref().unwrap()).unwrap();
        assert_eq!(cursor.search_after(), &[json!(12), json!("2")]);
        assert_eq!(cursor.point_in_time(), Some("pit-2"));
        assert_eq!(hits.aggregations.len(), 1);
    }

    #[test]
    fn test_containers() {
        let converter = converter();
        let materializer = ResultMaterializer::new(&converter);

        let one = materializer.materialize::<Book>(&response(), &ResultKind::One).unwrap();
        assert!(matches!(one, QueryResult::One(Some(ref b)) if b.name == "Foo"));

        let page = materializer
            .materialize::<Book>(&response(), &ResultKind::Page(PageRequest::of(0, 2)))
            .unwrap();
        let QueryResult::Page(page) = page else { panic!("expected a page") };
        assert_eq!(page.len(), 2);
        assert!(page.page_info.has_next);

        let count = materializer.materialize::<Book>(&json!({"count": 7}), &ResultKind::Count).unwrap();
        assert_eq!(count, QueryResult::Count(7));

        let exists = materializer
            .materialize::<Book>(&json!({"hits": {"total": {"value": 0, "relation": "eq"}, "hits": []}}), &ResultKind::Exists)
            .unwrap();
        assert_eq!(exists, QueryResult::Exists(false));

        let deleted = materializer.materialize::<Book>(&json!({"deleted": 3}), &ResultKind::Deleted).unwrap();
        assert_eq!(deleted, QueryResult::Deleted(3));
    }

    #[test]
    fn test_get_response() {
        let converter = converter();
        let materializer = ResultMaterializer::new(&converter);
        let found = materializer
            .get::<Book>(&json!({"_index": "books", "_id": "9", "found": true, "_source": {"name": "Baz", "price": 1}}))
            .unwrap();
        assert_eq!(found.unwrap().id.as_deref(), Some("9"));
        assert!(materializer.get::<Book>(&json!({"_id": "9", "found": false})).unwrap().is_none());
    }

    #[test]
    fn test_store_error() {
        let body = json!({"error": {"type": "index_not_found_exception", "reason": "no such index [x]", "index": "x"}, "status": 404});
        assert!(matches!(store_error("search", 404, &body), StoreError::IndexNotFound { index } if index == "x"));

        let body = json!({"error": {"type": "parsing_exception", "reason": "bad"}});
        assert!(matches!(
            store_error("search", 400, &body),
            StoreError::Status { status: 400, ref error_type, .. } if error_type.as_deref() == Some("parsing_exception")
        ));
    }
}
