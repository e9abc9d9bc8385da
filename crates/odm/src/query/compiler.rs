//! Compiles derived methods and templates into query plans.
//!
//! # Clauses
//!
//! - Comparisons compile to `range` clauses: `GreaterThan` is `gt`, `GreaterThanEqual`
//!   is `gte`, `Between` is `gte` plus `lte`, `Before` is `lte` and `After` is `gte`.
//! - Equality on text fields is a `match` with operator `and`, otherwise a `term`.
//! - Negated conditions land in `must_not` of the enclosing `bool`.
//! - Conditions under `nested` fields are wrapped in one `nested` query per level.

use serde_json::{Value, json};

use crate::config::OdmConfig;
use crate::convert::DocumentConverter;
use crate::error::{OdmResult, QueryDerivationError};
use crate::mapping::EntityMetadata;
use crate::types::Order;

use super::parser::MethodNameParser;
use super::plan::{PointInTime, QueryArgs, QueryPlan, TrackTotalHits};
use super::predicate::{Condition, Operator, Predicate, QueryMethod, Subject};
use super::template::StringQuery;

/// Turns query methods plus bound arguments into [`QueryPlan`]s.
#[derive(Debug, Clone, Copy)]
pub struct QueryCompiler<'a> {
    converter: &'a DocumentConverter,
    config: &'a OdmConfig,
}

impl<'a> QueryCompiler<'a> {
    /// Creates a compiler converting argument values with `converter`.
    pub fn new(converter: &'a DocumentConverter, config: &'a OdmConfig) -> Self {
        Self { converter, config }
    }

    /// Compiles a derived method with its arguments.
    pub fn compile(&self, method: &QueryMethod, metadata: &EntityMetadata, args: &QueryArgs) -> OdmResult<QueryPlan> {
        let expected = method.arity();
        if args.positional.len() != expected {
            return Err(QueryDerivationError::ArityMismatch {
                method: method.name.clone(),
                expected,
                actual: args.positional.len(),
            }
            .into());
        }

        let query = match &method.predicate {
            Some(predicate) => {
                let mut values = args.positional.iter().cloned();
                let (clause, negated) = self.node(predicate, &mut values)?;
                standalone(clause, negated)
            }
            None => json!({"match_all": {}}),
        };

        self.finish(query, method.subject, method.limit, &method.sort, metadata, args)
    }

    /// Binds a string template and compiles it.
    pub fn compile_template(
        &self,
        template: &StringQuery,
        subject: Subject,
        metadata: &EntityMetadata,
        args: &QueryArgs,
    ) -> OdmResult<QueryPlan> {
        let query = template.bind(&args.positional, &args.named)?;
        self.finish(query, subject, None, &[], metadata, args)
    }

    /// Compiles a ready-made query clause with paging and sorting from `args`.
    pub fn compile_query(&self, query: Value, metadata: &EntityMetadata, args: &QueryArgs) -> OdmResult<QueryPlan> {
        self.finish(query, Subject::Find, None, &[], metadata, args)
    }

    fn finish(
        &self,
        query: Value,
        subject: Subject,
        limit: Option<u32>,
        method_sort: &[Order],
        metadata: &EntityMetadata,
        args: &QueryArgs,
    ) -> OdmResult<QueryPlan> {
        let mut plan = QueryPlan::new(query);
        plan.routing = args.routing.clone();
        plan.min_score = args.min_score;
        plan.track_total_hits = args.track_total_hits;
        plan.highlight = args.highlight.as_ref().map(|h| h.to_json());
        plan.source = args.source.as_ref().map(|s| s.to_json());

        if matches!(subject, Subject::Count | Subject::Exists) {
            plan.size = Some(0);
            if subject == Subject::Count {
                plan.track_total_hits = Some(TrackTotalHits::Exact);
            }
            return Ok(plan);
        }

        plan.seq_no_primary_term = metadata.seq_no_property().is_some();
        plan.version = metadata.version_property().is_some();

        let mut sort: Vec<Value> = method_sort.iter().map(sort_clause).collect();
        let page_sort = args.page.iter().flat_map(|p| p.sort.orders.iter());
        for order in args.sort.orders.iter().chain(page_sort) {
            let field = self.sort_field(metadata, &order.property)?;
            sort.push(sort_clause(&Order { property: field, ..order.clone() }));
        }

        let max_window = metadata
            .settings
            .max_result_window
            .unwrap_or(self.config.max_result_window);

        match &args.page {
            Some(page) if args.cursor_paging => {
                plan.size = Some(page.size);
                if let Some(cursor) = &page.cursor {
                    plan.search_after = Some(cursor.search_after().to_vec());
                }
            }
            Some(page) => {
                plan.from = Some(page.offset());
                plan.size = Some(page.size);
            }
            None if args.cursor_paging => plan.size = Some(self.config.default_page_size),
            None => plan.size = Some(max_window),
        }

        if let Some(limit) = limit {
            plan.size = Some(plan.size.map_or(limit, |size| size.min(limit)));
        }

        if args.cursor_paging {
            plan.point_in_time = args.point_in_time.clone().or_else(|| {
                let cursor = args.page.as_ref()?.cursor.as_ref()?;
                cursor
                    .point_in_time()
                    .map(|id| PointInTime::new(id, self.config.point_in_time_keep_alive))
            });

            let tie_breaker = match &plan.point_in_time {
                Some(_) => Some("_shard_doc".to_string()),
                None => metadata.id_property().map(|p| p.field_name.clone()),
            };
            if let Some(field) = tie_breaker {
                if !sort.iter().any(|s| s.get(&field).is_some()) {
                    sort.push(json!({ field: {"order": "asc"} }));
                }
            }
        }

        plan.sort = sort;
        Ok(plan)
    }

    fn sort_field(&self, metadata: &EntityMetadata, property: &str) -> OdmResult<String> {
        let parser = MethodNameParser::new(self.converter.registry());
        let reference = property.replace('.', "_");
        Ok(parser
            .resolve_path(metadata, &reference)?
            .map_or_else(|| property.to_string(), |path| path.field_path))
    }

    fn node(&self, predicate: &Predicate, values: &mut impl Iterator<Item = Value>) -> OdmResult<(Value, bool)> {
        match predicate {
            Predicate::Condition(condition) => {
                let bound: Vec<Value> = values.take(condition.arity()).collect();
                self.condition(condition, bound)
            }
            Predicate::And(children) => {
                let mut must = Vec::new();
                let mut must_not = Vec::new();
                for child in children {
                    match self.node(child, values)? {
                        (clause, true) => must_not.push(clause),
                        (clause, false) => must.push(clause),
                    }
                }
                let mut bool_query = serde_json::Map::new();
                if !must.is_empty() {
                    bool_query.insert("must".to_string(), Value::Array(must));
                }
                if !must_not.is_empty() {
                    bool_query.insert("must_not".to_string(), Value::Array(must_not));
                }
                Ok((json!({ "bool": bool_query }), false))
            }
            Predicate::Or(children) => {
                let mut should = Vec::new();
                for child in children {
                    let (clause, negated) = self.node(child, values)?;
                    should.push(standalone(clause, negated));
                }
                Ok((json!({"bool": {"should": should, "minimum_should_match": 1}}), false))
            }
        }
    }

    fn condition(&self, condition: &Condition, values: Vec<Value>) -> OdmResult<(Value, bool)> {
        let path = &condition.path;
        let leaf = path.leaf();
        let field = path.field_path.as_str();
        let text = leaf.field_type.is_text();

        let mut converted = Vec::with_capacity(values.len());
        for (i, value) in values.into_iter().enumerate() {
            // The second argument of Within is a distance, not a field value.
            if condition.operator == Operator::Within && i == 1 {
                converted.push(value);
            } else {
                converted.push(self.converter.write_query_value(leaf, value)?);
            }
        }
        let arg = |i: usize| converted.get(i).cloned().unwrap_or(Value::Null);

        let (clause, negated) = match condition.operator {
            Operator::Simple | Operator::Negating => {
                let negate = condition.operator == Operator::Negating;
                match arg(0) {
                    Value::Null => (exists(field), !negate),
                    value => (equality(field, value, text), negate),
                }
            }
            Operator::Between => {
                let mut bounds = serde_json::Map::new();
                if !arg(0).is_null() {
                    bounds.insert("gte".to_string(), arg(0));
                }
                if !arg(1).is_null() {
                    bounds.insert("lte".to_string(), arg(1));
                }
                (json!({"range": { field: bounds }}), false)
            }
            Operator::LessThan => (range(field, "lt", arg(0)), false),
            Operator::LessThanEqual | Operator::Before => (range(field, "lte", arg(0)), false),
            Operator::GreaterThan => (range(field, "gt", arg(0)), false),
            Operator::GreaterThanEqual | Operator::After => (range(field, "gte", arg(0)), false),
            Operator::Like | Operator::StartingWith => (pattern(field, &value_text(&arg(0)), Affix::Prefix, text), false),
            Operator::EndingWith => (pattern(field, &value_text(&arg(0)), Affix::Suffix, text), false),
            Operator::Containing | Operator::NotContaining => (
                pattern(field, &value_text(&arg(0)), Affix::Infix, text),
                condition.operator == Operator::NotContaining,
            ),
            Operator::In | Operator::NotIn => {
                let values = match arg(0) {
                    Value::Array(values) => values,
                    other => vec![other],
                };
                (one_of(field, values, text), condition.operator == Operator::NotIn)
            }
            Operator::True => (json!({"term": { field: true }}), false),
            Operator::False => (json!({"term": { field: false }}), false),
            Operator::IsNull => (exists(field), true),
            Operator::IsNotNull | Operator::Exists => (exists(field), false),
            Operator::IsEmpty => (
                json!({"bool": {
                    "must": [exists(field)],
                    "must_not": [{"wildcard": { field: {"wildcard": "*"} }}]
                }}),
                false,
            ),
            Operator::IsNotEmpty => (json!({"wildcard": { field: {"wildcard": "*"} }}), false),
            Operator::Regex => (json!({"regexp": { field: {"value": value_text(&arg(0))} }}), false),
            Operator::Within => {
                let distance = match arg(1) {
                    Value::Number(n) => format!("{}km", n),
                    other => value_text(&other),
                };
                (json!({"geo_distance": {"distance": distance, field: arg(0)}}), false)
            }
            Operator::Near => (
                json!({"geo_bounding_box": { field: {"top_left": arg(0), "bottom_right": arg(1)} }}),
                false,
            ),
        };

        let wrapped = path.nested_paths.iter().rev().fold(clause, |query, nested| {
            json!({"nested": {"path": nested, "query": query}})
        });
        Ok((wrapped, negated))
    }
}

#[derive(Debug, Clone, Copy)]
enum Affix {
    Prefix,
    Suffix,
    Infix,
}

fn standalone(clause: Value, negated: bool) -> Value {
    if negated {
        json!({"bool": {"must_not": [clause]}})
    } else {
        clause
    }
}

fn exists(field: &str) -> Value {
    json!({"exists": {"field": field}})
}

fn range(field: &str, bound: &str, value: Value) -> Value {
    json!({"range": { field: { bound: value } }})
}

fn equality(field: &str, value: Value, text: bool) -> Value {
    match value {
        Value::Array(values) => one_of(field, values, text),
        value if text => json!({"match": { field: {"query": value, "operator": "and"} }}),
        value => json!({"term": { field: value }}),
    }
}

fn one_of(field: &str, values: Vec<Value>, text: bool) -> Value {
    if text {
        let query = values
            .iter()
            .map(|v| format!("\"{}\"", escape_query_string(&value_text(v))))
            .collect::<Vec<_>>()
            .join(" OR ");
        json!({"query_string": {"query": query, "fields": [field]}})
    } else {
        json!({"terms": { field: values }})
    }
}

fn pattern(field: &str, value: &str, affix: Affix, text: bool) -> Value {
    if text {
        let escaped = escape_query_string(value);
        let query = match affix {
            Affix::Prefix => format!("{}*", escaped),
            Affix::Suffix => format!("*{}", escaped),
            Affix::Infix => format!("*{}*", escaped),
        };
        return json!({"query_string": {"query": query, "fields": [field], "analyze_wildcard": true}});
    }
    match affix {
        Affix::Prefix => json!({"prefix": { field: value }}),
        Affix::Suffix => json!({"wildcard": { field: {"wildcard": format!("*{}", escape_wildcard(value))} }}),
        Affix::Infix => json!({"wildcard": { field: {"wildcard": format!("*{}*", escape_wildcard(value))} }}),
    }
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn escape_query_string(value: &str) -> String {
    const RESERVED: &[char] = &[
        '+', '-', '=', '&', '|', '>', '<', '!', '(', ')', '{', '}', '[', ']', '^', '"', '~', '*', '?', ':', '\\', '/',
    ];
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if RESERVED.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn escape_wildcard(value: &str) -> String {
    value.replace('\\', "\\\\").replace('*', "\\*").replace('?', "\\?")
}

fn sort_clause(order: &Order) -> Value {
    let mut spec = serde_json::Map::new();
    spec.insert("order".to_string(), json!(order.direction.as_str()));
    if let Some(missing) = order.missing {
        spec.insert("missing".to_string(), json!(missing.as_str()));
    }
    json!({ order.property.clone(): spec })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::error::OdmError;
    use crate::mapping::{EntityDescriptor, Mapped, MetadataRegistry, Property, TemporalKind, TypeRef};
    use crate::types::{HighlightSpec, Missing, PageCursor, PageRequest, Sort, SourceFilter};

    struct Author;
    impl Mapped for Author {
        fn describe() -> EntityDescriptor {
            EntityDescriptor::of::<Self>().property(Property::keyword("name"))
        }
    }

    struct Book;
    impl Mapped for Book {
        fn describe() -> EntityDescriptor {
            EntityDescriptor::of::<Self>()
                .index("books")
                .property(Property::keyword("id").id())
                .property(Property::text("name"))
                .property(Property::integer("price"))
                .property(Property::keyword("code").field_name("isbn"))
                .property(Property::boolean("available"))
                .property(Property::date("published", TemporalKind::LocalDate))
                .property(Property::geo_point("location"))
                .property(Property::nested("authors", TypeRef::of::<Author>()).collection())
        }
    }

    struct Fixture {
        registry: Arc<MetadataRegistry>,
        converter: DocumentConverter,
        config: OdmConfig,
    }

    impl Fixture {
        fn new() -> Self {
            let config = OdmConfig::default();
            let registry = Arc::new(MetadataRegistry::default());
            let converter = DocumentConverter::new(registry.clone(), &config);
            Self {
                registry,
                converter,
                config,
            }
        }

        fn compile(&self, method: &str, args: QueryArgs) -> OdmResult<QueryPlan> {
            let metadata = self.registry.metadata_for::<Book>().unwrap();
            let method = MethodNameParser::new(&self.registry).derive(method, &metadata)?;
            QueryCompiler::new(&self.converter, &self.config).compile(&method, &metadata, &args)
        }
    }

    #[test]
    fn test_range_bounds() {
        let fixture = Fixture::new();

        let plan = fixture.compile("findByPriceGreaterThan", QueryArgs::new().arg(5)).unwrap();
        assert_eq!(plan.query, json!({"range": {"price": {"gt": 5}}}));

        let plan = fixture.compile("findByPriceBetween", QueryArgs::new().arg(1).arg(10)).unwrap();
        assert_eq!(plan.query, json!({"range": {"price": {"gte": 1, "lte": 10}}}));

        let plan = fixture.compile("findByPriceLessThanEqual", QueryArgs::new().arg(7)).unwrap();
        assert_eq!(plan.query, json!({"range": {"price": {"lte": 7}}}));

        let plan = fixture
            .compile("findByPublishedAfter", QueryArgs::new().arg("2024-01-15"))
            .unwrap();
        assert_eq!(plan.query, json!({"range": {"published": {"gte": "2024-01-15"}}}));
    }

    #[test]
    fn test_arity_is_checked() {
        let fixture = Fixture::new();
        assert!(fixture
            .compile("findByNameAndPrice", QueryArgs::new().arg("Foo").arg(10))
            .is_ok());

        for args in [QueryArgs::new().arg("Foo"), QueryArgs::new().arg("Foo").arg(10).arg(3)] {
            let err = fixture.compile("findByNameAndPrice", args).unwrap_err();
            assert!(matches!(
                err,
                OdmError::Query(QueryDerivationError::ArityMismatch { expected: 2, .. })
            ));
        }
    }

    #[test]
    fn test_bool_composition() {
        let fixture = Fixture::new();

        let plan = fixture
            .compile("findByNameAndCodeNot", QueryArgs::new().arg("Foo").arg("123"))
            .unwrap();
        assert_eq!(
            plan.query,
            json!({"bool": {
                "must": [{"match": {"name": {"query": "Foo", "operator": "and"}}}],
                "must_not": [{"term": {"isbn": "123"}}]
            }})
        );

        let plan = fixture
            .compile("findByPriceOrAvailableTrue", QueryArgs::new().arg(3))
            .unwrap();
        assert_eq!(
            plan.query,
            json!({"bool": {
                "should": [{"term": {"price": 3}}, {"term": {"available": true}}],
                "minimum_should_match": 1
            }})
        );

        let plan = fixture.compile("findByCodeIsNull", QueryArgs::new()).unwrap();
        assert_eq!(plan.query, json!({"bool": {"must_not": [{"exists": {"field": "isbn"}}]}}));

        let plan = fixture.compile("findByCode", QueryArgs::new().arg(Value::Null)).unwrap();
        assert_eq!(plan.query, json!({"bool": {"must_not": [{"exists": {"field": "isbn"}}]}}));
    }

    #[test]
    fn test_string_and_collection_operators() {
        let fixture = Fixture::new();

        let plan = fixture.compile("findByCodeStartingWith", QueryArgs::new().arg("97")).unwrap();
        assert_eq!(plan.query, json!({"prefix": {"isbn": "97"}}));

        let plan = fixture.compile("findByNameContaining", QueryArgs::new().arg("a:b")).unwrap();
        assert_eq!(
            plan.query,
            json!({"query_string": {"query": "*a\\:b*", "fields": ["name"], "analyze_wildcard": true}})
        );

        let plan = fixture
            .compile("findByCodeIn", QueryArgs::new().arg(json!(["1", "2"])))
            .unwrap();
        assert_eq!(plan.query, json!({"terms": {"isbn": ["1", "2"]}}));

        let plan = fixture
            .compile("findByCodeNotIn", QueryArgs::new().arg(json!(["1"])))
            .unwrap();
        assert_eq!(plan.query, json!({"bool": {"must_not": [{"terms": {"isbn": ["1"]}}]}}));
    }

    #[test]
    fn test_nested_and_geo() {
        let fixture = Fixture::new();

        let plan = fixture.compile("findByAuthorsName", QueryArgs::new().arg("Ann")).unwrap();
        assert_eq!(
            plan.query,
            json!({"nested": {"path": "authors", "query": {"term": {"authors.name": "Ann"}}}})
        );

        let plan = fixture
            .compile(
                "findByLocationWithin",
                QueryArgs::new().arg(json!({"lat": 1.0, "lon": 2.0})).arg("10km"),
            )
            .unwrap();
        assert_eq!(
            plan.query,
            json!({"geo_distance": {"distance": "10km", "location": {"lat": 1.0, "lon": 2.0}}})
        );
    }

    #[test]
    fn test_sort_and_paging() {
        let fixture = Fixture::new();

        let args = QueryArgs::new()
            .arg("Foo")
            .sort(Sort::by([Order::desc("code").with_missing(Missing::Last)]))
            .page(PageRequest::of(2, 10).with_sort(Sort::by([Order::asc("unknown")])));
        let plan = fixture.compile("findByNameOrderByPriceDesc", args).unwrap();
        assert_eq!(
            plan.sort,
            vec![
                json!({"price": {"order": "desc"}}),
                json!({"isbn": {"order": "desc", "missing": "_last"}}),
                json!({"unknown": {"order": "asc"}}),
            ]
        );
        assert_eq!(plan.from, Some(20));
        assert_eq!(plan.size, Some(10));

        let plan = fixture.compile("findTop3ByName", QueryArgs::new().arg("Foo")).unwrap();
        assert_eq!(plan.size, Some(3));
        assert_eq!(plan.from, None);

        let plan = fixture.compile("findByName", QueryArgs::new().arg("Foo")).unwrap();
        assert_eq!(plan.size, Some(10_000));
    }

    #[test]
    fn test_cursor_paging() {
        let fixture = Fixture::new();

        let token = PageCursor::new(vec![json!(10), json!("7")]).encode();
        let args = QueryArgs::new()
            .arg("Foo")
            .page(PageRequest::after(&token, 5).unwrap().with_sort(Sort::by([Order::asc("price")])));
        let plan = fixture.compile("findByName", args).unwrap();
        assert_eq!(plan.search_after, Some(vec![json!(10), json!("7")]));
        assert_eq!(plan.from, None);
        assert_eq!(plan.size, Some(5));
        assert_eq!(
            plan.sort,
            vec![json!({"price": {"order": "asc"}}), json!({"id": {"order": "asc"}})]
        );

        let token = PageCursor::new(vec![json!(1)]).with_point_in_time("pit-9").encode();
        let args = QueryArgs::new().arg("Foo").page(PageRequest::after(&token, 5).unwrap());
        let plan = fixture.compile("findByName", args).unwrap();
        assert_eq!(plan.point_in_time.as_ref().map(|p| p.id.as_str()), Some("pit-9"));
        assert_eq!(plan.sort, vec![json!({"_shard_doc": {"order": "asc"}})]);
    }

    #[test]
    fn test_carried_specs_and_subjects() {
        let fixture = Fixture::new();
        let args = QueryArgs::new()
            .arg("Foo")
            .highlight(HighlightSpec::fields(["name"]))
            .source_filter(SourceFilter::includes(["name"]))
            .routing("r1");
        let plan = fixture.compile("findByName", args).unwrap();
        assert_eq!(plan.highlight, Some(HighlightSpec::fields(["name"]).to_json()));
        assert_eq!(plan.source, Some(SourceFilter::includes(["name"]).to_json()));
        assert_eq!(plan.routing.as_deref(), Some("r1"));

        let plan = fixture.compile("countByAvailableTrue", QueryArgs::new()).unwrap();
        assert_eq!(plan.size, Some(0));
        assert_eq!(plan.track_total_hits, Some(TrackTotalHits::Exact));

        let plan = fixture.compile("findAll", QueryArgs::new()).unwrap();
        assert_eq!(plan.query, json!({"match_all": {}}));
    }

    #[test]
    fn test_template_plan() {
        let fixture = Fixture::new();
        let metadata = fixture.registry.metadata_for::<Book>().unwrap();
        let template = StringQuery::parse("byName", r#"{"match": {"name": "?0"}}"#).unwrap();
        let compiler = QueryCompiler::new(&fixture.converter, &fixture.config);

        let plan = compiler
            .compile_template(&template, Subject::Find, &metadata, &QueryArgs::new().arg("Foo"))
            .unwrap();
        assert_eq!(plan.query, json!({"match": {"name": "Foo"}}));

        assert!(compiler
            .compile_template(&template, Subject::Find, &metadata, &QueryArgs::new())
            .is_err());
    }
}
