//! Aggregation results.
//!
//! Responses requested with `typed_keys` name each aggregation `kind#name`; the kind
//! picks the variant. Without a prefix the kind is inferred from the result's shape.
//! Kinds this crate does not model land in [`Aggregation::Unknown`] untouched.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

/// Aggregation results by name.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Aggregations {
    entries: BTreeMap<String, Aggregation>,
}

impl Aggregations {
    /// Parses the `aggregations` object of a response.
    pub fn from_json(value: &Value) -> Self {
        let mut entries = BTreeMap::new();
        if let Some(object) = value.as_object() {
            for (key, body) in object {
                let (kind, name) = match key.split_once('#') {
                    Some((kind, name)) => (Some(kind), name),
                    None => (None, key.as_str()),
                };
                if let Some(body) = body.as_object() {
                    entries.insert(name.to_string(), Aggregation::parse(kind, body));
                }
            }
        }
        Self { entries }
    }

    /// One aggregation by name.
    pub fn get(&self, name: &str) -> Option<&Aggregation> {
        self.entries.get(name)
    }

    /// Iterates over name and result pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Aggregation)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of aggregations.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the response carried no aggregations.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// One aggregation result.
#[derive(Debug, Clone, PartialEq)]
pub enum Aggregation {
    /// Buckets keyed by term.
    Terms {
        /// The buckets.
        buckets: Vec<Bucket>,
        /// Upper bound of the per-term count error.
        doc_count_error_upper_bound: u64,
        /// Documents in terms not returned.
        sum_other_doc_count: u64,
    },
    /// Buckets over value ranges.
    Range {
        /// The buckets.
        buckets: Vec<Bucket>,
    },
    /// Buckets over fixed intervals.
    Histogram {
        /// The buckets.
        buckets: Vec<Bucket>,
    },
    /// Count, min, max, avg and sum.
    Stats(Stats),
    /// A single numeric value such as `avg` or `cardinality`.
    Value {
        /// The value; absent when no document had the field.
        value: Option<f64>,
        /// Formatted value, for dates.
        value_as_string: Option<String>,
    },
    /// A kind this crate does not model.
    Unknown(Map<String, Value>),
}

impl Aggregation {
    fn parse(kind: Option<&str>, body: &Map<String, Value>) -> Self {
        match kind {
            Some("sterms" | "lterms" | "dterms" | "umterms" | "terms" | "rare_terms" | "srareterms" | "lrareterms") => {
                Self::terms(body)
            }
            Some("range" | "date_range" | "geo_distance" | "ip_range") => Self::Range {
                buckets: buckets(body),
            },
            Some("histogram" | "date_histogram" | "auto_date_histogram" | "variable_width_histogram") => {
                Self::Histogram {
                    buckets: buckets(body),
                }
            }
            Some("stats" | "extended_stats") => Self::Stats(Stats::parse(body)),
            Some("avg" | "sum" | "min" | "max" | "value_count" | "cardinality" | "median_absolute_deviation") => {
                Self::value(body)
            }
            Some(_) => Self::Unknown(body.clone()),
            None => Self::infer(body),
        }
    }

    fn infer(body: &Map<String, Value>) -> Self {
        if body.contains_key("sum_other_doc_count") || body.contains_key("doc_count_error_upper_bound") {
            return Self::terms(body);
        }
        if let Some(first) = bucket_values(body).first() {
            if first.get("from").is_some() || first.get("to").is_some() {
                return Self::Range {
                    buckets: buckets(body),
                };
            }
            if first.get("key").is_some_and(Value::is_number) {
                return Self::Histogram {
                    buckets: buckets(body),
                };
            }
            return Self::terms(body);
        }
        if ["count", "min", "max", "avg", "sum"].iter().all(|k| body.contains_key(*k)) {
            return Self::Stats(Stats::parse(body));
        }
        if body.contains_key("value") {
            return Self::value(body);
        }
        Self::Unknown(body.clone())
    }

    fn terms(body: &Map<String, Value>) -> Self {
        Self::Terms {
            buckets: buckets(body),
            doc_count_error_upper_bound: body
                .get("doc_count_error_upper_bound")
                .and_then(Value::as_u64)
                .unwrap_or(0),
            sum_other_doc_count: body.get("sum_other_doc_count").and_then(Value::as_u64).unwrap_or(0),
        }
    }

    fn value(body: &Map<String, Value>) -> Self {
        Self::Value {
            value: body.get("value").and_then(Value::as_f64),
            value_as_string: body.get("value_as_string").and_then(Value::as_str).map(String::from),
        }
    }

    /// Buckets of bucketing aggregations; empty otherwise.
    pub fn buckets(&self) -> &[Bucket] {
        match self {
            Aggregation::Terms { buckets, .. }
            | Aggregation::Range { buckets }
            | Aggregation::Histogram { buckets } => buckets,
            _ => &[],
        }
    }
}

/// One bucket of a bucketing aggregation.
#[derive(Debug, Clone, PartialEq)]
pub struct Bucket {
    /// The bucket key: a term, a number or a range name.
    pub key: Value,
    /// Formatted key, for dates.
    pub key_as_string: Option<String>,
    /// Documents in the bucket.
    pub doc_count: u64,
    /// Lower bound of range buckets.
    pub from: Option<f64>,
    /// Upper bound of range buckets.
    pub to: Option<f64>,
    /// Sub-aggregations.
    pub aggregations: Aggregations,
}

const BUCKET_FIELDS: &[&str] = &[
    "key",
    "key_as_string",
    "doc_count",
    "from",
    "to",
    "from_as_string",
    "to_as_string",
    "doc_count_error_upper_bound",
];

impl Bucket {
    fn parse(key: Option<&str>, body: &Value) -> Self {
        let sub: Map<String, Value> = body
            .as_object()
            .map(|o| {
                o.iter()
                    .filter(|(k, v)| !BUCKET_FIELDS.contains(&k.as_str()) && v.is_object())
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect()
            })
            .unwrap_or_default();

        Self {
            key: body
                .get("key")
                .cloned()
                .or_else(|| key.map(|k| Value::String(k.to_string())))
                .unwrap_or(Value::Null),
            key_as_string: body.get("key_as_string").and_then(Value::as_str).map(String::from),
            doc_count: body.get("doc_count").and_then(Value::as_u64).unwrap_or(0),
            from: body.get("from").and_then(Value::as_f64),
            to: body.get("to").and_then(Value::as_f64),
            aggregations: Aggregations::from_json(&Value::Object(sub)),
        }
    }
}

fn bucket_values(body: &Map<String, Value>) -> Vec<Value> {
    match body.get("buckets") {
        Some(Value::Array(items)) => items.clone(),
        Some(Value::Object(keyed)) => keyed.values().cloned().collect(),
        _ => Vec::new(),
    }
}

fn buckets(body: &Map<String, Value>) -> Vec<Bucket> {
    match body.get("buckets") {
        Some(Value::Array(items)) => items.iter().map(|b| Bucket::parse(None, b)).collect(),
        // keyed responses
        Some(Value::Object(keyed)) => keyed.iter().map(|(k, b)| Bucket::parse(Some(k), b)).collect(),
        _ => Vec::new(),
    }
}

/// Result of a `stats` aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Stats {
    /// Number of values.
    pub count: u64,
    /// Smallest value.
    pub min: Option<f64>,
    /// Largest value.
    pub max: Option<f64>,
    /// Mean.
    pub avg: Option<f64>,
    /// Sum.
    pub sum: f64,
}

impl Stats {
    fn parse(body: &Map<String, Value>) -> Self {
        Self {
            count: body.get("count").and_then(Value::as_u64).unwrap_or(0),
            min: body.get("min").and_then(Value::as_f64),
            max: body.get("max").and_then(Value::as_f64),
            avg: body.get("avg").and_then(Value::as_f64),
            sum: body.get("sum").and_then(Value::as_f64).unwrap_or(0.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_typed_keys() {
        let aggs = Aggregations::from_json(&json!({
            "sterms#genres": {
                "doc_count_error_upper_bound": 0,
                "sum_other_doc_count": 3,
                "buckets": [
                    {"key": "fantasy", "doc_count": 5, "avg#price": {"value": 12.5}},
                    {"key": "crime", "doc_count": 2, "avg#price": {"value": null}}
                ]
            },
            "stats#price": {"count": 7, "min": 1.0, "max": 20.0, "avg": 9.0, "sum": 63.0},
            "top_hits#best": {"hits": {"total": {"value": 1}}}
        }));

        let Some(Aggregation::Terms { buckets, sum_other_doc_count, .. }) = aggs.get("genres") else {
            panic!("expected terms");
        };
        assert_eq!(*sum_other_doc_count, 3);
        assert_eq!(buckets[0].key, json!("fantasy"));
        assert_eq!(
            buckets[0].aggregations.get("price"),
            Some(&Aggregation::Value {
                value: Some(12.5),
                value_as_string: None
            })
        );
        assert_eq!(
            buckets[1].aggregations.get("price"),
            Some(&Aggregation::Value {
                value: None,
                value_as_string: None
            })
        );

        assert!(matches!(aggs.get("price"), Some(Aggregation::Stats(Stats { count: 7, .. }))));
        assert!(matches!(aggs.get("best"), Some(Aggregation::Unknown(_))));
    }

    #[test]
    fn test_inferred_kinds() {
        let aggs = Aggregations::from_json(&json!({
            "prices": {"buckets": [{"key": "*-10.0", "to": 10.0, "doc_count": 4}]},
            "per_year": {"buckets": [{"key": 1704067200000i64, "key_as_string": "2024", "doc_count": 9}]},
            "max_price": {"value": 20.0},
            "keyed": {"buckets": {"cheap": {"to": 5.0, "doc_count": 1}}},
            "weird": {"something": [1, 2]}
        }));

        assert!(matches!(aggs.get("prices"), Some(Aggregation::Range { .. })));
        let histogram = aggs.get("per_year").unwrap();
        assert!(matches!(histogram, Aggregation::Histogram { .. }));
        assert_eq!(histogram.buckets()[0].key_as_string.as_deref(), Some("2024"));
        assert!(matches!(aggs.get("max_price"), Some(Aggregation::Value { value: Some(v), .. }) if *v == 20.0));
        let keyed = aggs.get("keyed").unwrap();
        assert_eq!(keyed.buckets()[0].key, json!("cheap"));
        assert!(matches!(aggs.get("weird"), Some(Aggregation::Unknown(_))));
        assert_eq!(aggs.len(), 5);
    }
}
