//! Search results.
//!
//! Hit metadata (score, version, sort values, highlights) stays on [`SearchHit`] and
//! never leaks into the entity.

mod aggregation;
mod hits;
mod materializer;

pub use aggregation::{Aggregation, Aggregations, Bucket, Stats};
pub use hits::{Page, PageInfo, QueryResult, SearchHit, SearchHits, TotalHits, TotalHitsRelation};
pub use materializer::{ResultKind, ResultMaterializer, document_from_hit};
pub(crate) use materializer::store_error;
