//! Value types used by mapped entities and by query requests.

mod geo;
mod highlight;
mod join;
mod pagination;
mod range;

pub use geo::{GeoJson, GeoPoint, Point};
pub(crate) use geo::canonical_geojson_type;
pub use highlight::{HighlightField, HighlightSpec, SourceFilter};
pub use join::{JoinField, SeqNoPrimaryTerm};
pub use pagination::{Direction, Missing, Order, PageCursor, PageRequest, Sort};
pub use range::{RangeBounds, RangeValue};
