//! Document, search, bulk and index operations.

mod blocking;
mod bulk;
mod document;
mod index;
mod scroll;

pub(crate) use blocking::blocking_runtime;
pub use blocking::{BlockingIndexOperations, BlockingOperations, BlockingSearchHitsIterator};
pub use bulk::{BulkItem, BulkOperation, BulkOutcome};
pub use document::{BulkSave, DocumentOperations};
pub use index::IndexOperations;
pub use scroll::SearchHitsIterator;
