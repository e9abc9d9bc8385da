//! Quiver ODM
//!
//! Object-document mapping and repositories for Elasticsearch-style search engines.
//! Typed entities are converted to and from document JSON, index schemas are derived
//! from entity descriptors, and query methods named like `findByNameAndPrice` are
//! compiled into search requests.
//!
//! # Features
//!
//! - **Metadata**: explicit [`EntityDescriptor`](mapping::EntityDescriptor)s, built
//!   once per type and shared across threads
//! - **Conversion**: dates, geo points and shapes, ranges, join fields, polymorphic
//!   type hints, custom converters
//! - **Schema**: mappings and settings for index creation
//! - **Queries**: derived query methods, string templates, paging by offset,
//!   `search_after` cursors, scroll and point in time
//! - **Results**: hits with metadata, aggregations, pages
//!
//! The network client is pluggable through [`DocumentStoreClient`]. Enable the
//! `elasticsearch` feature for an implementation over the official client:
//!
//! ```toml
//! [dependencies]
//! quiver-odm = { version = "0.1", features = ["elasticsearch"] }
//! ```
//!
//! # Architecture
//!
//! - [`mapping`] - Entity descriptors, metadata and the metadata registry
//! - [`convert`] - Entity to document conversion
//! - [`schema`] - Index mapping and settings derivation
//! - [`query`] - Query method derivation and compilation
//! - [`result`] - Search result materialization
//! - [`client`] - The document store client boundary
//! - [`operations`] - Document, search, bulk and index operations
//! - [`repository`] - Typed repositories with registered query methods
//!
//! # Quick Start
//!
//! ```ignore
//! use quiver_odm::{DocumentOperations, OdmConfig, QueryArgs, Repository};
//!
//! let ops = DocumentOperations::new(client, OdmConfig::default());
//! let books = Repository::<Book, _>::new(ops)?;
//! books.ensure_index().await?;
//!
//! books.save(&Book { id: Some("1".into()), name: "Foo".into(), price: 42 }).await?;
//!
//! books.register("findByPriceGreaterThan")?;
//! let cheap = books
//!     .execute("findByPriceGreaterThan", QueryArgs::new().arg(5))
//!     .await?
//!     .into_items();
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod client;
pub mod config;
pub mod convert;
pub mod error;
pub mod mapping;
pub mod operations;
pub mod query;
pub mod repository;
pub mod result;
pub mod schema;
pub mod types;

// Re-export commonly used types at crate root
pub use client::{DocumentStoreClient, RequestCustomizer, StoreRequest, StoreResponse};
pub use config::{FieldNamingStrategy, OdmConfig, RefreshPolicy};
pub use convert::{Document, DocumentConverter};
pub use error::{OdmError, OdmResult};
pub use mapping::{Entity, EntityDescriptor, Mapped, MetadataRegistry};
pub use operations::{BlockingOperations, DocumentOperations, IndexOperations};
pub use query::{QueryArgs, QueryPlan};
pub use repository::{BlockingRepository, Repository};
pub use result::{QueryResult, SearchHit, SearchHits};
pub use types::{PageRequest, Sort};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
