//! Type metadata.
//!
//! Mapped types describe themselves with an explicit [`EntityDescriptor`]. The
//! [`MetadataRegistry`] validates descriptors into [`EntityMetadata`] on first use and
//! shares the result for the registry's lifetime.

mod date_format;
mod descriptor;
mod field_type;
mod index_name;
mod metadata;
mod registry;

pub use date_format::{DateFormat, DatePattern, TemporalKind, translate_pattern};
pub use descriptor::{
    AccessMode, Dynamic, Entity, EntityDescriptor, GeoRepr, InnerField, MapKey, Mapped,
    MappingOptions, Property, PropertyRole, SettingsDescriptor, Subtype, TypeRef, ValueShape,
};
pub use field_type::FieldType;
pub use index_name::IndexNameTemplate;
pub use metadata::{EntityMetadata, JoinMetadata, PropertyMetadata};
pub use registry::MetadataRegistry;
