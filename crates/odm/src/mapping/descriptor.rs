//! Declarative entity descriptions.
//!
//! Every mapped type describes itself once through [`Mapped::describe`], returning an
//! [`EntityDescriptor`] built from [`Property`] entries. The registry validates the
//! descriptor and turns it into immutable [`EntityMetadata`](super::EntityMetadata).
//!
//! ```
//! use quiver_odm::mapping::{EntityDescriptor, Mapped, Property};
//!
//! struct Book;
//!
//! impl Mapped for Book {
//!     fn describe() -> EntityDescriptor {
//!         EntityDescriptor::of::<Self>()
//!             .index("books")
//!             .property(Property::keyword("id").id())
//!             .property(Property::text("name").analyzer("english"))
//!             .property(Property::integer("price"))
//!     }
//! }
//! ```

use std::any::{TypeId, type_name};
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::convert::PropertyValueConverter;
use crate::types::{Direction, RangeBounds};

use super::date_format::{DateFormat, TemporalKind};
use super::field_type::FieldType;

/// A type that can describe its document structure.
pub trait Mapped: 'static {
    /// Returns the structural description of this type.
    fn describe() -> EntityDescriptor;
}

/// A mapped type that can be written to and read from documents.
pub trait Entity: Mapped + Serialize + serde::de::DeserializeOwned + Send + Sync {}

impl<T> Entity for T where T: Mapped + Serialize + serde::de::DeserializeOwned + Send + Sync {}

/// A lazily resolved reference to a mapped type.
///
/// Holding only a function pointer lets descriptors reference themselves or each
/// other without building the referenced metadata.
#[derive(Clone, Copy)]
pub struct TypeRef {
    pub(crate) type_id: TypeId,
    pub(crate) type_name: &'static str,
    pub(crate) describe: fn() -> EntityDescriptor,
}

impl TypeRef {
    /// References a mapped type.
    pub fn of<T: Mapped>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: type_name::<T>(),
            describe: T::describe,
        }
    }

    /// The referenced type's name.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }
}

impl fmt::Debug for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("TypeRef").field(&self.type_name).finish()
    }
}

impl PartialEq for TypeRef {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

/// The key type of a map-valued property.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MapKey {
    type_name: &'static str,
    is_string: bool,
}

impl MapKey {
    /// Describes the key type `K`.
    pub fn of<K: 'static>() -> Self {
        let id = TypeId::of::<K>();
        let is_string = id == TypeId::of::<String>()
            || id == TypeId::of::<&'static str>()
            || id == TypeId::of::<Box<str>>()
            || id == TypeId::of::<Arc<str>>()
            || id == TypeId::of::<std::borrow::Cow<'static, str>>();
        Self {
            type_name: type_name::<K>(),
            is_string,
        }
    }

    /// The key type's name.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Returns true if keys are strings.
    pub fn is_string(&self) -> bool {
        self.is_string
    }
}

/// The structural shape of a property value.
#[derive(Debug, Clone, PartialEq)]
pub enum ValueShape {
    /// A leaf value.
    Scalar,
    /// An embedded mapped type.
    Entity(TypeRef),
    /// An ordered sequence of values.
    Collection(Box<ValueShape>),
    /// A map with keys of the given type.
    Map {
        /// Key type.
        key: MapKey,
        /// Value shape.
        value: Box<ValueShape>,
    },
}

impl ValueShape {
    /// The innermost non-container shape.
    pub fn element(&self) -> &ValueShape {
        match self {
            ValueShape::Collection(inner) => inner.element(),
            ValueShape::Map { value, .. } => value.element(),
            other => other,
        }
    }

    /// The embedded type, looking through containers.
    pub fn entity(&self) -> Option<TypeRef> {
        match self.element() {
            ValueShape::Entity(type_ref) => Some(*type_ref),
            _ => None,
        }
    }
}

/// Which directions of conversion a property takes part in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessMode {
    /// Written and read.
    #[default]
    ReadWrite,
    /// Read from documents but never written.
    ReadOnly,
    /// Written to documents but never read back.
    WriteOnly,
}

/// How geo-point values are represented in memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GeoRepr {
    /// `{lat, lon}` as stored.
    #[default]
    LatLon,
    /// `{x, y}` with x as longitude.
    Point,
}

/// The role a property plays beyond carrying data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PropertyRole {
    /// A plain data property.
    #[default]
    Data,
    /// The document id.
    Id,
    /// The external version.
    Version,
    /// Sequence number and primary term; never part of the source.
    SeqNoPrimaryTerm,
}

/// Dynamic mapping mode for an object or the whole index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dynamic {
    /// New fields are added to the mapping.
    True,
    /// New fields are stored but not indexed.
    False,
    /// New fields are rejected.
    Strict,
    /// New fields become runtime fields.
    Runtime,
}

impl Dynamic {
    /// The mapping value.
    pub fn as_json(&self) -> Value {
        match self {
            Dynamic::True => Value::Bool(true),
            Dynamic::False => Value::Bool(false),
            Dynamic::Strict => Value::String("strict".to_string()),
            Dynamic::Runtime => Value::String("runtime".to_string()),
        }
    }
}

/// A multi-field sub-entry (`fields` in the mapping).
#[derive(Debug, Clone, PartialEq)]
pub struct InnerField {
    /// Suffix appended to the parent field name.
    pub suffix: String,
    /// Field type of the sub-field.
    pub field_type: FieldType,
    /// Analyzer for text sub-fields.
    pub analyzer: Option<String>,
    /// Normalizer for keyword sub-fields.
    pub normalizer: Option<String>,
    /// Ignore values longer than this.
    pub ignore_above: Option<u32>,
}

impl InnerField {
    /// Creates a sub-field.
    pub fn new(suffix: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            suffix: suffix.into(),
            field_type,
            analyzer: None,
            normalizer: None,
            ignore_above: None,
        }
    }

    /// Sets the analyzer.
    pub fn analyzer(mut self, analyzer: impl Into<String>) -> Self {
        self.analyzer = Some(analyzer.into());
        self
    }

    /// Sets the normalizer.
    pub fn normalizer(mut self, normalizer: impl Into<String>) -> Self {
        self.normalizer = Some(normalizer.into());
        self
    }

    /// Sets `ignore_above`.
    pub fn ignore_above(mut self, limit: u32) -> Self {
        self.ignore_above = Some(limit);
        self
    }
}

/// Mapping parameters that only affect the derived schema.
#[derive(Debug, Clone, Default, PartialEq)]
#[allow(missing_docs)] // fields mirror mapping parameter names
pub struct MappingOptions {
    pub analyzer: Option<String>,
    pub search_analyzer: Option<String>,
    pub normalizer: Option<String>,
    pub index: Option<bool>,
    pub store: Option<bool>,
    pub doc_values: Option<bool>,
    pub copy_to: Vec<String>,
    pub ignore_above: Option<u32>,
    pub null_value: Option<Value>,
    pub scaling_factor: Option<f64>,
    pub dims: Option<u32>,
    pub enabled: Option<bool>,
    pub include_in_parent: Option<bool>,
    pub dynamic: Option<Dynamic>,
    pub fields: Vec<InnerField>,
}

/// A property declaration.
#[derive(Clone)]
pub struct Property {
    pub(crate) name: String,
    pub(crate) field_name: Option<String>,
    pub(crate) field_type: FieldType,
    pub(crate) shape: ValueShape,
    pub(crate) role: PropertyRole,
    pub(crate) transient: bool,
    pub(crate) access: AccessMode,
    pub(crate) store_null_value: bool,
    pub(crate) date_formats: Vec<DateFormat>,
    pub(crate) temporal: Option<TemporalKind>,
    pub(crate) geo: Option<GeoRepr>,
    pub(crate) range_bounds: Option<RangeBounds>,
    pub(crate) converter: Option<Arc<dyn PropertyValueConverter>>,
    pub(crate) value_type: Option<(TypeId, &'static str)>,
    pub(crate) options: MappingOptions,
}

impl fmt::Debug for Property {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Property")
            .field("name", &self.name)
            .field("field_type", &self.field_type)
            .field("shape", &self.shape)
            .field("role", &self.role)
            .finish_non_exhaustive()
    }
}

impl Property {
    /// Declares a property with automatic field type.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            field_name: None,
            field_type: FieldType::Auto,
            shape: ValueShape::Scalar,
            role: PropertyRole::Data,
            transient: false,
            access: AccessMode::ReadWrite,
            store_null_value: false,
            date_formats: Vec::new(),
            temporal: None,
            geo: None,
            range_bounds: None,
            converter: None,
            value_type: None,
            options: MappingOptions::default(),
        }
    }

    /// Declares a property of the given field type.
    pub fn typed(name: impl Into<String>, field_type: FieldType) -> Self {
        Self::new(name).field_type(field_type)
    }

    /// A `text` property.
    pub fn text(name: impl Into<String>) -> Self {
        Self::typed(name, FieldType::Text)
    }

    /// A `keyword` property.
    pub fn keyword(name: impl Into<String>) -> Self {
        Self::typed(name, FieldType::Keyword)
    }

    /// A `long` property.
    pub fn long(name: impl Into<String>) -> Self {
        Self::typed(name, FieldType::Long)
    }

    /// An `integer` property.
    pub fn integer(name: impl Into<String>) -> Self {
        Self::typed(name, FieldType::Integer)
    }

    /// A `double` property.
    pub fn double(name: impl Into<String>) -> Self {
        Self::typed(name, FieldType::Double)
    }

    /// A `boolean` property.
    pub fn boolean(name: impl Into<String>) -> Self {
        Self::typed(name, FieldType::Boolean)
    }

    /// A `date` property holding values of the given kind.
    pub fn date(name: impl Into<String>, kind: TemporalKind) -> Self {
        let mut property = Self::typed(name, FieldType::Date);
        property.temporal = Some(kind);
        property
    }

    /// An `object` property embedding a mapped type.
    pub fn object(name: impl Into<String>, target: TypeRef) -> Self {
        let mut property = Self::typed(name, FieldType::Object);
        property.shape = ValueShape::Entity(target);
        property
    }

    /// A `nested` property embedding a mapped type.
    pub fn nested(name: impl Into<String>, target: TypeRef) -> Self {
        let mut property = Self::typed(name, FieldType::Nested);
        property.shape = ValueShape::Entity(target);
        property
    }

    /// A `geo_point` property holding `GeoPoint` values.
    pub fn geo_point(name: impl Into<String>) -> Self {
        let mut property = Self::typed(name, FieldType::GeoPoint);
        property.geo = Some(GeoRepr::LatLon);
        property
    }

    /// A `geo_point` property holding x/y `Point` values.
    pub fn point(name: impl Into<String>) -> Self {
        let mut property = Self::typed(name, FieldType::GeoPoint);
        property.geo = Some(GeoRepr::Point);
        property
    }

    /// A `geo_shape` property holding GeoJSON values.
    pub fn geo_shape(name: impl Into<String>) -> Self {
        Self::typed(name, FieldType::GeoShape)
    }

    /// A range property of the given range type.
    pub fn range(name: impl Into<String>, field_type: FieldType) -> Self {
        let mut property = Self::typed(name, field_type);
        property.range_bounds = Some(RangeBounds::default());
        if field_type == FieldType::DateRange {
            property.temporal = Some(TemporalKind::Instant);
        }
        property
    }

    /// A `join` property holding `JoinField` values.
    pub fn join(name: impl Into<String>) -> Self {
        Self::typed(name, FieldType::Join)
    }

    /// A sequence number / primary term property.
    pub fn seq_no_primary_term(name: impl Into<String>) -> Self {
        let mut property = Self::new(name);
        property.role = PropertyRole::SeqNoPrimaryTerm;
        property
    }

    /// Sets the field type.
    pub fn field_type(mut self, field_type: FieldType) -> Self {
        self.field_type = field_type;
        self
    }

    /// Marks this property as the document id.
    pub fn id(mut self) -> Self {
        self.role = PropertyRole::Id;
        self
    }

    /// Marks this property as the external version.
    pub fn version(mut self) -> Self {
        self.role = PropertyRole::Version;
        self
    }

    /// Overrides the document field name.
    pub fn field_name(mut self, name: impl Into<String>) -> Self {
        self.field_name = Some(name.into());
        self
    }

    /// Excludes the property from documents and mappings.
    pub fn transient(mut self) -> Self {
        self.transient = true;
        self
    }

    /// Reads the property from documents but never writes it.
    pub fn read_only(mut self) -> Self {
        self.access = AccessMode::ReadOnly;
        self
    }

    /// Writes the property to documents but never reads it back.
    pub fn write_only(mut self) -> Self {
        self.access = AccessMode::WriteOnly;
        self
    }

    /// Writes `null` instead of omitting the field when the value is absent.
    pub fn store_null_value(mut self) -> Self {
        self.store_null_value = true;
        self
    }

    /// Appends a date format.
    pub fn format(mut self, format: DateFormat) -> Self {
        self.date_formats.push(format);
        self
    }

    /// Appends a custom date pattern.
    pub fn pattern(self, pattern: impl Into<String>) -> Self {
        self.format(DateFormat::Custom(pattern.into()))
    }

    /// Sets the in-memory temporal kind of a date or date-range property.
    pub fn temporal(mut self, kind: TemporalKind) -> Self {
        self.temporal = Some(kind);
        self
    }

    /// Sets the names range bounds are written under.
    pub fn range_bounds(mut self, bounds: RangeBounds) -> Self {
        self.range_bounds = Some(bounds);
        self
    }

    /// Wraps the current shape in a collection.
    pub fn collection(mut self) -> Self {
        self.shape = ValueShape::Collection(Box::new(self.shape));
        self
    }

    /// Wraps the current shape in a map keyed by `K`.
    pub fn map_of<K: 'static>(mut self) -> Self {
        self.shape = ValueShape::Map {
            key: MapKey::of::<K>(),
            value: Box::new(self.shape),
        };
        self
    }

    /// Registers a converter for this property only.
    pub fn converter(mut self, converter: Arc<dyn PropertyValueConverter>) -> Self {
        self.converter = Some(converter);
        self
    }

    /// Declares the Rust type of the value, used to look up type-level converters.
    pub fn value_type<V: 'static>(mut self) -> Self {
        self.value_type = Some((TypeId::of::<V>(), type_name::<V>()));
        self
    }

    /// Sets the analyzer.
    pub fn analyzer(mut self, analyzer: impl Into<String>) -> Self {
        self.options.analyzer = Some(analyzer.into());
        self
    }

    /// Sets the search analyzer.
    pub fn search_analyzer(mut self, analyzer: impl Into<String>) -> Self {
        self.options.search_analyzer = Some(analyzer.into());
        self
    }

    /// Sets the normalizer.
    pub fn normalizer(mut self, normalizer: impl Into<String>) -> Self {
        self.options.normalizer = Some(normalizer.into());
        self
    }

    /// Sets whether the field is indexed.
    pub fn index(mut self, index: bool) -> Self {
        self.options.index = Some(index);
        self
    }

    /// Sets whether the field is stored separately.
    pub fn store(mut self, store: bool) -> Self {
        self.options.store = Some(store);
        self
    }

    /// Sets whether doc values are kept.
    pub fn doc_values(mut self, doc_values: bool) -> Self {
        self.options.doc_values = Some(doc_values);
        self
    }

    /// Copies values into another field.
    pub fn copy_to(mut self, field: impl Into<String>) -> Self {
        self.options.copy_to.push(field.into());
        self
    }

    /// Sets `ignore_above`.
    pub fn ignore_above(mut self, limit: u32) -> Self {
        self.options.ignore_above = Some(limit);
        self
    }

    /// Sets the value indexed for explicit nulls.
    pub fn null_value(mut self, value: Value) -> Self {
        self.options.null_value = Some(value);
        self
    }

    /// Sets the scaling factor of a `scaled_float`.
    pub fn scaling_factor(mut self, factor: f64) -> Self {
        self.options.scaling_factor = Some(factor);
        self
    }

    /// Sets the dimensions of a `dense_vector`.
    pub fn dims(mut self, dims: u32) -> Self {
        self.options.dims = Some(dims);
        self
    }

    /// Adds a multi-field sub-entry.
    pub fn inner_field(mut self, field: InnerField) -> Self {
        self.options.fields.push(field);
        self
    }

    /// Sets `enabled` on an object.
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.options.enabled = Some(enabled);
        self
    }

    /// Sets `include_in_parent` on a nested field.
    pub fn include_in_parent(mut self, include: bool) -> Self {
        self.options.include_in_parent = Some(include);
        self
    }

    /// Sets the dynamic mode of an object or nested field.
    pub fn dynamic(mut self, dynamic: Dynamic) -> Self {
        self.options.dynamic = Some(dynamic);
        self
    }
}

/// A declared variant of a polymorphic type.
#[derive(Debug, Clone, PartialEq)]
pub struct Subtype {
    /// The serde variant name.
    pub variant: String,
    /// The type wrapped by the variant.
    pub target: TypeRef,
}

/// Index settings declared on an entity.
#[derive(Debug, Clone, Default, PartialEq)]
#[allow(missing_docs)] // fields mirror index setting names
pub struct SettingsDescriptor {
    pub shards: Option<u32>,
    pub replicas: Option<u32>,
    pub refresh_interval: Option<String>,
    pub max_result_window: Option<u32>,
    pub use_server_configuration: bool,
    pub sort: Vec<(String, Direction)>,
    pub overlay: Option<Value>,
}

/// The full description of a mapped type.
#[derive(Debug, Clone)]
pub struct EntityDescriptor {
    pub(crate) type_name: &'static str,
    pub(crate) alias: Option<String>,
    pub(crate) index: Option<String>,
    pub(crate) create_index: bool,
    pub(crate) write_type_hint: bool,
    pub(crate) dynamic: Option<Dynamic>,
    pub(crate) date_detection: Option<bool>,
    pub(crate) numeric_detection: Option<bool>,
    pub(crate) routing: Option<String>,
    pub(crate) properties: Vec<Property>,
    pub(crate) join_relations: Vec<(String, Vec<String>)>,
    pub(crate) creator: Option<Vec<String>>,
    pub(crate) subtypes: Vec<Subtype>,
    pub(crate) default_subtype: Option<String>,
    pub(crate) settings: SettingsDescriptor,
}

impl EntityDescriptor {
    /// Starts a descriptor for `T`.
    pub fn of<T: 'static>() -> Self {
        Self {
            type_name: type_name::<T>(),
            alias: None,
            index: None,
            create_index: true,
            write_type_hint: true,
            dynamic: None,
            date_detection: None,
            numeric_detection: None,
            routing: None,
            properties: Vec::new(),
            join_relations: Vec::new(),
            creator: None,
            subtypes: Vec::new(),
            default_subtype: None,
            settings: SettingsDescriptor::default(),
        }
    }

    /// Stores the type as documents in the index named by `template`.
    ///
    /// The template may contain `{variable}` and `{now:PATTERN}` expressions.
    pub fn index(mut self, template: impl Into<String>) -> Self {
        self.index = Some(template.into());
        self
    }

    /// Sets whether the index is created on startup.
    pub fn create_index(mut self, create: bool) -> Self {
        self.create_index = create;
        self
    }

    /// Sets whether a type hint is written for this type.
    pub fn write_type_hint(mut self, write: bool) -> Self {
        self.write_type_hint = write;
        self
    }

    /// Overrides the type hint alias.
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// Sets the root dynamic mapping mode.
    pub fn dynamic(mut self, dynamic: Dynamic) -> Self {
        self.dynamic = Some(dynamic);
        self
    }

    /// Sets `date_detection` on the mapping.
    pub fn date_detection(mut self, enabled: bool) -> Self {
        self.date_detection = Some(enabled);
        self
    }

    /// Sets `numeric_detection` on the mapping.
    pub fn numeric_detection(mut self, enabled: bool) -> Self {
        self.numeric_detection = Some(enabled);
        self
    }

    /// Names the property supplying the routing value.
    pub fn routing(mut self, property: impl Into<String>) -> Self {
        self.routing = Some(property.into());
        self
    }

    /// Adds a property.
    pub fn property(mut self, property: Property) -> Self {
        self.properties.push(property);
        self
    }

    /// Declares a parent relation with its child relations.
    ///
    /// Declarations for the same parent are merged.
    pub fn join_relation<I, S>(mut self, parent: impl Into<String>, children: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.join_relations
            .push((parent.into(), children.into_iter().map(Into::into).collect()));
        self
    }

    /// Declares the named parameters of the persistence creator.
    pub fn creator<I, S>(mut self, parameters: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.creator = Some(parameters.into_iter().map(Into::into).collect());
        self
    }

    /// Declares a variant of a polymorphic type.
    pub fn subtype(mut self, variant: impl Into<String>, target: TypeRef) -> Self {
        self.subtypes.push(Subtype {
            variant: variant.into(),
            target,
        });
        self
    }

    /// Names the variant assumed when a document carries no usable type hint.
    pub fn default_subtype(mut self, variant: impl Into<String>) -> Self {
        self.default_subtype = Some(variant.into());
        self
    }

    /// Sets the number of primary shards.
    pub fn shards(mut self, shards: u32) -> Self {
        self.settings.shards = Some(shards);
        self
    }

    /// Sets the number of replicas.
    pub fn replicas(mut self, replicas: u32) -> Self {
        self.settings.replicas = Some(replicas);
        self
    }

    /// Sets the refresh interval.
    pub fn refresh_interval(mut self, interval: impl Into<String>) -> Self {
        self.settings.refresh_interval = Some(interval.into());
        self
    }

    /// Sets the maximum result window.
    pub fn max_result_window(mut self, window: u32) -> Self {
        self.settings.max_result_window = Some(window);
        self
    }

    /// Leaves index settings entirely to the server.
    pub fn use_server_configuration(mut self) -> Self {
        self.settings.use_server_configuration = true;
        self
    }

    /// Adds an index sort field.
    pub fn index_sort(mut self, field: impl Into<String>, direction: Direction) -> Self {
        self.settings.sort.push((field.into(), direction));
        self
    }

    /// Merges raw settings over the derived ones.
    pub fn settings_overlay(mut self, settings: Value) -> Self {
        self.settings.overlay = Some(settings);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_key_detection() {
        assert!(MapKey::of::<String>().is_string());
        assert!(MapKey::of::<&'static str>().is_string());
        assert!(!MapKey::of::<i32>().is_string());
        assert_eq!(MapKey::of::<u64>().type_name(), "u64");
    }

    #[test]
    fn test_shape_wrapping() {
        struct Author;
        impl Mapped for Author {
            fn describe() -> EntityDescriptor {
                EntityDescriptor::of::<Self>()
            }
        }

        let property = Property::object("authors", TypeRef::of::<Author>())
            .collection()
            .map_of::<String>();
        assert!(matches!(property.shape, ValueShape::Map { .. }));
        assert_eq!(property.shape.entity(), Some(TypeRef::of::<Author>()));
    }

    #[test]
    fn test_builder_options() {
        let property = Property::keyword("code")
            .field_name("product_code")
            .ignore_above(256)
            .copy_to("all")
            .inner_field(InnerField::new("raw", FieldType::Keyword));
        assert_eq!(property.field_name.as_deref(), Some("product_code"));
        assert_eq!(property.options.ignore_above, Some(256));
        assert_eq!(property.options.copy_to, vec!["all".to_string()]);
        assert_eq!(property.options.fields.len(), 1);
    }
}
