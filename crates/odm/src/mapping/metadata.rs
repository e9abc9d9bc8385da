//! Validated, immutable entity metadata.

use std::any::TypeId;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use crate::config::FieldNamingStrategy;
use crate::convert::PropertyValueConverter;
use crate::error::MappingError;
use crate::types::RangeBounds;

use super::date_format::{DateFormat, DatePattern, TemporalKind};
use super::descriptor::{
    AccessMode, Dynamic, EntityDescriptor, GeoRepr, MappingOptions, PropertyRole,
    SettingsDescriptor, Subtype, ValueShape,
};
use super::field_type::FieldType;
use super::index_name::IndexNameTemplate;

/// Metadata of one property.
#[derive(Clone)]
pub struct PropertyMetadata {
    /// Property name, as serialized by serde.
    pub name: String,
    /// Document field name.
    pub field_name: String,
    /// Search field type.
    pub field_type: FieldType,
    /// Value structure.
    pub shape: ValueShape,
    /// Special role of the property.
    pub role: PropertyRole,
    /// Excluded from documents and mappings.
    pub transient: bool,
    /// Conversion directions.
    pub access: AccessMode,
    /// Write explicit nulls.
    pub store_null_value: bool,
    /// Effective date formats, defaults applied.
    pub date_formats: Vec<DateFormat>,
    /// In-memory temporal representation, for dates and date ranges.
    pub temporal: Option<TemporalKind>,
    /// In-memory geo-point representation.
    pub geo: Option<GeoRepr>,
    /// Range bound names.
    pub range_bounds: Option<RangeBounds>,
    /// Property-level converter.
    pub converter: Option<Arc<dyn PropertyValueConverter>>,
    /// Declared Rust value type, for type-level converters.
    pub value_type: Option<(TypeId, &'static str)>,
    /// Schema-only options.
    pub options: MappingOptions,
    date_patterns: Vec<DatePattern>,
}

impl std::fmt::Debug for PropertyMetadata {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PropertyMetadata")
            .field("name", &self.name)
            .field("field_name", &self.field_name)
            .field("field_type", &self.field_type)
            .field("shape", &self.shape)
            .field("role", &self.role)
            .finish_non_exhaustive()
    }
}

impl PropertyMetadata {
    /// Returns true for the id property.
    pub fn is_id(&self) -> bool {
        self.role == PropertyRole::Id
    }

    /// Returns true for the version property.
    pub fn is_version(&self) -> bool {
        self.role == PropertyRole::Version
    }

    /// Returns true for the sequence number / primary term property.
    pub fn is_seq_no_primary_term(&self) -> bool {
        self.role == PropertyRole::SeqNoPrimaryTerm
    }

    /// Returns true if the property is written to documents.
    pub fn is_writable(&self) -> bool {
        !self.transient && self.access != AccessMode::ReadOnly && !self.is_seq_no_primary_term()
    }

    /// Returns true if the property is read from documents.
    pub fn is_readable(&self) -> bool {
        !self.transient && self.access != AccessMode::WriteOnly && !self.is_seq_no_primary_term()
    }

    /// Compiled date patterns, in declaration order.
    pub fn date_patterns(&self) -> &[DatePattern] {
        &self.date_patterns
    }

    /// Returns true if scalar values go through the date codec.
    pub fn is_temporal(&self) -> bool {
        self.temporal.is_some() && !self.field_type.is_range()
    }
}

/// The join field of an entity and its aggregated relations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinMetadata {
    /// Name of the join property.
    pub property: String,
    /// Field name of the join property.
    pub field_name: String,
    /// Parent relation to child relations, each edge once.
    pub relations: BTreeMap<String, BTreeSet<String>>,
}

impl JoinMetadata {
    /// Returns true if the relation is declared as a parent or child.
    pub fn is_declared(&self, relation: &str) -> bool {
        self.relations.contains_key(relation) || self.is_child(relation)
    }

    /// Returns true if the relation is declared as a child of some parent.
    pub fn is_child(&self, relation: &str) -> bool {
        self.relations.values().any(|children| children.contains(relation))
    }
}

/// Immutable metadata of a mapped type.
#[derive(Debug)]
pub struct EntityMetadata {
    /// Rust type name.
    pub type_name: &'static str,
    /// Rust type id.
    pub type_id: TypeId,
    /// Type hint alias.
    pub alias: String,
    /// Index-name template, for document types.
    pub index: Option<IndexNameTemplate>,
    /// Create the index on startup.
    pub create_index: bool,
    /// Write a type hint for this type.
    pub write_type_hint: bool,
    /// Root dynamic mode.
    pub dynamic: Option<Dynamic>,
    /// `date_detection` mapping flag.
    pub date_detection: Option<bool>,
    /// `numeric_detection` mapping flag.
    pub numeric_detection: Option<bool>,
    /// Declared index settings.
    pub settings: SettingsDescriptor,
    properties: Vec<PropertyMetadata>,
    by_name: HashMap<String, usize>,
    by_field: HashMap<String, usize>,
    id_property: Option<usize>,
    version_property: Option<usize>,
    seq_no_property: Option<usize>,
    routing_property: Option<usize>,
    join: Option<JoinMetadata>,
    creator: Option<Vec<String>>,
    subtypes: Vec<Subtype>,
    default_subtype: Option<usize>,
}

impl EntityMetadata {
    /// All properties in declaration order.
    pub fn properties(&self) -> &[PropertyMetadata] {
        &self.properties
    }

    /// Looks up a property by name.
    pub fn property(&self, name: &str) -> Option<&PropertyMetadata> {
        self.by_name.get(name).map(|&i| &self.properties[i])
    }

    /// Looks up a property by document field name.
    pub fn property_by_field(&self, field: &str) -> Option<&PropertyMetadata> {
        self.by_field.get(field).map(|&i| &self.properties[i])
    }

    /// The id property.
    pub fn id_property(&self) -> Option<&PropertyMetadata> {
        self.id_property.map(|i| &self.properties[i])
    }

    /// The version property.
    pub fn version_property(&self) -> Option<&PropertyMetadata> {
        self.version_property.map(|i| &self.properties[i])
    }

    /// The sequence number / primary term property.
    pub fn seq_no_property(&self) -> Option<&PropertyMetadata> {
        self.seq_no_property.map(|i| &self.properties[i])
    }

    /// The routing property.
    pub fn routing_property(&self) -> Option<&PropertyMetadata> {
        self.routing_property.map(|i| &self.properties[i])
    }

    /// The join field, if relations are declared.
    pub fn join(&self) -> Option<&JoinMetadata> {
        self.join.as_ref()
    }

    /// Named persistence-creator parameters.
    pub fn creator(&self) -> Option<&[String]> {
        self.creator.as_deref()
    }

    /// Declared variants of a polymorphic type.
    pub fn subtypes(&self) -> &[Subtype] {
        &self.subtypes
    }

    /// Returns true if the type is an enum over mapped variants.
    pub fn is_polymorphic(&self) -> bool {
        !self.subtypes.is_empty()
    }

    /// Returns true if the type has no concrete default variant.
    pub fn is_abstract(&self) -> bool {
        self.is_polymorphic() && self.default_subtype.is_none()
    }

    /// The variant used when no hint resolves: the declared default, else the first.
    pub fn fallback_subtype(&self) -> Option<&Subtype> {
        self.default_subtype
            .or(if self.subtypes.is_empty() { None } else { Some(0) })
            .map(|i| &self.subtypes[i])
    }

    /// The declared default variant.
    pub fn default_subtype(&self) -> Option<&Subtype> {
        self.default_subtype.map(|i| &self.subtypes[i])
    }

    /// Looks up a variant by serde name.
    pub fn subtype(&self, variant: &str) -> Option<&Subtype> {
        self.subtypes.iter().find(|s| s.variant == variant)
    }

    /// Returns true if instances are stored as documents of their own.
    pub fn is_document(&self) -> bool {
        self.index.is_some()
    }

    /// The type name without its module path.
    pub fn short_name(&self) -> &'static str {
        let base = self.type_name.split('<').next().unwrap_or(self.type_name);
        base.rsplit("::").next().unwrap_or(base)
    }

    /// Validates a descriptor and builds metadata from it.
    pub(crate) fn build(
        type_id: TypeId,
        descriptor: EntityDescriptor,
        naming: FieldNamingStrategy,
    ) -> Result<Self, MappingError> {
        let type_name = descriptor.type_name;
        let short = type_name.rsplit("::").next().unwrap_or(type_name).to_string();
        let conflict = |property: &str, message: &str| MappingError::ConflictingProperty {
            type_name: short.clone(),
            property: property.to_string(),
            message: message.to_string(),
        };

        let explicit_id = descriptor
            .properties
            .iter()
            .any(|p| p.role == PropertyRole::Id);

        let mut properties = Vec::with_capacity(descriptor.properties.len());
        let mut by_name = HashMap::new();
        let mut by_field = HashMap::new();
        let mut id_property = None;
        let mut version_property = None;
        let mut seq_no_property = None;
        let mut join_property: Option<usize> = None;

        for mut property in descriptor.properties {
            if !explicit_id && property.name == "id" && property.role == PropertyRole::Data {
                property.role = PropertyRole::Id;
            }

            if property.transient {
                let indexed = property.field_type != FieldType::Auto
                    || property.options.index == Some(true)
                    || property.field_name.is_some();
                if indexed {
                    return Err(conflict(&property.name, "declared both transient and indexed"));
                }
                if property.role != PropertyRole::Data {
                    return Err(conflict(&property.name, "transient properties cannot carry a role"));
                }
                if property.store_null_value {
                    return Err(conflict(&property.name, "transient properties cannot store nulls"));
                }
            }
            if property.geo.is_some() && property.field_type != FieldType::GeoPoint {
                return Err(conflict(&property.name, "geo representation requires a geo_point field"));
            }
            if property.range_bounds.is_some() && !property.field_type.is_range() {
                return Err(conflict(&property.name, "range bounds require a range field"));
            }
            if !property.date_formats.is_empty()
                && !property.field_type.accepts_date_format()
                && property.temporal.is_none()
            {
                return Err(conflict(&property.name, "date formats require a date field"));
            }

            let date_formats = if property.field_type.accepts_date_format() || property.temporal.is_some() {
                if property.date_formats.is_empty() {
                    DateFormat::defaults()
                } else {
                    property.date_formats
                }
            } else {
                Vec::new()
            };
            let date_patterns = date_formats
                .iter()
                .map(|format| {
                    format.compile().map_err(|message| MappingError::InvalidDate {
                        property: property.name.clone(),
                        value: format.name().to_string(),
                        formats: message,
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;

            let field_name = property
                .field_name
                .clone()
                .unwrap_or_else(|| naming.field_name(&property.name));

            let index = properties.len();
            if by_name.insert(property.name.clone(), index).is_some() {
                return Err(MappingError::DuplicateProperty {
                    type_name: short.clone(),
                    property: property.name.clone(),
                });
            }
            if !property.transient && by_field.insert(field_name.clone(), index).is_some() {
                return Err(MappingError::DuplicateProperty {
                    type_name: short.clone(),
                    property: field_name.clone(),
                });
            }

            let slot = match property.role {
                PropertyRole::Id => Some(&mut id_property),
                PropertyRole::Version => Some(&mut version_property),
                PropertyRole::SeqNoPrimaryTerm => Some(&mut seq_no_property),
                PropertyRole::Data => None,
            };
            if let Some(slot) = slot {
                if slot.replace(index).is_some() {
                    return Err(conflict(&property.name, "role declared on more than one property"));
                }
            }
            if property.field_type == FieldType::Join && join_property.replace(index).is_some() {
                return Err(conflict(&property.name, "more than one join property"));
            }

            properties.push(PropertyMetadata {
                name: property.name,
                field_name,
                field_type: property.field_type,
                shape: property.shape,
                role: property.role,
                transient: property.transient,
                access: property.access,
                store_null_value: property.store_null_value,
                date_formats,
                temporal: property.temporal,
                geo: property.geo,
                range_bounds: property.range_bounds,
                converter: property.converter,
                value_type: property.value_type,
                options: property.options,
                date_patterns,
            });
        }

        let index = descriptor
            .index
            .as_deref()
            .map(IndexNameTemplate::parse)
            .transpose()?;

        if index.is_some() && descriptor.subtypes.is_empty() && id_property.is_none() {
            return Err(MappingError::MissingId { type_name: short.clone() });
        }

        let routing_property = match descriptor.routing {
            Some(ref name) => Some(*by_name.get(name).ok_or_else(|| MappingError::UnknownProperty {
                type_name: short.clone(),
                property: name.clone(),
            })?),
            None => None,
        };

        if let Some(ref parameters) = descriptor.creator {
            let mut seen = HashSet::new();
            for parameter in parameters {
                if !by_name.contains_key(parameter) || !seen.insert(parameter.as_str()) {
                    return Err(MappingError::UnmatchedCreatorParameter {
                        type_name: short.clone(),
                        parameter: parameter.clone(),
                    });
                }
            }
        }

        let join = match (join_property, descriptor.join_relations.is_empty()) {
            (None, true) => None,
            (None, false) => {
                return Err(conflict("join", "join relations declared without a join property"));
            }
            (Some(i), _) => {
                let mut relations: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
                for (parent, children) in descriptor.join_relations {
                    if parent.is_empty() || children.iter().any(String::is_empty) {
                        return Err(MappingError::InvalidJoin {
                            type_name: short.clone(),
                            relation: parent,
                        });
                    }
                    relations.entry(parent).or_default().extend(children);
                }
                Some(JoinMetadata {
                    property: properties[i].name.clone(),
                    field_name: properties[i].field_name.clone(),
                    relations,
                })
            }
        };

        let default_subtype = match descriptor.default_subtype {
            Some(ref variant) => Some(
                descriptor
                    .subtypes
                    .iter()
                    .position(|s| &s.variant == variant)
                    .ok_or_else(|| MappingError::UnknownProperty {
                        type_name: short.clone(),
                        property: variant.clone(),
                    })?,
            ),
            None => None,
        };
        let mut variants = HashSet::new();
        for subtype in &descriptor.subtypes {
            if !variants.insert(subtype.variant.as_str()) {
                return Err(MappingError::DuplicateProperty {
                    type_name: short.clone(),
                    property: subtype.variant.clone(),
                });
            }
        }

        Ok(Self {
            type_name,
            type_id,
            alias: descriptor.alias.unwrap_or_else(|| type_name.to_string()),
            index,
            create_index: descriptor.create_index,
            write_type_hint: descriptor.write_type_hint,
            dynamic: descriptor.dynamic,
            date_detection: descriptor.date_detection,
            numeric_detection: descriptor.numeric_detection,
            settings: descriptor.settings,
            properties,
            by_name,
            by_field,
            id_property,
            version_property,
            seq_no_property,
            routing_property,
            join,
            creator: descriptor.creator,
            subtypes: descriptor.subtypes,
            default_subtype,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::{Mapped, Property, TypeRef};

    fn build(descriptor: EntityDescriptor) -> Result<EntityMetadata, MappingError> {
        EntityMetadata::build(TypeId::of::<()>(), descriptor, FieldNamingStrategy::Identity)
    }

    struct Book;
    impl Mapped for Book {
        fn describe() -> EntityDescriptor {
            EntityDescriptor::of::<Self>()
                .index("books")
                .property(Property::keyword("id"))
                .property(Property::text("name"))
                .property(Property::integer("price"))
                .property(Property::date("publishedAt", TemporalKind::LocalDate))
        }
    }

    #[test]
    fn test_build_book() {
        let meta = build(Book::describe()).unwrap();
        assert_eq!(meta.short_name(), "Book");
        assert!(meta.is_document());
        assert_eq!(meta.id_property().unwrap().name, "id");
        assert_eq!(meta.properties().len(), 4);
        assert!(meta.alias.ends_with("Book"));

        let published = meta.property("publishedAt").unwrap();
        assert_eq!(published.date_formats, DateFormat::defaults());
        assert_eq!(published.date_patterns().len(), 2);
    }

    #[test]
    fn test_snake_case_field_names() {
        let meta = EntityMetadata::build(
            TypeId::of::<Book>(),
            Book::describe(),
            FieldNamingStrategy::SnakeCase,
        )
        .unwrap();
        assert_eq!(meta.property("publishedAt").unwrap().field_name, "published_at");
        assert_eq!(meta.property_by_field("published_at").unwrap().name, "publishedAt");
    }

    #[test]
    fn test_missing_id() {
        let descriptor = EntityDescriptor::of::<Book>()
            .index("books")
            .property(Property::text("name"));
        assert!(matches!(build(descriptor), Err(MappingError::MissingId { .. })));
    }

    #[test]
    fn test_transient_and_indexed_conflict() {
        let descriptor = EntityDescriptor::of::<Book>()
            .property(Property::keyword("cache").transient());
        assert!(matches!(
            build(descriptor),
            Err(MappingError::ConflictingProperty { .. })
        ));

        let plain = EntityDescriptor::of::<Book>().property(Property::new("cache").transient());
        assert!(build(plain).is_ok());
    }

    #[test]
    fn test_unmatched_creator_parameter() {
        let descriptor = EntityDescriptor::of::<Book>()
            .property(Property::keyword("id"))
            .creator(["id", "title"]);
        assert!(matches!(
            build(descriptor),
            Err(MappingError::UnmatchedCreatorParameter { parameter, .. }) if parameter == "title"
        ));
    }

    #[test]
    fn test_duplicate_field_names() {
        let descriptor = EntityDescriptor::of::<Book>()
            .property(Property::keyword("a").field_name("x"))
            .property(Property::keyword("b").field_name("x"));
        assert!(matches!(
            build(descriptor),
            Err(MappingError::DuplicateProperty { .. })
        ));
    }

    #[test]
    fn test_join_relations_merged() {
        let descriptor = EntityDescriptor::of::<Book>()
            .property(Property::keyword("id"))
            .property(Property::join("relation"))
            .join_relation("question", ["answer"])
            .join_relation("question", ["comment", "answer"])
            .join_relation("answer", ["vote"]);
        let meta = build(descriptor).unwrap();
        let join = meta.join().unwrap();
        assert_eq!(join.relations["question"].len(), 2);
        assert!(join.is_child("vote"));
        assert!(join.is_declared("answer"));
        assert!(!join.is_declared("reply"));
    }

    #[test]
    fn test_invalid_custom_date_pattern() {
        let descriptor = EntityDescriptor::of::<Book>()
            .property(Property::date("at", TemporalKind::Instant).pattern("yyyy-QQ"));
        assert!(matches!(build(descriptor), Err(MappingError::InvalidDate { .. })));
    }

    #[test]
    fn test_polymorphic_fallback() {
        struct Circle;
        impl Mapped for Circle {
            fn describe() -> EntityDescriptor {
                EntityDescriptor::of::<Self>().property(Property::double("radius"))
            }
        }
        struct Square;
        impl Mapped for Square {
            fn describe() -> EntityDescriptor {
                EntityDescriptor::of::<Self>().property(Property::double("side"))
            }
        }

        let open = build(
            EntityDescriptor::of::<Book>()
                .subtype("Circle", TypeRef::of::<Circle>())
                .subtype("Square", TypeRef::of::<Square>()),
        )
        .unwrap();
        assert!(open.is_abstract());
        assert_eq!(open.fallback_subtype().unwrap().variant, "Circle");

        let defaulted = build(
            EntityDescriptor::of::<Book>()
                .subtype("Circle", TypeRef::of::<Circle>())
                .subtype("Square", TypeRef::of::<Square>())
                .default_subtype("Square"),
        )
        .unwrap();
        assert!(!defaulted.is_abstract());
        assert_eq!(defaulted.fallback_subtype().unwrap().variant, "Square");
    }
}
