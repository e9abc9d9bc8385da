//! Index schema derivation.
//!
//! Builds the `mappings` and `settings` bodies for an entity's index from its
//! metadata. Every non-transient property with a field type gets one mapping entry;
//! object and nested properties expand recursively. Properties without a field type
//! are left to the store's dynamic mapping.

use std::any::TypeId;

use serde_json::{Map, Value, json};
use tracing::warn;

use crate::config::OdmConfig;
use crate::error::MappingError;
use crate::mapping::{
    DateFormat, EntityMetadata, FieldType, InnerField, MetadataRegistry, PropertyMetadata,
};

/// The derived mapping and settings of one index.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexSchema {
    /// The `mappings` body.
    pub mapping: Value,
    /// The `settings` body; empty when server configuration is used.
    pub settings: Value,
}

impl IndexSchema {
    /// The body of an index creation request.
    pub fn to_create_body(&self) -> Value {
        let mut body = Map::new();
        if self.settings.as_object().is_some_and(|s| !s.is_empty()) {
            body.insert("settings".to_string(), self.settings.clone());
        }
        body.insert("mappings".to_string(), self.mapping.clone());
        Value::Object(body)
    }
}

/// Derives index schemas from entity metadata.
#[derive(Debug, Clone, Copy)]
pub struct SchemaBuilder<'a> {
    registry: &'a MetadataRegistry,
    config: &'a OdmConfig,
}

impl<'a> SchemaBuilder<'a> {
    /// Creates a builder.
    pub fn new(registry: &'a MetadataRegistry, config: &'a OdmConfig) -> Self {
        Self { registry, config }
    }

    /// Mapping and settings for an entity.
    pub fn schema_for(&self, metadata: &EntityMetadata) -> Result<IndexSchema, MappingError> {
        Ok(IndexSchema {
            mapping: self.mapping_for(metadata)?,
            settings: self.settings_for(metadata),
        })
    }

    /// The `mappings` body for an entity.
    pub fn mapping_for(&self, metadata: &EntityMetadata) -> Result<Value, MappingError> {
        let mut root = Map::new();
        if let Some(dynamic) = metadata.dynamic {
            root.insert("dynamic".to_string(), dynamic.as_json());
        }
        if let Some(enabled) = metadata.date_detection {
            root.insert("date_detection".to_string(), Value::Bool(enabled));
        }
        if let Some(enabled) = metadata.numeric_detection {
            root.insert("numeric_detection".to_string(), Value::Bool(enabled));
        }

        let mut path = vec![metadata.type_id];
        let properties = self.properties_of(metadata, &mut path)?;
        root.insert("properties".to_string(), Value::Object(properties));
        Ok(Value::Object(root))
    }

    /// The `settings` body for an entity.
    pub fn settings_for(&self, metadata: &EntityMetadata) -> Value {
        let declared = &metadata.settings;
        if declared.use_server_configuration {
            return json!({});
        }

        let mut settings = Map::new();
        settings.insert(
            "number_of_shards".to_string(),
            json!(declared.shards.unwrap_or(self.config.number_of_shards)),
        );
        settings.insert(
            "number_of_replicas".to_string(),
            json!(declared.replicas.unwrap_or(self.config.number_of_replicas)),
        );
        settings.insert(
            "refresh_interval".to_string(),
            json!(
                declared
                    .refresh_interval
                    .clone()
                    .unwrap_or_else(|| self.config.refresh_interval.clone())
            ),
        );
        settings.insert(
            "index.max_result_window".to_string(),
            json!(declared.max_result_window.unwrap_or(self.config.max_result_window)),
        );
        if !declared.sort.is_empty() {
            let fields: Vec<_> = declared
                .sort
                .iter()
                .map(|(name, _)| field_name_of(metadata, name))
                .collect();
            let orders: Vec<_> = declared.sort.iter().map(|(_, d)| d.as_str()).collect();
            settings.insert("index.sort.field".to_string(), json!(fields));
            settings.insert("index.sort.order".to_string(), json!(orders));
        }

        let mut settings = Value::Object(settings);
        if let Some(overlay) = &declared.overlay {
            merge(&mut settings, overlay);
        }
        settings
    }

    fn hint_field(&self) -> Option<(String, Value)> {
        self.config.write_type_hints.then(|| {
            (
                self.config.type_key.clone(),
                json!({"type": "keyword", "index": false, "doc_values": false}),
            )
        })
    }

    fn properties_of(
        &self,
        metadata: &EntityMetadata,
        path: &mut Vec<TypeId>,
    ) -> Result<Map<String, Value>, MappingError> {
        let mut out = Map::new();
        if metadata.write_type_hint || metadata.is_polymorphic() {
            if let Some((key, field)) = self.hint_field() {
                out.insert(key, field);
            }
        }

        // Variants share one mapping; the first declaration of a field wins.
        if metadata.is_polymorphic() {
            for subtype in metadata.subtypes() {
                if path.contains(&subtype.target.type_id) {
                    continue;
                }
                let concrete = self.registry.resolve(subtype.target)?;
                path.push(concrete.type_id);
                let fields = self.properties_of(&concrete, path)?;
                path.pop();
                for (name, field) in fields {
                    out.entry(name).or_insert(field);
                }
            }
            return Ok(out);
        }

        for property in metadata.properties() {
            if property.transient || property.is_seq_no_primary_term() {
                continue;
            }
            if let Some(field) = self.field_mapping(metadata, property, path)? {
                out.insert(property.field_name.clone(), field);
            }
        }
        Ok(out)
    }

    fn field_mapping(
        &self,
        owner: &EntityMetadata,
        property: &PropertyMetadata,
        path: &mut Vec<TypeId>,
    ) -> Result<Option<Value>, MappingError> {
        let target = property.shape.entity();
        let field_type = match (property.field_type, target) {
            (FieldType::Auto, Some(_)) if property.converter.is_none() => FieldType::Object,
            (FieldType::Auto, _) => return Ok(None),
            (field_type, Some(_))
                if !field_type.is_structured()
                    && field_type != FieldType::Flattened
                    && property.converter.is_none() =>
            {
                warn!(
                    type_name = owner.short_name(),
                    property = %property.name,
                    field_type = %field_type,
                    "Embedded type cannot be mapped to a scalar field, leaving it to dynamic mapping"
                );
                return Ok(None);
            }
            (field_type, _) => field_type,
        };

        let mut field = Map::new();
        if let Some(name) = field_type.mapping_name() {
            field.insert("type".to_string(), json!(name));
        }

        if field_type.accepts_date_format() {
            field.insert(
                "format".to_string(),
                json!(DateFormat::mapping_format(&property.date_formats)),
            );
        }

        if field_type == FieldType::Join {
            if let Some(join) = owner.join() {
                let relations: Map<String, Value> = join
                    .relations
                    .iter()
                    .map(|(parent, children)| {
                        let children = if children.len() == 1 {
                            children.iter().next().map(|c| json!(c)).unwrap_or(Value::Null)
                        } else {
                            json!(children)
                        };
                        (parent.clone(), children)
                    })
                    .collect();
                field.insert("relations".to_string(), Value::Object(relations));
            }
        }

        apply_options(&mut field, property);

        if field_type.is_structured() {
            if let Some(target) = target.filter(|_| property.converter.is_none()) {
                if path.contains(&target.type_id) {
                    warn!(
                        type_name = owner.short_name(),
                        property = %property.name,
                        "Cyclic type reference, leaving nested fields to dynamic mapping"
                    );
                } else {
                    let nested = self.registry.resolve(target)?;
                    path.push(nested.type_id);
                    let properties = self.properties_of(&nested, path)?;
                    path.pop();
                    if !properties.is_empty() {
                        field.insert("properties".to_string(), Value::Object(properties));
                    }
                }
            }
        }

        Ok(Some(Value::Object(field)))
    }
}

fn apply_options(field: &mut Map<String, Value>, property: &PropertyMetadata) {
    let options = &property.options;
    let mut put = |key: &str, value: Option<Value>| {
        if let Some(value) = value {
            field.insert(key.to_string(), value);
        }
    };
    put("analyzer", options.analyzer.clone().map(Value::String));
    put("search_analyzer", options.search_analyzer.clone().map(Value::String));
    put("normalizer", options.normalizer.clone().map(Value::String));
    put("index", options.index.map(Value::Bool));
    put("store", options.store.map(Value::Bool));
    put("doc_values", options.doc_values.map(Value::Bool));
    put(
        "copy_to",
        (!options.copy_to.is_empty()).then(|| json!(options.copy_to)),
    );
    put("ignore_above", options.ignore_above.map(|v| json!(v)));
    put("null_value", options.null_value.clone());
    put("scaling_factor", options.scaling_factor.map(|v| json!(v)));
    put("dims", options.dims.map(|v| json!(v)));
    put("enabled", options.enabled.map(Value::Bool));
    put("include_in_parent", options.include_in_parent.map(Value::Bool));
    put("dynamic", options.dynamic.map(|d| d.as_json()));
    put(
        "fields",
        (!options.fields.is_empty()).then(|| {
            Value::Object(
                options
                    .fields
                    .iter()
                    .map(|f| (f.suffix.clone(), inner_field(f)))
                    .collect(),
            )
        }),
    );
}

fn inner_field(field: &InnerField) -> Value {
    let mut out = Map::new();
    if let Some(name) = field.field_type.mapping_name() {
        out.insert("type".to_string(), json!(name));
    }
    if let Some(analyzer) = &field.analyzer {
        out.insert("analyzer".to_string(), json!(analyzer));
    }
    if let Some(normalizer) = &field.normalizer {
        out.insert("normalizer".to_string(), json!(normalizer));
    }
    if let Some(limit) = field.ignore_above {
        out.insert("ignore_above".to_string(), json!(limit));
    }
    Value::Object(out)
}

fn field_name_of(metadata: &EntityMetadata, name: &str) -> String {
    metadata
        .property(name)
        .map(|p| p.field_name.clone())
        .unwrap_or_else(|| name.to_string())
}

/// Merges `overlay` into `base`, recursing into objects.
pub(crate) fn merge(base: &mut Value, overlay: &Value) {
    match (base, overlay) {
        (Value::Object(base), Value::Object(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(key) {
                    Some(existing) => merge(existing, value),
                    None => {
                        base.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (base, overlay) => *base = overlay.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::{Dynamic, EntityDescriptor, Mapped, Property, TemporalKind, TypeRef};
    use crate::types::Direction;

    struct Author;
    impl Mapped for Author {
        fn describe() -> EntityDescriptor {
            EntityDescriptor::of::<Self>()
                .write_type_hint(false)
                .property(Property::text("name").inner_field(InnerField::new("raw", FieldType::Keyword)))
                .property(Property::object("mentor", TypeRef::of::<Author>()))
        }
    }

    struct Book;
    impl Mapped for Book {
        fn describe() -> EntityDescriptor {
            EntityDescriptor::of::<Self>()
                .index("books")
                .dynamic(Dynamic::Strict)
                .property(Property::keyword("id"))
                .property(Property::text("title").analyzer("english"))
                .property(Property::date("published", TemporalKind::LocalDate))
                .property(
                    Property::date("printed", TemporalKind::LocalDateTime)
                        .format(DateFormat::BasicDate)
                        .format(DateFormat::BasicTime),
                )
                .property(Property::new("notes"))
                .property(Property::new("cache").transient())
                .property(Property::nested("authors", TypeRef::of::<Author>()).collection())
                .property(Property::integer("price").field_name("cost"))
                .shards(3)
                .index_sort("price", Direction::Desc)
        }
    }

    fn schema_of<T: Mapped>(config: &OdmConfig) -> IndexSchema {
        let registry = MetadataRegistry::default();
        let metadata = registry.metadata_for::<T>().unwrap();
        SchemaBuilder::new(&registry, config).schema_for(&metadata).unwrap()
    }

    #[test]
    fn test_book_mapping() {
        let schema = schema_of::<Book>(&OdmConfig::default());
        let properties = &schema.mapping["properties"];

        assert_eq!(schema.mapping["dynamic"], json!("strict"));
        assert_eq!(
            properties["_class"],
            json!({"type": "keyword", "index": false, "doc_values": false})
        );
        assert_eq!(properties["title"], json!({"type": "text", "analyzer": "english"}));
        assert_eq!(
            properties["published"]["format"],
            json!("date_optional_time||epoch_millis")
        );
        assert_eq!(properties["printed"]["format"], json!("basic_date||basic_time"));
        assert!(properties.get("notes").is_none());
        assert!(properties.get("cache").is_none());
        assert_eq!(properties["cost"], json!({"type": "integer"}));

        let authors = &properties["authors"];
        assert_eq!(authors["type"], json!("nested"));
        assert!(authors["properties"].get("_class").is_none());
        assert_eq!(
            authors["properties"]["name"]["fields"],
            json!({"raw": {"type": "keyword"}})
        );
        // The self-reference stops after one level.
        assert_eq!(
            authors["properties"]["mentor"],
            json!({"type": "object"})
        );
    }

    #[test]
    fn test_settings() {
        let schema = schema_of::<Book>(&OdmConfig::default());
        assert_eq!(schema.settings["number_of_shards"], json!(3));
        assert_eq!(schema.settings["number_of_replicas"], json!(1));
        assert_eq!(schema.settings["index.sort.field"], json!(["cost"]));
        assert_eq!(schema.settings["index.sort.order"], json!(["desc"]));

        let body = schema.to_create_body();
        assert!(body.get("settings").is_some());
        assert!(body.get("mappings").is_some());
    }

    #[test]
    fn test_server_configuration_and_overlay() {
        struct Plain;
        impl Mapped for Plain {
            fn describe() -> EntityDescriptor {
                EntityDescriptor::of::<Self>()
                    .index("plain")
                    .property(Property::keyword("id"))
                    .use_server_configuration()
            }
        }
        struct Tuned;
        impl Mapped for Tuned {
            fn describe() -> EntityDescriptor {
                EntityDescriptor::of::<Self>()
                    .index("tuned")
                    .property(Property::keyword("id"))
                    .settings_overlay(json!({"analysis": {"analyzer": {"folded": {"type": "custom"}}}, "number_of_replicas": 0}))
            }
        }

        let plain = schema_of::<Plain>(&OdmConfig::default());
        assert_eq!(plain.settings, json!({}));
        assert!(plain.to_create_body().get("settings").is_none());

        let tuned = schema_of::<Tuned>(&OdmConfig::default());
        assert_eq!(tuned.settings["number_of_replicas"], json!(0));
        assert_eq!(tuned.settings["analysis"]["analyzer"]["folded"]["type"], json!("custom"));
    }

    #[test]
    fn test_join_relations_single_and_list() {
        struct Post;
        impl Mapped for Post {
            fn describe() -> EntityDescriptor {
                EntityDescriptor::of::<Self>()
                    .index("posts")
                    .property(Property::keyword("id"))
                    .property(Property::join("relation"))
                    .join_relation("answer", ["vote"])
                    .join_relation("question", ["answer", "comment"])
                    .join_relation("question", ["answer"])
            }
        }
        let schema = schema_of::<Post>(&OdmConfig::default());
        assert_eq!(
            schema.mapping["properties"]["relation"],
            json!({
                "type": "join",
                "relations": {"answer": "vote", "question": ["answer", "comment"]}
            })
        );
    }

    #[test]
    fn test_hints_disabled_omits_class_field() {
        let schema = schema_of::<Book>(&OdmConfig::default().without_type_hints());
        assert!(schema.mapping["properties"].get("_class").is_none());
    }

    #[test]
    fn test_merge_replaces_scalars() {
        let mut base = json!({"a": {"b": 1, "c": 2}, "d": 3});
        merge(&mut base, &json!({"a": {"b": 10}, "e": 4}));
        assert_eq!(base, json!({"a": {"b": 10, "c": 2}, "d": 3, "e": 4}));
    }
}
