//! Entity to document conversion and back.
//!
//! Structural mapping goes through serde: an entity is serialized to a JSON value,
//! rewritten property by property according to its metadata, and emitted as a
//! [`Document`]. Reading runs the same steps in reverse. Per property the rules
//! apply in this order:
//!
//! 1. the property's own converter
//! 2. a type-level converter registered for the declared value type
//! 3. built-in codecs for ranges, dates and geo values
//! 4. structural mapping (nested entities, collections, maps)
//!
//! Polymorphic types are enums whose variants wrap mapped types. Serde's external
//! tagging (`{"Circle": {...}}`) becomes a type hint inside the variant's object.

use std::sync::Arc;

use serde_json::{Map, Value, json};
use tracing::debug;

use crate::config::OdmConfig;
use crate::error::MappingError;
use crate::mapping::{
    Entity, EntityMetadata, FieldType, GeoRepr, MetadataRegistry, PropertyMetadata, Subtype,
    ValueShape,
};
use crate::types::SeqNoPrimaryTerm;

use super::codecs;
use super::conversions::CustomConversions;
use super::document::{Document, type_label};

/// Store metadata collected while writing the root entity.
#[derive(Debug, Default)]
struct RootMetadata {
    id: Option<String>,
    version: Option<i64>,
    seq_no: Option<SeqNoPrimaryTerm>,
    routing: Option<String>,
}

/// Converts entities to documents and documents to entities.
#[derive(Debug, Clone)]
pub struct DocumentConverter {
    registry: Arc<MetadataRegistry>,
    conversions: CustomConversions,
    type_key: String,
    write_type_hints: bool,
}

impl DocumentConverter {
    /// Creates a converter over a registry.
    pub fn new(registry: Arc<MetadataRegistry>, config: &OdmConfig) -> Self {
        Self {
            registry,
            conversions: CustomConversions::default(),
            type_key: config.type_key.clone(),
            write_type_hints: config.write_type_hints,
        }
    }

    /// Sets the type-level converters.
    pub fn with_conversions(mut self, conversions: CustomConversions) -> Self {
        self.conversions = conversions;
        self
    }

    /// The metadata registry.
    pub fn registry(&self) -> &Arc<MetadataRegistry> {
        &self.registry
    }

    /// The document key holding type hints.
    pub fn type_key(&self) -> &str {
        &self.type_key
    }

    /// Returns true if type hints are written.
    pub fn writes_type_hints(&self) -> bool {
        self.write_type_hints
    }

    /// Converts an entity into a document.
    pub fn write<T: Entity>(&self, entity: &T) -> Result<Document, MappingError> {
        let metadata = self.registry.metadata_for::<T>()?;
        let value = serde_json::to_value(entity).map_err(|e| MappingError::Serialization {
            message: e.to_string(),
        })?;
        self.write_value(value, &metadata)
    }

    /// Returns a copy of `entity` carrying the id, version and sequence number of
    /// `document`.
    ///
    /// The entity's own serde form is the base, so properties that are never read
    /// back from documents keep the values the caller passed in.
    pub fn with_document_metadata<T: Entity>(&self, entity: &T, document: &Document) -> Result<T, MappingError> {
        let metadata = self.registry.metadata_for::<T>()?;
        let mut value = serde_json::to_value(entity).map_err(|e| MappingError::Serialization {
            message: e.to_string(),
        })?;

        if metadata.is_polymorphic() {
            if let Value::Object(outer) = &mut value {
                if let Some((variant, Value::Object(inner))) = outer.iter_mut().next() {
                    if let Some(subtype) = metadata.subtype(variant) {
                        let concrete = self.registry.resolve(subtype.target)?;
                        apply_document_metadata(inner, &concrete, document);
                    }
                }
            }
        } else if let Value::Object(fields) = &mut value {
            apply_document_metadata(fields, &metadata, document);
        }

        serde_json::from_value(value).map_err(|e| MappingError::Deserialization {
            type_name: metadata.short_name().to_string(),
            message: e.to_string(),
        })
    }

    /// Converts the serde form of an entity into a document.
    pub fn write_value(&self, value: Value, metadata: &EntityMetadata) -> Result<Document, MappingError> {
        let mut root = RootMetadata::default();
        let source = self.write_entity(value, metadata, true, Some(&mut root))?;

        let mut document = Document::from_source(source);
        document.set_id(root.id);
        document.set_version(root.version);
        document.set_seq_no_primary_term(root.seq_no);
        document.set_routing(root.routing);
        Ok(document)
    }

    /// Converts a document into an entity.
    pub fn read<T: Entity>(&self, document: &Document) -> Result<T, MappingError> {
        let metadata = self.registry.metadata_for::<T>()?;
        let value = self.read_value(document, &metadata)?;
        serde_json::from_value(value).map_err(|e| MappingError::Deserialization {
            type_name: metadata.short_name().to_string(),
            message: e.to_string(),
        })
    }

    /// Converts a document into the serde form of an entity.
    pub fn read_value(&self, document: &Document, metadata: &EntityMetadata) -> Result<Value, MappingError> {
        self.read_entity(document.to_json(), metadata, Some(document))
    }

    /// Converts a query argument the way the property's values are written.
    pub fn write_query_value(&self, property: &PropertyMetadata, value: Value) -> Result<Value, MappingError> {
        match value {
            Value::Array(items) => items
                .into_iter()
                .map(|item| self.write_query_scalar(property, item))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            other => self.write_query_scalar(property, other),
        }
    }

    fn write_query_scalar(&self, property: &PropertyMetadata, value: Value) -> Result<Value, MappingError> {
        if value.is_null() || property.shape.entity().is_some() {
            return Ok(value);
        }
        if let Some(converted) = self.custom_write(property, &value)? {
            return Ok(converted);
        }
        if property.temporal.is_some() {
            return codecs::write_date(property, &value);
        }
        if property.geo == Some(GeoRepr::Point) && value.get("x").is_some() {
            return codecs::write_point(property, &value);
        }
        Ok(value)
    }

    fn write_entity(
        &self,
        value: Value,
        metadata: &EntityMetadata,
        root: bool,
        sink: Option<&mut RootMetadata>,
    ) -> Result<Map<String, Value>, MappingError> {
        if !metadata.is_polymorphic() {
            let fields = self.write_struct(value, metadata, sink)?;
            return Ok(self.with_hint(fields, metadata, root));
        }

        let (variant, inner) = split_variant(metadata, value)?;
        let subtype = metadata
            .subtype(&variant)
            .ok_or_else(|| MappingError::Serialization {
                message: format!("{} declares no variant '{}'", metadata.short_name(), variant),
            })?;
        let concrete = self.registry.resolve(subtype.target)?;
        let hint = root
            || metadata
                .default_subtype()
                .is_none_or(|default| default.variant != variant);
        let fields = self.write_struct(inner, &concrete, sink)?;
        Ok(self.with_hint(fields, &concrete, hint))
    }

    fn with_hint(
        &self,
        fields: Map<String, Value>,
        metadata: &EntityMetadata,
        wanted: bool,
    ) -> Map<String, Value> {
        if !(wanted && self.write_type_hints && metadata.write_type_hint) {
            return fields;
        }
        let mut out = Map::with_capacity(fields.len() + 1);
        out.insert(self.type_key.clone(), Value::String(metadata.alias.clone()));
        out.extend(fields);
        out
    }

    fn write_struct(
        &self,
        value: Value,
        metadata: &EntityMetadata,
        sink: Option<&mut RootMetadata>,
    ) -> Result<Map<String, Value>, MappingError> {
        let Value::Object(mut fields) = value else {
            return Err(MappingError::NotAnObject {
                type_name: metadata.short_name().to_string(),
                found: type_label(&value).to_string(),
            });
        };

        let routing = metadata
            .routing_property()
            .and_then(|p| fields.get(&p.name))
            .and_then(scalar_string);

        if let Some(sink) = sink {
            let raw = |p: Option<&PropertyMetadata>| p.and_then(|p| fields.get(&p.name));
            sink.id = raw(metadata.id_property()).and_then(scalar_string);
            sink.version = raw(metadata.version_property()).and_then(Value::as_i64);
            sink.seq_no = raw(metadata.seq_no_property())
                .and_then(|v| serde_json::from_value(v.clone()).ok());
            sink.routing = routing.clone();
        }

        let mut out = Map::with_capacity(fields.len());
        for property in metadata.properties() {
            let value = fields.remove(&property.name).unwrap_or(Value::Null);
            if !property.is_writable() {
                continue;
            }
            if value.is_null() {
                if property.store_null_value {
                    out.insert(property.field_name.clone(), Value::Null);
                }
                continue;
            }
            if property.field_type == FieldType::Join {
                check_join(metadata, &value, routing.as_deref())?;
            }
            let written = self.write_shaped(property, &property.shape, value)?;
            out.insert(property.field_name.clone(), written);
        }

        // Undeclared serde fields pass through unchanged.
        for (key, value) in fields {
            if key != self.type_key && !out.contains_key(&key) {
                out.insert(key, value);
            }
        }
        Ok(out)
    }

    fn write_shaped(
        &self,
        property: &PropertyMetadata,
        shape: &ValueShape,
        value: Value,
    ) -> Result<Value, MappingError> {
        match shape {
            ValueShape::Collection(inner) => match value {
                Value::Array(items) => items
                    .into_iter()
                    .map(|item| match item {
                        Value::Null => Ok(Value::Null),
                        item => self.write_shaped(property, inner, item),
                    })
                    .collect::<Result<Vec<_>, _>>()
                    .map(Value::Array),
                single => self.write_shaped(property, inner, single),
            },
            ValueShape::Map { key, value: inner } => {
                if !key.is_string() {
                    return Err(MappingError::NonStringMapKey {
                        type_name: property.name.clone(),
                        property: property.name.clone(),
                        key_type: key.type_name().to_string(),
                    });
                }
                let Value::Object(entries) = value else {
                    return Err(MappingError::NotAnObject {
                        type_name: property.name.clone(),
                        found: type_label(&value).to_string(),
                    });
                };
                entries
                    .into_iter()
                    .map(|(k, v)| match v {
                        Value::Null => Ok((k, Value::Null)),
                        v => self.write_shaped(property, inner, v).map(|v| (k, v)),
                    })
                    .collect::<Result<Map<_, _>, _>>()
                    .map(Value::Object)
            }
            ValueShape::Entity(target) => {
                if let Some(converted) = self.custom_write(property, &value)? {
                    return Ok(converted);
                }
                let metadata = self.registry.resolve(*target)?;
                self.write_entity(value, &metadata, false, None)
                    .map(Value::Object)
            }
            ValueShape::Scalar => self.write_leaf(property, value),
        }
    }

    fn write_leaf(&self, property: &PropertyMetadata, value: Value) -> Result<Value, MappingError> {
        if let Some(converted) = self.custom_write(property, &value)? {
            return Ok(converted);
        }
        if property.field_type.is_range() {
            return codecs::write_range(property, &value);
        }
        if property.is_temporal() {
            return codecs::write_date(property, &value);
        }
        if property.geo == Some(GeoRepr::Point) {
            return codecs::write_point(property, &value);
        }
        Ok(value)
    }

    fn custom_write(&self, property: &PropertyMetadata, value: &Value) -> Result<Option<Value>, MappingError> {
        let converter = property.converter.as_ref().or_else(|| {
            property
                .value_type
                .and_then(|(type_id, _)| self.conversions.get(type_id))
        });
        converter
            .map(|c| {
                c.write(value).map_err(|message| MappingError::Conversion {
                    property: property.name.clone(),
                    message,
                })
            })
            .transpose()
    }

    fn custom_read(&self, property: &PropertyMetadata, value: &Value) -> Result<Option<Value>, MappingError> {
        let converter = property.converter.as_ref().or_else(|| {
            property
                .value_type
                .and_then(|(type_id, _)| self.conversions.get(type_id))
        });
        converter
            .map(|c| {
                c.read(value).map_err(|message| MappingError::Conversion {
                    property: property.name.clone(),
                    message,
                })
            })
            .transpose()
    }

    fn read_entity(
        &self,
        value: Value,
        metadata: &EntityMetadata,
        document: Option<&Document>,
    ) -> Result<Value, MappingError> {
        let Value::Object(mut fields) = value else {
            return Err(MappingError::NotAnObject {
                type_name: metadata.short_name().to_string(),
                found: type_label(&value).to_string(),
            });
        };
        let hint = fields.remove(&self.type_key);

        if !metadata.is_polymorphic() {
            return self
                .read_struct(fields, metadata, document)
                .map(Value::Object);
        }

        let (subtype, concrete) = self.resolve_hint(metadata, hint.as_ref().and_then(Value::as_str))?;
        let inner = self.read_struct(fields, &concrete, document)?;
        let mut wrapper = Map::with_capacity(1);
        wrapper.insert(subtype.variant, Value::Object(inner));
        Ok(Value::Object(wrapper))
    }

    fn resolve_hint(
        &self,
        metadata: &EntityMetadata,
        hint: Option<&str>,
    ) -> Result<(Subtype, Arc<EntityMetadata>), MappingError> {
        if let Some(alias) = hint {
            for subtype in metadata.subtypes() {
                let concrete = self.registry.resolve(subtype.target)?;
                if concrete.alias == alias || subtype.variant == alias {
                    return Ok((subtype.clone(), concrete));
                }
            }
            debug!(
                type_name = metadata.short_name(),
                hint = alias,
                "Type hint does not resolve, using declared type"
            );
        }
        let fallback = metadata
            .fallback_subtype()
            .ok_or_else(|| MappingError::Deserialization {
                type_name: metadata.short_name().to_string(),
                message: "no variants declared".to_string(),
            })?;
        let concrete = self.registry.resolve(fallback.target)?;
        Ok((fallback.clone(), concrete))
    }

    fn read_struct(
        &self,
        mut fields: Map<String, Value>,
        metadata: &EntityMetadata,
        document: Option<&Document>,
    ) -> Result<Map<String, Value>, MappingError> {
        let mut out = Map::with_capacity(fields.len());
        for property in metadata.properties() {
            let stored = fields.remove(&property.field_name);
            if !property.is_readable() {
                continue;
            }
            match stored {
                None => {}
                Some(Value::Null) => {
                    out.insert(property.name.clone(), Value::Null);
                }
                Some(value) => {
                    let read = self.read_shaped(property, &property.shape, value)?;
                    out.insert(property.name.clone(), read);
                }
            }
        }

        if let Some(document) = document {
            apply_document_metadata(&mut out, metadata, document);
        }
        if let Some(parameters) = metadata.creator() {
            for parameter in parameters {
                out.entry(parameter.clone()).or_insert(Value::Null);
            }
        }
        for (key, value) in fields {
            out.entry(key).or_insert(value);
        }
        Ok(out)
    }

    fn read_shaped(
        &self,
        property: &PropertyMetadata,
        shape: &ValueShape,
        value: Value,
    ) -> Result<Value, MappingError> {
        match shape {
            ValueShape::Collection(inner) => match value {
                Value::Array(items) => items
                    .into_iter()
                    .map(|item| match item {
                        Value::Null => Ok(Value::Null),
                        item => self.read_shaped(property, inner, item),
                    })
                    .collect::<Result<Vec<_>, _>>()
                    .map(Value::Array),
                // The store returns single values for array fields as written.
                single => Ok(Value::Array(vec![self.read_shaped(property, inner, single)?])),
            },
            ValueShape::Map { value: inner, .. } => {
                let Value::Object(entries) = value else {
                    return Err(MappingError::NotAnObject {
                        type_name: property.name.clone(),
                        found: type_label(&value).to_string(),
                    });
                };
                entries
                    .into_iter()
                    .map(|(k, v)| match v {
                        Value::Null => Ok((k, Value::Null)),
                        v => self.read_shaped(property, inner, v).map(|v| (k, v)),
                    })
                    .collect::<Result<Map<_, _>, _>>()
                    .map(Value::Object)
            }
            ValueShape::Entity(target) => {
                if let Some(converted) = self.custom_read(property, &value)? {
                    return Ok(converted);
                }
                let metadata = self.registry.resolve(*target)?;
                self.read_entity(value, &metadata, None)
            }
            ValueShape::Scalar => self.read_leaf(property, value),
        }
    }

    fn read_leaf(&self, property: &PropertyMetadata, value: Value) -> Result<Value, MappingError> {
        if let Some(converted) = self.custom_read(property, &value)? {
            return Ok(converted);
        }
        if property.field_type.is_range() {
            return codecs::read_range(property, &value);
        }
        if property.is_temporal() {
            return codecs::read_date(property, &value);
        }
        match property.geo {
            Some(GeoRepr::Point) => {
                let (lat, lon) = codecs::read_lat_lon(property, &value)?;
                return Ok(json!({"x": lon, "y": lat}));
            }
            Some(GeoRepr::LatLon) => {
                let (lat, lon) = codecs::read_lat_lon(property, &value)?;
                return Ok(json!({"lat": lat, "lon": lon}));
            }
            None => {}
        }
        if property.field_type == FieldType::GeoShape {
            return codecs::normalize_geojson(property, value);
        }
        Ok(value)
    }
}

fn split_variant(metadata: &EntityMetadata, value: Value) -> Result<(String, Value), MappingError> {
    match value {
        Value::Object(map) if map.len() == 1 => {
            let (variant, inner) = map.into_iter().next().ok_or_else(|| MappingError::Serialization {
                message: format!("empty variant of {}", metadata.short_name()),
            })?;
            Ok((variant, inner))
        }
        other => Err(MappingError::NotAnObject {
            type_name: metadata.short_name().to_string(),
            found: type_label(&other).to_string(),
        }),
    }
}

fn check_join(metadata: &EntityMetadata, value: &Value, routing: Option<&str>) -> Result<(), MappingError> {
    let Some(join) = metadata.join() else {
        return Ok(());
    };
    let invalid = |relation: String| MappingError::InvalidJoin {
        type_name: metadata.short_name().to_string(),
        relation,
    };
    let relation = value
        .get("name")
        .and_then(Value::as_str)
        .ok_or_else(|| invalid(value.to_string()))?;
    if !join.is_declared(relation) {
        return Err(invalid(relation.to_string()));
    }
    if join.is_child(relation) && routing.is_none() {
        return Err(MappingError::MissingRouting {
            type_name: metadata.short_name().to_string(),
            relation: relation.to_string(),
        });
    }
    Ok(())
}

fn apply_document_metadata(out: &mut Map<String, Value>, metadata: &EntityMetadata, document: &Document) {
    if let (Some(property), Some(id)) = (metadata.id_property(), document.id()) {
        if out.get(&property.name).is_none_or(Value::is_null) {
            let value = if property.field_type.is_numeric() {
                id.parse::<i64>().map(Value::from).unwrap_or_else(|_| json!(id))
            } else {
                json!(id)
            };
            out.insert(property.name.clone(), value);
        }
    }
    if let (Some(property), Some(version)) = (metadata.version_property(), document.version()) {
        out.insert(property.name.clone(), json!(version));
    }
    if let (Some(property), Some(seq)) = (metadata.seq_no_property(), document.seq_no_primary_term()) {
        out.insert(
            property.name.clone(),
            json!({"seq_no": seq.seq_no, "primary_term": seq.primary_term}),
        );
    }
}

fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
