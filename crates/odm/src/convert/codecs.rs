//! Built-in codecs for dates, geo values and ranges.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, SecondsFormat, TimeZone, Utc};
use serde_json::{Map, Value, json};

use crate::error::MappingError;
use crate::mapping::{PropertyMetadata, TemporalKind};
use crate::types::canonical_geojson_type;

/// Reads a temporal value in its serde form.
pub(crate) fn to_instant(kind: TemporalKind, value: &Value) -> Option<DateTime<FixedOffset>> {
    match kind {
        TemporalKind::Instant => DateTime::parse_from_rfc3339(value.as_str()?).ok(),
        TemporalKind::LocalDateTime => {
            let s = value.as_str()?;
            NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
                .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f"))
                .ok()
                .map(|dt| dt.and_utc().fixed_offset())
        }
        TemporalKind::LocalDate => NaiveDate::parse_from_str(value.as_str()?, "%Y-%m-%d")
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|dt| dt.and_utc().fixed_offset()),
        TemporalKind::LocalTime => {
            let time = NaiveTime::parse_from_str(value.as_str()?, "%H:%M:%S%.f").ok()?;
            NaiveDate::from_ymd_opt(1970, 1, 1).map(|d| d.and_time(time).and_utc().fixed_offset())
        }
        TemporalKind::EpochMillis => Utc
            .timestamp_millis_opt(value.as_i64()?)
            .single()
            .map(|dt| dt.fixed_offset()),
        TemporalKind::EpochSecond => Utc
            .timestamp_opt(value.as_i64()?, 0)
            .single()
            .map(|dt| dt.fixed_offset()),
    }
}

/// Renders an instant in the serde form of the given kind.
pub(crate) fn from_instant(kind: TemporalKind, dt: DateTime<FixedOffset>) -> Value {
    match kind {
        TemporalKind::Instant => Value::String(dt.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
        TemporalKind::LocalDateTime => {
            Value::String(dt.naive_local().format("%Y-%m-%dT%H:%M:%S%.f").to_string())
        }
        TemporalKind::LocalDate => Value::String(dt.naive_local().date().format("%Y-%m-%d").to_string()),
        TemporalKind::LocalTime => {
            Value::String(dt.naive_local().time().format("%H:%M:%S%.f").to_string())
        }
        TemporalKind::EpochMillis => json!(dt.timestamp_millis()),
        TemporalKind::EpochSecond => json!(dt.timestamp()),
    }
}

fn formats_label(property: &PropertyMetadata) -> String {
    property
        .date_formats
        .iter()
        .map(|f| f.name())
        .collect::<Vec<_>>()
        .join("||")
}

/// Writes a temporal value with the property's first format.
pub(crate) fn write_date(property: &PropertyMetadata, value: &Value) -> Result<Value, MappingError> {
    let kind = property.temporal.unwrap_or_default();
    let invalid = || MappingError::InvalidDate {
        property: property.name.clone(),
        value: value.to_string(),
        formats: formats_label(property),
    };
    let instant = to_instant(kind, value).ok_or_else(invalid)?;
    let pattern = property.date_patterns().first().ok_or_else(invalid)?;
    pattern.format(&instant, kind).map_err(|_| invalid())
}

/// Reads a stored date, trying each format in order.
pub(crate) fn read_date(property: &PropertyMetadata, value: &Value) -> Result<Value, MappingError> {
    let kind = property.temporal.unwrap_or_default();
    property
        .date_patterns()
        .iter()
        .find_map(|pattern| pattern.parse(value))
        .map(|instant| from_instant(kind, instant))
        .ok_or_else(|| MappingError::InvalidDate {
            property: property.name.clone(),
            value: value.to_string(),
            formats: formats_label(property),
        })
}

fn invalid_geo(property: &PropertyMetadata, message: impl Into<String>) -> MappingError {
    MappingError::InvalidGeo {
        property: property.name.clone(),
        message: message.into(),
    }
}

/// `{x, y}` to `{lat: y, lon: x}`.
pub(crate) fn write_point(property: &PropertyMetadata, value: &Value) -> Result<Value, MappingError> {
    let x = value.get("x").and_then(Value::as_f64);
    let y = value.get("y").and_then(Value::as_f64);
    match (x, y) {
        (Some(x), Some(y)) => Ok(json!({"lat": y, "lon": x})),
        _ => Err(invalid_geo(property, "expected an object with x and y")),
    }
}

/// Accepts the stored geo-point forms and returns `{lat, lon}`.
pub(crate) fn read_lat_lon(property: &PropertyMetadata, value: &Value) -> Result<(f64, f64), MappingError> {
    match value {
        Value::Object(map) => {
            let lat = map.get("lat").and_then(Value::as_f64);
            let lon = map.get("lon").and_then(Value::as_f64);
            lat.zip(lon)
                .ok_or_else(|| invalid_geo(property, "expected an object with lat and lon"))
        }
        // GeoJSON order: [lon, lat]
        Value::Array(items) if items.len() == 2 => {
            let lon = items[0].as_f64();
            let lat = items[1].as_f64();
            lat.zip(lon)
                .ok_or_else(|| invalid_geo(property, "expected a [lon, lat] pair"))
        }
        Value::String(s) => {
            let mut parts = s.split(',').map(|p| p.trim().parse::<f64>());
            match (parts.next(), parts.next(), parts.next()) {
                (Some(Ok(lat)), Some(Ok(lon)), None) => Ok((lat, lon)),
                _ => Err(invalid_geo(property, format!("cannot parse '{}' as lat,lon", s))),
            }
        }
        other => Err(invalid_geo(property, format!("unexpected value {}", other))),
    }
}

/// Normalizes GeoJSON type names (`point` to `Point`) recursively.
pub(crate) fn normalize_geojson(property: &PropertyMetadata, value: Value) -> Result<Value, MappingError> {
    let Value::Object(mut map) = value else {
        return Ok(value);
    };
    if let Some(kind) = map.get("type").and_then(Value::as_str).map(str::to_string) {
        let canonical = canonical_geojson_type(&kind)
            .ok_or_else(|| invalid_geo(property, format!("unknown GeoJSON type '{}'", kind)))?;
        map.insert("type".to_string(), Value::String(canonical.to_string()));
    }
    if let Some(Value::Array(geometries)) = map.remove("geometries") {
        let geometries = geometries
            .into_iter()
            .map(|g| normalize_geojson(property, g))
            .collect::<Result<Vec<_>, _>>()?;
        map.insert("geometries".to_string(), Value::Array(geometries));
    }
    Ok(Value::Object(map))
}

/// `{from, to}` to the property's bound names, converting date bounds.
pub(crate) fn write_range(property: &PropertyMetadata, value: &Value) -> Result<Value, MappingError> {
    let Value::Object(map) = value else {
        return Err(MappingError::InvalidRange {
            property: property.name.clone(),
            message: "expected an object with from and to".to_string(),
        });
    };
    let bounds = property.range_bounds.clone().unwrap_or_default();
    let mut out = Map::new();
    for (key, target) in [("from", &bounds.lower), ("to", &bounds.upper)] {
        match map.get(key) {
            None | Some(Value::Null) => {}
            Some(bound) => {
                let bound = if property.temporal.is_some() {
                    write_date(property, bound)?
                } else {
                    bound.clone()
                };
                out.insert(target.clone(), bound);
            }
        }
    }
    Ok(Value::Object(out))
}

/// Stored range bounds back to `{from, to}`.
pub(crate) fn read_range(property: &PropertyMetadata, value: &Value) -> Result<Value, MappingError> {
    let Value::Object(map) = value else {
        return Err(MappingError::InvalidRange {
            property: property.name.clone(),
            message: format!("expected an object, found {}", value),
        });
    };
    let bounds = property.range_bounds.clone().unwrap_or_default();
    let pick = |preferred: &str, alternatives: [&str; 2]| {
        map.get(preferred)
            .or_else(|| alternatives.iter().find_map(|name| map.get(*name)))
            .filter(|v| !v.is_null())
    };
    let lower = pick(bounds.lower.as_str(), ["gte", "gt"]);
    let upper = pick(bounds.upper.as_str(), ["lte", "lt"]);

    let read_bound = |bound: Option<&Value>| -> Result<Value, MappingError> {
        match bound {
            None => Ok(Value::Null),
            Some(v) if property.temporal.is_some() => read_date(property, v),
            Some(v) => Ok(v.clone()),
        }
    };
    Ok(json!({"from": read_bound(lower)?, "to": read_bound(upper)?}))
}
