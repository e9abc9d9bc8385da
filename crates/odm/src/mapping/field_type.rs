//! Search field types.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The field type a property is indexed as.
///
/// `Auto` leaves the decision to the store's dynamic mapping; such properties are
/// written to documents but omitted from derived mappings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[allow(missing_docs)] // variants mirror the store's type names
pub enum FieldType {
    #[default]
    Auto,
    Text,
    Keyword,
    ConstantKeyword,
    Wildcard,
    SearchAsYouType,
    Long,
    Integer,
    Short,
    Byte,
    Double,
    Float,
    HalfFloat,
    ScaledFloat,
    UnsignedLong,
    Date,
    DateNanos,
    Boolean,
    Binary,
    IntegerRange,
    FloatRange,
    LongRange,
    DoubleRange,
    DateRange,
    IpRange,
    Object,
    Nested,
    Ip,
    TokenCount,
    Percolator,
    Flattened,
    GeoPoint,
    GeoShape,
    Join,
    DenseVector,
    RankFeature,
    RankFeatures,
}

impl FieldType {
    /// The name used in mapping definitions, or `None` for `Auto`.
    pub fn mapping_name(&self) -> Option<&'static str> {
        let name = match self {
            FieldType::Auto => return None,
            FieldType::Text => "text",
            FieldType::Keyword => "keyword",
            FieldType::ConstantKeyword => "constant_keyword",
            FieldType::Wildcard => "wildcard",
            FieldType::SearchAsYouType => "search_as_you_type",
            FieldType::Long => "long",
            FieldType::Integer => "integer",
            FieldType::Short => "short",
            FieldType::Byte => "byte",
            FieldType::Double => "double",
            FieldType::Float => "float",
            FieldType::HalfFloat => "half_float",
            FieldType::ScaledFloat => "scaled_float",
            FieldType::UnsignedLong => "unsigned_long",
            FieldType::Date => "date",
            FieldType::DateNanos => "date_nanos",
            FieldType::Boolean => "boolean",
            FieldType::Binary => "binary",
            FieldType::IntegerRange => "integer_range",
            FieldType::FloatRange => "float_range",
            FieldType::LongRange => "long_range",
            FieldType::DoubleRange => "double_range",
            FieldType::DateRange => "date_range",
            FieldType::IpRange => "ip_range",
            FieldType::Object => "object",
            FieldType::Nested => "nested",
            FieldType::Ip => "ip",
            FieldType::TokenCount => "token_count",
            FieldType::Percolator => "percolator",
            FieldType::Flattened => "flattened",
            FieldType::GeoPoint => "geo_point",
            FieldType::GeoShape => "geo_shape",
            FieldType::Join => "join",
            FieldType::DenseVector => "dense_vector",
            FieldType::RankFeature => "rank_feature",
            FieldType::RankFeatures => "rank_features",
        };
        Some(name)
    }

    /// Returns true for full-text fields that are queried with `match`.
    pub fn is_text(&self) -> bool {
        matches!(self, FieldType::Text | FieldType::SearchAsYouType)
    }

    /// Returns true for numeric field types.
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            FieldType::Long
                | FieldType::Integer
                | FieldType::Short
                | FieldType::Byte
                | FieldType::Double
                | FieldType::Float
                | FieldType::HalfFloat
                | FieldType::ScaledFloat
                | FieldType::UnsignedLong
                | FieldType::TokenCount
        )
    }

    /// Returns true for date field types.
    pub fn is_date(&self) -> bool {
        matches!(self, FieldType::Date | FieldType::DateNanos)
    }

    /// Returns true for range field types.
    pub fn is_range(&self) -> bool {
        matches!(
            self,
            FieldType::IntegerRange
                | FieldType::FloatRange
                | FieldType::LongRange
                | FieldType::DoubleRange
                | FieldType::DateRange
                | FieldType::IpRange
        )
    }

    /// Returns true for types holding sub-properties.
    pub fn is_structured(&self) -> bool {
        matches!(self, FieldType::Object | FieldType::Nested)
    }

    /// Returns true if the type accepts a date `format` parameter.
    pub fn accepts_date_format(&self) -> bool {
        self.is_date() || *self == FieldType::DateRange
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mapping_name().unwrap_or("auto"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mapping_names() {
        assert_eq!(FieldType::Auto.mapping_name(), None);
        assert_eq!(FieldType::GeoPoint.mapping_name(), Some("geo_point"));
        assert_eq!(FieldType::DateRange.mapping_name(), Some("date_range"));
        assert_eq!(FieldType::Auto.to_string(), "auto");
    }

    #[test]
    fn test_classification() {
        assert!(FieldType::ScaledFloat.is_numeric());
        assert!(!FieldType::Keyword.is_numeric());
        assert!(FieldType::DateRange.is_range());
        assert!(FieldType::DateRange.accepts_date_format());
        assert!(FieldType::Nested.is_structured());
        assert!(FieldType::Text.is_text());
    }
}
