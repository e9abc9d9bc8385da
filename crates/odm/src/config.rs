//! Configuration for the mapping layer and the operations facade.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Strategy for deriving document field names from property names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldNamingStrategy {
    /// Field name equals the property name.
    #[default]
    Identity,
    /// `publishedAt` becomes `published_at`.
    SnakeCase,
}

impl FieldNamingStrategy {
    /// Applies the strategy to a property name.
    pub fn field_name(&self, property: &str) -> String {
        match self {
            FieldNamingStrategy::Identity => property.to_string(),
            FieldNamingStrategy::SnakeCase => to_snake_case(property),
        }
    }
}

fn to_snake_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    let mut prev_lower = false;
    for c in name.chars() {
        if c.is_uppercase() {
            if prev_lower {
                out.push('_');
            }
            out.extend(c.to_lowercase());
            prev_lower = false;
        } else {
            prev_lower = c.is_lowercase() || c.is_ascii_digit();
            out.push(c);
        }
    }
    out
}

/// When written documents become visible to search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshPolicy {
    /// Leave refreshing to the store.
    #[default]
    None,
    /// Refresh the affected shards immediately.
    Immediate,
    /// Wait for the next scheduled refresh.
    WaitFor,
}

impl RefreshPolicy {
    /// The value of the `refresh` request parameter, if any.
    pub fn as_param(&self) -> Option<&'static str> {
        match self {
            RefreshPolicy::None => None,
            RefreshPolicy::Immediate => Some("true"),
            RefreshPolicy::WaitFor => Some("wait_for"),
        }
    }
}

/// Configuration for mapping, schema derivation and operations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OdmConfig {
    /// Write type hints for aggregate roots and polymorphic values (default: true).
    #[serde(default = "default_true")]
    pub write_type_hints: bool,

    /// Document key holding the type hint (default: `"_class"`).
    #[serde(default = "default_type_key")]
    pub type_key: String,

    /// Naming strategy for properties without an explicit field name.
    #[serde(default)]
    pub field_naming: FieldNamingStrategy,

    /// Refresh policy applied to writes.
    #[serde(default)]
    pub refresh_policy: RefreshPolicy,

    /// Create missing indices on repository start (default: true).
    #[serde(default = "default_true")]
    pub create_indexes: bool,

    /// Number of primary shards per index (default: 1).
    #[serde(default = "default_shards")]
    pub number_of_shards: u32,

    /// Number of replica shards per index (default: 1).
    #[serde(default = "default_replicas")]
    pub number_of_replicas: u32,

    /// Refresh interval (default: "1s").
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval: String,

    /// Maximum result window size (default: 10000). Also the size of unpaged queries.
    #[serde(default = "default_max_result_window")]
    pub max_result_window: u32,

    /// Page size used when a paged method gets no page request (default: 10).
    #[serde(default = "default_page_size")]
    pub default_page_size: u32,

    /// Keep-alive for scroll contexts (default: 1m).
    #[serde(with = "humantime_serde", default = "default_keep_alive")]
    pub scroll_keep_alive: Duration,

    /// Keep-alive for point-in-time contexts (default: 1m).
    #[serde(with = "humantime_serde", default = "default_keep_alive")]
    pub point_in_time_keep_alive: Duration,

    /// Assign a random UUID to documents saved without an id (default: false).
    #[serde(default)]
    pub generate_ids: bool,

    /// Values for `{name}` placeholders in index-name templates.
    #[serde(default)]
    pub index_variables: HashMap<String, String>,
}

fn default_true() -> bool {
    true
}

fn default_type_key() -> String {
    "_class".to_string()
}

fn default_shards() -> u32 {
    1
}

fn default_replicas() -> u32 {
    1
}

fn default_refresh_interval() -> String {
    "1s".to_string()
}

fn default_max_result_window() -> u32 {
    10000
}

fn default_page_size() -> u32 {
    10
}

fn default_keep_alive() -> Duration {
    Duration::from_secs(60)
}

impl Default for OdmConfig {
    fn default() -> Self {
        Self {
            write_type_hints: default_true(),
            type_key: default_type_key(),
            field_naming: FieldNamingStrategy::default(),
            refresh_policy: RefreshPolicy::default(),
            create_indexes: default_true(),
            number_of_shards: default_shards(),
            number_of_replicas: default_replicas(),
            refresh_interval: default_refresh_interval(),
            max_result_window: default_max_result_window(),
            default_page_size: default_page_size(),
            scroll_keep_alive: default_keep_alive(),
            point_in_time_keep_alive: default_keep_alive(),
            generate_ids: false,
            index_variables: HashMap::new(),
        }
    }
}

impl OdmConfig {
    /// Sets the field naming strategy.
    pub fn with_field_naming(mut self, strategy: FieldNamingStrategy) -> Self {
        self.field_naming = strategy;
        self
    }

    /// Sets the refresh policy.
    pub fn with_refresh_policy(mut self, policy: RefreshPolicy) -> Self {
        self.refresh_policy = policy;
        self
    }

    /// Adds an index-name template variable.
    pub fn with_index_variable(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.index_variables.insert(name.into(), value.into());
        self
    }

    /// Disables type hints.
    pub fn without_type_hints(mut self) -> Self {
        self.write_type_hints = false;
        self
    }

    /// Formats a keep-alive duration the way the store expects it (`60s`).
    pub(crate) fn keep_alive_param(duration: Duration) -> String {
        let millis = duration.as_millis();
        if millis % 1000 == 0 {
            format!("{}s", millis / 1000)
        } else {
            format!("{}ms", millis)
        }
    }
}

/// Serde module for Duration with humantime format.
mod humantime_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&humantime::format_duration(*duration).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        humantime::parse_duration(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults_from_empty_object() {
        let config: OdmConfig = serde_json::from_value(json!({})).unwrap();
        assert!(config.write_type_hints);
        assert_eq!(config.type_key, "_class");
        assert_eq!(config.max_result_window, 10000);
        assert_eq!(config.default_page_size, 10);
        assert_eq!(config.scroll_keep_alive, Duration::from_secs(60));
        assert_eq!(config.refresh_policy, RefreshPolicy::None);
        assert!(!config.generate_ids);
    }

    #[test]
    fn test_humantime_durations() {
        let config: OdmConfig = serde_json::from_value(json!({
            "scroll_keep_alive": "5m",
            "point_in_time_keep_alive": "30s",
            "refresh_policy": "wait_for",
            "field_naming": "snake_case"
        }))
        .unwrap();
        assert_eq!(config.scroll_keep_alive, Duration::from_secs(300));
        assert_eq!(config.point_in_time_keep_alive, Duration::from_secs(30));
        assert_eq!(config.refresh_policy.as_param(), Some("wait_for"));
        assert_eq!(config.field_naming, FieldNamingStrategy::SnakeCase);

        let back = serde_json::to_value(&config).unwrap();
        assert_eq!(back["scroll_keep_alive"], "5m");
    }

    #[test]
    fn test_snake_case_naming() {
        let naming = FieldNamingStrategy::SnakeCase;
        assert_eq!(naming.field_name("publishedAt"), "published_at");
        assert_eq!(naming.field_name("name"), "name");
        assert_eq!(naming.field_name("isbn13Code"), "isbn13_code");
        assert_eq!(FieldNamingStrategy::Identity.field_name("publishedAt"), "publishedAt");
    }

    #[test]
    fn test_keep_alive_param() {
        assert_eq!(OdmConfig::keep_alive_param(Duration::from_secs(60)), "60s");
        assert_eq!(OdmConfig::keep_alive_param(Duration::from_millis(1500)), "1500ms");
    }
}
