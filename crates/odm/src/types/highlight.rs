//! Highlight and source filtering directives.
//!
//! Both are carried into the compiled query as written.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

/// Highlighting for a search.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct HighlightSpec {
    /// Fields to highlight.
    pub fields: Vec<HighlightField>,
    /// Tags inserted before each highlighted term.
    pub pre_tags: Vec<String>,
    /// Tags inserted after each highlighted term.
    pub post_tags: Vec<String>,
    /// Highlighter type (`unified`, `plain`, `fvh`).
    pub highlighter_type: Option<String>,
    /// Only highlight fields that matched the query.
    pub require_field_match: Option<bool>,
}

/// One highlighted field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HighlightField {
    /// Field name.
    pub name: String,
    /// Size of each fragment in characters.
    pub fragment_size: Option<u32>,
    /// Maximum number of fragments.
    pub number_of_fragments: Option<u32>,
}

impl HighlightField {
    /// Highlights a field with default settings.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fragment_size: None,
            number_of_fragments: None,
        }
    }
}

impl HighlightSpec {
    /// Highlights the given fields.
    pub fn fields<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fields: names.into_iter().map(HighlightField::new).collect(),
            ..Default::default()
        }
    }

    /// Sets pre and post tags.
    pub fn with_tags(mut self, pre: impl Into<String>, post: impl Into<String>) -> Self {
        self.pre_tags = vec![pre.into()];
        self.post_tags = vec![post.into()];
        self
    }

    /// Renders the `highlight` section of a search body.
    pub fn to_json(&self) -> Value {
        let mut fields = Map::new();
        for field in &self.fields {
            let mut options = Map::new();
            if let Some(size) = field.fragment_size {
                options.insert("fragment_size".to_string(), json!(size));
            }
            if let Some(n) = field.number_of_fragments {
                options.insert("number_of_fragments".to_string(), json!(n));
            }
            fields.insert(field.name.clone(), Value::Object(options));
        }

        let mut highlight = Map::new();
        highlight.insert("fields".to_string(), Value::Object(fields));
        if !self.pre_tags.is_empty() {
            highlight.insert("pre_tags".to_string(), json!(self.pre_tags));
        }
        if !self.post_tags.is_empty() {
            highlight.insert("post_tags".to_string(), json!(self.post_tags));
        }
        if let Some(ref kind) = self.highlighter_type {
            highlight.insert("type".to_string(), json!(kind));
        }
        if let Some(require) = self.require_field_match {
            highlight.insert("require_field_match".to_string(), json!(require));
        }
        Value::Object(highlight)
    }
}

/// Source filtering for a search or get.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SourceFilter {
    /// Fields to include.
    pub includes: Vec<String>,
    /// Fields to exclude.
    pub excludes: Vec<String>,
    /// When true, no source is fetched at all.
    pub disabled: bool,
}

impl SourceFilter {
    /// Includes only the given fields.
    pub fn includes<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            includes: fields.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    /// Adds excluded fields.
    pub fn with_excludes<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.excludes = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Disables source fetching.
    pub fn none() -> Self {
        Self {
            disabled: true,
            ..Default::default()
        }
    }

    /// Renders the `_source` section of a search body.
    pub fn to_json(&self) -> Value {
        if self.disabled {
            return json!(false);
        }
        let mut source = Map::new();
        if !self.includes.is_empty() {
            source.insert("includes".to_string(), json!(self.includes));
        }
        if !self.excludes.is_empty() {
            source.insert("excludes".to_string(), json!(self.excludes));
        }
        Value::Object(source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_highlight_json() {
        let spec = HighlightSpec::fields(["name", "description"]).with_tags("<em>", "</em>");
        let json = spec.to_json();
        assert!(json["fields"]["name"].is_object());
        assert!(json["fields"]["description"].is_object());
        assert_eq!(json["pre_tags"][0], "<em>");
        assert_eq!(json["post_tags"][0], "</em>");
    }

    #[test]
    fn test_source_filter_json() {
        let filter = SourceFilter::includes(["name"]).with_excludes(["secret"]);
        assert_eq!(
            filter.to_json(),
            json!({"includes": ["name"], "excludes": ["secret"]})
        );
        assert_eq!(SourceFilter::none().to_json(), json!(false));
    }
}
