//! Index-name templates.
//!
//! A template is literal text with embedded expressions:
//! - `{name}` is replaced by the configured index variable `name`
//! - `{now}` and `{now:PATTERN}` are replaced by the current UTC time, formatted
//!   with the given pattern (default `yyyy.MM.dd`)
//!
//! `{{` and `}}` produce literal braces. Templates are parsed when metadata is
//! built and resolved per operation, so the index can change over time.

use std::collections::HashMap;
use std::fmt::Write as _;

use chrono::{DateTime, Utc};

use crate::error::MappingError;

use super::date_format::translate_pattern;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Variable(String),
    Now(String),
}

/// A parsed index-name template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexNameTemplate {
    source: String,
    segments: Vec<Segment>,
}

impl IndexNameTemplate {
    /// Parses a template.
    pub fn parse(template: &str) -> Result<Self, MappingError> {
        let invalid = |message: &str| MappingError::InvalidIndexTemplate {
            template: template.to_string(),
            message: message.to_string(),
        };

        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = template.chars().peekable();

        while let Some(c) = chars.next() {
            match c {
                '{' if chars.peek() == Some(&'{') => {
                    chars.next();
                    literal.push('{');
                }
                '}' if chars.peek() == Some(&'}') => {
                    chars.next();
                    literal.push('}');
                }
                '}' => return Err(invalid("unmatched '}'")),
                '{' => {
                    let mut expression = String::new();
                    loop {
                        match chars.next() {
                            Some('}') => break,
                            Some('{') => return Err(invalid("nested '{'")),
                            Some(ch) => expression.push(ch),
                            None => return Err(invalid("unterminated expression")),
                        }
                    }
                    let expression = expression.trim();
                    if expression.is_empty() {
                        return Err(invalid("empty expression"));
                    }
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(parse_expression(expression).map_err(|m| invalid(&m))?);
                }
                _ => literal.push(c),
            }
        }
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }
        if segments.is_empty() {
            return Err(invalid("index name is empty"));
        }

        Ok(Self {
            source: template.to_string(),
            segments,
        })
    }

    /// The template as written.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Returns true if the template contains no expressions.
    pub fn is_static(&self) -> bool {
        self.segments
            .iter()
            .all(|segment| matches!(segment, Segment::Literal(_)))
    }

    /// Resolves the template against variables at the given time.
    pub fn resolve_at(
        &self,
        variables: &HashMap<String, String>,
        now: DateTime<Utc>,
    ) -> Result<String, MappingError> {
        let mut name = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => name.push_str(text),
                Segment::Variable(variable) => {
                    let value = variables.get(variable).ok_or_else(|| {
                        MappingError::UnresolvedIndexExpression {
                            expression: variable.clone(),
                        }
                    })?;
                    name.push_str(value);
                }
                Segment::Now(pattern) => {
                    write!(name, "{}", now.format(pattern)).map_err(|_| {
                        MappingError::InvalidIndexTemplate {
                            template: self.source.clone(),
                            message: format!("cannot format date with '{}'", pattern),
                        }
                    })?;
                }
            }
        }
        Ok(name)
    }

    /// Resolves the template against variables at the current time.
    pub fn resolve(&self, variables: &HashMap<String, String>) -> Result<String, MappingError> {
        self.resolve_at(variables, Utc::now())
    }
}

fn parse_expression(expression: &str) -> Result<Segment, String> {
    if expression == "now" {
        return Ok(Segment::Now("%Y.%m.%d".to_string()));
    }
    if let Some(pattern) = expression.strip_prefix("now:") {
        return translate_pattern(pattern.trim()).map(Segment::Now);
    }
    let valid = expression
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.');
    if !valid {
        return Err(format!("invalid variable name '{}'", expression));
    }
    Ok(Segment::Variable(expression.to_string()))
}
