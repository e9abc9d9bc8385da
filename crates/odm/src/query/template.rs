//! String query templates with `?0` and `:name` placeholders.
//!
//! Inside JSON string literals a placeholder is replaced by the argument's text
//! (strings unquoted, everything else as JSON), escaped for the surrounding string.
//! Outside string literals it is replaced by the argument's JSON. `:name` outside a
//! string is only a placeholder in value position, so `"a":true` stays intact.

use std::collections::HashMap;

use serde_json::Value;

use crate::error::QueryDerivationError;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Positional { index: usize, quoted: bool },
    Named { name: String, quoted: bool },
}

/// A parsed query template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StringQuery {
    method: String,
    source: String,
    segments: Vec<Segment>,
    positional: usize,
    named: Vec<String>,
}

impl StringQuery {
    /// Parses a template registered for `method`.
    pub fn parse(method: &str, template: &str) -> Result<Self, QueryDerivationError> {
        let invalid = |message: String| QueryDerivationError::InvalidTemplate {
            method: method.to_string(),
            message,
        };

        let chars: Vec<char> = template.chars().collect();
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut in_string = false;
        let mut escaped = false;
        let mut last_significant: Option<char> = None;
        let mut positional = 0;
        let mut named = Vec::new();

        let mut i = 0;
        while i < chars.len() {
            let c = chars[i];

            if in_string && escaped {
                literal.push(c);
                escaped = false;
                i += 1;
                continue;
            }

            if c == '?' && chars.get(i + 1).is_some_and(char::is_ascii_digit) {
                let digits: String = chars[i + 1..].iter().take_while(|c| c.is_ascii_digit()).collect();
                let index = digits
                    .parse::<usize>()
                    .map_err(|e| invalid(format!("bad placeholder ?{}: {}", digits, e)))?;
                flush(&mut literal, &mut segments);
                segments.push(Segment::Positional { index, quoted: in_string });
                positional = positional.max(index + 1);
                i += 1 + digits.len();
                last_significant = Some('0');
                continue;
            }

            if c == ':' && chars.get(i + 1).is_some_and(|n| n.is_ascii_alphabetic() || *n == '_') {
                let previous = if in_string { i.checked_sub(1).map(|p| chars[p]) } else { last_significant };
                let placeholder = if in_string {
                    previous.is_none_or(|p| !(p.is_ascii_alphanumeric() || p == '_'))
                } else {
                    matches!(previous, Some(':') | Some('[') | Some(',') | Some('('))
                };
                if placeholder {
                    let name: String = chars[i + 1..]
                        .iter()
                        .take_while(|c| c.is_ascii_alphanumeric() || **c == '_')
                        .collect();
                    flush(&mut literal, &mut segments);
                    i += 1 + name.len();
                    if !named.contains(&name) {
                        named.push(name.clone());
                    }
                    segments.push(Segment::Named { name, quoted: in_string });
                    last_significant = Some('a');
                    continue;
                }
            }

            match c {
                '"' => in_string = !in_string,
                '\\' if in_string => escaped = true,
                _ => {}
            }
            if !c.is_whitespace() {
                last_significant = Some(c);
            }
            literal.push(c);
            i += 1;
        }

        if in_string {
            return Err(invalid("unterminated string literal".to_string()));
        }
        flush(&mut literal, &mut segments);

        Ok(Self {
            method: method.to_string(),
            source: template.to_string(),
            segments,
            positional,
            named,
        })
    }

    /// The template text.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Number of positional arguments the template binds.
    pub fn arity(&self) -> usize {
        self.positional
    }

    /// Named placeholders, in order of first appearance.
    pub fn named_parameters(&self) -> &[String] {
        &self.named
    }

    /// Substitutes arguments and parses the result as a query.
    pub fn bind(&self, positional: &[Value], named: &HashMap<String, Value>) -> Result<Value, QueryDerivationError> {
        if positional.len() != self.positional {
            return Err(QueryDerivationError::ArityMismatch {
                method: self.method.clone(),
                expected: self.positional,
                actual: positional.len(),
            });
        }

        let mut out = String::with_capacity(self.source.len());
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Positional { index, quoted } => {
                    let value = positional.get(*index).ok_or_else(|| QueryDerivationError::ArityMismatch {
                        method: self.method.clone(),
                        expected: self.positional,
                        actual: positional.len(),
                    })?;
                    render(&mut out, value, *quoted);
                }
                Segment::Named { name, quoted } => {
                    let value = named.get(name).ok_or_else(|| QueryDerivationError::MissingNamedArgument {
                        method: self.method.clone(),
                        name: name.clone(),
                    })?;
                    render(&mut out, value, *quoted);
                }
            }
        }

        serde_json::from_str(&out).map_err(|e| QueryDerivationError::InvalidTemplate {
            method: self.method.clone(),
            message: format!("bound template is not valid JSON: {}", e),
        })
    }
}

fn flush(literal: &mut String, segments: &mut Vec<Segment>) {
    if !literal.is_empty() {
        segments.push(Segment::Literal(std::mem::take(literal)));
    }
}

fn render(out: &mut String, value: &Value, quoted: bool) {
    if !quoted {
        out.push_str(&value.to_string());
        return;
    }
    let text = match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    // Escape for the enclosing string literal, then drop the added quotes.
    let encoded = Value::String(text).to_string();
    out.push_str(&encoded[1..encoded.len() - 1]);
}
