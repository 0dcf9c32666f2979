//! Query templates
//!
//! A template is a backend query with exactly one `%s` slot for the entity
//! identifier, e.g. `rate(container_cpu_usage_seconds_total{name="%s"}[1m])`.
//! `%%` stands for a literal percent sign. Templates are validated once while
//! resolving the configuration, so resolving a query per tick never fails.

use std::fmt;

/// Substitution marker inside a raw template
pub const SLOT: &str = "%s";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TemplateError {
    #[error("query template `{0}` has no `%s` slot")]
    MissingSlot(String),

    #[error("query template `{template}` has {count} `%s` slots, expected exactly one")]
    MultipleSlots { template: String, count: usize },
}

/// A validated query template, split around its single slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryTemplate {
    raw: String,
    prefix: String,
    suffix: String,
}

impl QueryTemplate {
    pub fn parse(raw: &str) -> Result<Self, TemplateError> {
        let mut parts = vec![String::new()];
        let mut chars = raw.chars().peekable();

        while let Some(c) = chars.next() {
            if c == '%' {
                match chars.peek() {
                    Some('s') => {
                        chars.next();
                        parts.push(String::new());
                        continue;
                    }
                    Some('%') => {
                        chars.next();
                    }
                    _ => {}
                }
            }

            if let Some(current) = parts.last_mut() {
                current.push(c);
            }
        }

        match parts.len() {
            1 => Err(TemplateError::MissingSlot(raw.to_string())),
            2 => {
                let suffix = parts.pop().unwrap_or_default();
                let prefix = parts.pop().unwrap_or_default();
                Ok(Self {
                    raw: raw.to_string(),
                    prefix,
                    suffix,
                })
            }
            n => Err(TemplateError::MultipleSlots {
                template: raw.to_string(),
                count: n - 1,
            }),
        }
    }

    /// Substitute `entity` into the slot.
    pub fn resolve(&self, entity: &str) -> String {
        let mut query =
            String::with_capacity(self.prefix.len() + entity.len() + self.suffix.len());
        query.push_str(&self.prefix);
        query.push_str(entity);
        query.push_str(&self.suffix);
        query
    }

    /// The template as written in the configuration.
    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl fmt::Display for QueryTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}
