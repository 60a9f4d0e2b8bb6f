//! `$` indirection in flow parameters
//!
//! A parameter string is either a literal or a reference into the
//! [`ExecutionContext`](super::ExecutionContext). References are resolved when
//! the value is consumed, so mutations made by earlier steps are visible.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Where a parameter value comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueSource {
    /// Plain text, used as-is
    Literal(String),
    /// `$name` - the variable's current value
    Var(String),
    /// `$name.a.b` - nested access into the variable's value
    Path { name: String, path: Vec<String> },
    /// `$name.pop` - remove and return the first element of a list variable
    Pop(String),
}

impl ValueSource {
    /// Parse from a string, detecting references by `$` prefix
    ///
    /// Both `$name` and `${name}` forms are accepted.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        let reference = if s.starts_with("${") && s.ends_with('}') && s.len() > 3 {
            &s[2..s.len() - 1]
        } else if let Some(rest) = s.strip_prefix('$') {
            rest
        } else {
            return ValueSource::Literal(s.to_string());
        };

        let mut segments = reference.split('.');
        let name = match segments.next() {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => return ValueSource::Literal(s.to_string()),
        };
        let path: Vec<String> = segments.map(str::to_string).collect();

        match path.as_slice() {
            [] => ValueSource::Var(name),
            [verb] if verb == "pop" => ValueSource::Pop(name),
            _ => ValueSource::Path { name, path },
        }
    }
}

impl From<&str> for ValueSource {
    fn from(s: &str) -> Self {
        ValueSource::parse(s)
    }
}

impl fmt::Display for ValueSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueSource::Literal(text) => write!(f, "{text}"),
            ValueSource::Var(name) => write!(f, "${name}"),
            ValueSource::Path { name, path } => write!(f, "${}.{}", name, path.join(".")),
            ValueSource::Pop(name) => write!(f, "${name}.pop"),
        }
    }
}

impl Serialize for ValueSource {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ValueSource {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(ValueSource::parse(&s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_literal() {
        assert_eq!(
            ValueSource::parse("Compute"),
            ValueSource::Literal("Compute".to_string())
        );
        assert_eq!(ValueSource::parse("$"), ValueSource::Literal("$".to_string()));
    }

    #[test]
    fn test_parse_references() {
        assert_eq!(
            ValueSource::parse("$ServiceName"),
            ValueSource::Var("ServiceName".to_string())
        );
        assert_eq!(
            ValueSource::parse("${ServiceName}"),
            ValueSource::Var("ServiceName".to_string())
        );
        assert_eq!(
            ValueSource::parse("$sections.pop"),
            ValueSource::Pop("sections".to_string())
        );
        assert_eq!(
            ValueSource::parse("$links.0.href"),
            ValueSource::Path {
                name: "links".to_string(),
                path: vec!["0".to_string(), "href".to_string()],
            }
        );
    }

    #[test]
    fn test_pop_must_be_the_only_segment() {
        assert!(matches!(
            ValueSource::parse("$stack.pop.name"),
            ValueSource::Path { .. }
        ));
    }

    #[test]
    fn test_display_round_trips() {
        for raw in ["plain", "$a", "$a.pop", "$a.b.c"] {
            assert_eq!(ValueSource::parse(raw).to_string(), raw);
        }
    }

    #[test]
    fn test_deserialize_from_yaml() {
        let parsed: Vec<ValueSource> = serde_yaml::from_str("[\"$queue.pop\", literal]").unwrap();
        assert_eq!(parsed[0], ValueSource::Pop("queue".to_string()));
        assert_eq!(parsed[1], ValueSource::Literal("literal".to_string()));
    }
}
