//! Typed access to an action's `actionParams` mapping

use crate::document::AttrFilter;
use crate::error::{FlowError, Result};
use once_cell::sync::Lazy;
use serde_yaml::{Mapping, Value as Yaml};
use tracing::warn;

static EMPTY: Lazy<Mapping> = Lazy::new(Mapping::new);

/// Parameter reader bound to one action, so errors can name it
pub struct Params<'a> {
    action: &'static str,
    map: &'a Mapping,
}

impl<'a> Params<'a> {
    pub fn new(action: &'static str, map: Option<&'a Mapping>) -> Self {
        Self {
            action,
            map: map.unwrap_or(&EMPTY),
        }
    }

    pub fn action(&self) -> &'static str {
        self.action
    }

    fn get(&self, key: &str) -> Option<&'a Yaml> {
        match self.map.get(key) {
            None | Some(Yaml::Null) => None,
            Some(value) => Some(value),
        }
    }

    fn invalid(&self, key: &str, reason: impl Into<String>) -> FlowError {
        FlowError::invalid_parameter(self.action, key, reason)
    }

    /// Log parameters this action does not understand
    pub fn warn_unknown(&self, known: &[&str]) {
        for key in self.map.keys() {
            match key.as_str() {
                Some(name) if known.contains(&name) => {}
                Some(name) => warn!("Ignoring unknown parameter '{}' on {}", name, self.action),
                None => warn!("Ignoring non-string parameter key on {}", self.action),
            }
        }
    }

    /// Scalar parameter rendered as a string
    pub fn string(&self, key: &str) -> Result<Option<String>> {
        self.get(key)
            .map(|value| {
                scalar_text(value).ok_or_else(|| self.invalid(key, "expected a scalar value"))
            })
            .transpose()
    }

    pub fn required_string(&self, key: &str) -> Result<String> {
        self.string(key)?
            .ok_or_else(|| FlowError::missing_parameter(self.action, key))
    }

    pub fn integer(&self, key: &str) -> Result<Option<i64>> {
        let Some(value) = self.get(key) else {
            return Ok(None);
        };
        let parsed = match value {
            Yaml::Number(number) => number.as_i64(),
            Yaml::String(text) => text.trim().parse().ok(),
            _ => None,
        };
        parsed
            .map(Some)
            .ok_or_else(|| self.invalid(key, "expected an integer"))
    }

    /// Non-negative integer; negative values are treated as absent
    pub fn index(&self, key: &str) -> Result<Option<usize>> {
        Ok(self
            .integer(key)?
            .and_then(|value| usize::try_from(value).ok()))
    }

    pub fn boolean(&self, key: &str) -> Result<Option<bool>> {
        let Some(value) = self.get(key) else {
            return Ok(None);
        };
        match value {
            Yaml::Bool(flag) => Ok(Some(*flag)),
            Yaml::String(text) => match text.to_ascii_lowercase().as_str() {
                "true" | "yes" => Ok(Some(true)),
                "false" | "no" => Ok(Some(false)),
                _ => Err(self.invalid(key, "expected true or false")),
            },
            _ => Err(self.invalid(key, "expected true or false")),
        }
    }

    pub fn mapping(&self, key: &str) -> Result<Option<&'a Mapping>> {
        self.mapping_any(&[key])
    }

    pub fn mapping_any(&self, keys: &[&str]) -> Result<Option<&'a Mapping>> {
        for key in keys {
            match self.get(key) {
                Some(Yaml::Mapping(map)) => return Ok(Some(map)),
                Some(_) => return Err(self.invalid(key, "expected a mapping")),
                None => {}
            }
        }
        Ok(None)
    }

    /// A mapping of scalar values as ordered string pairs
    pub fn string_pairs(&self, key: &str) -> Result<Vec<(String, String)>> {
        match self.mapping(key)? {
            Some(map) => {
                pairs(map).ok_or_else(|| self.invalid(key, "expected scalar keys and values"))
            }
            None => Ok(Vec::new()),
        }
    }

    /// Read a `{type: {attr: value}}` marker mapping
    pub fn marker(&self, keys: &[&str]) -> Result<Option<(String, AttrFilter)>> {
        let Some(map) = self.mapping_any(keys)? else {
            return Ok(None);
        };
        let key = keys[0];
        let mut entries = map.iter();
        let (node_type, attrs) = entries
            .next()
            .ok_or_else(|| self.invalid(key, "expected one element type"))?;
        if entries.next().is_some() {
            return Err(self.invalid(key, "expected exactly one element type"));
        }
        let node_type =
            scalar_text(node_type).ok_or_else(|| self.invalid(key, "element type must be a string"))?;
        let mut filter = AttrFilter::new();
        match attrs {
            Yaml::Null => {}
            Yaml::Mapping(attrs) => {
                let attrs = pairs(attrs)
                    .ok_or_else(|| self.invalid(key, "attributes must be scalar pairs"))?;
                for (name, value) in attrs {
                    filter = filter.with(name, value);
                }
            }
            _ => return Err(self.invalid(key, "attributes must be a mapping")),
        }
        Ok(Some((node_type, filter)))
    }
}

/// Render a YAML scalar as text
pub fn scalar_text(value: &Yaml) -> Option<String> {
    match value {
        Yaml::String(text) => Some(text.clone()),
        Yaml::Number(number) => Some(number.to_string()),
        Yaml::Bool(flag) => Some(flag.to_string()),
        _ => None,
    }
}

fn pairs(map: &Mapping) -> Option<Vec<(String, String)>> {
    map.iter()
        .map(|(key, value)| Some((scalar_text(key)?, scalar_text(value)?)))
        .collect()
}
