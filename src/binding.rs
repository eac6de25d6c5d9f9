//! Variable bindings for template expansion
//!
//! [`Bindings`] is an immutable name → value mapping. Every render call
//! builds its own value by layering sources on top of each other; nothing
//! is ever mutated in place, so a `Bindings` can be shared freely between
//! concurrent renders.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::error::DeployError;

/// Valid binding names (same shape as template identifiers)
static BINDING_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid regex"));

/// Immutable set of named values visible to a template
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Bindings {
    values: Arc<BTreeMap<String, Value>>,
}

impl Bindings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.values.iter()
    }

    /// New bindings with `other` layered on top (its keys win)
    pub fn layer(&self, other: &Bindings) -> Bindings {
        if other.is_empty() {
            return self.clone();
        }
        if self.is_empty() {
            return other.clone();
        }
        let mut merged = (*self.values).clone();
        for (k, v) in other.iter() {
            merged.insert(k.clone(), v.clone());
        }
        Bindings {
            values: Arc::new(merged),
        }
    }

    /// New bindings with a single extra value
    pub fn with(&self, name: impl Into<String>, value: Value) -> Bindings {
        let mut merged = (*self.values).clone();
        merged.insert(name.into(), value);
        Bindings {
            values: Arc::new(merged),
        }
    }

    /// Bindings for a partial: `locals` as a whole, then each local by name
    pub fn for_partial(&self, locals: &Bindings) -> Bindings {
        let as_object: serde_json::Map<String, Value> = locals
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        self.with("locals", Value::Object(as_object)).layer(locals)
    }

    /// Parse a `name=value` CLI argument. The value is read as a YAML
    /// scalar so `replicas=3` binds a number and `debug=true` a boolean.
    pub fn parse_arg(arg: &str) -> Result<(String, Value), DeployError> {
        let (name, raw) = arg.split_once('=').ok_or_else(|| DeployError::InvalidBinding {
            input: arg.to_string(),
        })?;
        if !BINDING_NAME.is_match(name) {
            return Err(DeployError::InvalidBinding {
                input: arg.to_string(),
            });
        }
        let value = match serde_yaml::from_str::<serde_yaml::Value>(raw) {
            Ok(serde_yaml::Value::Mapping(_)) | Ok(serde_yaml::Value::Sequence(_)) | Err(_) => {
                Value::String(raw.to_string())
            }
            Ok(serde_yaml::Value::Null) if !raw.is_empty() && raw != "~" && raw != "null" => {
                Value::String(raw.to_string())
            }
            Ok(scalar) => serde_json::to_value(scalar).unwrap_or(Value::String(raw.to_string())),
        };
        Ok((name.to_string(), value))
    }

    /// Load bindings from a YAML (or JSON) file holding a top-level mapping
    pub fn from_file(path: &Path) -> Result<Bindings, DeployError> {
        let load = || -> anyhow::Result<Value> {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            let yaml: serde_yaml::Value =
                serde_yaml::from_str(&text).context("parsing bindings")?;
            serde_json::to_value(yaml).context("bindings keys must be strings")
        };
        match load() {
            Ok(Value::Object(map)) => Ok(map.into_iter().collect()),
            Ok(other) => Err(DeployError::BindingsFile {
                path: path.display().to_string(),
                details: format!("found {}", type_name(&other)),
            }),
            Err(e) => Err(DeployError::BindingsFile {
                path: path.display().to_string(),
                details: format!("{:#}", e),
            }),
        }
    }
}

impl FromIterator<(String, Value)> for Bindings {
    fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Self {
        Bindings {
            values: Arc::new(iter.into_iter().collect()),
        }
    }
}

impl<const N: usize> From<[(&str, Value); N]> for Bindings {
    fn from(pairs: [(&str, Value); N]) -> Self {
        pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
    }
}

/// Short type name for error messages
pub(crate) fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "sequence",
        Value::Object(_) => "mapping",
    }
}
