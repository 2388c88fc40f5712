//! Structured document values
//!
//! YAML and JSON sources are parsed into a [`Value`] tree and then flattened
//! into the dotted key namespace shared by every source
//! (`database.host`, `servers[0].name`).
//!
//! Numbers are stored as text. JSON numbers keep the text they were written
//! with (`1.10`, `18446744073709551615`). YAML integers are exact within the
//! 64-bit range, but YAML floats come out in their shortest form (`1.10`
//! becomes `1.1`); quote a YAML number to keep its text.

use indexmap::IndexMap;

use crate::error::{Error, Result};

/// A value parsed from a structured (YAML/JSON) document
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    /// Number as text
    Number(String),
    /// String value (may contain placeholders)
    String(String),
    Sequence(Vec<Value>),
    Mapping(IndexMap<String, Value>),
}

impl Value {
    /// Convert a parsed YAML document. Fails on a mapping key that is not a
    /// scalar.
    pub fn from_yaml(value: serde_yaml::Value) -> Result<Self> {
        Ok(match value {
            serde_yaml::Value::Null => Value::Null,
            serde_yaml::Value::Bool(b) => Value::Bool(b),
            serde_yaml::Value::Number(n) => Value::Number(n.to_string()),
            serde_yaml::Value::String(s) => Value::String(s),
            serde_yaml::Value::Sequence(seq) => Value::Sequence(
                seq.into_iter()
                    .map(Value::from_yaml)
                    .collect::<Result<_>>()?,
            ),
            serde_yaml::Value::Mapping(map) => {
                let mut entries = IndexMap::with_capacity(map.len());
                for (key, value) in map {
                    entries.insert(yaml_key(key)?, Value::from_yaml(value)?);
                }
                Value::Mapping(entries)
            }
            // Tags carry no meaning for properties
            serde_yaml::Value::Tagged(tagged) => Value::from_yaml(tagged.value)?,
        })
    }

    /// Convert a parsed JSON document
    pub fn from_json(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => Value::Number(n.to_string()),
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::Sequence(items.into_iter().map(Value::from_json).collect())
            }
            serde_json::Value::Object(map) => Value::Mapping(
                map.into_iter()
                    .map(|(key, value)| (key, Value::from_json(value)))
                    .collect(),
            ),
        }
    }

    /// Returns the type name of this value
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Sequence(_) => "sequence",
            Value::Mapping(_) => "mapping",
        }
    }

    /// Flatten the tree into `(dotted.key, value)` pairs in document order.
    ///
    /// Mapping keys are joined with `.`, sequence items get an `[i]` suffix
    /// and nulls become empty strings. Empty mappings and sequences
    /// contribute no entries.
    pub fn flatten(&self) -> Vec<(String, String)> {
        let mut entries = Vec::new();
        self.flatten_into("", &mut entries);
        entries
    }

    fn flatten_into(&self, prefix: &str, entries: &mut Vec<(String, String)>) {
        match self {
            Value::Mapping(map) => {
                for (key, value) in map {
                    let path = if prefix.is_empty() {
                        key.clone()
                    } else {
                        format!("{}.{}", prefix, key)
                    };
                    value.flatten_into(&path, entries);
                }
            }
            Value::Sequence(seq) => {
                for (i, item) in seq.iter().enumerate() {
                    item.flatten_into(&format!("{}[{}]", prefix, i), entries);
                }
            }
            Value::Null => entries.push((prefix.to_string(), String::new())),
            Value::Bool(b) => entries.push((prefix.to_string(), b.to_string())),
            Value::Number(text) | Value::String(text) => {
                entries.push((prefix.to_string(), text.clone()))
            }
        }
    }
}

fn yaml_key(key: serde_yaml::Value) -> Result<String> {
    let found = match key {
        serde_yaml::Value::String(s) => return Ok(s),
        serde_yaml::Value::Number(n) => return Ok(n.to_string()),
        serde_yaml::Value::Bool(b) => return Ok(b.to_string()),
        serde_yaml::Value::Tagged(tagged) => return yaml_key(tagged.value),
        serde_yaml::Value::Null => "null",
        serde_yaml::Value::Sequence(_) => "sequence",
        serde_yaml::Value::Mapping(_) => "mapping",
    };
    Err(Error::parse(format!(
        "Mapping keys must be scalars, found {}",
        found
    )))
}
