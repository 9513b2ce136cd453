//! Generic value tree produced by the bootstrap extractor
//!
//! `BootstrapValue` is the typed form of whatever a page assigns in its
//! bootstrap script. Constructs the extractor does not evaluate survive as
//! `Opaque` placeholders so sibling fields stay readable.

use crate::{ArchiveError, Result};
use serde_json::Value as JsonValue;
use std::collections::HashMap;

/// A literal leaf value
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Str(String),
    /// Numbers keep their source lexeme (hex literals are stored in decimal)
    Number(String),
    Bool(bool),
    Null,
}

/// Kind of expression that was recognized but not evaluated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpaqueKind {
    Call,
    Function,
    Unknown,
}

impl OpaqueKind {
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Call => "call",
            Self::Function => "function",
            Self::Unknown => "unknown",
        }
    }
}

/// String-keyed mapping that preserves insertion order
///
/// Inserting an existing key replaces its value in place, the same way a
/// repeated property in an object literal wins over the earlier one.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Mapping {
    entries: Vec<(String, BootstrapValue)>,
    /// Position of each key in `entries`
    index: HashMap<String, usize>,
}

impl Mapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: String, value: BootstrapValue) {
        match self.index.get(&key) {
            Some(&at) => self.entries[at].1 = value,
            None => {
                self.index.insert(key.clone(), self.entries.len());
                self.entries.push((key, value));
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&BootstrapValue> {
        self.index.get(key).map(|&at| &self.entries[at].1)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &BootstrapValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Recursive value recovered from an embedded script or a JSON response
#[derive(Debug, Clone, PartialEq)]
pub enum BootstrapValue {
    Scalar(Scalar),
    Mapping(Mapping),
    Sequence(Vec<BootstrapValue>),
    Opaque(OpaqueKind),
}

impl BootstrapValue {
    pub fn str(s: impl Into<String>) -> Self {
        Self::Scalar(Scalar::Str(s.into()))
    }

    pub fn null() -> Self {
        Self::Scalar(Scalar::Null)
    }

    /// Looks up a key when this value is a mapping
    pub fn get(&self, key: &str) -> Option<&BootstrapValue> {
        match self {
            Self::Mapping(map) => map.get(key),
            _ => None,
        }
    }

    /// Follows a chain of mapping keys
    pub fn path(&self, keys: &[&str]) -> Option<&BootstrapValue> {
        keys.iter().try_fold(self, |node, key| node.get(key))
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Scalar(Scalar::Str(s)) => Some(s),
            _ => None,
        }
    }

    /// Reads an integer from a number literal or a numeric string
    pub fn as_i64(&self) -> Option<i64> {
        let text = match self {
            Self::Scalar(Scalar::Str(s)) => s.trim(),
            Self::Scalar(Scalar::Number(n)) => n.as_str(),
            _ => return None,
        };
        text.parse::<i64>().ok().or_else(|| {
            text.parse::<f64>()
                .ok()
                .filter(|f| f.fract() == 0.0 && f.is_finite())
                .map(|f| f as i64)
        })
    }

    /// Reads a boolean literal, also accepting the strings "true"/"false"
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Scalar(Scalar::Bool(b)) => Some(*b),
            Self::Scalar(Scalar::Str(s)) => match s.as_str() {
                "true" => Some(true),
                "false" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }

    pub fn as_seq(&self) -> Option<&[BootstrapValue]> {
        match self {
            Self::Sequence(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_mapping(&self) -> Option<&Mapping> {
        match self {
            Self::Mapping(map) => Some(map),
            _ => None,
        }
    }

    pub fn is_opaque(&self) -> bool {
        matches!(self, Self::Opaque(_))
    }

    /// Returns the field, failing with `FieldMissing` or `FieldNotLiteral`
    pub fn require(&self, field: &str, context: &str) -> Result<&BootstrapValue> {
        match self.get(field) {
            None => Err(ArchiveError::field_missing(field, context)),
            Some(value) if value.is_opaque() => Err(ArchiveError::FieldNotLiteral {
                field: field.to_string(),
                context: context.to_string(),
            }),
            Some(value) => Ok(value),
        }
    }

    pub fn require_str(&self, field: &str, context: &str) -> Result<&str> {
        self.require(field, context)?.as_str().ok_or_else(|| {
            ArchiveError::protocol(context, format!("field '{}' is not a string", field))
        })
    }

    pub fn require_i64(&self, field: &str, context: &str) -> Result<i64> {
        self.require(field, context)?.as_i64().ok_or_else(|| {
            ArchiveError::protocol(context, format!("field '{}' is not an integer", field))
        })
    }

    pub fn require_seq(&self, field: &str, context: &str) -> Result<&[BootstrapValue]> {
        self.require(field, context)?.as_seq().ok_or_else(|| {
            ArchiveError::protocol(context, format!("field '{}' is not an array", field))
        })
    }

    /// Converts the tree to JSON; opaque nodes become `"<tag>"` strings
    pub fn to_json(&self) -> JsonValue {
        match self {
            Self::Scalar(Scalar::Str(s)) => JsonValue::String(s.clone()),
            Self::Scalar(Scalar::Number(n)) => n
                .parse::<serde_json::Number>()
                .ok()
                .or_else(|| n.parse::<f64>().ok().and_then(serde_json::Number::from_f64))
                .map(JsonValue::Number)
                .unwrap_or(JsonValue::Null),
            Self::Scalar(Scalar::Bool(b)) => JsonValue::Bool(*b),
            Self::Scalar(Scalar::Null) => JsonValue::Null,
            Self::Mapping(map) => JsonValue::Object(
                map.iter()
                    .map(|(k, v)| (k.to_string(), v.to_json()))
                    .collect(),
            ),
            Self::Sequence(items) => JsonValue::Array(items.iter().map(Self::to_json).collect()),
            Self::Opaque(kind) => JsonValue::String(format!("<{}>", kind.tag())),
        }
    }
}

impl From<JsonValue> for BootstrapValue {
    fn from(value: JsonValue) -> Self {
        match value {
            JsonValue::Null => Self::Scalar(Scalar::Null),
            JsonValue::Bool(b) => Self::Scalar(Scalar::Bool(b)),
            JsonValue::Number(n) => Self::Scalar(Scalar::Number(n.to_string())),
            JsonValue::String(s) => Self::Scalar(Scalar::Str(s)),
            JsonValue::Array(items) => Self::Sequence(items.into_iter().map(Self::from).collect()),
            JsonValue::Object(obj) => {
                let mut map = Mapping::new();
                for (k, v) in obj {
                    map.insert(k, Self::from(v));
                }
                Self::Mapping(map)
            }
        }
    }
}
