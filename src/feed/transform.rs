//! Field transforms applied while building outgoing documents

use crate::text::replace_dollar_tex;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use url::Url;

/// A named transform in a `[feed.fields]` pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transform {
    /// Host part of a URL
    Url2Site,
    /// Single-dollar TeX delimiters to `[imath]` markup
    ReplaceDollars,
    Trim,
}

impl Transform {
    /// Applies the transform to string values; other values pass through
    pub fn apply(&self, value: Value) -> Value {
        let Value::String(text) = value else {
            return value;
        };
        let out = match self {
            Self::Url2Site => Url::parse(&text)
                .ok()
                .and_then(|url| url.host_str().map(str::to_string))
                .unwrap_or_default(),
            Self::ReplaceDollars => replace_dollar_tex(&text),
            Self::Trim => text.trim().to_string(),
        };
        Value::String(out)
    }
}

impl FromStr for Transform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "url2site" => Ok(Self::Url2Site),
            "replace_dollars" => Ok(Self::ReplaceDollars),
            "trim" => Ok(Self::Trim),
            other => Err(format!(
                "unknown transform '{}' (expected url2site, replace_dollars or trim)",
                other
            )),
        }
    }
}

impl fmt::Display for Transform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Url2Site => "url2site",
            Self::ReplaceDollars => "replace_dollars",
            Self::Trim => "trim",
        };
        write!(f, "{}", name)
    }
}

/// One outgoing field: a source key and the transforms applied to it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSpec {
    pub source: String,
    pub transforms: Vec<Transform>,
}

impl FieldSpec {
    /// Reads the source key, runs the pipeline and trims string results
    ///
    /// A missing source key yields `null`.
    pub fn evaluate(&self, document: &Value) -> Value {
        let value = document.get(&self.source).cloned().unwrap_or(Value::Null);
        match self.transforms.iter().fold(value, |v, t| t.apply(v)) {
            Value::String(s) => Value::String(s.trim().to_string()),
            other => other,
        }
    }
}

/// Compiles `[feed.fields]` into field specs, in key order
pub fn compile_fields(fields: &BTreeMap<String, Vec<String>>) -> Result<Vec<(String, FieldSpec)>, String> {
    fields
        .iter()
        .map(|(name, pipeline)| {
            let (source, transforms) = pipeline
                .split_first()
                .ok_or_else(|| format!("field '{}' names no source key", name))?;
            let transforms = transforms
                .iter()
                .map(|t| t.parse::<Transform>())
                .collect::<Result<Vec<_>, _>>()?;
            Ok((
                name.clone(),
                FieldSpec {
                    source: source.clone(),
                    transforms,
                },
            ))
        })
        .collect()
}
