//! Flat INI-style configuration format.
//!
//! Cores read their frontend and core-option settings from a single global
//! section of `key = "value"` lines. Every scalar is written as a quoted
//! string, which is what the cores' own config parsers expect for booleans
//! and numbers too.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Line terminator for generated configuration files.
pub const LINE_ENDING: &str = "\n";

/// A scalar configuration value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConfigValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

/// Flat key→scalar map. Ordered so generated files are reproducible.
pub type ConfigMap = BTreeMap<String, ConfigValue>;

impl fmt::Display for ConfigValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigValue::Bool(v) => write!(f, "{}", v),
            ConfigValue::Int(v) => write!(f, "{}", v),
            ConfigValue::Float(v) => write!(f, "{}", v),
            ConfigValue::Str(v) => f.write_str(v),
        }
    }
}

impl From<bool> for ConfigValue {
    fn from(v: bool) -> Self {
        ConfigValue::Bool(v)
    }
}

impl From<i64> for ConfigValue {
    fn from(v: i64) -> Self {
        ConfigValue::Int(v)
    }
}

impl From<i32> for ConfigValue {
    fn from(v: i32) -> Self {
        ConfigValue::Int(v as i64)
    }
}

impl From<u32> for ConfigValue {
    fn from(v: u32) -> Self {
        ConfigValue::Int(v as i64)
    }
}

impl From<f64> for ConfigValue {
    fn from(v: f64) -> Self {
        ConfigValue::Float(v)
    }
}

impl From<&str> for ConfigValue {
    fn from(v: &str) -> Self {
        ConfigValue::Str(v.to_string())
    }
}

impl From<String> for ConfigValue {
    fn from(v: String) -> Self {
        ConfigValue::Str(v)
    }
}

impl ConfigValue {
    /// Interpret the value as a config flag the way cores do ("true" / "1").
    pub fn is_truthy(&self) -> bool {
        match self {
            ConfigValue::Bool(v) => *v,
            ConfigValue::Int(v) => *v != 0,
            ConfigValue::Float(v) => *v != 0.0,
            ConfigValue::Str(v) => matches!(v.trim(), "true" | "1"),
        }
    }
}

/// Render a value for the inside of a quoted string.
///
/// The format has no escape syntax, so quotes and line breaks cannot survive.
fn render_value(value: &ConfigValue) -> String {
    value
        .to_string()
        .chars()
        .map(|c| match c {
            '"' => '\'',
            '\r' | '\n' => ' ',
            c => c,
        })
        .collect()
}

/// Serialize a flat map into the configuration format.
pub fn stringify(map: &ConfigMap) -> String {
    let mut out = String::new();
    for (key, value) in map {
        out.push_str(key.trim());
        out.push_str(" = \"");
        out.push_str(&render_value(value));
        out.push('"');
        out.push_str(LINE_ENDING);
    }
    out
}

/// Parse a configuration document into raw string values.
///
/// Section headers and comments are skipped; surrounding quotes are removed.
/// Later duplicates win, matching how cores read their own files.
pub fn parse(text: &str) -> BTreeMap<String, String> {
    let mut map = BTreeMap::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') || line.starts_with('[') {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let key = key.trim();
        if key.is_empty() {
            continue;
        }
        let value = value.trim();
        let value = value
            .strip_prefix('"')
            .and_then(|v| v.strip_suffix('"'))
            .unwrap_or(value);
        map.insert(key.to_string(), value.to_string());
    }
    map
}
