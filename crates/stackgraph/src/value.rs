//! Property values and placeholders
//!
//! A [`Value`] is what a resource property holds. Besides plain JSON-like
//! data it can carry two kinds of placeholder that the engine resolves at
//! apply time:
//!
//! - [`Reference`]: an attribute of another resource, `${type.name.field}`
//! - a variable: an input supplied when the engine runs, `${var.name}`

use crate::error::{Error, Result};
use crate::types::Address;
use regex::Regex;
use serde::de::Deserializer;
use serde::ser::{SerializeMap, SerializeSeq, Serializer};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::LazyLock;

static REFERENCE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\$\{([a-z0-9_]+)\.([A-Za-z_][A-Za-z0-9_-]*)\.([A-Za-z0-9_]+)\}$")
        .expect("reference pattern is valid")
});

static VARIABLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\$\{var\.([A-Za-z_][A-Za-z0-9_-]*)\}$").expect("variable pattern is valid")
});

/// Placeholder for an attribute of another resource, resolved by the
/// engine once that resource exists
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Reference {
    pub address: Address,
    pub field: String,
}

impl Reference {
    /// Parse an interpolation string of the form `${type.name.field}`
    pub fn parse(s: &str) -> Option<Self> {
        let caps = REFERENCE_RE.captures(s)?;
        let kind = caps[1].parse().ok()?;
        Some(Self {
            address: Address::new(kind, &caps[2]),
            field: caps[3].to_string(),
        })
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${{{}.{}}}", self.address, self.field)
    }
}

impl Serialize for Reference {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Reference {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s)
            .ok_or_else(|| serde::de::Error::custom(format!("not a resource reference: '{s}'")))
    }
}

/// Escape interpolation markers so the engine reads the text literally
fn escape_literal(s: &str) -> std::borrow::Cow<'_, str> {
    if s.contains("${") {
        s.replace("${", "$${").into()
    } else {
        s.into()
    }
}

fn unescape_literal(s: String) -> String {
    if s.contains("$${") {
        s.replace("$${", "${")
    } else {
        s
    }
}

/// Check that a field name is a plain attribute identifier
pub(crate) fn is_valid_field(field: &str) -> bool {
    !field.is_empty() && field.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// A resource property value
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Number(serde_json::Number),
    String(String),
    List(Vec<Value>),
    /// Nested block, e.g. a cluster's `node_config`
    Block(BTreeMap<String, Value>),
    /// Attribute of another resource
    Reference(Reference),
    /// Input variable supplied at apply time
    Variable(String),
}

impl Value {
    /// Build a nested block from key/value pairs
    pub fn block<K, V, I>(entries: I) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        Self::Block(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Build a list from anything convertible into values
    pub fn list<V, I>(items: I) -> Self
    where
        V: Into<Value>,
        I: IntoIterator<Item = V>,
    {
        Self::List(items.into_iter().map(Into::into).collect())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_reference(&self) -> Option<&Reference> {
        match self {
            Self::Reference(r) => Some(r),
            _ => None,
        }
    }

    /// Walk every reference nested anywhere inside this value
    pub fn references(&self) -> Vec<&Reference> {
        let mut out = Vec::new();
        self.collect_placeholders(&mut out, &mut Vec::new());
        out
    }

    /// Walk every variable name nested anywhere inside this value
    pub fn variables(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_placeholders(&mut Vec::new(), &mut out);
        out
    }

    fn collect_placeholders<'a>(&'a self, refs: &mut Vec<&'a Reference>, vars: &mut Vec<&'a str>) {
        match self {
            Self::Reference(r) => refs.push(r),
            Self::Variable(v) => vars.push(v),
            Self::List(items) => {
                for item in items {
                    item.collect_placeholders(refs, vars);
                }
            }
            Self::Block(map) => {
                for value in map.values() {
                    value.collect_placeholders(refs, vars);
                }
            }
            Self::Null | Self::Bool(_) | Self::Number(_) | Self::String(_) => {}
        }
    }

    /// Convert raw JSON into a value, recognising interpolation strings
    pub fn from_json(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(b),
            serde_json::Value::Number(n) => Self::Number(n),
            serde_json::Value::String(s) => {
                if let Some(caps) = VARIABLE_RE.captures(&s) {
                    Self::Variable(caps[1].to_string())
                } else if let Some(reference) = Reference::parse(&s) {
                    Self::Reference(reference)
                } else {
                    Self::String(unescape_literal(s))
                }
            }
            serde_json::Value::Array(items) => {
                Self::List(items.into_iter().map(Self::from_json).collect())
            }
            serde_json::Value::Object(map) => Self::Block(
                map.into_iter()
                    .map(|(k, v)| (k, Self::from_json(v)))
                    .collect(),
            ),
        }
    }

    /// Convert into raw JSON, rendering placeholders as interpolation strings
    pub fn to_json(&self) -> Result<serde_json::Value> {
        serde_json::to_value(self).map_err(Error::from)
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Self::Null => serializer.serialize_unit(),
            Self::Bool(b) => serializer.serialize_bool(*b),
            Self::Number(n) => n.serialize(serializer),
            Self::String(s) => serializer.serialize_str(&escape_literal(s)),
            Self::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Self::Block(entries) => {
                let mut map = serializer.serialize_map(Some(entries.len()))?;
                for (k, v) in entries {
                    map.serialize_entry(k, v)?;
                }
                map.end()
            }
            Self::Reference(r) => serializer.collect_str(r),
            Self::Variable(name) => serializer.collect_str(&format_args!("${{var.{name}}}")),
        }
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        serde_json::Value::deserialize(deserializer).map(Self::from_json)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Self::Number(n.into())
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Self::Number(n.into())
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<&String> for Value {
    fn from(s: &String) -> Self {
        Self::String(s.clone())
    }
}

impl From<Reference> for Value {
    fn from(r: Reference) -> Self {
        Self::Reference(r)
    }
}

impl<V: Into<Value>> From<Vec<V>> for Value {
    fn from(items: Vec<V>) -> Self {
        Self::list(items)
    }
}

impl From<BTreeMap<String, Value>> for Value {
    fn from(map: BTreeMap<String, Value>) -> Self {
        Self::Block(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ResourceKind;
    use serde_json::json;

    fn vpc_id() -> Reference {
        Reference {
            address: Address::new(ResourceKind::Network, "vpc"),
            field: "id".into(),
        }
    }

    #[test]
    fn test_reference_display_and_parse() {
        let r = vpc_id();
        assert_eq!(r.to_string(), "${google_compute_network.vpc.id}");
        assert_eq!(Reference::parse("${google_compute_network.vpc.id}"), Some(r));
        assert_eq!(Reference::parse("${unknown_type.vpc.id}"), None);
        assert_eq!(Reference::parse("google_compute_network.vpc.id"), None);
    }

    #[test]
    fn test_serialize_placeholders() {
        let value = Value::block([
            ("network", Value::Reference(vpc_id())),
            ("password", Value::Variable("db_password".into())),
            ("count", Value::from(1i64)),
        ]);
        assert_eq!(
            value.to_json().unwrap(),
            json!({
                "network": "${google_compute_network.vpc.id}",
                "password": "${var.db_password}",
                "count": 1
            })
        );
    }

    #[test]
    fn test_from_json_recognises_placeholders() {
        let value = Value::from_json(json!({
            "a": "${google_compute_network.vpc.id}",
            "b": ["${var.secret}", "plain"],
            "c": null
        }));
        assert_eq!(value.references(), vec![&vpc_id()]);
        assert_eq!(value.variables(), vec!["secret"]);

        let Value::Block(map) = value else {
            panic!("expected block");
        };
        assert_eq!(map["c"], Value::Null);
        assert_eq!(map["b"], Value::list([Value::Variable("secret".into()), "plain".into()]));
    }

    #[test]
    fn test_nested_references_are_collected() {
        let value = Value::block([(
            "settings",
            Value::block([(
                "ip_configuration",
                Value::block([("private_network", Value::Reference(vpc_id()))]),
            )]),
        )]);
        assert_eq!(value.references().len(), 1);
    }

    #[test]
    fn test_literal_interpolation_text_is_escaped() {
        let value = Value::from("${google_compute_network.vpc.id}");
        let json = value.to_json().unwrap();
        assert_eq!(json, json!("$${google_compute_network.vpc.id}"));

        let back = Value::from_json(json);
        assert_eq!(back, value);
        assert!(back.references().is_empty());
    }

    #[test]
    fn test_escaping_is_reversible() {
        for text in ["plain", "a ${b} c", "$${already}", "$$${deep}", "cost: $5", "${"] {
            let value = Value::from(text);
            assert_eq!(Value::from_json(value.to_json().unwrap()), value, "{text}");
        }
    }

    #[test]
    fn test_field_validation() {
        assert!(is_valid_field("self_link"));
        assert!(!is_valid_field(""));
        assert!(!is_valid_field("a.b"));
    }
}
