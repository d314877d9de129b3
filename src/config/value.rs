//! Resolved configuration values
//!
//! A document is parsed into `serde_yaml::Value` and then resolved into this
//! tree, where every template reference has become a [`TemplateId`].

use std::collections::BTreeMap;

use serde_yaml::Value as YamlValue;

use super::registry::TemplateId;

/// Field name → value mapping of a template
pub type Fields = BTreeMap<String, Value>;

/// A configuration value with template references resolved
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
    /// A template instance living in the registry arena
    Template(TemplateId),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Numeric view (ints widen to floats)
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Value::Int(i) => Some(i as f64),
            Value::Float(x) => Some(x),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Value::Int(i) => Some(i),
            Value::Float(x) if x.fract() == 0.0 => Some(x as i64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match *self {
            Value::Bool(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Map(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_template(&self) -> Option<TemplateId> {
        match *self {
            Value::Template(id) => Some(id),
            _ => None,
        }
    }

    /// Convert a plain (reference-free) YAML scalar or container.
    ///
    /// Used for class defaults, which never contain template references.
    pub fn from_plain_yaml(raw: &YamlValue) -> Value {
        match raw {
            YamlValue::Null => Value::Null,
            YamlValue::Bool(b) => Value::Bool(*b),
            YamlValue::Number(n) => number_value(n),
            YamlValue::String(s) => Value::Str(s.clone()),
            YamlValue::Sequence(items) => Value::List(items.iter().map(Value::from_plain_yaml).collect()),
            YamlValue::Mapping(map) => Value::Map(
                map.iter()
                    .filter_map(|(k, v)| scalar_key(k).map(|k| (k, Value::from_plain_yaml(v))))
                    .collect(),
            ),
            YamlValue::Tagged(tagged) => Value::from_plain_yaml(&tagged.value),
        }
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<Option<f64>> for Value {
    fn from(x: Option<f64>) -> Self {
        x.map(Value::Float).unwrap_or(Value::Null)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

pub(crate) fn number_value(n: &serde_yaml::Number) -> Value {
    if let Some(i) = n.as_i64() {
        Value::Int(i)
    } else {
        Value::Float(n.as_f64().unwrap_or(f64::NAN))
    }
}

/// Mapping keys must be scalars; they are stringified
pub(crate) fn scalar_key(key: &YamlValue) -> Option<String> {
    match key {
        YamlValue::String(s) => Some(s.clone()),
        YamlValue::Number(n) => Some(n.to_string()),
        YamlValue::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_views() {
        assert_eq!(Value::Int(3).as_f64(), Some(3.0));
        assert_eq!(Value::Float(2.0).as_i64(), Some(2));
        assert_eq!(Value::Float(2.5).as_i64(), None);
        assert_eq!(Value::Str("x".into()).as_f64(), None);
    }

    #[test]
    fn test_plain_yaml_conversion() {
        let raw: YamlValue = serde_yaml::from_str("{a: 1, b: [true, 2.5], c: ~}").unwrap();
        let value = Value::from_plain_yaml(&raw);
        let map = value.as_map().unwrap();
        assert_eq!(map["a"], Value::Int(1));
        assert_eq!(map["b"], Value::List(vec![Value::Bool(true), Value::Float(2.5)]));
        assert!(map["c"].is_null());
    }
}
