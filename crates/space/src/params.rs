//! Parameter domains and concrete configurations.

use crate::product::ConfigurationIter;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use thiserror::Error;

/// A single tunable parameter value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl ParamValue {
    /// The value as an integer, if it is one.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            ParamValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// The value as a float; integers widen, booleans do not.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            ParamValue::Int(v) => Some(*v as f64),
            ParamValue::Float(v) => Some(*v),
            ParamValue::Bool(_) => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ParamValue::Bool(v) => Some(*v),
            _ => None,
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Int(v) => write!(f, "{v}"),
            ParamValue::Float(v) => write!(f, "{v}"),
            ParamValue::Bool(v) => write!(f, "{v}"),
        }
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        ParamValue::Int(v)
    }
}

impl From<i32> for ParamValue {
    fn from(v: i32) -> Self {
        ParamValue::Int(v as i64)
    }
}

impl From<usize> for ParamValue {
    fn from(v: usize) -> Self {
        ParamValue::Int(v as i64)
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        ParamValue::Float(v)
    }
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        ParamValue::Bool(v)
    }
}

#[derive(Debug, Error)]
pub enum SpaceError {
    #[error("duplicate tunable parameter {0:?}")]
    DuplicateParameter(String),
    #[error("tunable parameter {0:?} has no candidate values")]
    EmptyValueList(String),
}

/// Ordered mapping from parameter name to its candidate values.
///
/// The declaration order is significant: it fixes both the order in which
/// values appear in a configuration's canonical identity and the enumeration
/// order of the cartesian product.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParameterDomain {
    entries: Vec<(String, Vec<ParamValue>)>,
}

impl ParameterDomain {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Add a parameter with its candidate values.
    pub fn param<N, V, I>(mut self, name: N, values: I) -> Self
    where
        N: Into<String>,
        V: Into<ParamValue>,
        I: IntoIterator<Item = V>,
    {
        self.entries.push((
            name.into(),
            values.into_iter().map(Into::into).collect(),
        ));
        self
    }

    /// Check that every name is unique and every value list non-empty.
    pub fn validate(&self) -> Result<(), SpaceError> {
        let mut seen = HashSet::new();
        for (name, values) in &self.entries {
            if !seen.insert(name.as_str()) {
                return Err(SpaceError::DuplicateParameter(name.clone()));
            }
            if values.is_empty() {
                return Err(SpaceError::EmptyValueList(name.clone()));
            }
        }
        Ok(())
    }

    /// Number of declared parameters.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total number of configurations in the cartesian product, or `None`
    /// on overflow.
    pub fn cardinality(&self) -> Option<usize> {
        let mut total: usize = 1;
        for (_, values) in &self.entries {
            total = total.checked_mul(values.len())?;
        }
        Some(total)
    }

    pub fn entries(&self) -> &[(String, Vec<ParamValue>)] {
        &self.entries
    }

    /// Lazy iterator over every configuration in the product, in declaration
    /// order with the last parameter varying fastest.
    pub fn configurations(&self) -> ConfigurationIter<'_> {
        ConfigurationIter::new(self)
    }
}

/// One concrete assignment of a value to every tunable parameter, in the
/// domain's declaration order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Configuration {
    entries: Vec<(String, ParamValue)>,
}

impl Configuration {
    pub fn new(entries: Vec<(String, ParamValue)>) -> Self {
        Self { entries }
    }

    /// Build from name/value pairs, converting values.
    pub fn from_pairs<N, V, I>(pairs: I) -> Self
    where
        N: Into<String>,
        V: Into<ParamValue>,
        I: IntoIterator<Item = (N, V)>,
    {
        Self {
            entries: pairs
                .into_iter()
                .map(|(n, v)| (n.into(), v.into()))
                .collect(),
        }
    }

    pub fn get(&self, name: &str) -> Option<ParamValue> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| *v)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, ParamValue)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), *v))
    }

    /// Canonical identity: the values rendered in order, joined with `_`.
    ///
    /// Used as the result-table key and in log lines. Two configurations of
    /// the same domain always render distinct identities.
    pub fn instance_string(&self) -> String {
        self.entries
            .iter()
            .map(|(_, v)| v.to_string())
            .collect::<Vec<_>>()
            .join("_")
    }
}

impl fmt::Display for Configuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (name, value)) in self.entries.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{name}={value}")?;
        }
        Ok(())
    }
}
