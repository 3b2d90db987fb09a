// src/model/parameters.rs

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A single named value: a plain number, or the one ordered series (demand history).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Scalar(f64),
    Series(Vec<f64>),
}

/// Named-value map for one computation, keyed by variable code.
///
/// Backed by a `BTreeMap` so iteration (and therefore CSV columns, solver
/// fallbacks and report coverage) is deterministic.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParameterSet {
    values: BTreeMap<String, Value>,
}

impl ParameterSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scalar value of `code`. A series answers with its first element.
    pub fn get(&self, code: &str) -> Option<f64> {
        match self.values.get(code)? {
            Value::Scalar(v) => Some(*v),
            Value::Series(s) => s.first().copied(),
        }
    }

    pub fn get_or(&self, code: &str, default: f64) -> f64 {
        self.get(code).unwrap_or(default)
    }

    pub fn series(&self, code: &str) -> Option<&[f64]> {
        match self.values.get(code)? {
            Value::Series(s) => Some(s.as_slice()),
            Value::Scalar(_) => None,
        }
    }

    pub fn set(&mut self, code: &str, value: f64) {
        self.values.insert(code.to_string(), Value::Scalar(value));
    }

    pub fn set_series(&mut self, code: &str, values: Vec<f64>) {
        self.values.insert(code.to_string(), Value::Series(values));
    }

    /// Appends to a series, creating it when absent. A scalar under `code` is replaced.
    pub fn push_to_series(&mut self, code: &str, value: f64) {
        match self.values.get_mut(code) {
            Some(Value::Series(s)) => s.push(value),
            _ => self.set_series(code, vec![value]),
        }
    }

    pub fn contains(&self, code: &str) -> bool {
        self.values.contains_key(code)
    }

    pub fn remove(&mut self, code: &str) -> Option<Value> {
        self.values.remove(code)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Scalar entries only; series are skipped.
    pub fn scalars(&self) -> impl Iterator<Item = (&str, f64)> {
        self.values.iter().filter_map(|(k, v)| match v {
            Value::Scalar(x) => Some((k.as_str(), *x)),
            Value::Series(_) => None,
        })
    }
}

impl FromIterator<(String, f64)> for ParameterSet {
    fn from_iter<I: IntoIterator<Item = (String, f64)>>(iter: I) -> Self {
        let mut set = ParameterSet::new();
        for (k, v) in iter {
            set.values.insert(k, Value::Scalar(v));
        }
        set
    }
}
