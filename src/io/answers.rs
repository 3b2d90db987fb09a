// src/io/answers.rs

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Raw value of a questionnaire answer, as the external store hands it over.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnswerValue {
    Number(f64),
    List(Vec<f64>),
    Text(String),
}

/// One questionnaire answer: the question label plus an optional typed value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    pub label: String,
    #[serde(default)]
    pub value: Option<AnswerValue>,
    /// Explicit variable-of-question association, preferred over alias matching.
    #[serde(default, alias = "variable_code")]
    pub variable: Option<String>,
}

impl Answer {
    pub fn text(label: &str, value: &str) -> Self {
        Self {
            label: label.to_string(),
            value: Some(AnswerValue::Text(value.to_string())),
            variable: None,
        }
    }

    pub fn number(label: &str, value: f64) -> Self {
        Self {
            label: label.to_string(),
            value: Some(AnswerValue::Number(value)),
            variable: None,
        }
    }

    pub fn list(label: &str, values: Vec<f64>) -> Self {
        Self {
            label: label.to_string(),
            value: Some(AnswerValue::List(values)),
            variable: None,
        }
    }

    pub fn for_variable(mut self, code: &str) -> Self {
        self.variable = Some(code.to_string());
        self
    }
}

/// Reads a JSON array of answers.
pub fn load_answers<P: AsRef<Path>>(path: P) -> Result<Vec<Answer>> {
    let raw = fs::read_to_string(path)?;
    let answers: Vec<Answer> = serde_json::from_str(&raw)?;
    Ok(answers)
}
