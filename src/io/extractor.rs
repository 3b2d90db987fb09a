// src/io/extractor.rs

//! Turns free-form questionnaire answers into a complete, validated parameter set.
//!
//! Pipeline: resolve each answer to a variable code (explicit association first,
//! then alias matching), parse its value, fill every remaining input with its
//! documented default, apply a few cross-variable adjustments to those defaults,
//! then clamp everything into range. Nothing here fails: every recoverable
//! problem becomes a `Diagnostic`.

use crate::demand::distribution::mean;
use crate::io::answers::{Answer, AnswerValue};
use crate::model::parameters::ParameterSet;
use crate::model::variables::{
    Catalog, VariableKind, VariableSpec, CPROD, DH, GO, IIMP, IIPF, NEPP, NMD,
};
use serde::Serialize;
use std::collections::BTreeSet;
use tracing::debug;

/// Average units bought per customer, used to derive a customer count from demand.
pub const UNITS_PER_CUSTOMER: f64 = 20.0;
/// Days of raw-material cover assumed for a defaulted opening raw stock.
pub const RAW_COVER_DAYS: f64 = 4.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DiagnosticKind {
    /// No variable could be matched to the answer label.
    Unmatched,
    /// The value could not be parsed and was dropped.
    Unparsed,
    /// A second answer for an already-resolved variable was ignored.
    Duplicate,
    /// A list was given for a scalar variable; the first element was kept.
    Truncated,
    /// A percentage was converted to a fraction.
    Normalized,
    Defaulted,
    Adjusted,
    Clamped,
    /// Required input with no default available.
    Missing,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostic {
    pub code: Option<String>,
    pub kind: DiagnosticKind,
    pub message: String,
}

impl Diagnostic {
    fn new(code: Option<&str>, kind: DiagnosticKind, message: String) -> Self {
        Self {
            code: code.map(str::to_string),
            kind,
            message,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Extraction {
    pub parameters: ParameterSet,
    pub diagnostics: Vec<Diagnostic>,
    /// Codes that came from an answer rather than a default.
    pub provided: BTreeSet<String>,
}

impl Extraction {
    pub fn count(&self, kind: DiagnosticKind) -> usize {
        self.diagnostics.iter().filter(|d| d.kind == kind).count()
    }

    pub fn has(&self, code: &str, kind: DiagnosticKind) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.kind == kind && d.code.as_deref() == Some(code))
    }
}

enum Parsed {
    Scalar(f64),
    Series(Vec<f64>),
}

pub struct VariableExtractor {
    catalog: Catalog,
}

impl VariableExtractor {
    pub fn new(catalog: Catalog) -> Self {
        Self { catalog }
    }

    pub fn extract(&self, answers: &[Answer]) -> Extraction {
        let mut parameters = ParameterSet::new();
        let mut diagnostics = Vec::new();
        let mut provided = BTreeSet::new();

        for answer in answers {
            let Some(spec) = self.resolve(answer) else {
                diagnostics.push(Diagnostic::new(
                    None,
                    DiagnosticKind::Unmatched,
                    format!("no variable matches '{}'", answer.label),
                ));
                continue;
            };

            if provided.contains(spec.code) {
                diagnostics.push(Diagnostic::new(
                    Some(spec.code),
                    DiagnosticKind::Duplicate,
                    format!("'{}' ignored, {} already answered", answer.label, spec.code),
                ));
                continue;
            }

            let Some(value) = &answer.value else {
                continue;
            };

            match self.parse(spec, value, &mut diagnostics) {
                Some(Parsed::Scalar(v)) => {
                    parameters.set(spec.code, v);
                    provided.insert(spec.code.to_string());
                }
                Some(Parsed::Series(s)) => {
                    parameters.set_series(spec.code, s);
                    provided.insert(spec.code.to_string());
                }
                None => diagnostics.push(Diagnostic::new(
                    Some(spec.code),
                    DiagnosticKind::Unparsed,
                    format!("could not read a number from {:?}", value),
                )),
            }
        }

        let defaulted = self.apply_defaults(&mut parameters, &mut diagnostics);
        self.apply_context(&mut parameters, &provided, &defaulted, &mut diagnostics);
        self.validate(&mut parameters, &mut diagnostics);

        debug!(
            provided = provided.len(),
            defaulted = defaulted.len(),
            diagnostics = diagnostics.len(),
            "answers extracted"
        );

        Extraction {
            parameters,
            diagnostics,
            provided,
        }
    }

    fn resolve(&self, answer: &Answer) -> Option<&'static VariableSpec> {
        if let Some(code) = &answer.variable {
            if let Some(spec) = self.catalog.spec(code.trim()).filter(|s| s.input) {
                return Some(spec);
            }
        }
        self.catalog.match_alias(&answer.label)
    }

    fn parse(
        &self,
        spec: &VariableSpec,
        value: &AnswerValue,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Option<Parsed> {
        if spec.kind == VariableKind::Series {
            let series = match value {
                AnswerValue::Number(v) => vec![*v],
                AnswerValue::List(vs) => vs.clone(),
                AnswerValue::Text(t) => parse_list(t)?,
            };
            let series: Vec<f64> = series.into_iter().filter(|v| v.is_finite()).collect();
            return if series.is_empty() {
                None
            } else {
                Some(Parsed::Series(series))
            };
        }

        let (number, percent) = match value {
            AnswerValue::Number(v) => (*v, false),
            AnswerValue::List(vs) => {
                let first = *vs.first()?;
                if vs.len() > 1 {
                    diagnostics.push(Diagnostic::new(
                        Some(spec.code),
                        DiagnosticKind::Truncated,
                        format!("list of {} given, kept first value", vs.len()),
                    ));
                }
                (first, false)
            }
            AnswerValue::Text(t) => {
                let percent = t.contains('%');
                if looks_like_list(t) {
                    let items = parse_list(t)?;
                    if items.len() > 1 {
                        diagnostics.push(Diagnostic::new(
                            Some(spec.code),
                            DiagnosticKind::Truncated,
                            format!("list of {} given, kept first value", items.len()),
                        ));
                    }
                    (*items.first()?, percent)
                } else {
                    (parse_number(t)?, percent)
                }
            }
        };

        if !number.is_finite() {
            return None;
        }

        // Ratios given as percentages
        if spec.kind == VariableKind::Ratio && (number > 1.0 || percent) {
            let normalized = number / 100.0;
            diagnostics.push(Diagnostic::new(
                Some(spec.code),
                DiagnosticKind::Normalized,
                format!("{number} read as a percentage ({normalized})"),
            ));
            return Some(Parsed::Scalar(normalized));
        }

        Some(Parsed::Scalar(number))
    }

    /// Fills every input still absent. Returns the codes that were defaulted.
    fn apply_defaults(
        &self,
        parameters: &mut ParameterSet,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> BTreeSet<String> {
        let mut defaulted = BTreeSet::new();
        for spec in self.catalog.inputs() {
            if parameters.contains(spec.code) {
                continue;
            }
            match spec.default {
                Some(default) => {
                    parameters.set(spec.code, default);
                    defaulted.insert(spec.code.to_string());
                    diagnostics.push(Diagnostic::new(
                        Some(spec.code),
                        DiagnosticKind::Defaulted,
                        format!("{} defaulted to {default}", spec.name),
                    ));
                }
                None => diagnostics.push(Diagnostic::new(
                    Some(spec.code),
                    DiagnosticKind::Missing,
                    format!("{} was not answered and has no default", spec.name),
                )),
            }
        }
        defaulted
    }

    /// Scales some defaults by answered values. Only defaulted codes are
    /// written and only answered codes are read, so the order does not matter.
    fn apply_context(
        &self,
        parameters: &mut ParameterSet,
        provided: &BTreeSet<String>,
        defaulted: &BTreeSet<String>,
        diagnostics: &mut Vec<Diagnostic>,
    ) {
        let answered = |code: &str| -> Option<f64> {
            if provided.contains(code) {
                parameters.get(code)
            } else {
                None
            }
        };
        let default_of = |code: &str| -> f64 {
            self.catalog
                .spec(code)
                .and_then(|s| s.default)
                .unwrap_or(0.0)
        };

        let staff = answered(NEPP);
        let capacity = answered(CPROD);
        let history_mean = if provided.contains(DH) {
            parameters.series(DH).map(mean)
        } else {
            None
        };

        let mut adjustments: Vec<(&str, f64, &str)> = Vec::new();

        if let Some(staff) = staff {
            adjustments.push((
                CPROD,
                default_of(CPROD) * staff / default_of(NEPP),
                "scaled by production staff",
            ));
        }
        match (staff, capacity) {
            (Some(staff), _) => adjustments.push((
                GO,
                default_of(GO) * staff / default_of(NEPP),
                "scaled by production staff",
            )),
            (None, Some(capacity)) => adjustments.push((
                GO,
                default_of(GO) * capacity / default_of(CPROD),
                "scaled by production capacity",
            )),
            (None, None) => {}
        }
        if let Some(m) = history_mean {
            adjustments.push((
                NMD,
                (m / UNITS_PER_CUSTOMER).round().max(1.0),
                "derived from mean demand",
            ));
            adjustments.push((IIPF, m, "one day of mean demand"));
            adjustments.push((IIMP, m * RAW_COVER_DAYS, "days of mean demand"));
        }

        for (code, value, reason) in adjustments {
            if !defaulted.contains(code) || !value.is_finite() {
                continue;
            }
            parameters.set(code, value);
            diagnostics.push(Diagnostic::new(
                Some(code),
                DiagnosticKind::Adjusted,
                format!("default {reason}: {value}"),
            ));
        }
    }

    fn validate(&self, parameters: &mut ParameterSet, diagnostics: &mut Vec<Diagnostic>) {
        for spec in self.catalog.inputs() {
            if spec.kind == VariableKind::Series {
                if let Some(series) = parameters.series(spec.code) {
                    let cleaned: Vec<f64> = series.iter().map(|v| v.max(0.0)).collect();
                    if cleaned.as_slice() != series {
                        diagnostics.push(Diagnostic::new(
                            Some(spec.code),
                            DiagnosticKind::Clamped,
                            "negative demand points set to 0".to_string(),
                        ));
                        parameters.set_series(spec.code, cleaned);
                    }
                }
                continue;
            }
            let Some(value) = parameters.get(spec.code) else {
                continue;
            };
            let clamped = spec.clamp(value);
            if clamped != value {
                diagnostics.push(Diagnostic::new(
                    Some(spec.code),
                    DiagnosticKind::Clamped,
                    format!("{value} clamped to {clamped}"),
                ));
                parameters.set(spec.code, clamped);
            }
        }
    }
}

impl Default for VariableExtractor {
    fn default() -> Self {
        Self::new(Catalog::standard())
    }
}

/// True when a comma string is one number with thousands separators ("1,500.00").
fn is_thousands_grouped(text: &str) -> bool {
    let parts: Vec<&str> = text.split(',').collect();
    if parts.len() < 2 {
        return false;
    }
    let head_digits = parts[0]
        .chars()
        .rev()
        .take_while(|c| c.is_ascii_digit())
        .count();
    if head_digits == 0 || head_digits > 3 {
        return false;
    }
    let last = parts.len() - 2;
    parts[1..].iter().enumerate().all(|(i, part)| {
        let digits = part.chars().take_while(|c| c.is_ascii_digit()).count();
        digits == 3 && (i == last || part.len() == 3)
    })
}

fn is_plain_number(token: &str) -> bool {
    token.parse::<f64>().is_ok()
}

/// Bracketed, line/semicolon separated, comma separated (not thousands), or
/// several whitespace-separated plain numbers.
pub fn looks_like_list(text: &str) -> bool {
    let t = text.trim();
    if t.starts_with('[') && t.ends_with(']') {
        return true;
    }
    if t.contains('\n') || t.contains(';') {
        return true;
    }
    if t.contains(',') {
        return !is_thousands_grouped(t);
    }
    let tokens: Vec<&str> = t.split_whitespace().collect();
    tokens.len() > 1 && tokens.iter().all(|tok| is_plain_number(tok))
}

/// Every number found in a list-shaped string; unreadable items are skipped.
pub fn parse_list(text: &str) -> Option<Vec<f64>> {
    let inner = text.trim().trim_start_matches('[').trim_end_matches(']');
    let values: Vec<f64> = inner
        .split(|c: char| c == ',' || c == ';' || c.is_whitespace())
        .filter(|tok| !tok.is_empty())
        .filter_map(parse_number)
        .collect();
    if values.is_empty() {
        None
    } else {
        Some(values)
    }
}

/// First number embedded in `text`, ignoring currency symbols, units and
/// thousands separators.
pub fn parse_number(text: &str) -> Option<f64> {
    let chars: Vec<char> = text.chars().collect();
    let is_digit = |i: usize| chars.get(i).is_some_and(|c| c.is_ascii_digit());

    let start = (0..chars.len()).find(|&i| {
        let c = chars[i];
        c.is_ascii_digit() || ((c == '-' || c == '.') && is_digit(i + 1))
            || (c == '-' && chars.get(i + 1) == Some(&'.') && is_digit(i + 2))
    })?;

    let mut out = String::new();
    let mut seen_dot = false;
    let mut i = start;
    if chars[i] == '-' {
        out.push('-');
        i += 1;
    }
    while i < chars.len() {
        let c = chars[i];
        if c.is_ascii_digit() {
            out.push(c);
        } else if c == '.' && !seen_dot && is_digit(i + 1) {
            seen_dot = true;
            out.push(c);
        } else if c == ','
            && !seen_dot
            && (1..=3).all(|k| is_digit(i + k))
            && !is_digit(i + 4)
        {
            // thousands separator
        } else {
            break;
        }
        i += 1;
    }

    out.parse::<f64>().ok().filter(|v| v.is_finite())
}
