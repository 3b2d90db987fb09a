// src/model/state.rs

use crate::model::parameters::ParameterSet;
use crate::model::queues::TimeDelayQueue;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Quantities carried from one simulated day to the next.
///
/// Owned by the orchestrator; the day calculator takes it by reference and
/// hands back an updated copy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayState {
    pub day: usize,
    pub finished_goods: f64,
    pub raw_materials: f64,
    /// Raw-material orders still travelling from the supplier.
    pub material_pipeline: TimeDelayQueue,
}

impl DayState {
    pub fn new(finished_goods: f64, raw_materials: f64, lead_time_days: usize) -> Self {
        Self {
            day: 0,
            finished_goods: finished_goods.max(0.0),
            raw_materials: raw_materials.max(0.0),
            material_pipeline: TimeDelayQueue::new(lead_time_days),
        }
    }
}

/// How trustworthy a day's numbers are.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QualityFlag {
    Ok,
    Corrected,
    Incomplete,
    Invalid,
    Error,
}

impl QualityFlag {
    pub const ALL: [QualityFlag; 5] = [
        QualityFlag::Ok,
        QualityFlag::Corrected,
        QualityFlag::Incomplete,
        QualityFlag::Invalid,
        QualityFlag::Error,
    ];

    pub fn needs_repair(self) -> bool {
        matches!(self, QualityFlag::Incomplete | QualityFlag::Invalid)
    }
}

impl fmt::Display for QualityFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            QualityFlag::Ok => "OK",
            QualityFlag::Corrected => "CORRECTED",
            QualityFlag::Incomplete => "INCOMPLETE",
            QualityFlag::Invalid => "INVALID",
            QualityFlag::Error => "ERROR",
        };
        f.write_str(s)
    }
}

/// Everything computed for one simulated day.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DayResult {
    pub day: usize,
    pub date: NaiveDate,
    pub demand_mean: f64,
    pub demand_std: f64,
    pub values: ParameterSet,
    pub quality: QualityFlag,
    pub corrections: Vec<String>,
}

impl DayResult {
    pub fn value(&self, code: &str) -> Option<f64> {
        self.values.get(code)
    }
}
