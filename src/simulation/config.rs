// src/simulation/config.rs

use crate::demand::distribution::DistributionKind;
use crate::error::{EngineError, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub distribution: DistributionKind,
    pub horizon_days: usize,
    /// Target service level used for the safety-stock z-factor.
    pub confidence_level: f64,
    pub random_seed: Option<u64>,
    /// Date of day 1; today when absent.
    pub start_date: Option<NaiveDate>,
    /// Day results handed to the store per write.
    pub batch_size: usize,
    pub max_iterations: usize,
    pub tolerance: f64,
    /// Multiplier applied to the previous day's value when repairing a day.
    pub repair_decay: f64,
    /// Days of demand used for the per-day mean and deviation.
    pub trailing_window: usize,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            distribution: DistributionKind::Normal,
            horizon_days: 30,
            confidence_level: 0.95,
            random_seed: None,
            start_date: None,
            batch_size: 10,
            max_iterations: 10,
            tolerance: 1e-6,
            repair_decay: 0.95,
            trailing_window: 14,
        }
    }
}

impl SimulationConfig {
    /// Reads a TOML file; missing keys keep their defaults.
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let raw = fs::read_to_string(path)?;
        let config: SimulationConfig = toml::from_str(&raw)?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.horizon_days == 0 {
            return Err(EngineError::InvalidConfig(
                "horizon_days must be at least 1".into(),
            ));
        }
        if !(self.confidence_level > 0.0 && self.confidence_level < 1.0) {
            return Err(EngineError::InvalidConfig(format!(
                "confidence_level {} must lie strictly between 0 and 1",
                self.confidence_level
            )));
        }
        if self.batch_size == 0 {
            return Err(EngineError::InvalidConfig(
                "batch_size must be at least 1".into(),
            ));
        }
        if !(self.tolerance > 0.0) {
            return Err(EngineError::InvalidConfig(format!(
                "tolerance {} must be positive",
                self.tolerance
            )));
        }
        if !(self.repair_decay > 0.0 && self.repair_decay <= 1.0) {
            return Err(EngineError::InvalidConfig(format!(
                "repair_decay {} must lie in (0, 1]",
                self.repair_decay
            )));
        }
        Ok(())
    }

    pub fn start_date(&self) -> NaiveDate {
        self.start_date
            .unwrap_or_else(|| chrono::Local::now().date_naive())
    }
}
