// src/simulation/engine.rs

use crate::demand::distribution::{mean, population_std};
use crate::demand::model::{DemandConfig, DemandGenerator};
use crate::error::{EngineError, Result};
use crate::io::answers::Answer;
use crate::io::extractor::{Extraction, VariableExtractor};
use crate::io::store::ResultStore;
use crate::model::parameters::ParameterSet;
use crate::model::state::{DayResult, DayState, QualityFlag};
use crate::model::variables::{
    Catalog, DDP, DE, DH, DI, DPH, DSD, FU, IIMP, IIPF, IMP, IPF, NSC, PE, QPL, RMR, TE, TPV,
};
use crate::simulation::calculator::DayCalculator;
use crate::simulation::config::SimulationConfig;
use crate::simulation::optimization::effective_lead_time;
use crate::simulation::report::{PersistenceSummary, SimulationReport};
use tracing::{debug, error, info, warn};

/// Attempts per day result once its batch has failed.
pub const ITEM_WRITE_ATTEMPTS: usize = 2;

/// Runs one simulation: owns the parameters, the carried day state and the
/// history of results for that run only.
pub struct SimulationEngine<S: ResultStore> {
    config: SimulationConfig,
    parameters: ParameterSet,
    demand: DemandConfig,
    calculator: DayCalculator,
    store: S,

    pub history: Vec<DayResult>,
    persistence: PersistenceSummary,
}

impl<S: ResultStore> SimulationEngine<S> {
    /// Validates the configuration and fits the demand model.
    ///
    /// These are the only hard failures: an invalid config or a demand
    /// history with no usable point.
    pub fn new(config: SimulationConfig, parameters: ParameterSet, store: S) -> Result<Self> {
        config.validate()?;
        let history = parameters
            .series(DH)
            .ok_or(EngineError::EmptyDemandHistory)?;
        let demand = DemandConfig::fit(history, config.distribution)?;
        let calculator = DayCalculator::new(Catalog::standard(), &config);

        Ok(Self {
            config,
            parameters,
            demand,
            calculator,
            store,
            history: Vec::new(),
            persistence: PersistenceSummary::default(),
        })
    }

    /// Extracts parameters from questionnaire answers, then builds the engine.
    pub fn from_answers(
        config: SimulationConfig,
        answers: &[Answer],
        store: S,
    ) -> Result<(Self, Extraction)> {
        let extraction = VariableExtractor::new(Catalog::standard()).extract(answers);
        let engine = Self::new(config, extraction.parameters.clone(), store)?;
        Ok((engine, extraction))
    }

    /// Simulates every day of the horizon and returns the aggregate report.
    ///
    /// A failing day never stops the run; it is replaced by a fallback result.
    /// Each call starts from the opening stock again.
    pub fn run(&mut self) -> Result<SimulationReport> {
        self.history.clear();
        self.persistence = PersistenceSummary::default();

        let mut generator = DemandGenerator::new(self.demand.clone(), self.config.random_seed);
        let mut working = self.parameters.clone();
        let lead_time = effective_lead_time(self.parameters.get_or(TE, 1.0));
        let mut state = DayState::new(
            self.parameters.get_or(IIPF, 0.0),
            self.parameters.get_or(IIMP, 0.0),
            lead_time,
        );
        let mut unflushed = 0;

        info!(
            days = self.config.horizon_days,
            distribution = %self.config.distribution,
            seed = ?self.config.random_seed,
            "simulation started"
        );

        for day in 1..=self.config.horizon_days {
            let demand = generator.next_demand(day);
            state = self.step(day, demand, &state, &mut working);
            unflushed += 1;

            if unflushed >= self.config.batch_size {
                self.flush(unflushed);
                unflushed = 0;
            }
        }
        if unflushed > 0 {
            self.flush(unflushed);
        }

        let report = SimulationReport::build(
            &self.history,
            self.calculator.catalog(),
            self.demand.clone(),
            self.persistence,
        );
        if let Err(e) = self.store.write_report(&report) {
            error!(error = %e, "report could not be persisted");
        }

        info!(
            days = report.days,
            profit = report.financial.total_profit,
            errors = report.count(QualityFlag::Error),
            dropped = report.persistence.dropped,
            "simulation finished"
        );
        Ok(report)
    }

    fn step(
        &mut self,
        day: usize,
        demand: f64,
        state: &DayState,
        working: &mut ParameterSet,
    ) -> DayState {
        // =================================================================
        // PHASE 1: COMPUTE
        // =================================================================
        let (mut result, mut next) = match self.calculator.compute_day(demand, state, working) {
            Ok(computed) => computed,
            Err(e) => {
                warn!(day, error = %e, "day computation failed, using fallback");
                self.fallback(day, demand, state, working, &e)
            }
        };

        // =================================================================
        // PHASE 2: REPAIR
        // Missing or non-finite values take yesterday's value, decayed.
        // =================================================================
        if result.quality.needs_repair() {
            let offending = self.calculator.offending_codes(&result.values);
            repair(
                &mut result,
                self.history.last(),
                &offending,
                self.config.repair_decay,
            );
            next.finished_goods = result.values.get_or(IPF, next.finished_goods).max(0.0);
            next.raw_materials = result.values.get_or(IMP, next.raw_materials).max(0.0);
        }

        // =================================================================
        // PHASE 3: RECORD & ADVANCE
        // =================================================================
        let drawn = result.value(DDP).unwrap_or(demand);
        working.push_to_series(DH, drawn);

        if day % 5 == 0 {
            info!(
                day,
                stock = next.finished_goods,
                sold = result.value(TPV).unwrap_or(0.0),
                quality = %result.quality,
                "progress"
            );
        }
        self.history.push(result);
        next
    }

    /// Minimal day built from demand alone after the calculator failed.
    fn fallback(
        &self,
        day: usize,
        demand: f64,
        state: &DayState,
        working: &ParameterSet,
        cause: &EngineError,
    ) -> (DayResult, DayState) {
        let demand = if demand.is_finite() && demand >= 0.0 {
            demand
        } else {
            self.demand.mean
        };
        let history = working.series(DH).unwrap_or(&[]);
        let window = &history[history.len().saturating_sub(self.config.trailing_window)..];
        let demand_mean = if window.is_empty() {
            demand
        } else {
            mean(window)
        };
        let demand_std = population_std(window);

        let mut pipeline = state.material_pipeline.clone();
        let received = pipeline.pop_arrival();
        pipeline.push_departure(0.0);

        let sold = demand.min(state.finished_goods);
        let stock = state.finished_goods - sold;
        let raw = state.raw_materials + received;

        let mut values = ParameterSet::new();
        values.set(DPH, demand_mean);
        values.set(DSD, demand_std);
        values.set(DDP, demand);
        values.set(DE, demand);
        values.set(QPL, 0.0);
        values.set(PE, 0.0);
        values.set(FU, 0.0);
        values.set(TPV, sold);
        values.set(DI, demand - sold);
        values.set(NSC, if demand > 0.0 { sold / demand } else { 0.0 });
        values.set(IPF, stock);
        values.set(IMP, raw);
        values.set(RMR, received);

        let result = DayResult {
            day,
            date: self.calculator.date_for(day),
            demand_mean,
            demand_std,
            values,
            quality: QualityFlag::Error,
            corrections: vec![format!("fallback after error: {cause}")],
        };
        let next = DayState {
            day,
            finished_goods: stock,
            raw_materials: raw,
            material_pipeline: pipeline,
        };
        (result, next)
    }

    /// Hands the last `count` results to the store, one batch at a time.
    fn flush(&mut self, count: usize) {
        let start = self.history.len().saturating_sub(count);
        let batch = &self.history[start..];

        match self.store.write_batch(batch) {
            Ok(()) => {
                self.persistence.written += batch.len();
                debug!(size = batch.len(), "batch persisted");
            }
            Err(e) => {
                warn!(error = %e, size = batch.len(), "batch write failed, writing items one by one");
                for result in batch {
                    let mut stored = false;
                    for attempt in 1..=ITEM_WRITE_ATTEMPTS {
                        match self.store.write_one(result) {
                            Ok(()) => {
                                stored = true;
                                break;
                            }
                            Err(e) => debug!(day = result.day, attempt, error = %e, "item write failed"),
                        }
                    }
                    if stored {
                        self.persistence.written += 1;
                    } else {
                        error!(day = result.day, "day result dropped after retries");
                        self.persistence.dropped += 1;
                    }
                }
            }
        }
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }
}

/// Replaces each of `codes` with the previous day's value times `decay`
/// (0 when there is no previous value) and marks the day corrected.
pub fn repair(result: &mut DayResult, previous: Option<&DayResult>, codes: &[&str], decay: f64) {
    for code in codes {
        let replacement = previous
            .and_then(|p| p.value(code))
            .filter(|v| v.is_finite())
            .map_or(0.0, |v| v * decay);
        result.corrections.push(format!(
            "{code} repaired from previous day: {replacement}"
        ));
        result.values.set(code, replacement);
    }
    result.quality = QualityFlag::Corrected;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::store::MemoryStore;
    use crate::model::variables::{IT, PVP};
    use chrono::NaiveDate;

    fn result(day: usize, values: &[(&str, f64)], quality: QualityFlag) -> DayResult {
        DayResult {
            day,
            date: NaiveDate::from_ymd_opt(2024, 2, day as u32).unwrap(),
            demand_mean: 0.0,
            demand_std: 0.0,
            values: values.iter().map(|(c, v)| (c.to_string(), *v)).collect(),
            quality,
            corrections: Vec::new(),
        }
    }

    #[test]
    fn test_repair_uses_decayed_previous_value() {
        let previous = result(1, &[(IPF, 1000.0), (NSC, 0.8)], QualityFlag::Ok);
        let mut today = result(2, &[(IPF, f64::NAN)], QualityFlag::Invalid);

        repair(&mut today, Some(&previous), &[IPF, NSC], 0.95);

        assert_eq!(today.quality, QualityFlag::Corrected);
        assert_eq!(today.value(IPF), Some(950.0));
        assert!((today.value(NSC).unwrap() - 0.76).abs() < 1e-12);
        assert_eq!(today.corrections.len(), 2);
    }

    #[test]
    fn test_repair_without_previous_day_uses_zero() {
        let mut today = result(1, &[], QualityFlag::Incomplete);
        repair(&mut today, None, &[TPV], 0.95);
        assert_eq!(today.value(TPV), Some(0.0));
        assert_eq!(today.quality, QualityFlag::Corrected);
    }

    fn defaults() -> ParameterSet {
        let mut p = ParameterSet::new();
        for spec in Catalog::standard().inputs() {
            if let Some(default) = spec.default {
                p.set(spec.code, default);
            }
        }
        p.set_series(DH, vec![2500.0; 14]);
        p.set(IIPF, 2500.0);
        p.set(IIMP, 10000.0);
        p
    }

    fn seeded(days: usize) -> SimulationConfig {
        SimulationConfig {
            horizon_days: days,
            random_seed: Some(17),
            ..Default::default()
        }
    }

    #[test]
    fn test_overflowing_revenue_is_repaired_during_run() {
        let mut parameters = defaults();
        parameters.set(PVP, 1e308);
        let mut engine = SimulationEngine::new(seeded(3), parameters, MemoryStore::new()).unwrap();
        let report = engine.run().unwrap();

        assert_eq!(report.count(QualityFlag::Corrected), 3);
        assert_eq!(report.count(QualityFlag::Invalid), 0);
        for day in &engine.history {
            assert_eq!(day.value(IT), Some(0.0), "day {}", day.day);
            assert!(day
                .corrections
                .iter()
                .any(|c| c.starts_with("IT repaired from previous day")));
            assert!(day.values.scalars().all(|(_, v)| v.is_finite()));
        }
    }

    #[test]
    fn test_repaired_stock_is_carried_into_next_day() {
        let parameters = defaults();
        let mut engine =
            SimulationEngine::new(seeded(2), parameters.clone(), MemoryStore::new()).unwrap();
        let mut working = parameters;

        let opening = DayState::new(2500.0, 10000.0, 3);
        let after_first = engine.step(1, 2500.0, &opening, &mut working);
        let first_stock = engine.history[0].value(IPF).unwrap();
        assert_eq!(after_first.finished_goods, first_stock);

        // Unbounded opening stock leaves IPF undefined after spoilage
        let broken = DayState {
            finished_goods: f64::INFINITY,
            ..after_first
        };
        let after_second = engine.step(2, 2500.0, &broken, &mut working);
        let second = &engine.history[1];

        assert_eq!(second.quality, QualityFlag::Corrected);
        let repaired = first_stock * 0.95;
        assert!((second.value(IPF).unwrap() - repaired).abs() < 1e-9);
        assert!((after_second.finished_goods - repaired).abs() < 1e-9);
        assert!(second.corrections.iter().any(|c| c.starts_with("IPF repaired")));
        assert_eq!(working.series(DH).map(<[f64]>::len), Some(16));
    }

    #[test]
    fn test_missing_history_fails_before_the_loop() {
        let mut parameters = ParameterSet::new();
        parameters.set(IIPF, 100.0);
        assert!(matches!(
            SimulationEngine::new(SimulationConfig::default(), parameters, MemoryStore::new()),
            Err(EngineError::EmptyDemandHistory)
        ));
    }

    #[test]
    fn test_failing_days_fall_back_and_run_continues() {
        // No price: every day fails in the calculator
        let mut parameters = ParameterSet::new();
        parameters.set_series(DH, vec![100.0; 10]);
        parameters.set(IIPF, 250.0);
        let config = SimulationConfig {
            horizon_days: 5,
            random_seed: Some(3),
            ..Default::default()
        };
        let mut engine = SimulationEngine::new(config, parameters, MemoryStore::new()).unwrap();
        let report = engine.run().unwrap();

        assert_eq!(report.days, 5);
        assert_eq!(report.count(QualityFlag::Error), 5);
        assert!(engine.history.iter().all(|r| r.corrections[0].contains("PVP")));
        // Stock is sold down but never below zero
        for r in &engine.history {
            assert!(r.value(IPF).unwrap() >= 0.0);
        }
        assert_eq!(engine.store().days.len(), 5);
    }
}
