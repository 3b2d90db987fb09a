// src/simulation/calculator.rs

//! One simulated day.
//!
//! `compute_day` walks eight fixed phases: demand metrics, production, sales,
//! costs, revenue, inventory, the composite indicators (handed to the equation
//! solver) and a final validation pass. It never touches randomness, so equal
//! inputs give bit-identical results. Failures in the first seven phases are
//! returned as `EngineError` for the orchestrator to absorb.

use crate::demand::distribution::{linear_slope, mean, population_std};
use crate::error::{EngineError, Result};
use crate::model::parameters::ParameterSet;
use crate::model::state::{DayResult, DayState, QualityFlag};
use crate::model::variables::*;
use crate::simulation::config::SimulationConfig;
use crate::simulation::optimization::{
    effective_lead_time, replenishment_order, safety_stock, service_z, target_stock,
};
use crate::solver::equations::{
    composite_registry, global_performance, operational_efficiency, safe_div, utilization,
    COMPOSITE_TARGETS,
};
use crate::solver::registry::EquationRegistry;
use chrono::{Days, NaiveDate};
use tracing::{debug, warn};

/// Points used for the short-term demand trend.
pub const TREND_POINTS: usize = 7;
/// Largest accepted gap between a composite indicator and its defining formula.
pub const FORMULA_TOLERANCE: f64 = 1e-6;
/// Storage cost multiplier for units above warehouse capacity.
pub const OVERSTOCK_PENALTY: f64 = 2.0;

#[derive(Debug)]
pub struct DayCalculator {
    catalog: Catalog,
    registry: EquationRegistry,
    start_date: NaiveDate,
    z_factor: f64,
    trailing_window: usize,
    max_iterations: usize,
    tolerance: f64,
}

impl DayCalculator {
    pub fn new(catalog: Catalog, config: &SimulationConfig) -> Self {
        Self {
            registry: composite_registry(&catalog),
            catalog,
            start_date: config.start_date(),
            z_factor: service_z(config.confidence_level),
            trailing_window: config.trailing_window.max(1),
            max_iterations: config.max_iterations,
            tolerance: config.tolerance,
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Calendar date of the 1-based simulated `day`.
    pub fn date_for(&self, day: usize) -> NaiveDate {
        let offset = day.saturating_sub(1) as u64;
        self.start_date
            .checked_add_days(Days::new(offset))
            .unwrap_or(self.start_date)
    }

    /// Computes the day after `state.day` and the state to carry into the next one.
    ///
    /// `parameters` must hold every catalog input, with `DH` carrying the demand
    /// history plus all earlier draws of this run.
    pub fn compute_day(
        &self,
        demand: f64,
        state: &DayState,
        parameters: &ParameterSet,
    ) -> Result<(DayResult, DayState)> {
        let day = state.day + 1;
        if !demand.is_finite() || demand < 0.0 {
            return Err(EngineError::InvalidDemand { day, value: demand });
        }

        let input = |code: &str| required(parameters, code);
        let pvp = input(PVP)?;
        let cuip = input(CUIP)?;
        let se = input(SE)?;
        let cua = input(CUA)?;
        let ctl = input(CTL)?;
        let go = input(GO)?;
        let cmipf = input(CMIPF)?;
        let cct = input(CCT)?;
        let cprod = input(CPROD)?;
        let nepp = input(NEPP)?;
        let mlp = input(MLP)?;
        let tpe = input(TPE)?;
        let cinsp = input(CINSP)?;
        let qc = input(QC)?;
        let tmp = input(TMP)?;
        let te = input(TE)?;
        let nmd = input(NMD)?;

        let history = parameters
            .series(DH)
            .filter(|h| !h.is_empty())
            .ok_or_else(|| EngineError::MissingParameter {
                code: DH.to_string(),
            })?;

        let mut v: ParameterSet = parameters
            .scalars()
            .map(|(code, value)| (code.to_string(), value))
            .collect();
        let mut pipeline = state.material_pipeline.clone();

        // =================================================================
        // PHASE 1: DEMAND
        // Trailing statistics over history plus earlier draws.
        // =================================================================
        let window = &history[history.len().saturating_sub(self.trailing_window)..];
        let dph = mean(window);
        let dsd = population_std(window);
        let tdm = linear_slope(&window[window.len().saturating_sub(TREND_POINTS)..]);
        let de = (dph + tdm).max(1.0);
        let ddp = demand;
        let vpc = safe_div(dph, nmd);

        v.set(DPH, dph);
        v.set(DSD, dsd);
        v.set(CVD, safe_div(dsd, dph));
        v.set(TDM, tdm);
        v.set(DE, de);
        v.set(DDP, ddp);
        v.set(VPC, vpc);

        // =================================================================
        // PHASE 2: PRODUCTION
        // Raw material ordered TE days ago arrives before the shift starts.
        // =================================================================
        let rmr = pipeline.pop_arrival();
        let ipf0 = state.finished_goods;
        let imp0 = state.raw_materials + rmr;

        let lead = effective_lead_time(te) as f64;
        let zsc = self.z_factor;
        let ssg = safety_stock(zsc, dsd, lead);
        let itg = target_stock(dph, lead, ssg);

        let ptg = (de + itg - ipf0).max(0.0);
        let cpl = safe_div(nepp * mlp, tpe);
        // Without material per unit, materials never bind
        let cpm = if cinsp > 0.0 {
            imp0 / cinsp
        } else {
            cpl.max(cprod)
        };
        let cpr = cpl.min(cpm).min(cprod).max(0.0);
        let qpl = ptg.min(cpr);
        let qgp = qpl * qc;
        let mpu = (qpl * cinsp).min(imp0);

        v.set(RMR, rmr);
        v.set(PTG, ptg);
        v.set(CPL, cpl);
        v.set(CPM, cpm);
        v.set(CPR, cpr);
        v.set(QPL, qpl);
        v.set(FU, utilization(qpl, cprod));
        v.set(PE, utilization(qpl, cpl));
        v.set(PPE, safe_div(qpl, nepp));
        v.set(HTR, qpl * tpe / 60.0);
        v.set(QGP, qgp);
        v.set(QDF, qpl - qgp);
        v.set(MPU, mpu);

        // =================================================================
        // PHASE 3: SALES
        // =================================================================
        let available = ipf0 + qgp;
        let tpv = ddp.min(available);
        let di = ddp - tpv;
        let tcs = safe_div(tpv, vpc).floor();

        v.set(TPV, tpv);
        v.set(DI, di);
        v.set(NSC, utilization(tpv, ddp));
        v.set(TCS, tcs);
        v.set(NCM, (safe_div(ddp, vpc).round() - tcs).max(0.0));
        v.set(STR, utilization(tpv, available));

        // =================================================================
        // PHASE 4: COSTS
        // Spoilage hits whatever stays on the shelf overnight.
        // =================================================================
        let leftover = available - tpv;
        let qmr = leftover * tmp;
        let ipf = leftover - qmr;

        let ctai = mpu * cuip;
        let cmo = nepp * se;
        let cto = go + cmo;
        let nvj = safe_div(tpv, cct).ceil();
        let ctr = nvj * ctl;
        let cmr = qmr * cuip * cinsp;
        let psa = (ipf - cmipf).max(0.0) * cua * OVERSTOCK_PENALTY;
        let cal = ipf * cua + psa;
        let ctp = ctai + cto + ctr + cal + cmr;

        v.set(CTAI, ctai);
        v.set(CMO, cmo);
        v.set(CTO, cto);
        v.set(NVJ, nvj);
        v.set(CTR, ctr);
        v.set(QMR, qmr);
        v.set(CMR, cmr);
        v.set(PSA, psa);
        v.set(CAL, cal);
        v.set(CTP, ctp);
        v.set(CUP, safe_div(ctp, qpl));

        // =================================================================
        // PHASE 5: REVENUE
        // =================================================================
        let it = tpv * pvp;
        let gb = it - ctai;
        let gn = it - ctp;

        v.set(IT, it);
        v.set(IE, ddp * pvp);
        v.set(ILP, di * pvp);
        v.set(GB, gb);
        v.set(MB, safe_div(gb, it));
        v.set(GN, gn);
        v.set(MN, safe_div(gn, it));
        v.set(RSI, safe_div(gn, ctp));

        // =================================================================
        // PHASE 6: INVENTORY
        // Raw material is reordered up to the reorder point plus one lead time.
        // =================================================================
        let imp = imp0 - mpu;
        let rop = itg * cinsp;
        let prm = replenishment_order(rop, dph * cinsp, lead, imp, pipeline.in_transit());
        pipeline.push_departure(prm);

        v.set(ZSC, zsc);
        v.set(SSG, ssg);
        v.set(ITG, itg);
        v.set(IPF, ipf);
        v.set(IMP, imp);
        v.set(ROP, rop);
        v.set(PRM, prm);
        v.set(DCI, safe_div(ipf, dph));
        v.set(RTI, safe_div(tpv, (ipf0 + ipf) / 2.0));

        // =================================================================
        // PHASE 7: COMPOSITE INDICATORS
        // =================================================================
        let mut corrections = Vec::new();
        let outcome = self
            .registry
            .solve(&v, &COMPOSITE_TARGETS, self.max_iterations, self.tolerance);
        if !outcome.converged {
            corrections.push(format!(
                "composite indicators stopped after {} passes (max change {:.3e})",
                outcome.iterations, outcome.max_change
            ));
        }
        corrections.extend(outcome.warnings.iter().cloned());
        let mut values = outcome.values;

        // =================================================================
        // PHASE 8: VALIDATION
        // =================================================================
        let quality = self.validate(&mut values, &mut corrections);
        if quality != QualityFlag::Ok {
            warn!(day, %quality, corrections = corrections.len(), "day needed attention");
        }
        debug!(day, demand = ddp, sold = tpv, produced = qpl, stock = ipf, "day computed");

        let next_state = DayState {
            day,
            finished_goods: values.get_or(IPF, ipf).max(0.0),
            raw_materials: values.get_or(IMP, imp).max(0.0),
            material_pipeline: pipeline,
        };
        let result = DayResult {
            day,
            date: self.date_for(day),
            demand_mean: dph,
            demand_std: dsd,
            values,
            quality,
            corrections,
        };
        Ok((result, next_state))
    }

    /// Clamps every value into its documented range, re-derives composite
    /// indicators that drifted from their formula, and grades the day.
    fn validate(&self, values: &mut ParameterSet, corrections: &mut Vec<String>) -> QualityFlag {
        recheck_composites(values, corrections);

        for spec in self.catalog.iter().filter(|s| s.kind != VariableKind::Series) {
            let Some(value) = values.get(spec.code) else {
                continue;
            };
            if !value.is_finite() {
                continue;
            }
            let clamped = spec.clamp(value);
            if clamped != value {
                corrections.push(format!("{} clamped from {value} to {clamped}", spec.code));
                values.set(spec.code, clamped);
            }
        }

        let offending = self.offending_codes(values);
        if offending.iter().any(|code| values.get(code).is_none()) {
            QualityFlag::Incomplete
        } else if !offending.is_empty() {
            QualityFlag::Invalid
        } else if !corrections.is_empty() {
            QualityFlag::Corrected
        } else {
            QualityFlag::Ok
        }
    }

    /// Catalog codes that are absent from `values` or hold a non-finite number.
    pub fn offending_codes(&self, values: &ParameterSet) -> Vec<&'static str> {
        self.catalog
            .day_codes()
            .filter(|code| !values.get(code).is_some_and(f64::is_finite))
            .collect()
    }
}

fn required(parameters: &ParameterSet, code: &str) -> Result<f64> {
    parameters
        .get(code)
        .filter(|v| v.is_finite())
        .ok_or_else(|| EngineError::MissingParameter {
            code: code.to_string(),
        })
}

fn finite(values: &ParameterSet, code: &str) -> Option<f64> {
    values.get(code).filter(|v| v.is_finite())
}

/// Recomputes EOG and IDG directly when the solver left them out of range or
/// away from their defining formulas.
fn recheck_composites(values: &mut ParameterSet, corrections: &mut Vec<String>) {
    let (Some(pe), Some(fu), Some(qc)) = (finite(values, PE), finite(values, FU), finite(values, QC))
    else {
        return;
    };
    let eog = operational_efficiency(pe, fu, qc).clamp(0.0, 1.0);
    replace_if_off(values, EOG, eog, corrections);

    let (Some(nsc), Some(rnt)) = (finite(values, NSC), finite(values, RNT)) else {
        return;
    };
    let idg = global_performance(eog, nsc, rnt).clamp(0.0, 1.0);
    replace_if_off(values, IDG, idg, corrections);
}

fn replace_if_off(
    values: &mut ParameterSet,
    code: &str,
    expected: f64,
    corrections: &mut Vec<String>,
) {
    let current = values.get(code);
    let acceptable = current.is_some_and(|c| {
        c.is_finite() && (0.0..=1.0).contains(&c) && (c - expected).abs() <= FORMULA_TOLERANCE
    });
    if !acceptable {
        corrections.push(format!(
            "{code} recomputed from its formula: {} -> {expected}",
            current.map_or_else(|| "missing".to_string(), |c| c.to_string())
        ));
        values.set(code, expected);
    }
}
