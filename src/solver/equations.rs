// src/solver/equations.rs

use crate::model::variables::{
    Catalog, CPL, CPROD, DDP, EOG, FU, ICP, IDG, IEF, IPF, ITG, MN, NSC, PE, QC, QPL, RNT, TPV,
};
use crate::solver::registry::EquationRegistry;

/// Inputs of the circular indicators, refreshed before anything else on every pass.
pub const PRIORITY: [&str; 5] = [PE, FU, QC, NSC, RNT];

/// Everything the day calculator asks the solver for.
pub const COMPOSITE_TARGETS: [&str; 8] = [PE, FU, NSC, RNT, IEF, EOG, IDG, ICP];

/// Weights of efficiency, service level and profitability in the global index.
pub const IDG_WEIGHTS: [f64; 3] = [0.40, 0.35, 0.25];

/// Weights of service level, inventory efficiency and profitability in the
/// competitiveness index.
pub const ICP_WEIGHTS: [f64; 3] = [0.5, 0.3, 0.2];

/// Division that answers 0 instead of NaN/Infinity when the denominator is not positive.
pub fn safe_div(numerator: f64, denominator: f64) -> f64 {
    if denominator > 0.0 && denominator.is_finite() {
        numerator / denominator
    } else {
        0.0
    }
}

/// Share of a capacity actually used, in [0, 1].
pub fn utilization(used: f64, capacity: f64) -> f64 {
    safe_div(used, capacity).clamp(0.0, 1.0)
}

pub fn operational_efficiency(productivity: f64, utilization: f64, quality: f64) -> f64 {
    productivity * utilization * quality
}

pub fn global_performance(efficiency: f64, service_level: f64, profitability: f64) -> f64 {
    let [we, ws, wp] = IDG_WEIGHTS;
    we * efficiency + ws * service_level + wp * profitability
}

pub fn profitability_index(net_margin: f64) -> f64 {
    net_margin.clamp(0.0, 1.0)
}

pub fn inventory_efficiency(stock: f64, target: f64) -> f64 {
    (1.0 - (stock - target).abs() / target.max(1.0)).clamp(0.0, 1.0)
}

/// Registry of the composite indicators.
///
/// `EOG` and `IDG` form a cycle: global performance is a blend of efficiency,
/// and efficiency is scheduled against global performance. At the fixed point
/// `EOG = PE × FU × QC`.
pub fn composite_registry(catalog: &Catalog) -> EquationRegistry {
    let mut reg = EquationRegistry::new();

    reg.register(PE, &[QPL, CPL], |p| {
        utilization(p.get_or(QPL, 0.0), p.get_or(CPL, 0.0))
    });
    reg.register(FU, &[QPL, CPROD], |p| {
        utilization(p.get_or(QPL, 0.0), p.get_or(CPROD, 0.0))
    });
    reg.register(NSC, &[TPV, DDP], |p| {
        utilization(p.get_or(TPV, 0.0), p.get_or(DDP, 0.0))
    });
    reg.register(RNT, &[MN], |p| profitability_index(p.get_or(MN, 0.0)));
    reg.register(IEF, &[IPF, ITG], |p| {
        inventory_efficiency(p.get_or(IPF, 0.0), p.get_or(ITG, 0.0))
    });
    reg.register(EOG, &[PE, FU, QC, IDG], |p| {
        operational_efficiency(p.get_or(PE, 0.0), p.get_or(FU, 0.0), p.get_or(QC, 0.0))
    });
    reg.register(IDG, &[EOG, NSC, RNT], |p| {
        global_performance(p.get_or(EOG, 0.0), p.get_or(NSC, 0.0), p.get_or(RNT, 0.0))
    });
    reg.register(ICP, &[NSC, IEF, RNT], |p| {
        let [ws, wi, wp] = ICP_WEIGHTS;
        ws * p.get_or(NSC, 0.0) + wi * p.get_or(IEF, 0.0) + wp * p.get_or(RNT, 0.0)
    });

    for spec in catalog.inputs() {
        if let Some(default) = spec.default {
            reg.set_default(spec.code, default);
        }
    }
    reg.set_priority(&PRIORITY);
    reg
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::parameters::ParameterSet;

    fn day_inputs() -> ParameterSet {
        let mut p = ParameterSet::new();
        p.set(QPL, 2400.0);
        p.set(CPL, 3200.0);
        p.set(CPROD, 3000.0);
        p.set(QC, 0.95);
        p.set(TPV, 2300.0);
        p.set(DDP, 2500.0);
        p.set(MN, 0.18);
        p.set(IPF, 7000.0);
        p.set(ITG, 8000.0);
        p
    }

    #[test]
    fn test_efficiency_and_global_index_form_a_cycle() {
        let reg = composite_registry(&Catalog::standard());
        let order = reg.evaluation_order(&COMPOSITE_TARGETS);
        assert!(order.cyclic.contains(&EOG.to_string()));
        assert!(order.cyclic.contains(&IDG.to_string()));
        assert_eq!(&order.sequence[..4], &[PE, FU, NSC, RNT]);
    }

    #[test]
    fn test_cycle_converges_to_product_formula() {
        let reg = composite_registry(&Catalog::standard());
        let out = reg.solve(&day_inputs(), &COMPOSITE_TARGETS, 10, 1e-6);
        assert!(out.converged);
        assert!(out.iterations <= 10);

        let v = &out.values;
        let expected = v.get_or(PE, 0.0) * v.get_or(FU, 0.0) * v.get_or(QC, 0.0);
        assert!((v.get_or(EOG, -1.0) - expected).abs() < 1e-6);
        assert!((v.get_or(PE, 0.0) - 0.75).abs() < 1e-12);
        assert!((v.get_or(FU, 0.0) - 0.8).abs() < 1e-12);

        let idg = global_performance(expected, 2300.0 / 2500.0, 0.18);
        assert!((v.get_or(IDG, -1.0) - idg).abs() < 1e-6);
    }

    #[test]
    fn test_missing_quality_uses_catalog_default() {
        let reg = composite_registry(&Catalog::standard());
        let mut inputs = day_inputs();
        inputs.remove(QC);
        let out = reg.solve(&inputs, &COMPOSITE_TARGETS, 10, 1e-6);
        assert_eq!(out.values.get(QC), Some(0.95));
        assert!(out.injected.contains(&QC.to_string()));
    }

    #[test]
    fn test_zero_capacity_gives_zero_ratios() {
        let reg = composite_registry(&Catalog::standard());
        let mut inputs = day_inputs();
        inputs.set(CPROD, 0.0);
        inputs.set(QPL, 0.0);
        let out = reg.solve(&inputs, &COMPOSITE_TARGETS, 10, 1e-6);
        assert_eq!(out.values.get(FU), Some(0.0));
        assert_eq!(out.values.get(EOG), Some(0.0));
        assert!(out.warnings.is_empty());
    }

    #[test]
    fn test_safe_div_guards_zero_and_infinite() {
        assert_eq!(safe_div(5.0, 0.0), 0.0);
        assert_eq!(safe_div(5.0, f64::INFINITY), 0.0);
        assert_eq!(safe_div(5.0, 2.0), 2.5);
    }
}
