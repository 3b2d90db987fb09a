// src/simulation/report.rs

use crate::demand::distribution::{mean, population_std};
use crate::demand::model::{DemandConfig, TrendDirection};
use crate::model::state::{DayResult, QualityFlag};
use crate::model::variables::{Catalog, Category, CTP, DI, EOG, FU, GN, IT, NSC};
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;

/// Relative change between the two halves of the run treated as flat.
pub const PROFIT_TREND_DEAD_ZONE: f64 = 0.05;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FinancialSummary {
    pub total_profit: f64,
    pub average_profit: f64,
    pub profit_volatility: f64,
    pub total_revenue: f64,
    pub total_cost: f64,
    pub trend: TrendDirection,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OperationalSummary {
    pub average_efficiency: f64,
    pub average_utilization: f64,
    /// 1 - coefficient of variation of daily efficiency, floored at 0.
    pub consistency: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServiceSummary {
    pub average_service_level: f64,
    pub consistency: f64,
    pub total_unmet_demand: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct QualityShare {
    pub count: usize,
    pub percent: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PersistenceSummary {
    pub written: usize,
    pub dropped: usize,
}

/// Aggregate view of a finished run.
#[derive(Debug, Clone, Serialize)]
pub struct SimulationReport {
    pub days: usize,
    pub first_date: Option<NaiveDate>,
    pub last_date: Option<NaiveDate>,
    pub financial: FinancialSummary,
    pub operational: OperationalSummary,
    pub service: ServiceSummary,
    pub quality: BTreeMap<QualityFlag, QualityShare>,
    /// Percentage of expected (day, variable) pairs present and finite.
    pub coverage: BTreeMap<Category, f64>,
    pub persistence: PersistenceSummary,
    pub demand: DemandConfig,
}

impl SimulationReport {
    pub fn build(
        results: &[DayResult],
        catalog: &Catalog,
        demand: DemandConfig,
        persistence: PersistenceSummary,
    ) -> Self {
        let profit = column(results, GN);
        let efficiency = column(results, EOG);
        let service_levels = column(results, NSC);

        let financial = FinancialSummary {
            total_profit: profit.iter().sum(),
            average_profit: mean(&profit),
            profit_volatility: population_std(&profit),
            total_revenue: column(results, IT).iter().sum(),
            total_cost: column(results, CTP).iter().sum(),
            trend: half_trend(&profit),
        };

        let operational = OperationalSummary {
            average_efficiency: mean(&efficiency),
            average_utilization: mean(&column(results, FU)),
            consistency: consistency(&efficiency),
        };

        let service = ServiceSummary {
            average_service_level: mean(&service_levels),
            consistency: consistency(&service_levels),
            total_unmet_demand: column(results, DI).iter().sum(),
        };

        let mut quality = BTreeMap::new();
        for flag in QualityFlag::ALL {
            let count = results.iter().filter(|r| r.quality == flag).count();
            quality.insert(
                flag,
                QualityShare {
                    count,
                    percent: percent(count, results.len()),
                },
            );
        }

        let mut coverage = BTreeMap::new();
        for category in Category::ALL {
            let codes: Vec<&str> = catalog.in_category(category).map(|s| s.code).collect();
            let present = results
                .iter()
                .flat_map(|r| codes.iter().map(move |c| r.value(c)))
                .filter(|v| v.is_some_and(f64::is_finite))
                .count();
            coverage.insert(category, percent(present, codes.len() * results.len()));
        }

        Self {
            days: results.len(),
            first_date: results.first().map(|r| r.date),
            last_date: results.last().map(|r| r.date),
            financial,
            operational,
            service,
            quality,
            coverage,
            persistence,
            demand,
        }
    }

    pub fn count(&self, flag: QualityFlag) -> usize {
        self.quality.get(&flag).map_or(0, |s| s.count)
    }
}

/// Finite values of `code` across days that have it.
fn column(results: &[DayResult], code: &str) -> Vec<f64> {
    results
        .iter()
        .filter_map(|r| r.value(code))
        .filter(|v| v.is_finite())
        .collect()
}

fn consistency(values: &[f64]) -> f64 {
    let m = mean(values);
    if values.is_empty() || m <= 0.0 {
        return 0.0;
    }
    (1.0 - population_std(values) / m).clamp(0.0, 1.0)
}

fn percent(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 * 100.0 / whole as f64
    }
}

/// Compares the average of the second half of the run against the first.
fn half_trend(values: &[f64]) -> TrendDirection {
    if values.len() < 2 {
        return TrendDirection::Stable;
    }
    let (first, second) = values.split_at(values.len() / 2);
    let (a, b) = (mean(first), mean(second));
    let change = if a != 0.0 {
        (b - a) / a.abs()
    } else if b > 0.0 {
        1.0
    } else if b < 0.0 {
        -1.0
    } else {
        0.0
    };
    if change > PROFIT_TREND_DEAD_ZONE {
        TrendDirection::Increasing
    } else if change < -PROFIT_TREND_DEAD_ZONE {
        TrendDirection::Decreasing
    } else {
        TrendDirection::Stable
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::demand::distribution::DistributionKind;
    use crate::model::parameters::ParameterSet;

    fn day(day: usize, profit: f64, quality: QualityFlag) -> DayResult {
        let mut values = ParameterSet::new();
        values.set(GN, profit);
        values.set(IT, 1000.0);
        values.set(NSC, 0.9);
        values.set(EOG, 0.5);
        DayResult {
            day,
            date: NaiveDate::from_ymd_opt(2024, 1, day as u32).unwrap(),
            demand_mean: 100.0,
            demand_std: 10.0,
            values,
            quality,
            corrections: Vec::new(),
        }
    }

    fn demand() -> DemandConfig {
        DemandConfig::fit(&[100.0, 110.0, 90.0, 100.0, 105.0], DistributionKind::Normal).unwrap()
    }

    #[test]
    fn test_financial_totals_and_trend() {
        let results: Vec<_> = [100.0, 120.0, 200.0, 260.0]
            .iter()
            .enumerate()
            .map(|(i, p)| day(i + 1, *p, QualityFlag::Ok))
            .collect();
        let report = SimulationReport::build(
            &results,
            &Catalog::standard(),
            demand(),
            PersistenceSummary::default(),
        );
        assert_eq!(report.days, 4);
        assert_eq!(report.financial.total_profit, 680.0);
        assert_eq!(report.financial.average_profit, 170.0);
        assert_eq!(report.financial.total_revenue, 4000.0);
        assert_eq!(report.financial.trend, TrendDirection::Increasing);
        assert!((report.service.consistency - 1.0).abs() < 1e-9);
        assert_eq!(report.last_date, NaiveDate::from_ymd_opt(2024, 1, 4));
    }

    #[test]
    fn test_quality_shares_and_coverage() {
        let mut results = vec![
            day(1, 10.0, QualityFlag::Ok),
            day(2, 10.0, QualityFlag::Corrected),
            day(3, 10.0, QualityFlag::Ok),
            day(4, 10.0, QualityFlag::Error),
        ];
        results[3].values = ParameterSet::new();
        let report = SimulationReport::build(
            &results,
            &Catalog::standard(),
            demand(),
            PersistenceSummary { written: 4, dropped: 0 },
        );
        assert_eq!(report.count(QualityFlag::Ok), 2);
        assert_eq!(report.quality[&QualityFlag::Error].percent, 25.0);
        assert_eq!(report.count(QualityFlag::Invalid), 0);
        // Two of the nine revenue codes (PVP plus eight computed) on three of four days
        let revenue = report.coverage[&Category::Revenue];
        assert!((revenue - 100.0 * 6.0 / 36.0).abs() < 1e-9);
        assert_eq!(report.financial.trend, TrendDirection::Stable);
    }

    #[test]
    fn test_empty_run_has_zeroed_sections() {
        let report = SimulationReport::build(
            &[],
            &Catalog::standard(),
            demand(),
            PersistenceSummary::default(),
        );
        assert_eq!(report.days, 0);
        assert_eq!(report.financial.total_profit, 0.0);
        assert_eq!(report.operational.consistency, 0.0);
        assert!(report.coverage.values().all(|p| *p == 0.0));
    }
}
