use chrono::NaiveDate;
use factory_sim::model::variables::{
    CPROD, DDP, EOG, FU, IDG, IMP, IPF, NSC, PE, PRM, PVP, QC, QGP, QPL, RNT, TE, TPV,
};
use factory_sim::solver::equations::global_performance;
use factory_sim::{
    Answer, CsvStore, DayResult, MemoryStore, QualityFlag, ResultStore, SimulationConfig,
    SimulationEngine, SimulationReport, StoreError,
};
use std::collections::HashMap;

// ========== Helpers ==========

/// 30 days alternating 2250/2750: mean 2500, population std 250.
fn history() -> Vec<f64> {
    (0..30)
        .map(|i| if i % 2 == 0 { 2250.0 } else { 2750.0 })
        .collect()
}

fn scenario_answers() -> Vec<Answer> {
    vec![
        Answer::list("Historical demand (units/day)", history()),
        Answer::text("Unit selling price", "$15.50"),
        Answer::number("Raw material cost per unit", 8.20),
        Answer::number("Number of employees", 15.0),
        Answer::text("Production capacity", "3,000 units"),
    ]
}

fn config(days: usize, seed: u64) -> SimulationConfig {
    SimulationConfig {
        horizon_days: days,
        random_seed: Some(seed),
        start_date: NaiveDate::from_ymd_opt(2024, 6, 1),
        batch_size: 5,
        ..Default::default()
    }
}

fn run(answers: &[Answer], config: SimulationConfig) -> (SimulationReport, Vec<DayResult>) {
    let (mut engine, _) =
        SimulationEngine::from_answers(config, answers, MemoryStore::new()).unwrap();
    let report = engine.run().unwrap();
    (report, engine.history.clone())
}

fn value(result: &DayResult, code: &str) -> f64 {
    result
        .value(code)
        .unwrap_or_else(|| panic!("day {} has no {code}", result.day))
}

// ========== Scenarios ==========

#[test]
fn test_reference_business_first_day_is_consistent() {
    let (report, days) = run(&scenario_answers(), config(30, 42));
    assert_eq!(report.days, 30);

    let first = &days[0];
    let opening_stock = 2500.0;
    assert!(value(first, TPV) <= value(first, DDP));
    assert!(value(first, TPV) <= opening_stock + value(first, QGP) + 1e-9);
    assert!((0.0..=1.0).contains(&value(first, NSC)));
    assert_eq!(value(first, PVP), 15.5);
    assert_eq!(value(first, CPROD), 3000.0);
    assert!(value(first, QPL) <= 3000.0);
}

#[test]
fn test_inventory_never_goes_negative() {
    for seed in [1, 7, 99] {
        let (_, days) = run(&scenario_answers(), config(45, seed));
        for day in &days {
            assert!(value(day, IPF) >= 0.0, "day {} IPF negative", day.day);
            assert!(value(day, IMP) >= 0.0, "day {} IMP negative", day.day);
        }
    }
}

#[test]
fn test_same_seed_reproduces_the_run() {
    let (a_report, a) = run(&scenario_answers(), config(20, 2024));
    let (b_report, b) = run(&scenario_answers(), config(20, 2024));
    assert_eq!(a, b);
    assert_eq!(a_report.financial, b_report.financial);

    let (_, c) = run(&scenario_answers(), config(20, 2025));
    let demand_a: Vec<f64> = a.iter().map(|d| value(d, DDP)).collect();
    let demand_c: Vec<f64> = c.iter().map(|d| value(d, DDP)).collect();
    assert_ne!(demand_a, demand_c);
}

#[test]
fn test_rerunning_an_engine_starts_over() {
    let (mut engine, _) =
        SimulationEngine::from_answers(config(10, 5), &scenario_answers(), MemoryStore::new())
            .unwrap();
    let first = engine.run().unwrap();
    let first_days = engine.history.clone();
    let second = engine.run().unwrap();
    assert_eq!(first_days, engine.history);
    assert_eq!(first.financial, second.financial);
}

#[test]
fn test_composite_indicators_sit_at_their_fixed_point() {
    let (_, days) = run(&scenario_answers(), config(30, 11));
    for day in days.iter().filter(|d| d.quality != QualityFlag::Error) {
        let eog = value(day, PE) * value(day, FU) * value(day, QC);
        assert!((value(day, EOG) - eog).abs() < 1e-6, "day {}", day.day);
        let idg = global_performance(value(day, EOG), value(day, NSC), value(day, RNT));
        assert!((value(day, IDG) - idg).abs() < 1e-6, "day {}", day.day);
    }
}

#[test]
fn test_zero_capacity_runs_down_service_without_failing() {
    let mut answers = scenario_answers();
    answers[4] = Answer::number("Production capacity", 0.0);
    let (report, days) = run(&answers, config(30, 8));

    assert_eq!(days.len(), 30);
    assert_eq!(report.count(QualityFlag::Error), 0);
    assert!(days.iter().all(|d| value(d, QPL) == 0.0));

    let first = value(&days[0], NSC);
    let last = value(&days[29], NSC);
    assert!(last <= first);
    assert_eq!(last, 0.0);
    assert_eq!(value(&days[29], IPF), 0.0);
}

#[test]
fn test_same_day_supplier_keeps_production_going() {
    let mut answers = scenario_answers();
    answers.push(Answer::number("Supplier lead time", 0.0));
    let (report, days) = run(&answers, config(30, 6));

    assert_eq!(value(&days[0], TE), 0.0);
    assert_eq!(report.count(QualityFlag::Error), 0);
    let ordered: f64 = days.iter().map(|d| value(d, PRM)).sum();
    assert!(ordered > 0.0);
    for day in &days[20..] {
        assert!(value(day, QPL) > 0.0, "day {} produced nothing", day.day);
        assert!(value(day, NSC) > 0.0, "day {}", day.day);
    }
}

#[test]
fn test_malformed_answer_uses_default_and_run_completes() {
    let mut answers = scenario_answers();
    answers[1] = Answer::text("Unit selling price", "abc");
    let (report, days) = run(&answers, config(5, 3));
    assert_eq!(report.days, 5);
    assert_eq!(value(&days[0], PVP), 15.0);
}

#[test]
fn test_short_history_still_simulates() {
    let answers = vec![Answer::text("Historical demand", "120, 80, 100")];
    let (report, days) = run(&answers, config(10, 4));
    assert!(!report.demand.reliable);
    assert_eq!(days.len(), 10);
    assert!(days.iter().all(|d| value(d, DDP) >= 1.0));
}

#[test]
fn test_missing_history_is_a_configuration_error() {
    let answers = vec![Answer::number("Unit selling price", 20.0)];
    let result = SimulationEngine::from_answers(config(10, 1), &answers, MemoryStore::new());
    assert!(matches!(
        result,
        Err(factory_sim::EngineError::EmptyDemandHistory)
    ));
}

#[test]
fn test_every_distribution_completes_a_run() {
    for name in ["normal", "exponential", "lognormal", "gamma", "uniform"] {
        let cfg = SimulationConfig {
            distribution: name.parse().unwrap(),
            ..config(15, 21)
        };
        let (report, days) = run(&scenario_answers(), cfg);
        assert_eq!(report.days, 15, "{name}");
        assert_eq!(report.count(QualityFlag::Error), 0, "{name}");
        assert!(days.iter().all(|d| value(d, DDP) >= 1.0), "{name}");
    }
}

// ========== Persistence ==========

/// Rejects every batch; each item fails once before succeeding, except
/// `broken_day` which never succeeds.
struct FlakyStore {
    days: Vec<DayResult>,
    attempts: HashMap<usize, usize>,
    broken_day: usize,
}

impl ResultStore for FlakyStore {
    fn write_batch(&mut self, _batch: &[DayResult]) -> Result<(), StoreError> {
        Err(StoreError::Rejected("batch endpoint unavailable".into()))
    }

    fn write_one(&mut self, result: &DayResult) -> Result<(), StoreError> {
        let tries = self.attempts.entry(result.day).or_insert(0);
        *tries += 1;
        if result.day == self.broken_day || *tries == 1 {
            return Err(StoreError::Rejected(format!("day {} refused", result.day)));
        }
        self.days.push(result.clone());
        Ok(())
    }

    fn write_report(&mut self, _report: &SimulationReport) -> Result<(), StoreError> {
        Err(StoreError::Rejected("report endpoint unavailable".into()))
    }
}

#[test]
fn test_batch_failure_falls_back_to_single_writes() {
    let store = FlakyStore {
        days: Vec::new(),
        attempts: HashMap::new(),
        broken_day: 7,
    };
    let (mut engine, _) =
        SimulationEngine::from_answers(config(12, 9), &scenario_answers(), store).unwrap();
    let report = engine.run().unwrap();

    assert_eq!(report.days, 12);
    assert_eq!(report.persistence.written, 11);
    assert_eq!(report.persistence.dropped, 1);

    let store = engine.into_store();
    assert_eq!(store.days.len(), 11);
    assert!(store.days.iter().all(|d| d.day != 7));
    assert_eq!(store.attempts[&7], 2);
}

#[test]
fn test_memory_store_receives_days_and_report() {
    let (mut engine, _) =
        SimulationEngine::from_answers(config(12, 9), &scenario_answers(), MemoryStore::new())
            .unwrap();
    engine.run().unwrap();
    let store = engine.into_store();
    assert_eq!(store.days.len(), 12);
    let days: Vec<usize> = store.days.iter().map(|d| d.day).collect();
    assert_eq!(days, (1..=12).collect::<Vec<_>>());
    assert_eq!(store.report.map(|r| r.persistence.written), Some(12));
}

#[test]
fn test_csv_store_writes_day_table_and_report() {
    let dir = tempfile::tempdir().unwrap();
    let csv_path = dir.path().join("days.csv");
    let report_path = dir.path().join("report.json");

    let store = CsvStore::create(&csv_path, &factory_sim::model::variables::Catalog::standard())
        .unwrap()
        .with_report_path(&report_path);
    let (mut engine, _) =
        SimulationEngine::from_answers(config(12, 13), &scenario_answers(), store).unwrap();
    engine.run().unwrap();
    assert_eq!(engine.store().rows(), 12);

    let mut reader = csv::Reader::from_path(&csv_path).unwrap();
    let headers = reader.headers().unwrap().clone();
    assert!(headers.iter().any(|h| h == "EOG"));
    assert!(headers.iter().any(|h| h == "quality"));
    let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
    assert_eq!(rows.len(), 12);
    assert_eq!(&rows[0][0], "1");
    assert_eq!(&rows[0][1], "2024-06-01");

    let raw = std::fs::read_to_string(&report_path).unwrap();
    let report: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(report["days"], 12);
    assert!(report["financial"]["total_revenue"].as_f64().unwrap() > 0.0);
    assert_eq!(report["quality"]["ERROR"]["count"], 0);
}
