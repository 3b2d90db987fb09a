// src/io/reporting.rs

use crate::error::Result;
use crate::model::state::DayResult;
use crate::model::variables::Catalog;
use crate::simulation::report::SimulationReport;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

/// Fixed leading columns of the day table; one column per catalog code follows.
pub const META_COLUMNS: [&str; 6] = [
    "day",
    "date",
    "quality",
    "demand_mean",
    "demand_std",
    "corrections",
];

pub fn day_header(catalog: &Catalog) -> Vec<String> {
    META_COLUMNS
        .iter()
        .map(|c| c.to_string())
        .chain(catalog.day_codes().map(str::to_string))
        .collect()
}

/// One CSV row. Absent values are left empty so a fallback day stays readable.
pub fn day_record(result: &DayResult, codes: &[&str]) -> Vec<String> {
    let mut row = vec![
        result.day.to_string(),
        result.date.to_string(),
        result.quality.to_string(),
        result.demand_mean.to_string(),
        result.demand_std.to_string(),
        result.corrections.join("; "),
    ];
    row.extend(
        codes
            .iter()
            .map(|code| result.value(code).map(|v| v.to_string()).unwrap_or_default()),
    );
    row
}

/// Writes the report as pretty JSON.
pub fn write_report_json<P: AsRef<Path>>(path: P, report: &SimulationReport) -> Result<()> {
    let file = File::create(path.as_ref())?;
    serde_json::to_writer_pretty(BufWriter::new(file), report)?;
    Ok(())
}

/// Human-readable run summary for the terminal.
pub fn print_summary(report: &SimulationReport) {
    println!("\n=== Financial ===");
    println!("Total revenue:   ${:.2}", report.financial.total_revenue);
    println!("Total cost:      ${:.2}", report.financial.total_cost);
    println!(
        "Net profit:      ${:.2} (avg ${:.2}/day, volatility ${:.2}, trend {:?})",
        report.financial.total_profit,
        report.financial.average_profit,
        report.financial.profit_volatility,
        report.financial.trend
    );

    println!("\n=== Operations & Service ===");
    println!(
        "Efficiency:      {:.1}% (utilization {:.1}%, consistency {:.2})",
        report.operational.average_efficiency * 100.0,
        report.operational.average_utilization * 100.0,
        report.operational.consistency
    );
    println!(
        "Service level:   {:.1}% (consistency {:.2}, unmet demand {:.0} units)",
        report.service.average_service_level * 100.0,
        report.service.consistency,
        report.service.total_unmet_demand
    );

    println!("\n=== Calculation quality ===");
    for (flag, share) in &report.quality {
        println!("{:<11} {:>4} ({:.1}%)", flag.to_string(), share.count, share.percent);
    }
    for (category, percent) in &report.coverage {
        println!("{:<11} coverage {:.1}%", format!("{category:?}"), percent);
    }
    println!(
        "Persisted {} day(s), dropped {}",
        report.persistence.written, report.persistence.dropped
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::parameters::ParameterSet;
    use crate::model::state::QualityFlag;
    use chrono::NaiveDate;

    #[test]
    fn test_row_matches_header_width() {
        let catalog = Catalog::standard();
        let codes: Vec<&str> = catalog.day_codes().collect();
        let mut values = ParameterSet::new();
        values.set("TPV", 120.0);
        let result = DayResult {
            day: 3,
            date: NaiveDate::from_ymd_opt(2024, 5, 3).unwrap(),
            demand_mean: 100.0,
            demand_std: 5.0,
            values,
            quality: QualityFlag::Error,
            corrections: vec!["a".into(), "b".into()],
        };

        let header = day_header(&catalog);
        let row = day_record(&result, &codes);
        assert_eq!(header.len(), row.len());
        assert_eq!(row[2], "ERROR");
        assert_eq!(row[5], "a; b");
        let tpv = header.iter().position(|h| h == "TPV").unwrap();
        assert_eq!(row[tpv], "120");
        let pvp = header.iter().position(|h| h == "PVP").unwrap();
        assert_eq!(row[pvp], "");
    }
}
