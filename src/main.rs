// src/main.rs

use clap::Parser;
use factory_sim::demand::distribution::DistributionKind;
use factory_sim::io::extractor::DiagnosticKind;
use factory_sim::io::reporting;
use factory_sim::model::variables::Catalog;
use factory_sim::{
    load_answers, CsvStore, EngineError, MemoryStore, ResultStore, SimulationConfig,
    SimulationEngine,
};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "factory-sim")]
#[command(about = "Day-by-day manufacturing simulation from questionnaire answers")]
#[command(version)]
struct Args {
    /// JSON array of {label, value, variable?} answers
    #[arg(short, long)]
    answers: PathBuf,

    /// TOML simulation config
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Day-by-day CSV output
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Report JSON output
    #[arg(short, long)]
    report: Option<PathBuf>,

    #[arg(long)]
    seed: Option<u64>,

    /// Days to simulate
    #[arg(long)]
    days: Option<usize>,

    /// normal | exponential | lognormal | gamma | uniform
    #[arg(long)]
    distribution: Option<DistributionKind>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();

    let default_filter = if args.verbose {
        "factory_sim=debug"
    } else {
        "factory_sim=info"
    };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)))
        .with(tracing_subscriber::fmt::layer())
        .init();

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<(), EngineError> {
    println!("=== Manufacturing Simulation ===");

    // 1. SETUP CONFIGURATION
    let mut config = match &args.config {
        Some(path) => SimulationConfig::from_toml_file(path)?,
        None => SimulationConfig::default(),
    };
    if let Some(seed) = args.seed {
        config.random_seed = Some(seed);
    }
    if let Some(days) = args.days {
        config.horizon_days = days;
    }
    if let Some(distribution) = args.distribution {
        config.distribution = distribution;
    }

    // 2. READ ANSWERS
    let answers = load_answers(&args.answers)?;
    info!(count = answers.len(), path = %args.answers.display(), "answers loaded");

    // 3. RUN, persisting to CSV when asked, in memory otherwise
    match &args.output {
        Some(path) => {
            let mut store = CsvStore::create(path, &Catalog::standard())?;
            if let Some(report_path) = &args.report {
                store = store.with_report_path(report_path);
            }
            simulate(config, &answers, store)?;
            println!("Day table written to {}", path.display());
        }
        None => {
            let report = simulate(config, &answers, MemoryStore::new())?;
            if let Some(report_path) = &args.report {
                reporting::write_report_json(report_path, &report)?;
            }
        }
    }
    if let Some(report_path) = &args.report {
        println!("Report written to {}", report_path.display());
    }

    println!("\nSimulation Complete.");
    Ok(())
}

fn simulate<S: ResultStore>(
    config: SimulationConfig,
    answers: &[factory_sim::Answer],
    store: S,
) -> Result<factory_sim::SimulationReport, EngineError> {
    let (mut engine, extraction) = SimulationEngine::from_answers(config, answers, store)?;

    for diagnostic in &extraction.diagnostics {
        match diagnostic.kind {
            DiagnosticKind::Unmatched | DiagnosticKind::Unparsed | DiagnosticKind::Missing => {
                warn!(code = ?diagnostic.code, "{}", diagnostic.message)
            }
            _ => info!(code = ?diagnostic.code, "{}", diagnostic.message),
        }
    }
    println!(
        "Parameters: {} answered, {} defaulted",
        extraction.provided.len(),
        extraction.count(DiagnosticKind::Defaulted)
    );

    println!(
        "Running simulation for {} days...",
        engine.config().horizon_days
    );
    let report = engine.run()?;
    reporting::print_summary(&report);
    Ok(report)
}
