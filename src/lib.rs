// src/lib.rs

//! Day-by-day simulation of a small manufacturing business.
//!
//! Questionnaire answers are turned into a parameter set (`io::extractor`),
//! historical demand is fitted once (`demand`), and the orchestrator
//! (`simulation::engine`) walks the horizon day by day, resolving the circular
//! composite indicators with the equation solver (`solver`).

pub mod demand;
pub mod error;
pub mod io;
pub mod model;
pub mod simulation;
pub mod solver;

pub use error::{EngineError, Result, StoreError};
pub use io::answers::{load_answers, Answer, AnswerValue};
pub use io::extractor::{Extraction, VariableExtractor};
pub use io::store::{CsvStore, MemoryStore, ResultStore};
pub use model::parameters::ParameterSet;
pub use model::state::{DayResult, DayState, QualityFlag};
pub use simulation::config::SimulationConfig;
pub use simulation::engine::SimulationEngine;
pub use simulation::report::SimulationReport;
