// src/error.rs

use thiserror::Error;

/// Failures the engine cannot recover from locally.
///
/// Configuration-level variants are returned by `SimulationEngine::run` before the
/// day loop starts. Day-level variants (`MissingParameter`, `InvalidDemand`) are
/// caught by the orchestrator and turned into an `ERROR` fallback day.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("historical demand is empty and no fallback is available")]
    EmptyDemandHistory,

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("required parameter '{code}' is missing")]
    MissingParameter { code: String },

    #[error("demand draw {value} on day {day} is not usable")]
    InvalidDemand { day: usize, value: f64 },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("config parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Errors raised by a `ResultStore` implementation.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("csv write failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("store rejected write: {0}")]
    Rejected(String),
}

pub type Result<T> = std::result::Result<T, EngineError>;
