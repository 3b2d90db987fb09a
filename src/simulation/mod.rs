pub mod calculator;
pub mod config;
pub mod engine;
pub mod optimization;
pub mod report;
