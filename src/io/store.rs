// src/io/store.rs

//! Persistence collaborator for day results and the run report.

use crate::error::StoreError;
use crate::io::reporting::{day_header, day_record};
use crate::model::state::DayResult;
use crate::model::variables::Catalog;
use crate::simulation::report::SimulationReport;
use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Append-only sink the orchestrator flushes results into.
///
/// `write_batch` is the fast path. When it fails the orchestrator falls back to
/// `write_one` per item, so implementations must tolerate a batch being
/// re-sent item by item after a partial write.
pub trait ResultStore {
    fn write_batch(&mut self, batch: &[DayResult]) -> Result<(), StoreError>;

    fn write_one(&mut self, result: &DayResult) -> Result<(), StoreError>;

    fn write_report(&mut self, report: &SimulationReport) -> Result<(), StoreError>;
}

/// Keeps everything in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    pub days: Vec<DayResult>,
    pub report: Option<SimulationReport>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ResultStore for MemoryStore {
    fn write_batch(&mut self, batch: &[DayResult]) -> Result<(), StoreError> {
        self.days.extend_from_slice(batch);
        Ok(())
    }

    fn write_one(&mut self, result: &DayResult) -> Result<(), StoreError> {
        self.days.push(result.clone());
        Ok(())
    }

    fn write_report(&mut self, report: &SimulationReport) -> Result<(), StoreError> {
        self.report = Some(report.clone());
        Ok(())
    }
}

/// Day table as CSV (one row per day, one column per variable), report as JSON.
///
/// Each batch is encoded in memory and handed to the sink in a single write, so
/// a failed batch appends nothing and the per-item retry cannot duplicate rows.
pub struct CsvStore<W: Write = File> {
    sink: W,
    codes: Vec<&'static str>,
    report_path: Option<PathBuf>,
    rows: usize,
}

impl CsvStore<File> {
    /// Creates (truncating) `path` and writes the header row.
    pub fn create<P: AsRef<Path>>(path: P, catalog: &Catalog) -> Result<Self, StoreError> {
        Self::from_writer(File::create(path.as_ref())?, catalog)
    }
}

impl<W: Write> CsvStore<W> {
    /// Writes the header row to `sink` and appends day rows after it.
    pub fn from_writer(mut sink: W, catalog: &Catalog) -> Result<Self, StoreError> {
        let mut header = csv::Writer::from_writer(Vec::new());
        header.write_record(day_header(catalog))?;
        sink.write_all(&finish(header)?)?;
        sink.flush()?;
        Ok(Self {
            sink,
            codes: catalog.day_codes().collect(),
            report_path: None,
            rows: 0,
        })
    }

    /// Also write the report, as JSON, to `path`.
    pub fn with_report_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.report_path = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn into_inner(self) -> W {
        self.sink
    }

    fn append(&mut self, results: &[DayResult]) -> Result<(), StoreError> {
        let mut encoder = csv::Writer::from_writer(Vec::new());
        for result in results {
            encoder.write_record(day_record(result, &self.codes))?;
        }
        let bytes = finish(encoder)?;

        self.sink.write_all(&bytes)?;
        self.sink.flush()?;
        self.rows += results.len();
        Ok(())
    }
}

fn finish(encoder: csv::Writer<Vec<u8>>) -> Result<Vec<u8>, StoreError> {
    encoder
        .into_inner()
        .map_err(|e| StoreError::from(e.into_error()))
}

impl<W: Write> ResultStore for CsvStore<W> {
    fn write_batch(&mut self, batch: &[DayResult]) -> Result<(), StoreError> {
        self.append(batch)?;
        debug!(rows = batch.len(), total = self.rows, "csv batch flushed");
        Ok(())
    }

    fn write_one(&mut self, result: &DayResult) -> Result<(), StoreError> {
        self.append(std::slice::from_ref(result))
    }

    fn write_report(&mut self, report: &SimulationReport) -> Result<(), StoreError> {
        let Some(path) = &self.report_path else {
            return Ok(());
        };
        let file = File::create(path)?;
        serde_json::to_writer_pretty(io::BufWriter::new(file), report).map_err(io::Error::from)?;
        Ok(())
    }
}
