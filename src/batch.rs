//! Batch driver
//!
//! Runs the stage pipeline over a worklist in order. Every item is
//! attempted; a failure is recorded against its item and the loop moves
//! on. Only startup errors (resolution, assets) end a run early, and
//! those happen before the driver is reached.

use std::path::Path;

use chrono::{DateTime, Utc};
use log::{error, info};
use serde::Serialize;

use crate::error::{Result, TreatmentError};
use crate::pipeline::{ItemReport, Stage, StagePipeline};
use crate::resolver::Worklist;

/// A failed WorkItem
#[derive(Debug, Clone, Serialize)]
pub struct ItemFailure {
    pub id: String,
    pub stage: Option<Stage>,
    pub error_code: &'static str,
    pub message: String,
}

impl ItemFailure {
    fn new(id: &str, err: &TreatmentError) -> Self {
        Self {
            id: id.to_string(),
            stage: err.stage(),
            error_code: err.error_code(),
            message: err.to_string(),
        }
    }
}

/// Outcome of one WorkItem
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ItemOutcome {
    Succeeded(ItemReport),
    Failed(ItemFailure),
}

impl ItemOutcome {
    pub fn id(&self) -> &str {
        match self {
            ItemOutcome::Succeeded(report) => &report.id,
            ItemOutcome::Failed(failure) => &failure.id,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ItemOutcome::Succeeded(_))
    }
}

/// Aggregate of one run; one outcome per WorkItem, in worklist order
#[derive(Debug, Clone, Serialize)]
pub struct BatchResult {
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub outcomes: Vec<ItemOutcome>,
}

impl BatchResult {
    pub(crate) fn start() -> Self {
        Self {
            started_at: Utc::now(),
            finished_at: None,
            outcomes: Vec::new(),
        }
    }

    pub fn attempted(&self) -> usize {
        self.outcomes.len()
    }

    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.attempted() - self.succeeded()
    }

    pub fn failures(&self) -> impl Iterator<Item = &ItemFailure> {
        self.outcomes.iter().filter_map(|o| match o {
            ItemOutcome::Failed(f) => Some(f),
            ItemOutcome::Succeeded(_) => None,
        })
    }

    pub fn successes(&self) -> impl Iterator<Item = &ItemReport> {
        self.outcomes.iter().filter_map(|o| match o {
            ItemOutcome::Succeeded(r) => Some(r),
            ItemOutcome::Failed(_) => None,
        })
    }

    /// Write the result as pretty JSON
    pub fn write_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Print the end-of-run summary
    pub fn print_summary(&self) {
        println!();
        println!("{:-<60}", "");
        println!(
            "Processed {} file(s): {} succeeded, {} failed",
            self.attempted(),
            self.succeeded(),
            self.failed()
        );
        for failure in self.failures() {
            println!("  FAILED {}: {}", failure.id, failure.message);
        }
        println!("{:-<60}", "");
    }
}

/// Drives the pipeline over a worklist
pub struct BatchDriver<'a> {
    pipeline: StagePipeline<'a>,
}

impl<'a> BatchDriver<'a> {
    pub fn new(pipeline: StagePipeline<'a>) -> Self {
        Self { pipeline }
    }

    pub fn run(&self, worklist: &Worklist) -> BatchResult {
        let mut result = BatchResult::start();
        let total = worklist.len();

        println!("\nFound {} file(s) to process", total);

        for (i, item) in worklist.items.iter().enumerate() {
            println!("\nProcessing file {} of {}: {}", i + 1, total, item.id);

            let outcome = match self.pipeline.run(item) {
                Ok(report) => {
                    println!("Successfully processed: {}", item.id);
                    println!("  WAV: {}", report.lossless.display());
                    println!("  MP3: {}", report.lossy.display());
                    ItemOutcome::Succeeded(report)
                }
                Err(e) => {
                    error!("[{}] {} ({})", item.id, e, e.error_code());
                    println!("Failed to process {}: {}", item.id, e);
                    ItemOutcome::Failed(ItemFailure::new(&item.id, &e))
                }
            };
            result.outcomes.push(outcome);
        }

        result.finished_at = Some(Utc::now());
        info!(
            "Batch finished: {} attempted, {} succeeded, {} failed",
            result.attempted(),
            result.succeeded(),
            result.failed()
        );
        result
    }
}
