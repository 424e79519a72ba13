//! CLI Command Implementations
//!
//! Implements the actual logic behind the prompt.

use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

use log::{info, warn};

use super::Cli;
use crate::batch::{BatchDriver, BatchResult};
use crate::config::PipelineConfig;
use crate::error::{Result, TreatmentError};
use crate::pipeline::StagePipeline;
use crate::resolver::{self, clean_input_path};
use crate::tools::{AudioTool, Ffmpeg, MatcheringBridge, ReferenceMatcher};

const PROMPT: &str = "\nPlease enter the path to a WAV file or a directory containing WAV files: ";

/// Ask for the input path on `output`, read one line from `input`
pub fn prompt_for_input<R: BufRead, W: Write>(mut input: R, mut output: W) -> Result<PathBuf> {
    write!(output, "{}", PROMPT)?;
    output.flush()?;

    let mut line = String::new();
    input.read_line(&mut line)?;
    let path = clean_input_path(&line);
    if path.as_os_str().is_empty() {
        return Err(TreatmentError::NotFound { path });
    }
    Ok(path)
}

/// Build the run configuration from the CLI flags
pub fn load_config(cli: &Cli) -> Result<PipelineConfig> {
    let base_dir = match &cli.base_dir {
        Some(dir) => dir.clone(),
        None => std::env::current_dir()?,
    };
    PipelineConfig::load(&base_dir, cli.config.as_deref())
}

/// Resolve `input` and treat every WorkItem with the given tools.
///
/// Errors only for startup failures; per-item failures are in the result.
pub fn run_batch(
    input: &Path,
    config: &PipelineConfig,
    tool: &dyn AudioTool,
    matcher: &dyn ReferenceMatcher,
) -> Result<BatchResult> {
    let worklist = resolver::resolve(input, config)?;
    let pipeline = StagePipeline::new(config, tool, matcher);
    Ok(BatchDriver::new(pipeline).run(&worklist))
}

/// Full CLI flow with ffmpeg and matchering
pub fn treat(cli: &Cli) -> Result<BatchResult> {
    let config = load_config(cli)?;

    let input = match &cli.input {
        Some(raw) => clean_input_path(raw),
        None => {
            let stdin = std::io::stdin();
            prompt_for_input(stdin.lock(), std::io::stdout())?
        }
    };
    info!("Input: {}", input.display());

    let ffmpeg = Ffmpeg::from_config(&config);
    let matchering = MatcheringBridge::from_config(&config);
    let result = run_batch(&input, &config, &ffmpeg, &matchering)?;

    result.print_summary();
    if let Some(report) = &cli.report {
        write_report(&result, report);
    }

    Ok(result)
}

/// Write the JSON report; the batch already ran, so failure is only a warning
pub fn write_report(result: &BatchResult, path: &Path) -> bool {
    match result.write_json(path) {
        Ok(()) => {
            println!("Report written to {}", path.display());
            true
        }
        Err(e) => {
            warn!("Could not write report {}: {}", path.display(), e);
            false
        }
    }
}
