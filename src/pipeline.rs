//! Stage pipeline
//!
//! Treats one WorkItem in strict order:
//! 1. Clean & shape (denoise, EQ, resample) -> intermediate
//! 2. Reference match -> matched
//! 3. Finalize lossless (matched -> WAV deliverable)
//! 4. Finalize lossy (matched -> MP3 deliverable)
//!
//! Scratch files are removed on every exit path.

use std::path::PathBuf;

use log::{debug, info};
use serde::Serialize;

use crate::config::PipelineConfig;
use crate::error::{Result, TreatmentError};
use crate::lifecycle::{self, ScratchGuard};
use crate::probe;
use crate::tools::{AudioTool, MatchOutput, ReferenceMatcher};
use crate::work::{AssetState, AudioAsset, WorkItem};

/// Pipeline stages, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    CleanShape = 1,
    ReferenceMatch = 2,
    FinalizeLossless = 3,
    FinalizeLossy = 4,
}

impl Stage {
    pub const ALL: [Stage; 4] = [
        Stage::CleanShape,
        Stage::ReferenceMatch,
        Stage::FinalizeLossless,
        Stage::FinalizeLossy,
    ];
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CleanShape => write!(f, "clean & shape"),
            Self::ReferenceMatch => write!(f, "reference match"),
            Self::FinalizeLossless => write!(f, "finalize lossless"),
            Self::FinalizeLossy => write!(f, "finalize lossy"),
        }
    }
}

/// Deliverables of one successful WorkItem
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemReport {
    pub id: String,
    pub lossless: PathBuf,
    pub lossy: PathBuf,
    pub lossless_sha256: String,
    pub lossy_sha256: String,
}

/// Runs the four stages for one WorkItem at a time
pub struct StagePipeline<'a> {
    config: &'a PipelineConfig,
    tool: &'a dyn AudioTool,
    matcher: &'a dyn ReferenceMatcher,
}

impl<'a> StagePipeline<'a> {
    pub fn new(
        config: &'a PipelineConfig,
        tool: &'a dyn AudioTool,
        matcher: &'a dyn ReferenceMatcher,
    ) -> Self {
        Self {
            config,
            tool,
            matcher,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        self.config
    }

    /// Treat `item`, producing both deliverables or an error.
    ///
    /// No scratch file for `item` remains afterwards in either case.
    pub fn run(&self, item: &WorkItem) -> Result<ItemReport> {
        let guard = ScratchGuard::new(&item.scratch);
        let result = self.run_stages(item);
        // Cleanup failures are logged inside the guard and never replace `result`
        let _ = guard.cleanup();
        result
    }

    fn run_stages(&self, item: &WorkItem) -> Result<ItemReport> {
        let config = self.config;

        let intermediate = self.clean_shape(item)?;
        let matched = self.reference_match(item, &intermediate)?;

        // Stages 3 and 4 both read the same matched asset
        let lossless = self.finalize(
            &matched,
            AudioAsset::new(&item.lossless_output, AssetState::FinalLossless),
            Stage::FinalizeLossless,
        )?;
        if config.verify_outputs {
            let info = probe::verify_lossless(&lossless.path, config)?;
            debug!(
                "[{}] {}: {} Hz, {} ch, {}-bit, {:.2}s",
                item.id,
                Stage::FinalizeLossless,
                info.sample_rate,
                info.channels,
                info.bits_per_sample,
                info.duration_secs()
            );
        }

        let lossy = self.finalize(
            &matched,
            AudioAsset::new(&item.lossy_output, AssetState::FinalLossy),
            Stage::FinalizeLossy,
        )?;

        Ok(ItemReport {
            id: item.id.clone(),
            lossless_sha256: probe::sha256_file(&lossless.path)?,
            lossy_sha256: probe::sha256_file(&lossy.path)?,
            lossless: lossless.path,
            lossy: lossy.path,
        })
    }

    fn clean_shape(&self, item: &WorkItem) -> Result<AudioAsset> {
        let out = advance(&item.input, &item.scratch.intermediate, AssetState::Intermediate)?;
        info!("[{}] {}", item.id, Stage::CleanShape);
        lifecycle::remove_if_present(&out.path)?;
        self.tool.clean_and_shape(
            &item.input.path,
            &self.config.filters,
            &self.config.lossless_format(),
            &out.path,
        )?;
        require_output(&out, Stage::CleanShape, self.tool.name())?;
        Ok(out)
    }

    fn reference_match(&self, item: &WorkItem, intermediate: &AudioAsset) -> Result<AudioAsset> {
        let out = advance(intermediate, &item.scratch.matched, AssetState::Matched)?;
        info!("[{}] {}", item.id, Stage::ReferenceMatch);
        lifecycle::remove_if_present(&out.path)?;
        self.matcher.match_reference(
            &intermediate.path,
            &self.config.reference,
            &[MatchOutput::pcm24(&out.path)],
        )?;
        if !out.exists() {
            return Err(TreatmentError::Matching {
                reason: format!(
                    "{} reported success but wrote no {}",
                    self.matcher.name(),
                    out.path.display()
                ),
            });
        }
        Ok(out)
    }

    fn finalize(&self, matched: &AudioAsset, target: AudioAsset, stage: Stage) -> Result<AudioAsset> {
        let out = advance(matched, &target.path, target.state)?;
        info!("{} -> {}", stage, out.path.display());
        let format = match stage {
            Stage::FinalizeLossy => self.config.lossy_format(),
            _ => self.config.lossless_format(),
        };
        // A stale deliverable from an earlier run must not pass as output
        lifecycle::remove_if_present(&out.path)?;
        self.tool.encode(&matched.path, &format, &out.path, stage)?;
        require_output(&out, stage, self.tool.name())?;
        Ok(out)
    }
}

fn advance(from: &AudioAsset, path: &std::path::Path, next: AssetState) -> Result<AudioAsset> {
    from.advance(path, next).ok_or_else(|| TreatmentError::InvalidConfig {
        reason: format!("{:?} asset cannot become {:?}", from.state, next),
    })
}

/// A tool that exits cleanly but leaves no (or an empty) file still failed
fn require_output(asset: &AudioAsset, stage: Stage, tool: &str) -> Result<()> {
    let len = std::fs::metadata(&asset.path).map(|m| m.len()).unwrap_or(0);
    if len == 0 {
        return Err(TreatmentError::StageExecution {
            stage,
            tool: tool.to_string(),
            diagnostics: format!("no output written to {}", asset.path.display()),
        });
    }
    Ok(())
}
