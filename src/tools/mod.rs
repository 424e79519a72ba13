//! External tool interfaces
//!
//! The pipeline never talks to a subprocess directly. It goes through:
//! - `AudioTool` for clean & shape and the two finalize encodes (ffmpeg)
//! - `ReferenceMatcher` for reference matching (matchering via a Python bridge)
//!
//! Mock implementations live in `mock` for pipeline testing.

mod ffmpeg;
mod matchering;
pub mod mock;
mod process;

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::config::OutputFormat;
use crate::error::Result;
use crate::filters::FilterChain;
use crate::pipeline::Stage;

pub use ffmpeg::Ffmpeg;
pub use matchering::MatcheringBridge;
pub use process::{run_tool, ToolOutput};

/// PCM encodings the matcher can write
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PcmSubtype {
    #[serde(rename = "PCM_16")]
    Pcm16,
    #[serde(rename = "PCM_24")]
    Pcm24,
    #[serde(rename = "FLOAT")]
    Float32,
}

/// One file the matcher should produce
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchOutput {
    pub path: PathBuf,
    pub subtype: PcmSubtype,
}

impl MatchOutput {
    pub fn pcm24(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            subtype: PcmSubtype::Pcm24,
        }
    }
}

/// Media tool used for stages 1, 3 and 4
pub trait AudioTool {
    /// Run `chain` over `input` and write `output` in `format`, overwriting
    fn clean_and_shape(
        &self,
        input: &Path,
        chain: &FilterChain,
        format: &OutputFormat,
        output: &Path,
    ) -> Result<()>;

    /// Re-encode `input` to `output` in `format`, overwriting.
    ///
    /// `stage` is only used to attribute failures.
    fn encode(&self, input: &Path, format: &OutputFormat, output: &Path, stage: Stage) -> Result<()>;

    /// Tool name used in logs and error messages
    fn name(&self) -> &str;
}

/// Reference-match service used for stage 2
pub trait ReferenceMatcher {
    /// Match `target` toward `reference`, writing every requested result.
    ///
    /// Any failure is reported as `TreatmentError::Matching`.
    fn match_reference(&self, target: &Path, reference: &Path, results: &[MatchOutput]) -> Result<()>;

    fn name(&self) -> &str;
}
