//! Mock tool implementations for testing
//!
//! These don't run ffmpeg or matchering but write real, deterministic WAV
//! files with hound so stage outputs can be inspected. Failures can be
//! injected per input base name.

use std::cell::RefCell;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};

use super::{AudioTool, MatchOutput, ReferenceMatcher};
use crate::config::OutputFormat;
use crate::error::{Result, TreatmentError};
use crate::filters::FilterChain;
use crate::pipeline::Stage;

/// Duration of the tone written by clean & shape
const MOCK_TONE_SECS: f32 = 0.1;

/// One recorded tool invocation
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCall {
    pub stage: Stage,
    pub input: PathBuf,
    pub output: PathBuf,
    /// Filter string for clean & shape, empty otherwise
    pub filters: String,
    pub format: OutputFormat,
}

/// Mock media tool
#[derive(Debug, Default)]
pub struct MockAudioTool {
    calls: RefCell<Vec<ToolCall>>,
    /// (stage, base-name fragment) pairs that fail
    failures: HashSet<(Stage, String)>,
    /// Stages that exit cleanly without writing their output
    silent: HashSet<Stage>,
}

impl MockAudioTool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail `stage` for inputs whose file name contains `fragment`
    pub fn failing(mut self, stage: Stage, fragment: &str) -> Self {
        self.failures.insert((stage, fragment.to_string()));
        self
    }

    /// Report success for `stage` without writing anything
    pub fn silent(mut self, stage: Stage) -> Self {
        self.silent.insert(stage);
        self
    }

    pub fn calls(&self) -> Vec<ToolCall> {
        self.calls.borrow().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.borrow().len()
    }

    /// Log the call; `Ok(false)` means the stage should write nothing
    fn record(
        &self,
        stage: Stage,
        input: &Path,
        output: &Path,
        filters: String,
        format: &OutputFormat,
    ) -> Result<bool> {
        self.calls.borrow_mut().push(ToolCall {
            stage,
            input: input.to_path_buf(),
            output: output.to_path_buf(),
            filters,
            format: format.clone(),
        });

        let name = input
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let fails = self
            .failures
            .iter()
            .any(|(s, fragment)| *s == stage && name.contains(fragment.as_str()));
        if fails {
            return Err(TreatmentError::StageExecution {
                stage,
                tool: "mock".to_string(),
                diagnostics: format!("{}: Invalid data found when processing input", name),
            });
        }
        Ok(!self.silent.contains(&stage))
    }
}

impl AudioTool for MockAudioTool {
    fn clean_and_shape(
        &self,
        input: &Path,
        chain: &FilterChain,
        format: &OutputFormat,
        output: &Path,
    ) -> Result<()> {
        if !self.record(Stage::CleanShape, input, output, chain.to_filter_string(), format)? {
            return Ok(());
        }
        if !input.is_file() {
            return Err(TreatmentError::StageExecution {
                stage: Stage::CleanShape,
                tool: "mock".to_string(),
                diagnostics: format!("{}: No such file or directory", input.display()),
            });
        }
        write_tone(output, format.sample_rate, format.channels, 440.0)
    }

    fn encode(&self, input: &Path, format: &OutputFormat, output: &Path, stage: Stage) -> Result<()> {
        if !self.record(stage, input, output, String::new(), format)? {
            return Ok(());
        }
        match format.bitrate_kbps {
            None => rewrite_wav(input, output, format),
            // Lossy output is opaque: tag + input bytes, deterministic
            Some(kbps) => {
                let mut bytes = format!("MOCKMP3 {}k\n", kbps).into_bytes();
                bytes.extend(std::fs::read(input)?);
                std::fs::write(output, bytes)?;
                Ok(())
            }
        }
    }

    fn name(&self) -> &str {
        "mock-audio"
    }
}

/// Mock reference matcher; copies the target into each result
#[derive(Debug, Default)]
pub struct MockMatcher {
    calls: RefCell<Vec<(PathBuf, PathBuf)>>,
    fail_for: HashSet<String>,
    /// Report success without writing results
    silent: bool,
}

impl MockMatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail for targets whose file name contains `fragment`
    pub fn failing(mut self, fragment: &str) -> Self {
        self.fail_for.insert(fragment.to_string());
        self
    }

    /// Claim success without producing any result file
    pub fn silent(mut self) -> Self {
        self.silent = true;
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.borrow().len()
    }
}

impl ReferenceMatcher for MockMatcher {
    fn match_reference(&self, target: &Path, reference: &Path, results: &[MatchOutput]) -> Result<()> {
        self.calls
            .borrow_mut()
            .push((target.to_path_buf(), reference.to_path_buf()));

        let name = target
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        if self.fail_for.iter().any(|f| name.contains(f.as_str())) {
            return Err(TreatmentError::Matching {
                reason: "Audio is too short for matching".to_string(),
            });
        }
        if self.silent {
            return Ok(());
        }
        for result in results {
            std::fs::copy(target, &result.path).map_err(|e| TreatmentError::Matching {
                reason: e.to_string(),
            })?;
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "mock-matcher"
    }
}

/// Write a 24-bit sine tone WAV
pub fn write_tone(path: &Path, sample_rate: u32, channels: u16, frequency: f32) -> Result<()> {
    let spec = WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 24,
        sample_format: SampleFormat::Int,
    };
    let mut writer = WavWriter::create(path, spec).map_err(wav_error)?;

    let frames = (MOCK_TONE_SECS * sample_rate as f32) as usize;
    let angular_freq = 2.0 * std::f32::consts::PI * frequency / sample_rate as f32;
    for i in 0..frames {
        let sample = ((angular_freq * i as f32).sin() * 0.5 * 8388607.0) as i32;
        for _ in 0..channels {
            writer.write_sample(sample).map_err(wav_error)?;
        }
    }
    writer.finalize().map_err(wav_error)
}

/// Copy the first channel of `input` into a WAV with `format`'s rate and
/// channel count. Sample values are carried over unchanged.
fn rewrite_wav(input: &Path, output: &Path, format: &OutputFormat) -> Result<()> {
    let mut reader = WavReader::open(input).map_err(wav_error)?;
    let source_channels = reader.spec().channels as usize;
    let samples: Vec<i32> = reader
        .samples::<i32>()
        .collect::<std::result::Result<_, _>>()
        .map_err(wav_error)?;

    let spec = WavSpec {
        channels: format.channels,
        sample_rate: format.sample_rate,
        bits_per_sample: 24,
        sample_format: SampleFormat::Int,
    };
    let mut writer = WavWriter::create(output, spec).map_err(wav_error)?;
    for frame in samples.chunks(source_channels.max(1)) {
        for _ in 0..format.channels {
            writer.write_sample(frame[0]).map_err(wav_error)?;
        }
    }
    writer.finalize().map_err(wav_error)
}

fn wav_error(e: hound::Error) -> TreatmentError {
    match e {
        hound::Error::IoError(io) => TreatmentError::Io(io),
        other => TreatmentError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            other.to_string(),
        )),
    }
}
