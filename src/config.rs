//! Pipeline configuration
//!
//! `PipelineConfig` is built once at startup (defaults, then an optional
//! TOML file, then environment overrides) and shared read-only by every
//! WorkItem in the run. Relative paths are resolved against the base
//! directory, never against wherever the process happens to be launched
//! from at call time.

use std::path::{Path, PathBuf};
use std::time::Duration;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::{Result, TreatmentError};
use crate::filters::FilterChain;

/// Conventional location of the RNNoise model, relative to the base dir
pub const DEFAULT_DENOISE_MODEL: &str = "rnnoise-models/beguiling-drafter-2018-08-30/bd.rnnn";

/// Conventional location of the reference recording, relative to the base dir
pub const DEFAULT_REFERENCE: &str = "references/reference.wav";

const ENV_FFMPEG: &str = "VOICE_TREATMENT_FFMPEG";
const ENV_PYTHON: &str = "VOICE_TREATMENT_PYTHON";
const ENV_TIMEOUT_SECS: &str = "VOICE_TREATMENT_TIMEOUT_SECS";

/// Encoder settings for one deliverable
#[derive(Debug, Clone, PartialEq)]
pub struct OutputFormat {
    pub sample_rate: u32,
    pub channels: u16,
    pub codec: String,
    /// Lossy only
    pub bitrate_kbps: Option<u32>,
    /// Lossy only; applied as a `volume` filter during encode
    pub volume_db: Option<f64>,
}

/// Fixed parameters for one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Directory relative paths are resolved against
    pub base_dir: PathBuf,
    pub denoise_model: PathBuf,
    pub reference: PathBuf,
    /// Where intermediate/matched scratch files live
    pub scratch_dir: PathBuf,
    /// Overrides the derived `<input-dir>_processed` root
    pub output_root: Option<PathBuf>,

    /// ffmpeg executable
    pub ffmpeg: String,
    /// Python interpreter with `matchering` installed
    pub python: String,
    /// Per-invocation limit in seconds; 0 disables
    pub tool_timeout_secs: u64,

    pub sample_rate: u32,
    pub channels: u16,
    pub bit_depth: u16,
    pub lossless_codec: String,
    pub lossy_codec: String,
    pub lossy_bitrate_kbps: u32,
    /// Optional extra attenuation for the lossy deliverable, e.g. -25.0
    pub lossy_volume_db: Option<f64>,

    pub filters: FilterChain,

    /// Read back the lossless deliverable header after encoding
    pub verify_outputs: bool,

    pub input_extension: String,
    pub lossless_suffix: String,
    pub lossy_suffix: String,
    pub lossless_subdir: String,
    pub output_root_suffix: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        let model = PathBuf::from(DEFAULT_DENOISE_MODEL);
        PipelineConfig {
            base_dir: PathBuf::from("."),
            filters: FilterChain::voice(&model),
            denoise_model: model,
            reference: PathBuf::from(DEFAULT_REFERENCE),
            scratch_dir: PathBuf::from("."),
            output_root: None,
            ffmpeg: "ffmpeg".to_string(),
            python: "python3".to_string(),
            tool_timeout_secs: 30 * 60,
            sample_rate: 48000,
            channels: 1,
            bit_depth: 24,
            lossless_codec: "pcm_s24le".to_string(),
            lossy_codec: "libmp3lame".to_string(),
            lossy_bitrate_kbps: 320,
            lossy_volume_db: None,
            verify_outputs: true,
            input_extension: "wav".to_string(),
            lossless_suffix: "_processed".to_string(),
            lossy_suffix: "_mobile".to_string(),
            lossless_subdir: "wavs".to_string(),
            output_root_suffix: "_processed".to_string(),
        }
    }
}

impl PipelineConfig {
    /// Defaults rooted at `base_dir`, paths resolved and validated
    pub fn with_base_dir(base_dir: &Path) -> Result<Self> {
        let mut config = PipelineConfig {
            base_dir: base_dir.to_path_buf(),
            ..Default::default()
        };
        config.finish()?;
        Ok(config)
    }

    /// Parse a TOML document; unspecified keys keep their defaults
    pub fn from_toml_str(contents: &str, base_dir: &Path) -> Result<Self> {
        let mut config: PipelineConfig = toml::from_str(contents)?;
        // A base_dir inside the file is itself relative to the caller's base
        config.base_dir = if config.base_dir == Path::new(".") {
            base_dir.to_path_buf()
        } else {
            resolve(base_dir, &config.base_dir)
        };
        config.finish()?;
        Ok(config)
    }

    /// Build the run configuration: defaults, optional file, environment.
    pub fn load(base_dir: &Path, config_file: Option<&Path>) -> Result<Self> {
        let mut config = match config_file {
            Some(path) => {
                if !path.is_file() {
                    return Err(TreatmentError::NotFound {
                        path: path.to_path_buf(),
                    });
                }
                let contents = std::fs::read_to_string(path)?;
                debug!("Loaded config file {}", path.display());
                Self::from_toml_str(&contents, base_dir)?
            }
            None => Self::with_base_dir(base_dir)?,
        };

        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Apply tool overrides from the environment.
    ///
    /// `lookup` is `std::env::var` in production.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(ffmpeg) = lookup(ENV_FFMPEG) {
            self.ffmpeg = ffmpeg;
        }
        if let Some(python) = lookup(ENV_PYTHON) {
            self.python = python;
        }
        if let Some(raw) = lookup(ENV_TIMEOUT_SECS) {
            self.tool_timeout_secs = raw.trim().parse().map_err(|_| TreatmentError::InvalidConfig {
                reason: format!(
                    "{} must be a whole number of seconds, got '{}'",
                    ENV_TIMEOUT_SECS, raw
                ),
            })?;
        }
        Ok(())
    }

    /// Resolve relative paths, bind the denoise step to the model, validate
    fn finish(&mut self) -> Result<()> {
        self.denoise_model = resolve(&self.base_dir, &self.denoise_model);
        self.reference = resolve(&self.base_dir, &self.reference);
        self.scratch_dir = resolve(&self.base_dir, &self.scratch_dir);
        self.output_root = self
            .output_root
            .as_ref()
            .map(|root| resolve(&self.base_dir, root));
        self.filters = self.filters.clone().with_model(&self.denoise_model);
        self.validate()
    }

    /// Check values that would only fail later inside a tool
    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: &str| {
            Err(TreatmentError::InvalidConfig {
                reason: reason.to_string(),
            })
        };

        if self.sample_rate == 0 {
            return invalid("sample_rate must be positive");
        }
        if self.channels == 0 {
            return invalid("channels must be positive");
        }
        if !matches!(self.bit_depth, 16 | 24 | 32) {
            return invalid("bit_depth must be 16, 24 or 32");
        }
        if let Some(depth) = pcm_codec_bit_depth(&self.lossless_codec) {
            if depth != self.bit_depth {
                return Err(TreatmentError::InvalidConfig {
                    reason: format!(
                        "lossless_codec {} writes {}-bit samples but bit_depth is {}",
                        self.lossless_codec, depth, self.bit_depth
                    ),
                });
            }
        }
        if self.lossy_bitrate_kbps == 0 {
            return invalid("lossy_bitrate_kbps must be positive");
        }
        if self.input_extension.is_empty() {
            return invalid("input_extension must not be empty");
        }
        if self.lossless_suffix.is_empty() && self.lossless_subdir.is_empty() {
            // Deliverable would overwrite the raw input in single-file mode
            return invalid("lossless_suffix and lossless_subdir cannot both be empty");
        }
        self.filters.validate()
    }

    /// `None` when timeouts are disabled
    pub fn tool_timeout(&self) -> Option<Duration> {
        match self.tool_timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }

    pub fn lossless_format(&self) -> OutputFormat {
        OutputFormat {
            sample_rate: self.sample_rate,
            channels: self.channels,
            codec: self.lossless_codec.clone(),
            bitrate_kbps: None,
            volume_db: None,
        }
    }

    pub fn lossy_format(&self) -> OutputFormat {
        OutputFormat {
            sample_rate: self.sample_rate,
            channels: self.channels,
            codec: self.lossy_codec.clone(),
            bitrate_kbps: Some(self.lossy_bitrate_kbps),
            volume_db: self.lossy_volume_db,
        }
    }
}

/// Sample width of an ffmpeg PCM codec name such as `pcm_s16le`
fn pcm_codec_bit_depth(codec: &str) -> Option<u16> {
    let width = codec
        .strip_prefix("pcm_s")
        .or_else(|| codec.strip_prefix("pcm_f"))?;
    let digits: String = width.chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}

fn resolve(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}
