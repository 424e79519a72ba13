//! Clean & shape filter chain
//!
//! Filters run in chain order (index 0 first). The order is fixed:
//! 1. Denoise (the EQ assumes a denoised signal)
//! 2. High-pass
//! 3. Peaking bells
//! 4. Low-pass
//! 5. Resample (always last, so all filtering happens at the source rate)
//!
//! Each filter renders to one ffmpeg filtergraph entry; the chain joins
//! them with commas.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, TreatmentError};

/// One step of the clean & shape chain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FilterSpec {
    /// RNNoise spectral denoise conditioned on a model file. The model is
    /// bound to the configured `denoise_model` when the config is built.
    Denoise {
        #[serde(default)]
        model: PathBuf,
    },
    /// High-pass; `poles = 2` gives a 12 dB/oct slope
    HighPass { frequency: f64, poles: u8 },
    /// Peaking bell, bandwidth given as Q
    Peaking { frequency: f64, q: f64, gain_db: f64 },
    /// Low-pass; `poles = 2` gives a 12 dB/oct slope
    LowPass { frequency: f64, poles: u8 },
    /// SoX asynchronous resampler
    Resample { min_hard_comp: f64 },
}

impl FilterSpec {
    /// Short name used in logs and validation messages
    pub fn kind(&self) -> &'static str {
        match self {
            FilterSpec::Denoise { .. } => "denoise",
            FilterSpec::HighPass { .. } => "highpass",
            FilterSpec::Peaking { .. } => "peaking",
            FilterSpec::LowPass { .. } => "lowpass",
            FilterSpec::Resample { .. } => "resample",
        }
    }

    /// Render as an ffmpeg filtergraph entry
    pub fn to_ffmpeg(&self) -> String {
        match self {
            FilterSpec::Denoise { model } => format!("arnndn=m={}", quote_filter_arg(model)),
            FilterSpec::HighPass { frequency, poles } => {
                format!("highpass=f={}:p={}", frequency, poles)
            }
            FilterSpec::Peaking {
                frequency,
                q,
                gain_db,
            } => format!("equalizer=f={}:t=q:w={}:g={}", frequency, q, gain_db),
            FilterSpec::LowPass { frequency, poles } => {
                format!("lowpass=f={}:p={}", frequency, poles)
            }
            FilterSpec::Resample { min_hard_comp } => format!(
                "aresample=async=1:min_hard_comp={}:first_pts=0:resampler=soxr",
                min_hard_comp
            ),
        }
    }
}

/// Quote a path for use inside a filtergraph option value.
///
/// Single quotes inside the path are closed, escaped and reopened.
fn quote_filter_arg(path: &Path) -> String {
    let raw = path.to_string_lossy();
    format!("'{}'", raw.replace('\'', r"'\''"))
}

/// Ordered clean & shape chain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterChain {
    pub filters: Vec<FilterSpec>,
}

impl FilterChain {
    /// The voice treatment curve: denoise, 150 Hz low cut, -4 dB at 880 Hz,
    /// +3 dB at 5 kHz, 17.5 kHz high cut, soxr resample.
    pub fn voice(model: &Path) -> Self {
        Self {
            filters: vec![
                FilterSpec::Denoise {
                    model: model.to_path_buf(),
                },
                FilterSpec::HighPass {
                    frequency: 150.0,
                    poles: 2,
                },
                FilterSpec::Peaking {
                    frequency: 880.0,
                    q: 1.0,
                    gain_db: -4.0,
                },
                FilterSpec::Peaking {
                    frequency: 5000.0,
                    q: 1.0,
                    gain_db: 3.0,
                },
                FilterSpec::LowPass {
                    frequency: 17500.0,
                    poles: 2,
                },
                FilterSpec::Resample {
                    min_hard_comp: 0.100001,
                },
            ],
        }
    }

    /// Point the denoise step at a different model file
    pub fn with_model(mut self, model: &Path) -> Self {
        for filter in &mut self.filters {
            if let FilterSpec::Denoise { model: m } = filter {
                *m = model.to_path_buf();
            }
        }
        self
    }

    /// Check the ordering constraints.
    ///
    /// Denoise must be first and resample last, each exactly once, and
    /// every EQ step must sit between them.
    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: String| TreatmentError::InvalidConfig { reason };

        match self.filters.first() {
            Some(FilterSpec::Denoise { .. }) => {}
            Some(other) => {
                return Err(invalid(format!(
                    "filter chain must start with denoise, found {}",
                    other.kind()
                )))
            }
            None => return Err(invalid("filter chain is empty".to_string())),
        }

        match self.filters.last() {
            Some(FilterSpec::Resample { .. }) => {}
            Some(other) => {
                return Err(invalid(format!(
                    "filter chain must end with resample, found {}",
                    other.kind()
                )))
            }
            None => unreachable!("checked non-empty above"),
        }

        let count = |kind: &str| self.filters.iter().filter(|f| f.kind() == kind).count();
        for kind in ["denoise", "resample"] {
            if count(kind) != 1 {
                return Err(invalid(format!(
                    "filter chain must contain exactly one {} step",
                    kind
                )));
            }
        }

        Ok(())
    }

    /// Render the whole chain as the `-af` argument
    pub fn to_filter_string(&self) -> String {
        self.filters
            .iter()
            .map(FilterSpec::to_ffmpeg)
            .collect::<Vec<_>>()
            .join(",")
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }
}
