//! Error handling for voice-treatment
//!
//! Startup errors (missing input, missing fixed assets, bad config) end the
//! run. Everything raised while processing one WorkItem is captured at the
//! WorkItem boundary by the batch driver.

use std::path::PathBuf;

use thiserror::Error;

use crate::pipeline::Stage;

/// Result type alias for voice-treatment operations
pub type Result<T> = std::result::Result<T, TreatmentError>;

/// Which of the shared fixed assets is missing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetKind {
    DenoiseModel,
    Reference,
}

impl std::fmt::Display for AssetKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DenoiseModel => write!(f, "denoise model"),
            Self::Reference => write!(f, "reference recording"),
        }
    }
}

/// Main error type for voice-treatment operations
#[derive(Error, Debug)]
pub enum TreatmentError {
    // Startup Errors
    #[error("Input not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("{kind} not found at {}", path.display())]
    MissingAsset { kind: AssetKind, path: PathBuf },

    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    // Per-item Errors
    #[error("{stage} failed ({tool}): {diagnostics}")]
    StageExecution {
        stage: Stage,
        tool: String,
        diagnostics: String,
    },

    #[error("Reference matching failed: {reason}")]
    Matching { reason: String },

    #[error("Output verification failed for {}: {reason}", path.display())]
    OutputVerification { path: PathBuf, reason: String },

    #[error("Failed to remove scratch file {}: {source}", path.display())]
    Cleanup {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // I/O Errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Serialization Errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config file error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl TreatmentError {
    /// Get the error code for this error type
    pub fn error_code(&self) -> &'static str {
        match self {
            TreatmentError::NotFound { .. } => "NOT_FOUND",
            TreatmentError::MissingAsset { .. } => "MISSING_ASSET",
            TreatmentError::InvalidConfig { .. } => "INVALID_CONFIG",
            TreatmentError::StageExecution { .. } => "STAGE_EXECUTION",
            TreatmentError::Matching { .. } => "MATCHING",
            TreatmentError::OutputVerification { .. } => "OUTPUT_VERIFICATION",
            TreatmentError::Cleanup { .. } => "CLEANUP",
            TreatmentError::Io(_) => "IO_ERROR",
            TreatmentError::Json(_) => "JSON_ERROR",
            TreatmentError::Toml(_) => "CONFIG_FILE_ERROR",
        }
    }

    /// Errors that stop the whole run before any WorkItem is attempted
    pub fn is_batch_fatal(&self) -> bool {
        matches!(
            self,
            TreatmentError::NotFound { .. }
                | TreatmentError::MissingAsset { .. }
                | TreatmentError::InvalidConfig { .. }
                | TreatmentError::Toml(_)
        )
    }

    /// The pipeline stage the error was raised in, if any
    pub fn stage(&self) -> Option<Stage> {
        match self {
            TreatmentError::StageExecution { stage, .. } => Some(*stage),
            TreatmentError::Matching { .. } => Some(Stage::ReferenceMatch),
            TreatmentError::OutputVerification { .. } => Some(Stage::FinalizeLossless),
            _ => None,
        }
    }

    /// Get recovery suggestions for this error
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            TreatmentError::NotFound { .. } => vec![
                "Check the path is correct",
                "Paths with spaces may be pasted with or without quotes",
            ],
            TreatmentError::MissingAsset {
                kind: AssetKind::DenoiseModel,
                ..
            } => vec![
                "Download an RNNoise model (.rnnn) into rnnoise-models/",
                "Or point `denoise_model` in the config file at an existing model",
            ],
            TreatmentError::MissingAsset {
                kind: AssetKind::Reference,
                ..
            } => vec![
                "Place a reference WAV in references/",
                "Or point `reference` in the config file at an existing recording",
            ],
            TreatmentError::StageExecution { .. } => vec![
                "Check that ffmpeg is installed and built with arnndn and soxr",
                "Try the input file in another player; it may be corrupted",
            ],
            TreatmentError::Matching { .. } => vec![
                "Check that the Python interpreter can `import matchering`",
                "Very short or silent takes cannot be matched",
            ],
            TreatmentError::OutputVerification { .. } => {
                vec!["The encoder ignored the requested format; check the ffmpeg build"]
            }
            _ => vec![],
        }
    }
}
