//! voice-treatment - batch voice recording treatment
//!
//! Each recording runs through a fixed four-stage pipeline:
//! 1. Clean & shape: RNNoise denoise, EQ curve, soxr resample (ffmpeg)
//! 2. Reference match: loudness/timbre matching toward a reference (matchering)
//! 3. Finalize lossless: 48 kHz mono 24-bit WAV
//! 4. Finalize lossy: 48 kHz mono 320 kbit/s MP3
//!
//! # Architecture
//!
//! - `resolver` turns a file or directory into a worklist
//! - `pipeline` runs the stages for one WorkItem
//! - `lifecycle` owns the per-item scratch files
//! - `batch` drives the worklist and aggregates a `BatchResult`
//!
//! External tools sit behind the `tools::AudioTool` and
//! `tools::ReferenceMatcher` traits.

pub mod batch;
pub mod cli;
pub mod config;
pub mod error;
pub mod filters;
pub mod lifecycle;
pub mod pipeline;
pub mod probe;
pub mod resolver;
pub mod tools;
pub mod work;

pub use batch::{BatchDriver, BatchResult, ItemOutcome};
pub use config::PipelineConfig;
pub use error::{Result, TreatmentError};
pub use pipeline::{Stage, StagePipeline};
pub use resolver::{resolve, Worklist};
