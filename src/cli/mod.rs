//! CLI Module
//!
//! Command-line interface for voice-treatment. With no INPUT argument the
//! user is prompted for a file or directory path.

pub mod commands;

use clap::Parser;
use std::path::PathBuf;

/// Voice Treatment - denoise, EQ, reference-match and deliver voice recordings
#[derive(Parser, Debug)]
#[command(name = "voice-treatment")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// WAV file or directory of WAV files (prompted for when omitted)
    pub input: Option<String>,

    /// TOML file overriding pipeline settings
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Directory holding rnnoise-models/ and references/ (default: current dir)
    #[arg(short, long)]
    pub base_dir: Option<PathBuf>,

    /// Write a JSON batch report to this path
    #[arg(short, long)]
    pub report: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,
}
