//! voice-treatment CLI
//!
//! Prompts for a file or directory and treats every recording in it.

use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use env_logger::Env;
use log::{error, info};

use voice_treatment::cli::{commands, Cli};
use voice_treatment::TreatmentError;

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(default_filter)).init();

    info!("Voice Treatment v{}", env!("CARGO_PKG_VERSION"));

    match run(&cli) {
        Ok(()) => {
            println!("\nProcessing complete!");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            if let Some(treatment) = e.downcast_ref::<TreatmentError>() {
                for suggestion in treatment.recovery_suggestions() {
                    eprintln!("  - {}", suggestion);
                }
            }
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    let result = commands::treat(cli).context("voice treatment did not start")?;
    if result.failed() > 0 {
        info!("{} of {} file(s) failed", result.failed(), result.attempted());
    }
    Ok(())
}
