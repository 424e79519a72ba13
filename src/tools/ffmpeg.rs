//! ffmpeg adapter
//!
//! Argument lists are built by pure functions so the exact invocation can
//! be checked without running ffmpeg.

use std::ffi::OsString;
use std::path::Path;
use std::process::Command;
use std::time::Duration;

use log::info;

use super::process::run_tool;
use super::AudioTool;
use crate::config::{OutputFormat, PipelineConfig};
use crate::error::Result;
use crate::filters::FilterChain;
use crate::pipeline::Stage;

/// ffmpeg invoked as a subprocess
#[derive(Debug, Clone)]
pub struct Ffmpeg {
    program: String,
    timeout: Option<Duration>,
}

impl Ffmpeg {
    pub fn new(program: impl Into<String>, timeout: Option<Duration>) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(config.ffmpeg.clone(), config.tool_timeout())
    }

    /// `-i <input> -af <chain> -ar <rate> -ac <ch> -acodec <codec> <output>`
    pub fn clean_shape_args(
        input: &Path,
        chain: &FilterChain,
        format: &OutputFormat,
        output: &Path,
    ) -> Vec<OsString> {
        let mut args = base_args(input);
        args.push("-af".into());
        args.push(chain.to_filter_string().into());
        push_format(&mut args, format);
        args.push(output.into());
        args
    }

    /// Re-encode without further signal change, apart from the optional
    /// volume trim on lossy output. Metadata is dropped and muxers run in
    /// bitexact mode so repeated encodes of the same input are identical.
    pub fn encode_args(input: &Path, format: &OutputFormat, output: &Path) -> Vec<OsString> {
        let mut args = base_args(input);
        if let Some(db) = format.volume_db {
            args.push("-af".into());
            args.push(format!("volume={}dB", db).into());
        }
        push_format(&mut args, format);
        for arg in ["-map_metadata", "-1", "-fflags", "+bitexact", "-flags:a", "+bitexact"] {
            args.push(arg.into());
        }
        args.push(output.into());
        args
    }

    fn run(&self, args: Vec<OsString>, stage: Stage) -> Result<()> {
        let mut command = Command::new(&self.program);
        command.args(args);
        let output = run_tool(command, self.timeout, stage)?.into_success(stage)?;
        info!(
            "[{}] {} finished in {:.1}s",
            stage,
            self.program,
            output.elapsed.as_secs_f64()
        );
        Ok(())
    }
}

impl AudioTool for Ffmpeg {
    fn clean_and_shape(
        &self,
        input: &Path,
        chain: &FilterChain,
        format: &OutputFormat,
        output: &Path,
    ) -> Result<()> {
        self.run(
            Self::clean_shape_args(input, chain, format, output),
            Stage::CleanShape,
        )
    }

    fn encode(&self, input: &Path, format: &OutputFormat, output: &Path, stage: Stage) -> Result<()> {
        self.run(Self::encode_args(input, format, output), stage)
    }

    fn name(&self) -> &str {
        &self.program
    }
}

/// Overwrite, no banner, never read stdin
fn base_args(input: &Path) -> Vec<OsString> {
    let mut args: Vec<OsString> = ["-hide_banner", "-nostdin", "-y", "-i"]
        .into_iter()
        .map(OsString::from)
        .collect();
    args.push(input.into());
    args
}

fn push_format(args: &mut Vec<OsString>, format: &OutputFormat) {
    args.push("-ar".into());
    args.push(format.sample_rate.to_string().into());
    args.push("-ac".into());
    args.push(format.channels.to_string().into());
    args.push("-codec:a".into());
    args.push(format.codec.clone().into());
    if let Some(kbps) = format.bitrate_kbps {
        args.push("-b:a".into());
        args.push(format!("{}k", kbps).into());
    }
}
