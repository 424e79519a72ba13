//! Blocking subprocess execution with an optional timeout
//!
//! stdout and stderr are drained on helper threads while the calling
//! thread polls for exit, so a chatty tool cannot stall on a full pipe.
//! On timeout the child is killed and reaped before returning.

use std::io::Read;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use log::{debug, warn};

use crate::error::{Result, TreatmentError};
use crate::pipeline::Stage;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Lines of stderr kept in error diagnostics
const DIAGNOSTIC_TAIL_LINES: usize = 20;

/// Captured result of a finished tool
#[derive(Debug)]
pub struct ToolOutput {
    pub tool: String,
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
    pub elapsed: Duration,
}

impl ToolOutput {
    /// Turn a non-zero exit into `StageExecution` carrying the stderr tail
    pub fn into_success(self, stage: Stage) -> Result<ToolOutput> {
        if self.status.success() {
            return Ok(self);
        }
        Err(TreatmentError::StageExecution {
            stage,
            tool: self.tool.clone(),
            diagnostics: format!("{}: {}", self.status, self.diagnostics()),
        })
    }

    /// Last lines of stderr, or stdout when stderr is empty
    pub fn diagnostics(&self) -> String {
        let text = if self.stderr.trim().is_empty() {
            &self.stdout
        } else {
            &self.stderr
        };
        tail_lines(text, DIAGNOSTIC_TAIL_LINES)
    }
}

/// Run `command` to completion.
///
/// Fails only if the tool cannot be started or exceeds `timeout`; a
/// non-zero exit is returned as a normal `ToolOutput`.
pub fn run_tool(mut command: Command, timeout: Option<Duration>, stage: Stage) -> Result<ToolOutput> {
    let tool = command.get_program().to_string_lossy().to_string();
    debug!("[{}] {:?}", stage, command);

    let start = Instant::now();
    let mut child = command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| TreatmentError::StageExecution {
            stage,
            tool: tool.clone(),
            diagnostics: format!("failed to start {}: {}", tool, e),
        })?;

    let stdout = drain(child.stdout.take());
    let stderr = drain(child.stderr.take());

    let status = match wait_with_timeout(&mut child, timeout) {
        Ok(Some(status)) => status,
        Ok(None) => {
            let limit = timeout.unwrap_or_default();
            warn!("[{}] {} exceeded {:?}, killing", stage, tool, limit);
            let _ = child.kill();
            let _ = child.wait();
            let _ = join(stdout);
            let _ = join(stderr);
            return Err(TreatmentError::StageExecution {
                stage,
                tool,
                diagnostics: format!("timed out after {}s", limit.as_secs_f64()),
            });
        }
        Err(e) => {
            let _ = child.kill();
            let _ = child.wait();
            return Err(TreatmentError::StageExecution {
                stage,
                tool,
                diagnostics: format!("failed to wait for process: {}", e),
            });
        }
    };

    let output = ToolOutput {
        tool,
        status,
        stdout: join(stdout),
        stderr: join(stderr),
        elapsed: start.elapsed(),
    };
    debug!(
        "[{}] {} exited with {} after {:.1}s",
        stage,
        output.tool,
        output.status,
        output.elapsed.as_secs_f64()
    );
    Ok(output)
}

/// `Ok(None)` means the timeout expired with the child still running
fn wait_with_timeout(child: &mut Child, timeout: Option<Duration>) -> std::io::Result<Option<ExitStatus>> {
    let Some(limit) = timeout else {
        return child.wait().map(Some);
    };

    let deadline = Instant::now() + limit;
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if Instant::now() >= deadline {
            return Ok(None);
        }
        thread::sleep(POLL_INTERVAL);
    }
}

fn drain<R: Read + Send + 'static>(stream: Option<R>) -> Option<JoinHandle<String>> {
    stream.map(|mut stream| {
        thread::spawn(move || {
            let mut bytes = Vec::new();
            let _ = stream.read_to_end(&mut bytes);
            String::from_utf8_lossy(&bytes).into_owned()
        })
    })
}

fn join(handle: Option<JoinHandle<String>>) -> String {
    handle
        .and_then(|h| h.join().ok())
        .unwrap_or_default()
}

fn tail_lines(text: &str, n: usize) -> String {
    let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
    let start = lines.len().saturating_sub(n);
    lines[start..].join("\n")
}
