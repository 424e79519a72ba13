//! Reference matching through the matchering Python library
//!
//! Each call starts a one-shot bridge: `python -c <BRIDGE_SCRIPT> <json>`.
//! The bridge prints exactly one JSON line as its final output and exits
//! non-zero on failure.

use std::path::Path;
use std::process::Command;
use std::time::Duration;

use log::{debug, info};
use serde::{Deserialize, Serialize};

use super::process::run_tool;
use super::{MatchOutput, ReferenceMatcher};
use crate::config::PipelineConfig;
use crate::error::{Result, TreatmentError};
use crate::pipeline::Stage;

const BRIDGE_SCRIPT: &str = r#"
import json, sys
req = json.loads(sys.argv[1])
def reply(success, error=None):
    print(json.dumps({"request_id": req.get("request_id"), "success": success, "error": error}), flush=True)
try:
    import matchering as mg
    mg.process(
        target=req["target"],
        reference=req["reference"],
        results=[mg.Result(r["path"], subtype=r["subtype"]) for r in req["results"]],
    )
except Exception as e:
    reply(False, "%s: %s" % (type(e).__name__, e))
    sys.exit(1)
reply(True)
"#;

/// Request to the Python bridge
#[derive(Debug, Serialize)]
struct BridgeRequest<'a> {
    request_id: String,
    target: &'a Path,
    reference: &'a Path,
    results: &'a [MatchOutput],
}

/// Response from the Python bridge
#[derive(Debug, Deserialize)]
struct BridgeResponse {
    request_id: Option<String>,
    success: bool,
    error: Option<String>,
}

/// matchering invoked through a Python interpreter
#[derive(Debug, Clone)]
pub struct MatcheringBridge {
    python: String,
    timeout: Option<Duration>,
}

impl MatcheringBridge {
    pub fn new(python: impl Into<String>, timeout: Option<Duration>) -> Self {
        Self {
            python: python.into(),
            timeout,
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(config.python.clone(), config.tool_timeout())
    }
}

impl ReferenceMatcher for MatcheringBridge {
    fn match_reference(&self, target: &Path, reference: &Path, results: &[MatchOutput]) -> Result<()> {
        let request = BridgeRequest {
            request_id: uuid::Uuid::new_v4().to_string(),
            target,
            reference,
            results,
        };
        let request_json = serde_json::to_string(&request)?;

        let mut command = Command::new(&self.python);
        command.args(["-c", BRIDGE_SCRIPT]).arg(&request_json);

        let output = run_tool(command, self.timeout, Stage::ReferenceMatch).map_err(as_matching)?;
        let response = parse_response(&output.stdout);

        match response {
            Some(response) if response.success && output.status.success() => {
                debug!("Bridge request {:?} succeeded", response.request_id);
                if response.request_id.as_deref() != Some(request.request_id.as_str()) {
                    return Err(TreatmentError::Matching {
                        reason: "bridge answered a different request".to_string(),
                    });
                }
                info!(
                    "[{}] matchering finished in {:.1}s",
                    Stage::ReferenceMatch,
                    output.elapsed.as_secs_f64()
                );
                Ok(())
            }
            Some(BridgeResponse {
                error: Some(reason),
                ..
            }) => Err(TreatmentError::Matching { reason }),
            _ => Err(TreatmentError::Matching {
                reason: format!("{}: {}", output.status, output.diagnostics()),
            }),
        }
    }

    fn name(&self) -> &str {
        "matchering"
    }
}

/// The bridge's reply is the last JSON line it printed
fn parse_response(stdout: &str) -> Option<BridgeResponse> {
    stdout
        .lines()
        .rev()
        .map(str::trim)
        .find(|line| line.starts_with('{'))
        .and_then(|line| serde_json::from_str(line).ok())
}

fn as_matching(err: TreatmentError) -> TreatmentError {
    match err {
        TreatmentError::StageExecution { diagnostics, .. } => TreatmentError::Matching {
            reason: diagnostics,
        },
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_json_shape() {
        let results = [MatchOutput::pcm24(Path::new("/s/matched_take1.wav"))];
        let request = BridgeRequest {
            request_id: "r-1".to_string(),
            target: Path::new("/s/intermediate_take1.wav"),
            reference: Path::new("/vt/references/reference.wav"),
            results: &results,
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["target"], "/s/intermediate_take1.wav");
        assert_eq!(value["results"][0]["subtype"], "PCM_24");
        assert_eq!(value["results"][0]["path"], "/s/matched_take1.wav");
    }

    #[test]
    fn test_parse_response_skips_library_chatter() {
        let stdout = "Loading and analysis...\n{\"request_id\": \"r-1\", \"success\": true, \"error\": null}\n";
        let response = parse_response(stdout).unwrap();
        assert!(response.success);
        assert_eq!(response.request_id.as_deref(), Some("r-1"));
    }

    #[test]
    fn test_parse_response_error() {
        let stdout = r#"{"request_id": "r-1", "success": false, "error": "ModuleNotFoundError: No module named 'matchering'"}"#;
        let response = parse_response(stdout).unwrap();
        assert!(!response.success);
        assert!(response.error.unwrap().contains("matchering"));
    }

    #[test]
    fn test_parse_response_garbage() {
        assert!(parse_response("Traceback (most recent call last):").is_none());
    }

    #[test]
    fn test_missing_interpreter_is_matching_error() {
        let bridge = MatcheringBridge::new("voice-treatment-no-such-python", None);
        let err = bridge
            .match_reference(
                Path::new("a.wav"),
                Path::new("ref.wav"),
                &[MatchOutput::pcm24(Path::new("b.wav"))],
            )
            .unwrap_err();
        assert_eq!(err.error_code(), "MATCHING");
    }
}
