//! Integration Tests
//!
//! End-to-end runs of resolve -> pipeline -> batch through the public API,
//! with mock tools standing in for ffmpeg and matchering.

use std::path::{Path, PathBuf};

use pretty_assertions::assert_eq;
use tempfile::{tempdir, TempDir};

use voice_treatment::cli::commands::run_batch;
use voice_treatment::probe::{inspect_wav, sha256_file};
use voice_treatment::tools::mock::{write_tone, MockAudioTool, MockMatcher};
use voice_treatment::tools::{Ffmpeg, MatcheringBridge};
use voice_treatment::{PipelineConfig, Stage, TreatmentError};

/// Base dir with both fixed assets and a scratch dir of its own
fn setup() -> (TempDir, PipelineConfig) {
    let dir = tempdir().unwrap();
    let mut config = PipelineConfig::with_base_dir(&dir.path().join("vt")).unwrap();
    config.scratch_dir = dir.path().join("scratch");
    std::fs::create_dir_all(config.denoise_model.parent().unwrap()).unwrap();
    std::fs::create_dir_all(config.reference.parent().unwrap()).unwrap();
    std::fs::write(&config.denoise_model, b"rnnoise model").unwrap();
    write_tone(&config.reference, 44100, 2, 220.0).unwrap();
    (dir, config)
}

fn session(dir: &Path, takes: &[&str]) -> PathBuf {
    let session = dir.join("session");
    std::fs::create_dir_all(&session).unwrap();
    for take in takes {
        write_tone(&session.join(format!("{}.wav", take)), 44100, 2, 330.0).unwrap();
    }
    session
}

fn scratch_is_empty(config: &PipelineConfig) -> bool {
    match std::fs::read_dir(&config.scratch_dir) {
        Ok(mut entries) => entries.next().is_none(),
        Err(_) => true,
    }
}

// === End-to-end ===

#[test]
fn test_single_take_produces_both_deliverables() {
    let (dir, config) = setup();
    let session = session(dir.path(), &["take1"]);
    let (tool, matcher) = (MockAudioTool::new(), MockMatcher::new());

    let result = run_batch(&session, &config, &tool, &matcher).unwrap();
    assert_eq!(result.attempted(), 1);
    assert_eq!(result.succeeded(), 1);

    let root = dir.path().canonicalize().unwrap().join("session_processed");
    let wav = root.join("wavs").join("take1_processed.wav");
    let mp3 = root.join("take1_mobile.mp3");
    assert!(std::fs::metadata(&wav).unwrap().len() > 0);
    assert!(std::fs::metadata(&mp3).unwrap().len() > 0);

    let info = inspect_wav(&wav).unwrap();
    assert_eq!(info.sample_rate, 48000);
    assert_eq!(info.channels, 1);
    assert_eq!(info.bits_per_sample, 24);

    assert!(scratch_is_empty(&config));
    assert_eq!(matcher.call_count(), 1);

    // The MP3 is encoded at the same rate and channel count
    let calls = tool.calls();
    let lossy = calls
        .iter()
        .find(|c| c.stage == Stage::FinalizeLossy)
        .unwrap();
    assert_eq!(lossy.output, mp3);
    assert_eq!(lossy.format.sample_rate, 48000);
    assert_eq!(lossy.format.channels, 1);
    assert_eq!(lossy.format.bitrate_kbps, Some(320));

    let args: Vec<String> = Ffmpeg::encode_args(&lossy.input, &lossy.format, &lossy.output)
        .iter()
        .map(|a| a.to_string_lossy().into_owned())
        .collect();
    let joined = args.join(" ");
    assert!(joined.contains("-ar 48000 -ac 1"), "{}", joined);
    assert!(joined.contains("-b:a 320k"), "{}", joined);
}

#[test]
fn test_single_file_input_uses_parent_layout() {
    let (dir, config) = setup();
    let session = session(dir.path(), &["take1", "take2"]);
    let (tool, matcher) = (MockAudioTool::new(), MockMatcher::new());

    let result = run_batch(&session.join("take2.wav"), &config, &tool, &matcher).unwrap();
    assert_eq!(result.attempted(), 1);
    assert_eq!(result.outcomes[0].id(), "take2");

    let root = session.canonicalize().unwrap().with_file_name("session_processed");
    assert!(root.join("take2_mobile.mp3").is_file());
    assert!(!root.join("take1_mobile.mp3").exists());
}

#[test]
fn test_mixed_batch_continues_past_failures() {
    let (dir, config) = setup();
    let session = session(dir.path(), &["a_take", "b_corrupt", "c_short", "d_take"]);
    let tool = MockAudioTool::new().failing(Stage::CleanShape, "b_corrupt");
    let matcher = MockMatcher::new().failing("c_short");

    let result = run_batch(&session, &config, &tool, &matcher).unwrap();
    assert_eq!(result.attempted(), 4);
    assert_eq!(result.succeeded(), 2);
    assert_eq!(result.failed(), 2);

    let failed: Vec<(&str, Option<Stage>)> = result
        .failures()
        .map(|f| (f.id.as_str(), f.stage))
        .collect();
    assert_eq!(
        failed,
        vec![
            ("b_corrupt", Some(Stage::CleanShape)),
            ("c_short", Some(Stage::ReferenceMatch)),
        ]
    );

    let root = dir.path().canonicalize().unwrap().join("session_processed");
    assert!(!root.join("b_corrupt_mobile.mp3").exists());
    assert!(!root.join("wavs").join("c_short_processed.wav").exists());
    assert!(root.join("d_take_mobile.mp3").is_file());
    assert!(scratch_is_empty(&config));
}

#[test]
fn test_empty_directory_runs_no_tools() {
    let (dir, config) = setup();
    let session = session(dir.path(), &[]);
    std::fs::write(session.join("notes.txt"), b"not audio").unwrap();
    let (tool, matcher) = (MockAudioTool::new(), MockMatcher::new());

    let result = run_batch(&session, &config, &tool, &matcher).unwrap();
    assert_eq!(result.attempted(), 0);
    assert_eq!(tool.call_count(), 0);
    let root = dir.path().canonicalize().unwrap().join("session_processed");
    assert!(root.join("wavs").is_dir());
}

// === Startup failures ===

#[test]
fn test_missing_reference_processes_nothing() {
    let (dir, config) = setup();
    std::fs::remove_file(&config.reference).unwrap();
    let session = session(dir.path(), &["take1", "take2"]);
    let (tool, matcher) = (MockAudioTool::new(), MockMatcher::new());

    let err = run_batch(&session, &config, &tool, &matcher).unwrap_err();
    assert!(matches!(err, TreatmentError::MissingAsset { .. }));
    assert!(err.is_batch_fatal());
    assert_eq!(tool.call_count(), 0);
    assert_eq!(matcher.call_count(), 0);
    assert!(!dir.path().join("session_processed").exists());
}

#[test]
fn test_missing_input_path() {
    let (dir, config) = setup();
    let (tool, matcher) = (MockAudioTool::new(), MockMatcher::new());

    let err = run_batch(&dir.path().join("nowhere"), &config, &tool, &matcher).unwrap_err();
    assert_eq!(err.error_code(), "NOT_FOUND");
    assert_eq!(tool.call_count(), 0);
}

// === Properties ===

#[test]
fn test_rerun_overwrites_with_identical_deliverables() {
    let (dir, config) = setup();
    let session = session(dir.path(), &["take1"]);
    let (tool, matcher) = (MockAudioTool::new(), MockMatcher::new());

    let first = run_batch(&session, &config, &tool, &matcher).unwrap();
    let second = run_batch(&session, &config, &tool, &matcher).unwrap();

    let a = first.successes().next().unwrap();
    let b = second.successes().next().unwrap();
    assert_eq!(a.lossless_sha256, b.lossless_sha256);
    assert_eq!(a.lossy_sha256, b.lossy_sha256);
    assert_eq!(a.lossless_sha256, sha256_file(&b.lossless).unwrap());
}

#[test]
fn test_filter_order_reaches_tool() {
    let (dir, config) = setup();
    let session = session(dir.path(), &["take1"]);
    let (tool, matcher) = (MockAudioTool::new(), MockMatcher::new());

    run_batch(&session, &config, &tool, &matcher).unwrap();

    let calls = tool.calls();
    let stages: Vec<Stage> = calls.iter().map(|c| c.stage).collect();
    assert_eq!(
        stages,
        vec![Stage::CleanShape, Stage::FinalizeLossless, Stage::FinalizeLossy]
    );

    let filters = &calls[0].filters;
    let order = ["arnndn=", "highpass=", "equalizer=f=880", "equalizer=f=5000", "lowpass=", "aresample="];
    let positions: Vec<usize> = order
        .iter()
        .map(|needle| filters.find(needle).unwrap_or_else(|| panic!("{} missing", needle)))
        .collect();
    let mut sorted = positions.clone();
    sorted.sort();
    assert_eq!(positions, sorted);
    assert!(filters.contains(&config.denoise_model.display().to_string()));
}

#[test]
fn test_report_lists_every_item() {
    let (dir, config) = setup();
    let session = session(dir.path(), &["take1", "take2"]);
    let tool = MockAudioTool::new().failing(Stage::FinalizeLossy, "take2");
    let matcher = MockMatcher::new();

    let result = run_batch(&session, &config, &tool, &matcher).unwrap();
    let report = dir.path().join("report.json");
    result.write_json(&report).unwrap();

    let value: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&report).unwrap()).unwrap();
    let outcomes = value["outcomes"].as_array().unwrap();
    assert_eq!(outcomes.len(), 2);
    assert_eq!(outcomes[1]["stage"], "finalize_lossy");
}

// === Real tools ===

/// Needs ffmpeg with arnndn, python3 with matchering, and real assets
/// under $VOICE_TREATMENT_BASE_DIR.
#[test]
#[ignore]
fn test_real_tools_end_to_end() {
    let base = std::env::var("VOICE_TREATMENT_BASE_DIR").expect("VOICE_TREATMENT_BASE_DIR not set");
    let config = PipelineConfig::load(Path::new(&base), None).unwrap();
    let dir = tempdir().unwrap();
    let session = dir.path().join("session");
    std::fs::create_dir_all(&session).unwrap();
    std::fs::copy(&config.reference, session.join("take1.wav")).unwrap();

    let ffmpeg = Ffmpeg::from_config(&config);
    let bridge = MatcheringBridge::from_config(&config);
    let result = run_batch(&session, &config, &ffmpeg, &bridge).unwrap();
    assert_eq!(result.succeeded(), 1, "{:?}", result.failures().collect::<Vec<_>>());
}
