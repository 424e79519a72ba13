//! Deliverable inspection
//!
//! Reads WAV headers with hound and fingerprints files with SHA-256. Used
//! to verify the lossless deliverable and to record checksums in the batch
//! report.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use hound::WavReader;
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::config::PipelineConfig;
use crate::error::{Result, TreatmentError};

/// Header facts of a WAV file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WavInfo {
    pub sample_rate: u32,
    pub channels: u16,
    pub bits_per_sample: u16,
    pub frames: u32,
}

impl WavInfo {
    pub fn duration_secs(&self) -> f64 {
        self.frames as f64 / self.sample_rate as f64
    }
}

/// Read the header of the WAV at `path`
pub fn inspect_wav(path: &Path) -> Result<WavInfo> {
    let reader = WavReader::open(path).map_err(|e| TreatmentError::OutputVerification {
        path: path.to_path_buf(),
        reason: format!("not a readable WAV file: {}", e),
    })?;
    let spec = reader.spec();
    Ok(WavInfo {
        sample_rate: spec.sample_rate,
        channels: spec.channels,
        bits_per_sample: spec.bits_per_sample,
        frames: reader.duration(),
    })
}

/// Check a lossless deliverable against the configured format
pub fn verify_lossless(path: &Path, config: &PipelineConfig) -> Result<WavInfo> {
    let info = inspect_wav(path)?;

    let mut problems = Vec::new();
    if info.sample_rate != config.sample_rate {
        problems.push(format!(
            "sample rate {} Hz, expected {} Hz",
            info.sample_rate, config.sample_rate
        ));
    }
    if info.channels != config.channels {
        problems.push(format!(
            "{} channel(s), expected {}",
            info.channels, config.channels
        ));
    }
    if info.bits_per_sample != config.bit_depth {
        problems.push(format!(
            "{}-bit, expected {}-bit",
            info.bits_per_sample, config.bit_depth
        ));
    }
    if info.frames == 0 {
        problems.push("no audio frames".to_string());
    }

    if problems.is_empty() {
        Ok(info)
    } else {
        Err(TreatmentError::OutputVerification {
            path: path.to_path_buf(),
            reason: problems.join(", "),
        })
    }
}

/// Hex SHA-256 of a file's contents
pub fn sha256_file(path: &Path) -> Result<String> {
    let mut reader = BufReader::new(File::open(path)?);
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::mock::write_tone;
    use tempfile::tempdir;

    #[test]
    fn test_inspect_written_tone() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tone.wav");
        write_tone(&path, 48000, 1, 440.0).unwrap();

        let info = inspect_wav(&path).unwrap();
        assert_eq!(info.sample_rate, 48000);
        assert_eq!(info.channels, 1);
        assert_eq!(info.bits_per_sample, 24);
        assert!(info.duration_secs() > 0.05);
    }

    #[test]
    fn test_verify_rejects_wrong_format() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("stereo.wav");
        write_tone(&path, 44100, 2, 440.0).unwrap();

        let err = verify_lossless(&path, &PipelineConfig::default()).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("44100 Hz"));
        assert!(message.contains("2 channel(s)"));
    }

    #[test]
    fn test_verify_rejects_non_wav() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("fake.wav");
        std::fs::write(&path, b"not audio").unwrap();
        let err = verify_lossless(&path, &PipelineConfig::default()).unwrap_err();
        assert_eq!(err.error_code(), "OUTPUT_VERIFICATION");
    }

    #[test]
    fn test_sha256_known_value() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("abc.bin");
        std::fs::write(&path, b"abc").unwrap();
        assert_eq!(
            sha256_file(&path).unwrap(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
