//! Scratch file lifecycle
//!
//! Every WorkItem owns two scratch files, named after its input so that
//! many items can share one scratch directory. A `ScratchGuard` removes
//! both when it goes out of scope, whichever way the pipeline exits.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use log::{debug, warn};
use serde::Serialize;

use crate::error::{Result, TreatmentError};

/// Scratch paths for one WorkItem
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScratchPaths {
    /// Stage 1 output
    pub intermediate: PathBuf,
    /// Stage 2 output
    pub matched: PathBuf,
}

impl ScratchPaths {
    pub fn for_input(scratch_dir: &Path, base_name: &str) -> Self {
        Self {
            intermediate: scratch_dir.join(format!("intermediate_{}.wav", base_name)),
            matched: scratch_dir.join(format!("matched_{}.wav", base_name)),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Path> {
        [self.intermediate.as_path(), self.matched.as_path()].into_iter()
    }

    /// True when neither scratch file is on disk
    pub fn all_absent(&self) -> bool {
        self.iter().all(|p| !p.exists())
    }
}

/// Remove `path` if it exists.
///
/// Returns whether a file was removed. A missing file is not an error.
pub fn remove_if_present(path: &Path) -> Result<bool> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(source) => Err(TreatmentError::Cleanup {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Removes a WorkItem's scratch files on drop
pub struct ScratchGuard<'a> {
    paths: &'a ScratchPaths,
    released: bool,
}

impl<'a> ScratchGuard<'a> {
    pub fn new(paths: &'a ScratchPaths) -> Self {
        Self {
            paths,
            released: false,
        }
    }

    /// Remove the scratch files now and collect any failures.
    ///
    /// Failures are logged, never returned as the item's error.
    pub fn cleanup(mut self) -> Vec<TreatmentError> {
        self.released = true;
        remove_all(self.paths)
    }
}

impl Drop for ScratchGuard<'_> {
    fn drop(&mut self) {
        if !self.released {
            remove_all(self.paths);
        }
    }
}

fn remove_all(paths: &ScratchPaths) -> Vec<TreatmentError> {
    let mut failures = Vec::new();
    for path in paths.iter() {
        match remove_if_present(path) {
            Ok(true) => debug!("Removed scratch file {}", path.display()),
            Ok(false) => {}
            Err(e) => {
                warn!("{}", e);
                failures.push(e);
            }
        }
    }
    failures
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn touch(path: &Path) {
        std::fs::write(path, b"RIFF").unwrap();
    }

    #[test]
    fn test_paths_keyed_by_base_name() {
        let a = ScratchPaths::for_input(Path::new("/s"), "take1");
        let b = ScratchPaths::for_input(Path::new("/s"), "take2");
        assert_ne!(a.intermediate, b.intermediate);
        assert_ne!(a.matched, b.matched);
        assert_ne!(a.intermediate, a.matched);
    }

    #[test]
    fn test_remove_if_present_is_idempotent() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("intermediate_x.wav");
        touch(&path);

        assert!(remove_if_present(&path).unwrap());
        assert!(!remove_if_present(&path).unwrap());
    }

    #[test]
    fn test_guard_removes_on_drop() {
        let dir = tempdir().unwrap();
        let paths = ScratchPaths::for_input(dir.path(), "take1");
        touch(&paths.intermediate);
        touch(&paths.matched);

        {
            let _guard = ScratchGuard::new(&paths);
        }

        assert!(paths.all_absent());
    }

    #[test]
    fn test_guard_tolerates_missing_files() {
        let dir = tempdir().unwrap();
        let paths = ScratchPaths::for_input(dir.path(), "take1");
        touch(&paths.intermediate);

        let failures = ScratchGuard::new(&paths).cleanup();
        assert!(failures.is_empty());
        assert!(paths.all_absent());
    }

    #[test]
    fn test_guard_removes_on_early_return() {
        fn stage_fails(paths: &ScratchPaths) -> Result<()> {
            let _guard = ScratchGuard::new(paths);
            std::fs::write(&paths.intermediate, b"RIFF")?;
            Err(TreatmentError::Matching {
                reason: "boom".to_string(),
            })
        }

        let dir = tempdir().unwrap();
        let paths = ScratchPaths::for_input(dir.path(), "take1");
        assert!(stage_fails(&paths).is_err());
        assert!(paths.all_absent());
    }

    #[cfg(unix)]
    #[test]
    fn test_cleanup_failure_is_reported_not_raised() {
        let dir = tempdir().unwrap();
        // A directory where a file is expected cannot be removed with remove_file
        let paths = ScratchPaths::for_input(dir.path(), "take1");
        std::fs::create_dir(&paths.intermediate).unwrap();

        let failures = ScratchGuard::new(&paths).cleanup();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].error_code(), "CLEANUP");
    }
}
