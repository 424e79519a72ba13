//! Input resolution
//!
//! Turns the path given at the prompt into an ordered worklist. The fixed
//! assets are checked before any WorkItem exists, and the output tree is
//! created as a side effect.

use std::path::{Path, PathBuf};

use log::{debug, info};
use walkdir::WalkDir;

use crate::config::PipelineConfig;
use crate::error::{AssetKind, Result, TreatmentError};
use crate::work::{OutputLayout, WorkItem};

/// How the input path was interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    SingleFile,
    Directory,
}

/// Ordered WorkItems plus the tree they write into
#[derive(Debug, Clone)]
pub struct Worklist {
    pub mode: InputMode,
    pub layout: OutputLayout,
    pub items: Vec<WorkItem>,
}

impl Worklist {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Strip whitespace and surrounding quote characters from pasted input
pub fn clean_input_path(raw: &str) -> PathBuf {
    const QUOTES: [char; 2] = ['"', '\''];
    PathBuf::from(raw.trim().trim_matches(&QUOTES[..]))
}

/// Fail with `MissingAsset` unless both fixed assets exist
pub fn validate_assets(config: &PipelineConfig) -> Result<()> {
    let assets = [
        (AssetKind::DenoiseModel, &config.denoise_model),
        (AssetKind::Reference, &config.reference),
    ];
    for (kind, path) in assets {
        if !path.is_file() {
            return Err(TreatmentError::MissingAsset {
                kind,
                path: path.clone(),
            });
        }
        debug!("Found {} at {}", kind, path.display());
    }
    Ok(())
}

/// Resolve `input` (file or directory) into a worklist
pub fn resolve(input: &Path, config: &PipelineConfig) -> Result<Worklist> {
    let (mode, input_dir) = if input.is_file() {
        let parent = match input.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        (InputMode::SingleFile, parent)
    } else if input.is_dir() {
        (InputMode::Directory, input.to_path_buf())
    } else {
        return Err(TreatmentError::NotFound {
            path: input.to_path_buf(),
        });
    };

    validate_assets(config)?;

    let inputs = match mode {
        InputMode::SingleFile => vec![input.to_path_buf()],
        InputMode::Directory => list_inputs(&input_dir, &config.input_extension)?,
    };

    let layout = OutputLayout::for_input_dir(&absolute(&input_dir)?, config);
    layout.create()?;
    std::fs::create_dir_all(&config.scratch_dir)?;

    let items: Vec<WorkItem> = inputs
        .iter()
        .map(|path| WorkItem::new(path, &layout, config))
        .collect();

    info!(
        "Resolved {} input(s) from {} into {}",
        items.len(),
        input.display(),
        layout.root.display()
    );

    Ok(Worklist {
        mode,
        layout,
        items,
    })
}

/// Regular files directly inside `dir` with `extension`, sorted by name
fn list_inputs(dir: &Path, extension: &str) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry = entry.map_err(|e| match e.into_io_error() {
            Some(io) => TreatmentError::Io(io),
            None => TreatmentError::NotFound {
                path: dir.to_path_buf(),
            },
        })?;
        // Follows symlinks so linked takes are included
        if !entry.path().is_file() {
            continue;
        }
        let matches = entry
            .path()
            .extension()
            .map(|ext| ext.to_string_lossy().eq_ignore_ascii_case(extension))
            .unwrap_or(false);
        if matches {
            files.push(entry.into_path());
        }
    }
    files.sort();
    Ok(files)
}

/// Absolute form of `path` so `..`/`.` inputs still get a named output root
fn absolute(path: &Path) -> Result<PathBuf> {
    Ok(std::fs::canonicalize(path)?)
}
