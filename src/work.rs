//! Work items and the assets they move through
//!
//! An asset only ever advances along
//! `Raw -> Intermediate -> Matched -> {FinalLossless, FinalLossy}`.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::config::PipelineConfig;
use crate::lifecycle::ScratchPaths;

/// Where an asset sits in the treatment chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetState {
    Raw,
    Intermediate,
    Matched,
    FinalLossless,
    FinalLossy,
}

impl AssetState {
    /// States an asset in this state may be consumed into
    pub fn successors(self) -> &'static [AssetState] {
        match self {
            AssetState::Raw => &[AssetState::Intermediate],
            AssetState::Intermediate => &[AssetState::Matched],
            AssetState::Matched => &[AssetState::FinalLossless, AssetState::FinalLossy],
            AssetState::FinalLossless | AssetState::FinalLossy => &[],
        }
    }

    pub fn is_scratch(self) -> bool {
        matches!(self, AssetState::Intermediate | AssetState::Matched)
    }
}

/// An audio file on disk tagged with its chain state
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AudioAsset {
    pub path: PathBuf,
    pub state: AssetState,
}

impl AudioAsset {
    pub fn new(path: impl Into<PathBuf>, state: AssetState) -> Self {
        Self {
            path: path.into(),
            state,
        }
    }

    /// The asset a stage produces from this one at `path`.
    ///
    /// Returns `None` when `next` is not a legal successor.
    pub fn advance(&self, path: impl Into<PathBuf>, next: AssetState) -> Option<AudioAsset> {
        self.state
            .successors()
            .contains(&next)
            .then(|| AudioAsset::new(path, next))
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }
}

/// Output tree for one run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputLayout {
    /// Lossy deliverables go here
    pub root: PathBuf,
    /// Lossless deliverables go here
    pub lossless_dir: PathBuf,
}

impl OutputLayout {
    /// `<parent>/<input-dir-name><suffix>` beside `input_dir`, unless the
    /// config names an explicit root.
    pub fn for_input_dir(input_dir: &Path, config: &PipelineConfig) -> Self {
        let root = match &config.output_root {
            Some(root) => root.clone(),
            None => {
                let name = input_dir
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_else(|| "input".to_string());
                let parent = input_dir.parent().unwrap_or_else(|| Path::new("."));
                parent.join(format!("{}{}", name, config.output_root_suffix))
            }
        };
        let lossless_dir = root.join(&config.lossless_subdir);
        Self { root, lossless_dir }
    }

    /// Create root and lossless dir; no error if they exist
    pub fn create(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.root)?;
        std::fs::create_dir_all(&self.lossless_dir)
    }
}

/// One raw input with everything needed to treat it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkItem {
    /// Input base name; used in logs, scratch names and the batch report
    pub id: String,
    pub input: AudioAsset,
    pub lossless_output: PathBuf,
    pub lossy_output: PathBuf,
    pub scratch: ScratchPaths,
}

impl WorkItem {
    pub fn new(input: &Path, layout: &OutputLayout, config: &PipelineConfig) -> Self {
        let id = input
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| input.display().to_string());

        let lossless_output = layout
            .lossless_dir
            .join(format!("{}{}.wav", id, config.lossless_suffix));
        let lossy_output = layout.root.join(format!("{}{}.mp3", id, config.lossy_suffix));

        Self {
            scratch: ScratchPaths::for_input(&config.scratch_dir, &id),
            id,
            input: AudioAsset::new(input, AssetState::Raw),
            lossless_output,
            lossy_output,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    #[test_case(AssetState::Raw, AssetState::Intermediate, true ; "raw to intermediate")]
    #[test_case(AssetState::Intermediate, AssetState::Matched, true ; "intermediate to matched")]
    #[test_case(AssetState::Matched, AssetState::FinalLossless, true ; "matched to lossless")]
    #[test_case(AssetState::Matched, AssetState::FinalLossy, true ; "matched to lossy")]
    #[test_case(AssetState::Raw, AssetState::Matched, false ; "raw cannot skip")]
    #[test_case(AssetState::FinalLossless, AssetState::FinalLossy, false ; "finals are terminal")]
    #[test_case(AssetState::Matched, AssetState::Intermediate, false ; "no going back")]
    fn test_asset_transitions(from: AssetState, to: AssetState, legal: bool) {
        let asset = AudioAsset::new("a.wav", from);
        assert_eq!(asset.advance("b.wav", to).is_some(), legal);
    }

    #[test]
    fn test_scratch_states() {
        assert!(AssetState::Intermediate.is_scratch());
        assert!(AssetState::Matched.is_scratch());
        assert!(!AssetState::Raw.is_scratch());
        assert!(!AssetState::FinalLossy.is_scratch());
    }

    #[test]
    fn test_layout_beside_input_dir() {
        let config = PipelineConfig::default();
        let layout = OutputLayout::for_input_dir(Path::new("/rec/session"), &config);
        assert_eq!(layout.root, PathBuf::from("/rec/session_processed"));
        assert_eq!(
            layout.lossless_dir,
            PathBuf::from("/rec/session_processed/wavs")
        );
    }

    #[test]
    fn test_layout_explicit_root() {
        let config = PipelineConfig {
            output_root: Some(PathBuf::from("/deliver")),
            ..Default::default()
        };
        let layout = OutputLayout::for_input_dir(Path::new("/rec/session"), &config);
        assert_eq!(layout.root, PathBuf::from("/deliver"));
        assert_eq!(layout.lossless_dir, PathBuf::from("/deliver/wavs"));
    }

    #[test]
    fn test_work_item_paths() {
        let config = PipelineConfig {
            scratch_dir: PathBuf::from("/tmp/vt"),
            ..Default::default()
        };
        let layout = OutputLayout::for_input_dir(Path::new("/rec/session"), &config);
        let item = WorkItem::new(Path::new("/rec/session/take1.wav"), &layout, &config);

        assert_eq!(item.id, "take1");
        assert_eq!(item.input.state, AssetState::Raw);
        assert_eq!(
            item.lossless_output,
            PathBuf::from("/rec/session_processed/wavs/take1_processed.wav")
        );
        assert_eq!(
            item.lossy_output,
            PathBuf::from("/rec/session_processed/take1_mobile.mp3")
        );
        assert_eq!(
            item.scratch.intermediate,
            PathBuf::from("/tmp/vt/intermediate_take1.wav")
        );
        assert_eq!(item.scratch.matched, PathBuf::from("/tmp/vt/matched_take1.wav"));
    }
}
