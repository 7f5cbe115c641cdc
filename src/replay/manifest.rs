use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::models::FaceBox;
use crate::perception::FrameScript;

/// One recorded frame plus the model answers to replay for it.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ManifestEntry {
    pub candidate_id: String,
    /// Image path, relative to the manifest file.
    pub frame: PathBuf,
    /// Capture time relative to the start of the recording.
    pub at_ms: u64,
    #[serde(default)]
    pub faces: Vec<FaceBox>,
    #[serde(default)]
    pub landmarks: Option<Vec<[f64; 3]>>,
    #[serde(default)]
    pub emotion: Option<String>,
    /// Drop the candidate's session after this frame.
    #[serde(default)]
    pub end_session: bool,
}

impl ManifestEntry {
    pub fn script(&self) -> FrameScript {
        FrameScript {
            faces: self.faces.clone(),
            landmarks: self.landmarks.clone(),
            emotion: self.emotion.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Manifest {
    pub base_dir: PathBuf,
    pub entries: Vec<ManifestEntry>,
}

impl Manifest {
    /// Read a JSON-lines manifest. Blank lines and `#` comments are skipped;
    /// entries are sorted by capture time.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read manifest {}", path.display()))?;
        let mut entries = parse_entries(&contents)
            .with_context(|| format!("invalid manifest {}", path.display()))?;
        entries.sort_by_key(|entry| entry.at_ms);

        Ok(Self {
            base_dir: path
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_default(),
            entries,
        })
    }

    pub fn frame_path(&self, entry: &ManifestEntry) -> PathBuf {
        if entry.frame.is_absolute() {
            entry.frame.clone()
        } else {
            self.base_dir.join(&entry.frame)
        }
    }
}

fn parse_entries(contents: &str) -> Result<Vec<ManifestEntry>> {
    contents
        .lines()
        .enumerate()
        .filter(|(_, line)| {
            let trimmed = line.trim();
            !trimmed.is_empty() && !trimmed.starts_with('#')
        })
        .map(|(index, line)| {
            serde_json::from_str(line).with_context(|| format!("line {}", index + 1))
        })
        .collect()
}
