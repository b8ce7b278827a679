//! Progress snapshots on disk
//!
//! The snapshot is a JSON document with four fields: `current_index`,
//! `processed_phrases`, `char_pinyin_map` and `poly_phrases`. It is written to
//! a temporary file next to the target and renamed over it, so a crash in the
//! middle of a save leaves the previous snapshot intact.

use super::aggregate::ProgressState;
use crate::error::{Error, Result};
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Result of looking for a snapshot at startup
#[derive(Debug)]
pub enum LoadOutcome {
    /// No snapshot on disk
    Absent,
    Restored(ProgressState),
    /// A snapshot existed but could not be read; starting over
    EmptyAfterFailedLoad,
}

impl LoadOutcome {
    pub fn into_state(self) -> ProgressState {
        match self {
            LoadOutcome::Restored(state) => state,
            LoadOutcome::Absent | LoadOutcome::EmptyAfterFailedLoad => ProgressState::default(),
        }
    }
}

/// Per-character value as found on disk; older snapshots may hold a bare string
#[derive(Deserialize)]
#[serde(untagged)]
enum Syllables {
    Many(Vec<String>),
    One(String),
}

impl From<Syllables> for Vec<String> {
    fn from(value: Syllables) -> Self {
        match value {
            Syllables::Many(list) => list,
            Syllables::One(single) => vec![single],
        }
    }
}

#[derive(Deserialize)]
struct StoredState {
    #[serde(default)]
    current_index: usize,
    #[serde(default)]
    processed_phrases: Vec<String>,
    #[serde(default)]
    char_pinyin_map: BTreeMap<String, Syllables>,
    #[serde(default)]
    poly_phrases: BTreeMap<String, String>,
}

impl From<StoredState> for ProgressState {
    fn from(stored: StoredState) -> Self {
        Self {
            current_index: stored.current_index,
            processed_phrases: stored.processed_phrases.into_iter().collect::<BTreeSet<_>>(),
            char_pinyin_map: stored
                .char_pinyin_map
                .into_iter()
                .map(|(c, pys)| (c, pys.into()))
                .collect(),
            poly_phrases: stored.poly_phrases,
        }
    }
}

/// Saves, restores and removes the progress snapshot at one path
#[derive(Debug, Clone)]
pub struct CheckpointManager {
    path: PathBuf,
}

impl CheckpointManager {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Snapshot file inside a cache directory
    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join("progress.json"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Serialize a snapshot without touching the disk
    pub fn encode(state: &ProgressState) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(state)?)
    }

    /// Persist `state`, replacing any earlier snapshot
    pub fn save(&self, state: &ProgressState) -> Result<()> {
        self.write_encoded(&Self::encode(state)?)
    }

    /// Atomically write an already encoded snapshot
    pub fn write_encoded(&self, bytes: &[u8]) -> Result<()> {
        let parent_dir = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        fs::create_dir_all(parent_dir)?;

        let temp_file = NamedTempFile::new_in(parent_dir)?;
        {
            let mut writer = BufWriter::new(temp_file.as_file());
            writer.write_all(bytes)?;
            writer.flush()?;
        }
        temp_file.as_file().sync_all()?;
        temp_file.persist(&self.path).map_err(|e| Error::Io(e.error))?;
        Ok(())
    }

    fn read(&self) -> Result<ProgressState> {
        let file = File::open(&self.path)?;
        let stored: StoredState = serde_json::from_reader(BufReader::new(file))
            .map_err(|e| Error::CheckpointCorrupt(e.to_string()))?;
        Ok(stored.into())
    }

    /// Restore the snapshot if there is one. Never fails: a broken snapshot is
    /// logged and treated as an empty state.
    pub fn load(&self) -> LoadOutcome {
        if !self.exists() {
            return LoadOutcome::Absent;
        }
        match self.read() {
            Ok(state) => {
                tracing::info!(
                    "Restored progress: {} phrases already processed (index {})",
                    state.processed_phrases.len(),
                    state.current_index
                );
                LoadOutcome::Restored(state)
            }
            Err(e) => {
                tracing::warn!("Failed to load progress from {}: {}", self.path.display(), e);
                LoadOutcome::EmptyAfterFailedLoad
            }
        }
    }

    /// Remove the snapshot after a successful run
    pub fn clear(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
