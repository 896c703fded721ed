use log::{debug, info};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{DrqnError, Result};

const INDEX_FILE: &str = "checkpoint.json";

#[derive(Debug, Default, Serialize, Deserialize, PartialEq)]
struct CheckpointIndex {
    /// Saved ids, oldest first
    ids: Vec<usize>,
}

/// Directory of bincode checkpoints `model-<id>.bin` with a JSON index.
///
/// Only the newest `max_to_keep` checkpoints are kept; older files are
/// removed when a new one is saved.
pub struct CheckpointStore {
    dir: PathBuf,
    max_to_keep: usize,
    index: CheckpointIndex,
}

impl CheckpointStore {
    /// Open (and create if needed) the checkpoint directory.
    pub fn open(dir: impl AsRef<Path>, max_to_keep: usize) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        let index_path = dir.join(INDEX_FILE);
        let index = if index_path.exists() {
            serde_json::from_slice(&fs::read(&index_path)?)?
        } else {
            CheckpointIndex::default()
        };
        Ok(CheckpointStore { dir, max_to_keep: max_to_keep.max(1), index })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, id: usize) -> PathBuf {
        self.dir.join(format!("model-{}.bin", id))
    }

    /// Ids of the kept checkpoints, oldest first.
    pub fn ids(&self) -> &[usize] {
        &self.index.ids
    }

    pub fn latest_id(&self) -> Option<usize> {
        self.index.ids.last().copied()
    }

    /// Write `value` as checkpoint `id`, replacing an earlier one with the
    /// same id.
    pub fn save<T: Serialize>(&mut self, value: &T, id: usize) -> Result<PathBuf> {
        let path = self.path_for(id);
        fs::write(&path, bincode::serialize(value)?)?;

        self.index.ids.retain(|&existing| existing != id);
        self.index.ids.push(id);
        while self.index.ids.len() > self.max_to_keep {
            let old = self.index.ids.remove(0);
            let old_path = self.path_for(old);
            if old_path.exists() {
                fs::remove_file(&old_path)?;
            }
            debug!("Removed checkpoint {}", old_path.display());
        }
        fs::write(self.dir.join(INDEX_FILE), serde_json::to_vec_pretty(&self.index)?)?;

        info!("Saved model to {}", path.display());
        Ok(path)
    }

    pub fn load<T: DeserializeOwned>(&self, id: usize) -> Result<T> {
        let path = self.path_for(id);
        let bytes = fs::read(&path)
            .map_err(|e| DrqnError::CheckpointUnavailable(format!("{}: {}", path.display(), e)))?;
        Ok(bincode::deserialize(&bytes)?)
    }

    /// The newest checkpoint and its id.
    pub fn load_latest<T: DeserializeOwned>(&self) -> Result<(usize, T)> {
        let id = self
            .latest_id()
            .ok_or_else(|| DrqnError::CheckpointUnavailable(self.dir.display().to_string()))?;
        Ok((id, self.load(id)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn keeps_only_newest_checkpoints() -> Result<()> {
        let dir = TempDir::new()?;
        let mut store = CheckpointStore::open(dir.path(), 2)?;
        for id in [64, 128, 149] {
            store.save(&vec![id as f32], id)?;
        }
        assert_eq!(store.ids(), &[128, 149]);
        assert!(!store.path_for(64).exists());

        let (id, value): (usize, Vec<f32>) = store.load_latest()?;
        assert_eq!((id, value), (149, vec![149.0]));
        Ok(())
    }

    #[test]
    fn index_survives_reopening() -> Result<()> {
        let dir = TempDir::new()?;
        CheckpointStore::open(dir.path(), 5)?.save(&1u8, 3)?;
        assert_eq!(CheckpointStore::open(dir.path(), 5)?.latest_id(), Some(3));
        Ok(())
    }

    #[test]
    fn empty_store_has_no_checkpoint() -> Result<()> {
        let dir = TempDir::new()?;
        let store = CheckpointStore::open(dir.path(), 5)?;
        let result: Result<(usize, u8)> = store.load_latest();
        assert!(matches!(result, Err(DrqnError::CheckpointUnavailable(_))));
        Ok(())
    }
}
