//! Checkpoint management with bounded retention
//!
//! Each snapshot is a numbered directory holding both parameter stores plus a
//! small metadata file. Only the most recent `keep` snapshots survive; older
//! ones are evicted on save. Restoring with no snapshot present is a no-op,
//! leaving the freshly initialized parameters in place.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::model::Dcgan;

const GEN_FILE: &str = "generator.pt";
const DISC_FILE: &str = "discriminator.pt";
const META_FILE: &str = "meta.json";
const SNAPSHOT_PREFIX: &str = "ckpt-";

/// Checkpoint metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointMeta {
    /// Monotonic snapshot index
    pub index: u64,
    /// Epoch the snapshot was taken in
    pub epoch: usize,
    /// Timestamp of the save
    pub timestamp: String,
    /// Latent dimension of the saved generator
    pub z_dim: i64,
}

/// Manages numbered model snapshots under one directory
pub struct CheckpointManager {
    dir: PathBuf,
    keep: usize,
    next_index: u64,
}

impl CheckpointManager {
    /// Snapshots retained by default
    pub const DEFAULT_KEEP: usize = 3;

    /// Create a manager over `dir`, creating the directory if absent and
    /// resuming the numbering after any snapshots already present
    pub fn new<P: AsRef<Path>>(dir: P, keep: usize) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)
            .with_context(|| format!("creating checkpoint directory {dir:?}"))?;

        let next_index = Self::scan(&dir)
            .last()
            .map(|(index, _)| index + 1)
            .unwrap_or(0);

        Ok(Self {
            dir,
            keep: keep.max(1),
            next_index,
        })
    }

    /// Persist a new snapshot and evict the oldest beyond the retention bound
    pub fn save(&mut self, model: &Dcgan, epoch: usize) -> Result<PathBuf> {
        let path = self.dir.join(format!("{SNAPSHOT_PREFIX}{:06}", self.next_index));
        fs::create_dir_all(&path)?;

        model.save(path.join(GEN_FILE), path.join(DISC_FILE))?;

        let meta = CheckpointMeta {
            index: self.next_index,
            epoch,
            timestamp: chrono::Utc::now().to_rfc3339(),
            z_dim: model.z_dim(),
        };
        fs::write(path.join(META_FILE), serde_json::to_string_pretty(&meta)?)?;

        self.next_index += 1;
        self.prune()?;

        info!("Saved checkpoint {:?}", path);
        Ok(path)
    }

    /// Path of the most recent snapshot, if any exists
    pub fn latest(&self) -> Option<PathBuf> {
        Self::scan(&self.dir).pop().map(|(_, path)| path)
    }

    /// All snapshot paths, oldest first
    pub fn snapshots(&self) -> Vec<PathBuf> {
        Self::scan(&self.dir)
            .into_iter()
            .map(|(_, path)| path)
            .collect()
    }

    /// Load the most recent snapshot into the model
    ///
    /// Returns false (leaving fresh initialization untouched) when no
    /// snapshot exists yet.
    pub fn restore_latest(&self, model: &mut Dcgan) -> Result<bool> {
        match self.latest() {
            Some(path) => {
                model.load(path.join(GEN_FILE), path.join(DISC_FILE))?;
                info!("Restored checkpoint {:?}", path);
                Ok(true)
            }
            None => {
                info!("No checkpoint found in {:?}, keeping fresh parameters", self.dir);
                Ok(false)
            }
        }
    }

    /// Load this snapshot's metadata
    pub fn read_meta<P: AsRef<Path>>(snapshot: P) -> Result<CheckpointMeta> {
        let content = fs::read_to_string(snapshot.as_ref().join(META_FILE))?;
        Ok(serde_json::from_str(&content)?)
    }

    fn prune(&self) -> Result<()> {
        let snapshots = Self::scan(&self.dir);
        if snapshots.len() > self.keep {
            for (_, path) in &snapshots[..snapshots.len() - self.keep] {
                fs::remove_dir_all(path)
                    .with_context(|| format!("evicting old checkpoint {path:?}"))?;
            }
        }
        Ok(())
    }

    /// Snapshot directories under `dir`, sorted by index ascending
    fn scan(dir: &Path) -> Vec<(u64, PathBuf)> {
        let mut found: Vec<(u64, PathBuf)> = fs::read_dir(dir)
            .into_iter()
            .flatten()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().is_dir())
            .filter_map(|entry| {
                let name = entry.file_name().to_str()?.to_string();
                let index: u64 = name.strip_prefix(SNAPSHOT_PREFIX)?.parse().ok()?;
                Some((index, entry.path()))
            })
            .collect();
        found.sort_by_key(|(index, _)| *index);
        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::test_support::small_model;
    use tch::{Device, Tensor};

    #[test]
    fn test_restore_without_snapshot_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let manager = CheckpointManager::new(dir.path(), 3).unwrap();

        let mut model = small_model();
        assert!(!manager.restore_latest(&mut model).unwrap());
    }

    #[test]
    fn test_checkpoint_roundtrip_reproduces_output() {
        let dir = tempfile::tempdir().unwrap();
        let mut manager = CheckpointManager::new(dir.path(), 3).unwrap();

        let model = small_model();
        let noise = Tensor::randn([2, 16], (tch::Kind::Float, Device::Cpu));
        let before = model.generate_from_noise(&noise);

        manager.save(&model, 0).unwrap();

        let mut restored = small_model();
        assert!(manager.restore_latest(&mut restored).unwrap());
        let after = restored.generate_from_noise(&noise);

        assert!(before.allclose(&after, 1e-6, 1e-6, false));
    }

    #[test]
    fn test_retention_keeps_three_most_recent() {
        let dir = tempfile::tempdir().unwrap();
        let mut manager = CheckpointManager::new(dir.path(), 3).unwrap();

        let model = small_model();
        for epoch in 0..5 {
            manager.save(&model, epoch).unwrap();
        }

        let snapshots = manager.snapshots();
        assert_eq!(snapshots.len(), 3);
        let names: Vec<String> = snapshots
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["ckpt-000002", "ckpt-000003", "ckpt-000004"]);

        let meta = CheckpointManager::read_meta(manager.latest().unwrap()).unwrap();
        assert_eq!(meta.index, 4);
        assert_eq!(meta.epoch, 4);
    }

    #[test]
    fn test_numbering_resumes_after_restart() {
        let dir = tempfile::tempdir().unwrap();
        let model = small_model();

        let mut manager = CheckpointManager::new(dir.path(), 3).unwrap();
        manager.save(&model, 0).unwrap();
        drop(manager);

        let mut manager = CheckpointManager::new(dir.path(), 3).unwrap();
        let path = manager.save(&model, 1).unwrap();
        assert!(path.ends_with("ckpt-000001"));
    }
}
