//! Checkpoint persistence for the learner's networks.
//!
//! Weight files are written under deterministic names keyed by
//! `train_step / save_cycle`, with a JSON metadata sidecar per cycle so a
//! run can be resumed from the most recent save.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::coma::ComaLearner;
use crate::error::CheckpointError;

/// Metadata written next to each pair of weight files.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CheckpointMetadata {
    pub cycle: usize,
    pub train_step: usize,
    pub timestamp: u64,
}

/// Saves and restores learner weights in a fixed directory.
pub struct Checkpointer {
    dir: PathBuf,
    save_cycle: usize,
}

impl Checkpointer {
    pub fn new(dir: PathBuf, save_cycle: usize) -> Self {
        fs::create_dir_all(&dir).ok();
        Checkpointer { dir, save_cycle }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Persist the learner's actor and eval critic for `train_step`.
    pub fn save(
        &self,
        learner: &ComaLearner,
        train_step: usize,
    ) -> Result<PathBuf, CheckpointError> {
        let cycle = train_step / self.save_cycle;
        learner.save_networks(&self.dir, train_step)?;

        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        let metadata = CheckpointMetadata {
            cycle,
            train_step,
            timestamp,
        };
        let meta_path = self.dir.join(format!("{}_meta.json", cycle));
        fs::write(&meta_path, serde_json::to_string_pretty(&metadata)?)?;
        Ok(meta_path)
    }

    /// Restore the learner from the weight files of cycle `cycle`.
    pub fn load(&self, learner: &mut ComaLearner, cycle: usize) -> Result<(), CheckpointError> {
        learner.load_networks(&self.dir, cycle)
    }

    /// Restore the learner from the highest-numbered saved cycle.
    /// Returns its metadata.
    pub fn load_latest(
        &self,
        learner: &mut ComaLearner,
    ) -> Result<CheckpointMetadata, CheckpointError> {
        let metadata = self.latest_metadata()?;
        self.load(learner, metadata.cycle)?;
        Ok(metadata)
    }

    /// Metadata of the highest-numbered saved cycle.
    pub fn latest_metadata(&self) -> Result<CheckpointMetadata, CheckpointError> {
        let mut latest: Option<CheckpointMetadata> = None;
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            let name = match path.file_name().and_then(|n| n.to_str()) {
                Some(name) => name,
                None => continue,
            };
            if !name.ends_with("_meta.json") {
                continue;
            }
            let json = fs::read_to_string(&path).map_err(|e| CheckpointError::MetadataRead {
                path: path.clone(),
                source: e,
            })?;
            let metadata: CheckpointMetadata =
                serde_json::from_str(&json).map_err(|e| CheckpointError::MetadataParse {
                    path: path.clone(),
                    source: e,
                })?;
            if latest.as_ref().is_none_or(|m| metadata.cycle > m.cycle) {
                latest = Some(metadata);
            }
        }
        latest.ok_or_else(|| CheckpointError::NoCheckpoint(self.dir.clone()))
    }
}
