//! Model persistence for saving and loading trained networks
//!
//! Networks are stored through the [`ModelStore`] port so the agents never
//! assume a particular location. [`FileModelStore`] keeps each snapshot as
//! a Burn record (`<dir>/<name>.mpk`) with optional JSON metadata
//! (`<dir>/<name>.meta.json`).

use super::network::FeedForwardNetwork;
use crate::error::TrainError;
use burn::{
    module::Module,
    record::{FullPrecisionSettings, NamedMpkFileRecorder, Recorder},
    tensor::backend::Backend,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

/// Snapshot name of the PPO actor
pub const ACTOR_SNAPSHOT: &str = "actor";

/// Snapshot name of the PPO critic
pub const CRITIC_SNAPSHOT: &str = "critic";

/// Snapshot name of the DQN Q-network
pub const DQN_SNAPSHOT: &str = "model";

/// Metadata saved with a training run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelMetadata {
    /// "ppo" or "dqn"
    pub algorithm: String,

    /// Hyperparameters used during training
    pub config: serde_json::Value,

    pub observation_dim: usize,
    pub action_dim: usize,

    /// Optimizer calls (PPO) or games played (DQN)
    pub updates: usize,

    /// Environment steps taken
    pub timesteps: usize,

    /// Crate version that wrote the snapshot
    pub version: String,
}

impl ModelMetadata {
    pub fn new<C: Serialize>(
        algorithm: &str,
        config: &C,
        observation_dim: usize,
        action_dim: usize,
        updates: usize,
        timesteps: usize,
    ) -> Self {
        Self {
            algorithm: algorithm.to_string(),
            config: serde_json::to_value(config).unwrap_or(serde_json::Value::Null),
            observation_dim,
            action_dim,
            updates,
            timesteps,
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Where trained parameter snapshots are written to and read from
pub trait ModelStore {
    /// Persist `network` under `name`
    fn save<B: Backend>(&self, name: &str, network: &FeedForwardNetwork<B>) -> Result<(), TrainError>;

    /// Load the snapshot `name` into an already-shaped `network`
    fn load<B: Backend>(&self, name: &str, network: FeedForwardNetwork<B>) -> Result<FeedForwardNetwork<B>, TrainError>;

    /// Persist run metadata under `name`
    fn save_metadata(&self, name: &str, metadata: &ModelMetadata) -> Result<(), TrainError>;
}

/// Stores snapshots as files in one directory
#[derive(Debug, Clone)]
pub struct FileModelStore {
    dir: PathBuf,
}

impl FileModelStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the weights file for `name`
    pub fn weights_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.mpk"))
    }

    /// Path of the metadata file for `name`
    pub fn metadata_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.meta.json"))
    }

    /// Read back metadata written by [`ModelStore::save_metadata`]
    pub fn load_metadata(&self, name: &str) -> Result<ModelMetadata, TrainError> {
        let path = self.metadata_path(name);
        let json = std::fs::read_to_string(&path).map_err(|e| TrainError::persistence(&path, e))?;
        serde_json::from_str(&json).map_err(|e| TrainError::persistence(&path, e))
    }

    fn ensure_dir(&self) -> Result<(), TrainError> {
        std::fs::create_dir_all(&self.dir).map_err(|e| TrainError::persistence(&self.dir, e))
    }
}

impl ModelStore for FileModelStore {
    fn save<B: Backend>(&self, name: &str, network: &FeedForwardNetwork<B>) -> Result<(), TrainError> {
        self.ensure_dir()?;

        // The recorder appends the ".mpk" extension itself
        let stem = self.dir.join(name);
        let recorder = NamedMpkFileRecorder::<FullPrecisionSettings>::new();
        recorder
            .record(network.clone().into_record(), stem)
            .map_err(|e| TrainError::persistence(self.weights_path(name), e))?;

        info!(path = ?self.weights_path(name), "saved snapshot");
        Ok(())
    }

    fn load<B: Backend>(&self, name: &str, network: FeedForwardNetwork<B>) -> Result<FeedForwardNetwork<B>, TrainError> {
        let path = self.weights_path(name);
        if !path.is_file() {
            return Err(TrainError::persistence(&path, "snapshot file not found"));
        }

        let device = network.device();
        let recorder = NamedMpkFileRecorder::<FullPrecisionSettings>::new();
        let record = recorder
            .load(self.dir.join(name), &device)
            .map_err(|e| TrainError::persistence(&path, e))?;

        info!(path = ?path, "loaded snapshot");
        Ok(network.load_record(record))
    }

    fn save_metadata(&self, name: &str, metadata: &ModelMetadata) -> Result<(), TrainError> {
        self.ensure_dir()?;

        let path = self.metadata_path(name);
        let json = serde_json::to_string_pretty(metadata).map_err(|e| TrainError::persistence(&path, e))?;
        std::fs::write(&path, json).map_err(|e| TrainError::persistence(&path, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rl::network::{Approximator, FeedForwardConfig};
    use crate::rl::{InferenceBackend, PPOConfig, default_device};
    use tempfile::TempDir;

    fn small_network() -> FeedForwardNetwork<InferenceBackend> {
        FeedForwardConfig::new(3, 8, 2, 4).init(&default_device())
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileModelStore::new(temp_dir.path().join("models"));

        let original = small_network();
        store.save(ACTOR_SNAPSHOT, &original).unwrap();
        assert!(store.weights_path(ACTOR_SNAPSHOT).is_file());

        let restored = store.load(ACTOR_SNAPSHOT, small_network()).unwrap();

        let obs = [0.3, -0.7, 1.1];
        let before = original.predict(&obs);
        let after = restored.predict(&obs);
        for (a, b) in before.iter().zip(&after) {
            assert!((a - b).abs() < 1e-6);
        }
    }

    #[test]
    fn test_missing_snapshot_is_persistence_error() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileModelStore::new(temp_dir.path());

        let err = store.load(CRITIC_SNAPSHOT, small_network()).unwrap_err();
        assert!(matches!(err, TrainError::Persistence { .. }));
    }

    #[test]
    fn test_corrupt_snapshot_is_persistence_error() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileModelStore::new(temp_dir.path());
        std::fs::write(store.weights_path(ACTOR_SNAPSHOT), b"not a record").unwrap();

        let err = store.load(ACTOR_SNAPSHOT, small_network()).unwrap_err();
        assert!(matches!(err, TrainError::Persistence { .. }));
    }

    #[test]
    fn test_metadata_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileModelStore::new(temp_dir.path());

        let metadata = ModelMetadata::new("ppo", &PPOConfig::default(), 15, 4, 10, 100_000);
        store.save_metadata("ppo", &metadata).unwrap();

        let loaded = store.load_metadata("ppo").unwrap();
        assert_eq!(loaded.algorithm, "ppo");
        assert_eq!(loaded.observation_dim, 15);
        assert_eq!(loaded.timesteps, 100_000);
        assert_eq!(loaded.config["timesteps_per_batch"], 10_000);
    }
}
