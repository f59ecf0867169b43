//! PPO algorithm hyperparameter configuration

use crate::error::TrainError;
use serde::{Deserialize, Serialize};

/// Configuration for the PPO (Proximal Policy Optimization) trainer
///
/// Defaults mirror the baseline maze-chase setup: large full-batch updates
/// with a fixed-variance Gaussian policy.
///
/// # Example
///
/// ```rust
/// use maze_rl::rl::PPOConfig;
///
/// // Use default hyperparameters
/// let config = PPOConfig::default();
///
/// // Or customize specific parameters
/// let config = PPOConfig {
///     learning_rate: 1e-3,
///     ..Default::default()
/// };
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PPOConfig {
    /// Minimum number of environment steps gathered per rollout
    ///
    /// The last episode of a batch is always played to the end, so a batch
    /// may hold more steps than this.
    ///
    /// Default: 10000
    pub timesteps_per_batch: usize,

    /// Discount factor for rewards-to-go, in [0, 1)
    ///
    /// Default: 0.95
    pub gamma: f32,

    /// Full-batch gradient steps per rollout
    ///
    /// Default: 5
    pub n_updates_per_iteration: usize,

    /// PPO clipping parameter (epsilon)
    ///
    /// Limits how far the probability ratio may move from 1 in one update.
    ///
    /// Default: 0.2
    pub clip: f32,

    /// Learning rate shared by the actor and critic Adam optimizers
    ///
    /// Default: 0.005
    pub learning_rate: f64,

    /// Width of each hidden layer
    ///
    /// Default: 500
    pub hidden_dim: usize,

    /// Number of hidden layers
    ///
    /// Default: 100
    pub hidden_count: usize,

    /// Diagonal entry of the fixed action covariance matrix
    ///
    /// Default: 0.5
    pub action_variance: f32,

    /// Restore actor and critic snapshots when the agent is built
    ///
    /// Default: false
    pub load_model: bool,

    /// Seed for action sampling
    ///
    /// Default: 0
    pub seed: u64,
}

impl PPOConfig {
    /// Create a new configuration with default hyperparameters
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate configuration parameters
    ///
    /// Rejects non-finite or out-of-range values before any environment
    /// interaction takes place.
    pub fn validate(&self) -> Result<(), TrainError> {
        if !self.learning_rate.is_finite() || self.learning_rate <= 0.0 {
            return Err(TrainError::Configuration(format!(
                "learning_rate must be positive and finite, got {}",
                self.learning_rate
            )));
        }

        if !self.gamma.is_finite() || !(0.0..1.0).contains(&self.gamma) {
            return Err(TrainError::Configuration(format!(
                "gamma must be in [0, 1), got {}",
                self.gamma
            )));
        }

        if !self.clip.is_finite() || self.clip <= 0.0 || self.clip >= 1.0 {
            return Err(TrainError::Configuration(format!(
                "clip must be in (0, 1), got {}",
                self.clip
            )));
        }

        if !self.action_variance.is_finite() || self.action_variance <= 0.0 {
            return Err(TrainError::Configuration(format!(
                "action_variance must be positive and finite, got {}",
                self.action_variance
            )));
        }

        if self.timesteps_per_batch == 0 {
            return Err(TrainError::Configuration(
                "timesteps_per_batch must be at least 1".to_string(),
            ));
        }

        if self.n_updates_per_iteration == 0 {
            return Err(TrainError::Configuration(
                "n_updates_per_iteration must be at least 1".to_string(),
            ));
        }

        if self.hidden_dim == 0 || self.hidden_count == 0 {
            return Err(TrainError::Configuration(format!(
                "network needs at least one hidden layer of width >= 1, got {} x {}",
                self.hidden_count, self.hidden_dim
            )));
        }

        Ok(())
    }
}

impl Default for PPOConfig {
    fn default() -> Self {
        Self {
            timesteps_per_batch: 10_000,
            gamma: 0.95,
            n_updates_per_iteration: 5,
            clip: 0.2,
            learning_rate: 0.005,
            hidden_dim: 500,
            hidden_count: 100,
            action_variance: 0.5,
            load_model: false,
            seed: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PPOConfig::default();
        assert_eq!(config.timesteps_per_batch, 10_000);
        assert_eq!(config.gamma, 0.95);
        assert_eq!(config.n_updates_per_iteration, 5);
        assert_eq!(config.clip, 0.2);
        assert_eq!(config.learning_rate, 0.005);
        assert_eq!(config.hidden_dim, 500);
        assert_eq!(config.hidden_count, 100);
        assert_eq!(config.action_variance, 0.5);
        assert!(!config.load_model);
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(PPOConfig::new().validate().is_ok());
    }

    #[test]
    fn test_validation_learning_rate() {
        let mut config = PPOConfig::default();
        config.learning_rate = -0.1;
        assert!(config.validate().is_err());

        config.learning_rate = f64::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_gamma_out_of_range() {
        let mut config = PPOConfig::default();
        config.gamma = 1.0;
        assert!(config.validate().is_err());

        config.gamma = -0.1;
        assert!(config.validate().is_err());

        config.gamma = 0.0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_clip_invalid() {
        let mut config = PPOConfig::default();
        config.clip = 0.0;
        assert!(matches!(
            config.validate(),
            Err(TrainError::Configuration(_))
        ));

        config.clip = f32::INFINITY;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_zero_sizes() {
        let mut config = PPOConfig::default();
        config.timesteps_per_batch = 0;
        assert!(config.validate().is_err());

        let mut config = PPOConfig::default();
        config.n_updates_per_iteration = 0;
        assert!(config.validate().is_err());

        let mut config = PPOConfig::default();
        config.hidden_count = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: PPOConfig =
            serde_json::from_str(r#"{"timesteps_per_batch": 64, "hidden_count": 2}"#).unwrap();
        assert_eq!(config.timesteps_per_batch, 64);
        assert_eq!(config.hidden_count, 2);
        assert_eq!(config.clip, 0.2); // From default
        assert!(config.validate().is_ok());
    }
}
