//! Reinforcement learning for the maze-chase game
//!
//! Provides:
//! - Feed-forward function approximators on the Burn NdArray backend
//! - Two-stage policy (Gaussian head + direction discretizer)
//! - PPO: rollout collection, advantage estimation and the clipped update
//! - Deep Q-learning with bounded replay memory
//! - Model persistence behind the `ModelStore` port

pub mod advantage;
pub mod backend;
pub mod config;
pub mod dqn;
pub mod network;
pub mod persistence;
pub mod policy;
pub mod ppo;
pub mod replay;
pub mod rollout;

pub use advantage::{Advantages, compute_advantages, rewards_to_go};
pub use backend::{InferenceBackend, TrainingBackend, default_device};
pub use config::PPOConfig;
pub use dqn::{DqnAgent, DqnConfig, Transition};
pub use network::{Approximator, FeedForwardConfig, FeedForwardNetwork};
pub use persistence::{FileModelStore, ModelMetadata, ModelStore};
pub use policy::{ArgMaxDiscretizer, Discretizer, GaussianHead};
pub use ppo::{PPOAgent, UpdateReport};
pub use replay::ReplayMemory;
pub use rollout::{Batch, RolloutCollector};
