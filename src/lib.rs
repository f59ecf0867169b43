//! maze_rl - Reinforcement learning agents for a maze-chase game
//!
//! This library provides:
//! - The environment contract and a JSON-lines adapter for an external game process (env module)
//! - PPO and deep Q-learning agents on the Burn NdArray backend (rl module)
//! - Training loops for both agents (modes module)
//! - Score reporting and rolling training statistics (metrics module)

pub mod env;
pub mod error;
pub mod metrics;
pub mod modes;
pub mod rl;

pub use error::{EnvError, Result, TrainError};
