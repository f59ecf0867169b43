//! Environment contract for the maze-chase game
//!
//! The game itself lives outside this crate. Agents only see it through the
//! [`Environment`] trait: reset, step with a cardinal direction, and the
//! static observation/action dimensions.

pub mod action;
pub mod process;

#[cfg(test)]
pub(crate) mod testing;

pub use action::Direction;
pub use process::{JsonLinesEnv, ProcessEnv};

use crate::error::EnvError;

/// Observation vector produced by the game
pub type Observation = Vec<f32>;

/// Result of a single environment step
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub observation: Observation,
    pub reward: f32,
    pub done: bool,
}

/// A maze-chase game instance the agents can drive
///
/// Every episode must end with exactly one `done == true` step. An
/// environment that never terminates will stall rollout collection.
pub trait Environment {
    /// Start a new episode and return its first observation
    fn reset(&mut self) -> Result<Observation, EnvError>;

    /// Apply one move
    fn step(&mut self, action: Direction) -> Result<Step, EnvError>;

    /// Length of the observation vector
    fn observations(&self) -> usize;

    /// Length of the action vector
    fn actions(&self) -> usize;

    /// Score of the current (or just finished) game
    fn score(&mut self) -> Result<f32, EnvError>;
}

/// Reject an observation whose length differs from `env.observations()`
pub fn check_observation<E: Environment + ?Sized>(env: &E, observation: &[f32]) -> Result<(), EnvError> {
    let expected = env.observations();
    if observation.len() != expected {
        return Err(EnvError::Protocol(format!(
            "observation has {} values, expected {expected}",
            observation.len()
        )));
    }
    Ok(())
}
