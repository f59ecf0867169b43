//! Scripted environments for unit tests

use super::{Direction, Environment, Observation, Step};
use crate::error::EnvError;

/// Terminates every episode after exactly `episode_len` steps
///
/// Observations encode the step index in the first component so tests can
/// check alignment. `emitted_dim` is the length actually produced and
/// defaults to the declared `obs_dim`.
pub struct FixedLengthEnv {
    pub obs_dim: usize,
    pub emitted_dim: usize,
    pub actions: usize,
    pub episode_len: usize,
    pub reward: f32,
    pub step_in_episode: usize,
    pub resets: usize,
    pub total_steps: usize,
    pub moves: Vec<Direction>,
    pub score: f32,
}

impl FixedLengthEnv {
    pub fn new(obs_dim: usize, episode_len: usize, reward: f32) -> Self {
        Self {
            obs_dim,
            emitted_dim: obs_dim,
            actions: Direction::COUNT,
            episode_len,
            reward,
            step_in_episode: 0,
            resets: 0,
            total_steps: 0,
            moves: Vec::new(),
            score: 0.0,
        }
    }

    fn observation(&self) -> Observation {
        let mut obs = vec![0.0; self.emitted_dim];
        if let Some(first) = obs.first_mut() {
            *first = self.step_in_episode as f32;
        }
        obs
    }
}

impl Environment for FixedLengthEnv {
    fn reset(&mut self) -> Result<Observation, EnvError> {
        self.resets += 1;
        self.step_in_episode = 0;
        self.score = 0.0;
        Ok(self.observation())
    }

    fn step(&mut self, action: Direction) -> Result<Step, EnvError> {
        self.moves.push(action);
        self.step_in_episode += 1;
        self.total_steps += 1;
        self.score += self.reward;
        Ok(Step {
            observation: self.observation(),
            reward: self.reward,
            done: self.step_in_episode >= self.episode_len,
        })
    }

    fn observations(&self) -> usize {
        self.obs_dim
    }

    fn actions(&self) -> usize {
        self.actions
    }

    fn score(&mut self) -> Result<f32, EnvError> {
        Ok(self.score)
    }
}

/// Fails on the `fail_at`-th step
pub struct FailingEnv {
    pub inner: FixedLengthEnv,
    pub fail_at: usize,
}

impl Environment for FailingEnv {
    fn reset(&mut self) -> Result<Observation, EnvError> {
        self.inner.reset()
    }

    fn step(&mut self, action: Direction) -> Result<Step, EnvError> {
        if self.inner.total_steps + 1 >= self.fail_at {
            return Err(EnvError::Closed);
        }
        self.inner.step(action)
    }

    fn observations(&self) -> usize {
        self.inner.observations()
    }

    fn actions(&self) -> usize {
        self.inner.actions()
    }

    fn score(&mut self) -> Result<f32, EnvError> {
        self.inner.score()
    }
}
