//! Rollout collection for on-policy training
//!
//! Plays whole episodes with the current actor until the batch holds at
//! least `timesteps_per_batch` steps. Episodes are never cut short, so the
//! final one may push the batch past the target.

use super::network::Approximator;
use super::policy::{ArgMaxDiscretizer, Discretizer, GaussianHead};
use crate::env::{Environment, Observation, check_observation};
use crate::error::TrainError;
use crate::metrics::ScoreSink;
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::debug;

/// Trajectories gathered by one rollout
///
/// `observations`, `actions` and `log_probs` are index-aligned: position `i`
/// in each refers to the same timestep.
#[derive(Debug, Clone, Default)]
pub struct Batch {
    /// Observation each action was chosen from
    pub observations: Vec<Observation>,

    /// Continuous action vectors sampled from the Gaussian head
    pub actions: Vec<Vec<f32>>,

    /// Log probability of each action under the policy that sampled it
    pub log_probs: Vec<f32>,

    /// Rewards, grouped per episode in collection order
    pub rewards_per_episode: Vec<Vec<f32>>,

    /// Number of steps in each episode
    pub episode_lengths: Vec<usize>,

    /// Final game score of each episode
    pub scores: Vec<f32>,
}

impl Batch {
    /// Total number of timesteps in the batch
    pub fn timesteps(&self) -> usize {
        self.episode_lengths.iter().sum()
    }

    pub fn episodes(&self) -> usize {
        self.episode_lengths.len()
    }
}

/// Drives the environment to produce fixed-size batches of trajectories
pub struct RolloutCollector<D: Discretizer = ArgMaxDiscretizer> {
    timesteps_per_batch: usize,
    head: GaussianHead,
    discretizer: D,
    rng: StdRng,
}

impl RolloutCollector<ArgMaxDiscretizer> {
    /// Collector using arg-max discretization and a seeded sampler
    pub fn new(timesteps_per_batch: usize, head: GaussianHead, seed: u64) -> Self {
        Self::with_discretizer(timesteps_per_batch, head, ArgMaxDiscretizer, seed)
    }
}

impl<D: Discretizer> RolloutCollector<D> {
    pub fn with_discretizer(timesteps_per_batch: usize, head: GaussianHead, discretizer: D, seed: u64) -> Self {
        Self {
            timesteps_per_batch,
            head,
            discretizer,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Play episodes until the batch reaches the timestep target
    ///
    /// Every finished episode's score goes to `sink`. Environment failures
    /// abort the batch immediately.
    pub fn collect_batch<E, P, S>(&mut self, env: &mut E, actor: &P, sink: &mut S) -> Result<Batch, TrainError>
    where
        E: Environment,
        P: Approximator,
        S: ScoreSink,
    {
        let mut batch = Batch::default();
        let mut collected = 0;

        while collected < self.timesteps_per_batch {
            let (rewards, score) = self.run_episode(env, actor, &mut batch)?;
            collected += rewards.len();

            debug!(
                episode = batch.episodes() + 1,
                length = rewards.len(),
                score,
                collected,
                "episode collected"
            );
            sink.record(score);

            batch.episode_lengths.push(rewards.len());
            batch.rewards_per_episode.push(rewards);
            batch.scores.push(score);
        }

        Ok(batch)
    }

    fn run_episode<E, P>(&mut self, env: &mut E, actor: &P, batch: &mut Batch) -> Result<(Vec<f32>, f32), TrainError>
    where
        E: Environment,
        P: Approximator,
    {
        let mut rewards = Vec::new();
        let mut obs = env.reset()?;
        check_observation(env, &obs)?;

        loop {
            let mean = actor.predict(&obs);
            let (action, log_prob) = self.head.sample(&mean, &mut self.rng);
            let direction = self.discretizer.discretize(&action);

            let step = env.step(direction)?;
            check_observation(env, &step.observation)?;

            batch.observations.push(obs);
            batch.actions.push(action);
            batch.log_probs.push(log_prob);
            rewards.push(step.reward);

            if step.done {
                break;
            }
            obs = step.observation;
        }

        let score = env.score()?;
        Ok((rewards, score))
    }
}
