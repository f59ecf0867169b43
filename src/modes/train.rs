//! Training mode for the PPO agent
//!
//! Alternates rollout collection and PPO updates until the timestep budget
//! is used up, then writes actor and critic snapshots plus run metadata.
//!
//! # Example
//!
//! ```rust,ignore
//! use maze_rl::env::ProcessEnv;
//! use maze_rl::metrics::ScorePlot;
//! use maze_rl::modes::TrainMode;
//! use maze_rl::rl::{FileModelStore, PPOConfig, TrainingBackend, default_device};
//!
//! let env = ProcessEnv::spawn("maze-game", &[])?;
//! let store = FileModelStore::new("models");
//! let mut mode = TrainMode::<TrainingBackend, _, _, _>::new(
//!     PPOConfig::default(),
//!     env,
//!     ScorePlot::new(),
//!     store,
//!     default_device(),
//! )?;
//! mode.run(100_000)?;
//! ```

use burn::tensor::backend::AutodiffBackend;
use tracing::info;

use crate::env::{Direction, Environment};
use crate::error::TrainError;
use crate::metrics::{ScoreSink, TrainingStats};
use crate::rl::{ModelMetadata, ModelStore, PPOAgent, PPOConfig, RolloutCollector};

/// Metadata name of PPO runs
pub const PPO_METADATA: &str = "ppo";

/// Outcome of a finished [`TrainMode::run`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrainSummary {
    /// Environment steps simulated
    pub timesteps: usize,

    /// Collect + update iterations performed
    pub iterations: usize,

    /// Episodes played
    pub episodes: usize,
}

/// PPO training orchestrator
///
/// Owns the agent, the environment, the score sink and the model store for
/// the duration of a run.
pub struct TrainMode<B: AutodiffBackend, E: Environment, S: ScoreSink, M: ModelStore> {
    agent: PPOAgent<B>,
    collector: RolloutCollector,
    env: E,
    sink: S,
    store: M,

    /// Training statistics tracker
    stats: TrainingStats,

    timesteps_so_far: usize,
    iterations: usize,
}

impl<B, E, S, M> TrainMode<B, E, S, M>
where
    B: AutodiffBackend,
    E: Environment,
    S: ScoreSink,
    M: ModelStore,
{
    /// Validate the setup and build the agent
    ///
    /// Snapshots are loaded from `store` when `config.load_model` is set.
    /// Nothing touches the environment before validation succeeds.
    pub fn new(config: PPOConfig, env: E, sink: S, store: M, device: B::Device) -> Result<Self, TrainError> {
        config.validate()?;

        let act_dim = env.actions();
        if act_dim != Direction::COUNT {
            return Err(TrainError::Configuration(format!(
                "environment declares {act_dim} actions, the policy discretizes into {}",
                Direction::COUNT
            )));
        }

        let agent = PPOAgent::from_store(config, env.observations(), act_dim, &store, device)?;
        let collector = RolloutCollector::new(
            agent.config().timesteps_per_batch,
            agent.head(),
            agent.config().seed,
        );

        Ok(Self {
            agent,
            collector,
            env,
            sink,
            store,
            stats: TrainingStats::new(100),
            timesteps_so_far: 0,
            iterations: 0,
        })
    }

    /// Train until at least `total_timesteps` environment steps have run
    ///
    /// The final batch is never truncated, so the step count may overshoot
    /// the budget by up to one batch. Snapshots are saved once, after the
    /// last update.
    pub fn run(&mut self, total_timesteps: usize) -> Result<TrainSummary, TrainError> {
        self.log_header(total_timesteps);

        while self.timesteps_so_far < total_timesteps {
            self.iterate()?;
        }

        self.save()?;

        info!(
            timesteps = self.timesteps_so_far,
            iterations = self.iterations,
            "training complete: {}",
            self.stats.format_summary()
        );

        Ok(TrainSummary {
            timesteps: self.timesteps_so_far,
            iterations: self.iterations,
            episodes: self.stats.total_episodes(),
        })
    }

    /// One collect + update cycle
    fn iterate(&mut self) -> Result<(), TrainError> {
        let actor = self.agent.actor_inference();
        let batch = self.collector.collect_batch(&mut self.env, &actor, &mut self.sink)?;

        for (&score, &length) in batch.scores.iter().zip(&batch.episode_lengths) {
            self.stats.record_episode(score, length);
        }
        self.timesteps_so_far += batch.timesteps();

        let report = self.agent.learn(&batch);
        self.stats.record_update(report.actor_loss, report.critic_loss);
        for _ in 0..report.numeric_warnings() {
            self.stats.record_numeric_warning();
        }
        self.iterations += 1;

        info!(
            iteration = self.iterations,
            timesteps = self.timesteps_so_far,
            episodes = batch.episodes(),
            "{}",
            self.stats.format_summary()
        );
        Ok(())
    }

    fn save(&self) -> Result<(), TrainError> {
        self.agent.save(&self.store)?;

        let metadata = ModelMetadata::new(
            PPO_METADATA,
            self.agent.config(),
            self.agent.observation_dim(),
            self.agent.action_dim(),
            self.agent.training_step(),
            self.timesteps_so_far,
        );
        self.store.save_metadata(PPO_METADATA, &metadata)
    }

    fn log_header(&self, total_timesteps: usize) {
        let config = self.agent.config();
        info!(
            total_timesteps,
            timesteps_per_batch = config.timesteps_per_batch,
            gamma = config.gamma,
            clip = config.clip,
            learning_rate = config.learning_rate,
            epochs = config.n_updates_per_iteration,
            observations = self.agent.observation_dim(),
            "starting PPO training"
        );
    }

    pub fn agent(&self) -> &PPOAgent<B> {
        &self.agent
    }

    pub fn env(&self) -> &E {
        &self.env
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn stats(&self) -> &TrainingStats {
        &self.stats
    }

    pub fn timesteps_so_far(&self) -> usize {
        self.timesteps_so_far
    }
}
