//! Deep Q-learning game loop
//!
//! Plays a fixed number of games. Each step is trained on immediately and
//! remembered; each finished game triggers a replay pass and, when it sets a
//! new record, a snapshot of the Q-network.

use burn::tensor::backend::AutodiffBackend;
use tracing::{debug, info};

use crate::env::{Direction, Environment, check_observation};
use crate::error::TrainError;
use crate::metrics::ScoreSink;
use crate::rl::{DqnAgent, DqnConfig, ModelMetadata, ModelStore, Transition};

/// Metadata name of DQN runs
pub const DQN_METADATA: &str = "dqn";

/// Outcome of a finished [`DqnMode::run`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DqnSummary {
    pub games: usize,
    pub steps: usize,
    /// Best score seen, `None` if no game finished
    pub record: Option<f32>,
}

pub struct DqnMode<B: AutodiffBackend, E: Environment, S: ScoreSink, M: ModelStore> {
    agent: DqnAgent<B>,
    env: E,
    sink: S,
    store: M,
    record: Option<f32>,
    steps: usize,
}

impl<B, E, S, M> DqnMode<B, E, S, M>
where
    B: AutodiffBackend,
    E: Environment,
    S: ScoreSink,
    M: ModelStore,
{
    pub fn new(config: DqnConfig, env: E, sink: S, store: M, device: B::Device) -> Result<Self, TrainError> {
        config.validate()?;

        if env.actions() != Direction::COUNT {
            return Err(TrainError::Configuration(format!(
                "environment declares {} actions, the q-network outputs {}",
                env.actions(),
                Direction::COUNT
            )));
        }

        let agent = DqnAgent::from_store(config, env.observations(), &store, device)?;

        Ok(Self {
            agent,
            env,
            sink,
            store,
            record: None,
            steps: 0,
        })
    }

    /// Play `games` complete games
    pub fn run(&mut self, games: usize) -> Result<DqnSummary, TrainError> {
        info!(
            games,
            exploration_games = self.agent.config().exploration_games,
            batch_size = self.agent.config().batch_size,
            "starting DQN training"
        );

        let mut played = 0;
        if games == 0 {
            return Ok(DqnSummary {
                games: played,
                steps: self.steps,
                record: self.record,
            });
        }
        let mut state = self.env.reset()?;
        check_observation(&self.env, &state)?;

        while played < games {
            let action = self.agent.select_action(&state);
            let step = self.env.step(action)?;
            check_observation(&self.env, &step.observation)?;
            self.steps += 1;

            let transition = Transition {
                state,
                action,
                reward: step.reward,
                next_state: step.observation,
                done: step.done,
            };
            self.agent.train_short_memory(&transition);
            state = transition.next_state.clone();
            self.agent.remember(transition);

            if step.done {
                played += 1;
                self.finish_game()?;
                if played < games {
                    state = self.env.reset()?;
                    check_observation(&self.env, &state)?;
                }
            }
        }

        Ok(DqnSummary {
            games: played,
            steps: self.steps,
            record: self.record,
        })
    }

    fn finish_game(&mut self) -> Result<(), TrainError> {
        self.agent.finish_game();
        if let Some(loss) = self.agent.train_long_memory() {
            debug!(game = self.agent.n_games(), loss, "replayed memory");
        }

        let score = self.env.score()?;
        if self.record.is_none_or(|record| score > record) {
            self.record = Some(score);
            self.save()?;
        }

        info!(
            game = self.agent.n_games(),
            score,
            record = self.record.unwrap_or(score),
            "game over"
        );
        self.sink.record(score);
        Ok(())
    }

    fn save(&self) -> Result<(), TrainError> {
        self.agent.save(&self.store)?;
        let metadata = ModelMetadata::new(
            DQN_METADATA,
            self.agent.config(),
            self.agent.observation_dim(),
            Direction::COUNT,
            self.agent.n_games(),
            self.steps,
        );
        self.store.save_metadata(DQN_METADATA, &metadata)
    }

    pub fn agent(&self) -> &DqnAgent<B> {
        &self.agent
    }

    pub fn env(&self) -> &E {
        &self.env
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::Step;
    use crate::env::testing::FixedLengthEnv;
    use crate::error::EnvError;
    use crate::metrics::ScorePlot;
    use crate::rl::persistence::DQN_SNAPSHOT;
    use crate::rl::{FileModelStore, TrainingBackend, default_device};
    use tempfile::TempDir;

    fn small_config() -> DqnConfig {
        DqnConfig {
            hidden_dim: 8,
            batch_size: 4,
            ..Default::default()
        }
    }

    /// Game whose score is the number of the game just played
    struct CountingEnv {
        inner: FixedLengthEnv,
    }

    impl Environment for CountingEnv {
        fn reset(&mut self) -> Result<Vec<f32>, EnvError> {
            self.inner.reset()
        }

        fn step(&mut self, action: Direction) -> Result<Step, EnvError> {
            self.inner.step(action)
        }

        fn observations(&self) -> usize {
            self.inner.observations()
        }

        fn actions(&self) -> usize {
            self.inner.actions()
        }

        fn score(&mut self) -> Result<f32, EnvError> {
            Ok(self.inner.resets as f32)
        }
    }

    #[test]
    fn test_plays_requested_games() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileModelStore::new(temp_dir.path());

        let mut mode = DqnMode::<TrainingBackend, _, _, _>::new(
            small_config(),
            FixedLengthEnv::new(3, 5, 1.0),
            ScorePlot::new(),
            store.clone(),
            default_device(),
        )
        .unwrap();
        let summary = mode.run(3).unwrap();

        assert_eq!(summary.games, 3);
        assert_eq!(summary.steps, 15);
        assert_eq!(summary.record, Some(5.0));
        assert_eq!(mode.agent().n_games(), 3);
        assert_eq!(mode.agent().memory().len(), 15);
        assert_eq!(mode.sink().scores(), &[5.0, 5.0, 5.0]);
        assert_eq!(mode.env().resets, 3);
        assert!(store.weights_path(DQN_SNAPSHOT).is_file());
    }

    #[test]
    fn test_record_updates_on_improvement() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileModelStore::new(temp_dir.path());
        let env = CountingEnv {
            inner: FixedLengthEnv::new(2, 2, 0.0),
        };

        let mut mode =
            DqnMode::<TrainingBackend, _, _, _>::new(small_config(), env, ScorePlot::new(), store.clone(), default_device())
                .unwrap();
        let summary = mode.run(4).unwrap();

        assert_eq!(summary.record, Some(4.0));
        assert_eq!(mode.sink().scores(), &[1.0, 2.0, 3.0, 4.0]);
        // The last record snapshot was written after game 4
        assert_eq!(store.load_metadata(DQN_METADATA).unwrap().updates, 4);
    }

    #[test]
    fn test_zero_games_does_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let mut mode = DqnMode::<TrainingBackend, _, _, _>::new(
            small_config(),
            FixedLengthEnv::new(3, 5, 1.0),
            ScorePlot::new(),
            FileModelStore::new(temp_dir.path()),
            default_device(),
        )
        .unwrap();

        let summary = mode.run(0).unwrap();
        assert_eq!(summary.games, 0);
        assert_eq!(summary.steps, 0);
        assert_eq!(summary.record, None);
    }

    #[test]
    fn test_short_observation_is_environment_error() {
        let temp_dir = TempDir::new().unwrap();
        let mut env = FixedLengthEnv::new(3, 5, 1.0);
        env.emitted_dim = 2;

        let mut mode = DqnMode::<TrainingBackend, _, _, _>::new(
            small_config(),
            env,
            ScorePlot::new(),
            FileModelStore::new(temp_dir.path()),
            default_device(),
        )
        .unwrap();

        let err = mode.run(1).unwrap_err();
        assert!(matches!(err, TrainError::Environment(EnvError::Protocol(_))));
        assert_eq!(mode.env().total_steps, 0);
    }

    #[test]
    fn test_action_dimension_mismatch_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let mut env = FixedLengthEnv::new(3, 5, 1.0);
        env.actions = 2;

        let result = DqnMode::<TrainingBackend, _, _, _>::new(
            small_config(),
            env,
            ScorePlot::new(),
            FileModelStore::new(temp_dir.path()),
            default_device(),
        );
        assert!(matches!(result, Err(TrainError::Configuration(_))));
    }
}
