//! Deep Q-learning agent with experience replay
//!
//! A single Q-network maps an observation to one value per direction.
//! Moves are chosen ε-greedily with ε shrinking by one per finished game.
//! Every transition is trained on immediately ("short memory") and stored;
//! at the end of each game a random batch of stored transitions is replayed
//! ("long memory").

use super::network::{Approximator, FeedForwardConfig, FeedForwardNetwork, rows_to_tensor};
use super::persistence::{DQN_SNAPSHOT, ModelStore};
use super::policy::argmax;
use super::ppo::mse_loss;
use super::replay::{DEFAULT_REPLAY_CAPACITY, ReplayMemory};
use crate::env::{Direction, Observation};
use crate::error::TrainError;
use burn::{
    module::AutodiffModule,
    optim::{Adam, AdamConfig, GradientsParams, Optimizer, adaptor::OptimizerAdaptor},
    tensor::{ElementConversion, Tensor, TensorData, backend::AutodiffBackend},
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Hyperparameters of the DQN agent
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DqnConfig {
    /// Replay memory capacity
    pub max_memory: usize,

    /// Transitions replayed at the end of each game
    pub batch_size: usize,

    pub learning_rate: f64,

    /// Discount applied to the best next-state value, in [0, 1]
    pub gamma: f32,

    pub hidden_dim: usize,
    pub hidden_count: usize,

    /// ε starts here and drops by one per finished game
    pub exploration_games: usize,

    /// Upper bound (inclusive) of the exploration draw compared against ε
    pub exploration_range: u32,

    /// Restore the `model` snapshot when the agent is built
    pub load_model: bool,

    pub seed: u64,
}

impl Default for DqnConfig {
    fn default() -> Self {
        Self {
            max_memory: DEFAULT_REPLAY_CAPACITY,
            batch_size: 1000,
            learning_rate: 0.001,
            gamma: 0.9,
            hidden_dim: 256,
            hidden_count: 1,
            exploration_games: 80,
            exploration_range: 200,
            load_model: false,
            seed: 0,
        }
    }
}

impl DqnConfig {
    pub fn validate(&self) -> Result<(), TrainError> {
        if !self.learning_rate.is_finite() || self.learning_rate <= 0.0 {
            return Err(TrainError::Configuration(format!(
                "learning_rate must be positive and finite, got {}",
                self.learning_rate
            )));
        }
        if !self.gamma.is_finite() || !(0.0..=1.0).contains(&self.gamma) {
            return Err(TrainError::Configuration(format!(
                "gamma must be in [0, 1], got {}",
                self.gamma
            )));
        }
        if self.max_memory == 0 || self.batch_size == 0 {
            return Err(TrainError::Configuration(
                "max_memory and batch_size must be at least 1".to_string(),
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

/// One step of experience
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub state: Observation,
    pub action: Direction,
    pub reward: f32,
    pub next_state: Observation,
    pub done: bool,
}

/// ε-greedy Q-learning agent
pub struct DqnAgent<B: AutodiffBackend> {
    model: FeedForwardNetwork<B>,
    optim: OptimizerAdaptor<Adam, FeedForwardNetwork<B>, B>,
    memory: ReplayMemory<Transition>,
    config: DqnConfig,
    rng: StdRng,
    n_games: usize,
    obs_dim: usize,
    device: B::Device,
}

impl<B: AutodiffBackend> DqnAgent<B> {
    pub fn new(config: DqnConfig, obs_dim: usize, device: B::Device) -> Result<Self, TrainError> {
        config.validate()?;
        if obs_dim == 0 {
            return Err(TrainError::Configuration(
                "observation dimension must be non-zero".to_string(),
            ));
        }

        let model = FeedForwardConfig::new(obs_dim, config.hidden_dim, config.hidden_count, Direction::COUNT)
            .init(&device);

        Ok(Self {
            model,
            optim: AdamConfig::new().init(),
            memory: ReplayMemory::new(config.max_memory),
            rng: StdRng::seed_from_u64(config.seed),
            config,
            n_games: 0,
            obs_dim,
            device,
        })
    }

    /// Build the agent, restoring the Q-network when `config.load_model` is set
    pub fn from_store<S: ModelStore>(
        config: DqnConfig,
        obs_dim: usize,
        store: &S,
        device: B::Device,
    ) -> Result<Self, TrainError> {
        let mut agent = Self::new(config, obs_dim, device)?;
        if agent.config.load_model {
            agent.model = store.load(DQN_SNAPSHOT, agent.model)?;
        }
        Ok(agent)
    }

    pub fn save<S: ModelStore>(&self, store: &S) -> Result<(), TrainError> {
        store.save(DQN_SNAPSHOT, &self.model)
    }

    /// Current exploration threshold; zero or negative means always greedy
    pub fn epsilon(&self) -> i64 {
        self.config.exploration_games as i64 - self.n_games as i64
    }

    /// Q-values of `state` under the current network, one per direction
    pub fn q_values(&self, state: &[f32]) -> Vec<f32> {
        self.model.valid().predict(state)
    }

    /// ε-greedy move selection
    pub fn select_action(&mut self, state: &[f32]) -> Direction {
        let draw = i64::from(self.rng.gen_range(0..=self.config.exploration_range));
        if draw < self.epsilon() {
            let idx = self.rng.gen_range(0..Direction::COUNT);
            return Direction::from_index(idx).unwrap_or(Direction::Up);
        }

        let q = self.q_values(state);
        Direction::from_index(argmax(&q)).unwrap_or(Direction::Up)
    }

    /// Store a transition for later replay
    pub fn remember(&mut self, transition: Transition) {
        self.memory.push(transition);
    }

    /// One gradient step on the latest transition
    pub fn train_short_memory(&mut self, transition: &Transition) -> f32 {
        self.train_step(&[transition])
    }

    /// One gradient step on up to `batch_size` stored transitions
    ///
    /// Returns `None` when nothing has been remembered yet.
    pub fn train_long_memory(&mut self) -> Option<f32> {
        if self.memory.is_empty() {
            return None;
        }
        let sample: Vec<Transition> = self
            .memory
            .sample(&mut self.rng, self.config.batch_size)
            .into_iter()
            .cloned()
            .collect();
        let batch: Vec<&Transition> = sample.iter().collect();
        Some(self.train_step(&batch))
    }

    /// Regress Q(s, a) toward `r + γ · max Q(s', ·)` (just `r` on terminal steps)
    ///
    /// Only the taken action's output gets a new target; the others are
    /// pinned to their current predictions. Returns the MSE loss.
    pub fn train_step(&mut self, transitions: &[&Transition]) -> f32 {
        let n = transitions.len();
        if n == 0 {
            return 0.0;
        }

        let states: Vec<Observation> = transitions.iter().map(|t| t.state.clone()).collect();
        let next_states: Vec<Observation> = transitions.iter().map(|t| t.next_state.clone()).collect();

        let next_best: Vec<f32> = self
            .model
            .valid()
            .forward(rows_to_tensor(&next_states, self.obs_dim, &self.device))
            .max_dim(1)
            .into_data()
            .iter::<f32>()
            .collect();

        let q = self.model.forward(rows_to_tensor(&states, self.obs_dim, &self.device));

        let mut targets: Vec<f32> = q.clone().detach().into_data().iter::<f32>().collect();
        for (i, t) in transitions.iter().enumerate() {
            let q_new = if t.done {
                t.reward
            } else {
                t.reward + self.config.gamma * next_best[i]
            };
            targets[i * Direction::COUNT + t.action.index()] = q_new;
        }
        let targets = Tensor::<B, 2>::from_data(TensorData::new(targets, [n, Direction::COUNT]), &self.device);

        let loss = mse_loss(q, targets);
        let loss_value = loss.clone().into_scalar().elem::<f32>();

        if !loss_value.is_finite() {
            let err = TrainError::NumericInstability(format!("q-network loss is {loss_value}"));
            warn!(%err, batch = n, "skipping q-network gradient step");
            return loss_value;
        }

        let grads = GradientsParams::from_grads(loss.backward(), &self.model);
        self.model = self.optim.step(self.config.learning_rate, self.model.clone(), grads);

        debug!(batch = n, loss = loss_value, "q-network step");
        loss_value
    }

    /// Mark a game as finished, lowering ε for the next one
    pub fn finish_game(&mut self) {
        self.n_games += 1;
    }

    pub fn n_games(&self) -> usize {
        self.n_games
    }

    pub fn memory(&self) -> &ReplayMemory<Transition> {
        &self.memory
    }

    pub fn config(&self) -> &DqnConfig {
        &self.config
    }

    pub fn observation_dim(&self) -> usize {
        self.obs_dim
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rl::persistence::FileModelStore;
    use crate::rl::{TrainingBackend, default_device};
    use std::collections::HashSet;
    use tempfile::TempDir;

    fn small_config() -> DqnConfig {
        DqnConfig {
            hidden_dim: 16,
            learning_rate: 0.01,
            batch_size: 8,
            ..Default::default()
        }
    }

    fn agent(config: DqnConfig) -> DqnAgent<TrainingBackend> {
        DqnAgent::new(config, 3, default_device()).unwrap()
    }

    fn terminal(action: Direction, reward: f32) -> Transition {
        Transition {
            state: vec![1.0, 0.0, -1.0],
            action,
            reward,
            next_state: vec![0.0, 0.0, 0.0],
            done: true,
        }
    }

    #[test]
    fn test_default_config() {
        let config = DqnConfig::default();
        assert_eq!(config.max_memory, 100_000);
        assert_eq!(config.batch_size, 1000);
        assert_eq!(config.learning_rate, 0.001);
        assert_eq!(config.exploration_games, 80);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = DqnConfig {
            gamma: 1.5,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(TrainError::Configuration(_))));

        let config = DqnConfig {
            batch_size: 0,
            ..Default::default()
        };
        assert!(DqnAgent::<TrainingBackend>::new(config, 3, default_device()).is_err());
    }

    #[test]
    fn test_epsilon_decays_per_game() {
        let mut agent = agent(small_config());
        assert_eq!(agent.epsilon(), 80);

        for _ in 0..100 {
            agent.finish_game();
        }
        assert_eq!(agent.n_games(), 100);
        assert_eq!(agent.epsilon(), -20);
    }

    #[test]
    fn test_greedy_when_exploration_exhausted() {
        let mut agent = agent(DqnConfig {
            exploration_games: 0,
            ..small_config()
        });
        let state = [0.3, -0.2, 0.9];
        let expected = Direction::from_index(argmax(&agent.q_values(&state))).unwrap();

        for _ in 0..20 {
            assert_eq!(agent.select_action(&state), expected);
        }
    }

    #[test]
    fn test_random_while_exploring() {
        let mut agent = agent(DqnConfig {
            exploration_games: 10_000,
            ..small_config()
        });
        let state = [0.3, -0.2, 0.9];

        let seen: HashSet<_> = (0..200).map(|_| agent.select_action(&state)).collect();
        assert_eq!(seen.len(), Direction::COUNT);
    }

    #[test]
    fn test_terminal_target_is_reward() {
        let mut agent = agent(small_config());
        let transition = terminal(Direction::Down, 10.0);
        let before = agent.q_values(&transition.state)[Direction::Down.index()];

        for _ in 0..30 {
            agent.train_short_memory(&transition);
        }

        let after = agent.q_values(&transition.state)[Direction::Down.index()];
        assert!((after - 10.0).abs() < (before - 10.0).abs());
    }

    #[test]
    fn test_long_memory_needs_experience() {
        let mut agent = agent(small_config());
        assert_eq!(agent.train_long_memory(), None);

        for i in 0..20 {
            agent.remember(terminal(Direction::Left, i as f32));
        }
        let loss = agent.train_long_memory().unwrap();
        assert!(loss.is_finite());
        assert_eq!(agent.memory().len(), 20);
    }

    #[test]
    fn test_memory_bounded_by_config() {
        let mut agent = agent(DqnConfig {
            max_memory: 5,
            ..small_config()
        });
        for i in 0..8 {
            agent.remember(terminal(Direction::Up, i as f32));
        }
        assert_eq!(agent.memory().len(), 5);
        assert_eq!(agent.memory().iter().next().map(|t| t.reward), Some(3.0));
    }

    #[test]
    fn test_model_snapshot_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileModelStore::new(temp_dir.path());

        let mut trained = agent(small_config());
        trained.train_short_memory(&terminal(Direction::Right, 1.0));
        trained.save(&store).unwrap();

        let restored = DqnAgent::<TrainingBackend>::from_store(
            DqnConfig {
                load_model: true,
                ..small_config()
            },
            3,
            &store,
            default_device(),
        )
        .unwrap();

        let state = [0.5, 0.5, 0.5];
        for (a, b) in trained.q_values(&state).iter().zip(restored.q_values(&state)) {
            assert!((a - b).abs() < 1e-6);
        }
    }
}
