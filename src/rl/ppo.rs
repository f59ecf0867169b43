//! PPO (Proximal Policy Optimization) agent implementation
//!
//! Separate actor and critic networks, each with its own Adam optimizer.
//! Every call to [`PPOAgent::learn`] computes rewards-to-go and normalized
//! advantages for one rollout, then takes `n_updates_per_iteration`
//! full-batch gradient steps on the clipped surrogate objective (actor) and
//! on the value regression (critic).

use super::advantage::{compute_advantages, rewards_to_go};
use super::config::PPOConfig;
use super::network::{FeedForwardConfig, FeedForwardNetwork, rows_to_tensor};
use super::persistence::{ACTOR_SNAPSHOT, CRITIC_SNAPSHOT, ModelStore};
use super::policy::GaussianHead;
use super::rollout::Batch;
use crate::env::Observation;
use crate::error::TrainError;
use burn::{
    module::AutodiffModule,
    optim::{Adam, AdamConfig, GradientsParams, Optimizer, adaptor::OptimizerAdaptor},
    tensor::{ElementConversion, Tensor, TensorData, backend::AutodiffBackend, backend::Backend},
};
use tracing::{debug, warn};

/// Losses and diagnostics of one [`PPOAgent::learn`] call
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UpdateReport {
    /// Mean actor loss over the epochs whose step was taken
    pub actor_loss: f32,

    /// Mean critic loss over the epochs whose step was taken
    pub critic_loss: f32,

    /// Raw advantages had (near) zero spread before normalization
    pub degenerate_advantages: bool,

    /// Gradient steps skipped because a loss was not finite
    pub skipped_steps: usize,
}

impl UpdateReport {
    /// Number of numeric-instability events in this update
    pub fn numeric_warnings(&self) -> usize {
        self.skipped_steps + usize::from(self.degenerate_advantages)
    }
}

/// PPO agent holding the actor, the critic and their optimizers
///
/// # Type Parameters
///
/// * `B` - Autodiff backend for gradient computation
///
/// # Example
///
/// ```rust,ignore
/// use maze_rl::rl::{PPOAgent, PPOConfig, TrainingBackend, default_device};
///
/// let config = PPOConfig { hidden_dim: 32, hidden_count: 2, ..Default::default() };
/// let agent = PPOAgent::<TrainingBackend>::new(config, 15, 4, default_device())?;
/// ```
pub struct PPOAgent<B: AutodiffBackend> {
    /// Maps an observation to the Gaussian action mean
    actor: FeedForwardNetwork<B>,

    /// Maps an observation to a scalar value estimate
    critic: FeedForwardNetwork<B>,

    actor_optim: OptimizerAdaptor<Adam, FeedForwardNetwork<B>, B>,
    critic_optim: OptimizerAdaptor<Adam, FeedForwardNetwork<B>, B>,

    head: GaussianHead,
    config: PPOConfig,

    obs_dim: usize,
    act_dim: usize,

    /// Completed `learn` calls
    training_step: usize,

    device: B::Device,
}

impl<B: AutodiffBackend> PPOAgent<B> {
    /// Create an agent with freshly initialized networks
    ///
    /// Fails with a configuration error before anything is allocated when
    /// the hyperparameters are out of range.
    pub fn new(config: PPOConfig, obs_dim: usize, act_dim: usize, device: B::Device) -> Result<Self, TrainError> {
        config.validate()?;
        if obs_dim == 0 || act_dim == 0 {
            return Err(TrainError::Configuration(format!(
                "observation and action dimensions must be non-zero, got {obs_dim} and {act_dim}"
            )));
        }

        let actor = FeedForwardConfig::new(obs_dim, config.hidden_dim, config.hidden_count, act_dim).init(&device);
        let critic = FeedForwardConfig::new(obs_dim, config.hidden_dim, config.hidden_count, 1).init(&device);

        Ok(Self {
            actor,
            critic,
            actor_optim: AdamConfig::new().init(),
            critic_optim: AdamConfig::new().init(),
            head: GaussianHead::new(config.action_variance),
            config,
            obs_dim,
            act_dim,
            training_step: 0,
            device,
        })
    }

    /// Create an agent, restoring actor and critic from `store` when
    /// `config.load_model` is set
    pub fn from_store<S: ModelStore>(
        config: PPOConfig,
        obs_dim: usize,
        act_dim: usize,
        store: &S,
        device: B::Device,
    ) -> Result<Self, TrainError> {
        let mut agent = Self::new(config, obs_dim, act_dim, device)?;
        if agent.config.load_model {
            agent.actor = store.load(ACTOR_SNAPSHOT, agent.actor)?;
            agent.critic = store.load(CRITIC_SNAPSHOT, agent.critic)?;
        }
        Ok(agent)
    }

    /// Write actor and critic snapshots to `store`
    pub fn save<S: ModelStore>(&self, store: &S) -> Result<(), TrainError> {
        store.save(ACTOR_SNAPSHOT, &self.actor)?;
        store.save(CRITIC_SNAPSHOT, &self.critic)
    }

    /// Actor copy without gradient tracking, for rollout collection
    pub fn actor_inference(&self) -> FeedForwardNetwork<B::InnerBackend> {
        self.actor.valid()
    }

    /// Detached critic estimates for a list of observations
    pub fn critic_values(&self, observations: &[Observation]) -> Vec<f32> {
        if observations.is_empty() {
            return Vec::new();
        }
        let critic = self.critic.valid();
        let obs = rows_to_tensor::<B::InnerBackend>(observations, self.obs_dim, &self.device);
        critic.forward(obs).into_data().iter::<f32>().collect()
    }

    /// Value estimates and current-policy log probabilities for a batch
    ///
    /// Both outputs keep their autodiff graphs.
    pub fn evaluate(&self, observations: Tensor<B, 2>, actions: Tensor<B, 2>) -> (Tensor<B, 1>, Tensor<B, 1>) {
        let values = self.critic.forward(observations.clone()).squeeze::<1>(1);
        let mean = self.actor.forward(observations);
        let log_probs = self.head.log_prob_batch(mean, actions);
        (values, log_probs)
    }

    /// Advantage estimation followed by the PPO update for one rollout
    ///
    /// Rewards-to-go and advantages are computed once here and stay fixed
    /// for every inner epoch.
    pub fn learn(&mut self, batch: &Batch) -> UpdateReport {
        let rtgs = rewards_to_go(&batch.rewards_per_episode, self.config.gamma);
        let values = self.critic_values(&batch.observations);
        let advantages = compute_advantages(&rtgs, &values);

        if advantages.is_degenerate() {
            let err = TrainError::NumericInstability(format!(
                "advantage std {:.3e} collapsed before normalization",
                advantages.raw_std
            ));
            warn!(%err, step = self.training_step, "continuing with epsilon-stabilized advantages");
        }

        let mut report = self.update(
            &batch.observations,
            &batch.actions,
            &batch.log_probs,
            &rtgs,
            &advantages.values,
        );
        report.degenerate_advantages = advantages.is_degenerate();
        report
    }

    /// Clipped-objective update on a fixed batch
    ///
    /// Runs `n_updates_per_iteration` full-batch passes. Each pass
    /// re-evaluates actor and critic, then steps both optimizers
    /// independently.
    pub fn update(
        &mut self,
        observations: &[Observation],
        actions: &[Vec<f32>],
        old_log_probs: &[f32],
        rtgs: &[f32],
        advantages: &[f32],
    ) -> UpdateReport {
        let n = observations.len();
        debug_assert!(actions.len() == n && old_log_probs.len() == n);
        debug_assert!(rtgs.len() == n && advantages.len() == n);

        let clip = self.config.clip;
        let lr = self.config.learning_rate;
        let epochs = self.config.n_updates_per_iteration;

        let obs: Tensor<B, 2> = rows_to_tensor(observations, self.obs_dim, &self.device);
        let acts: Tensor<B, 2> = rows_to_tensor(actions, self.act_dim, &self.device);
        let old_log_probs = vector_tensor::<B>(old_log_probs, &self.device);
        let rtgs = vector_tensor::<B>(rtgs, &self.device);
        let advantages = vector_tensor::<B>(advantages, &self.device);

        let mut total_actor_loss = 0.0;
        let mut total_critic_loss = 0.0;
        let mut actor_steps = 0;
        let mut critic_steps = 0;

        for epoch in 0..epochs {
            let (values, curr_log_probs) = self.evaluate(obs.clone(), acts.clone());

            // r = π_new / π_old
            let ratios = (curr_log_probs - old_log_probs.clone()).exp();
            let actor_loss = clipped_surrogate_loss(ratios, advantages.clone(), clip);
            let critic_loss = mse_loss(values, rtgs.clone());

            let actor_loss_value = actor_loss.clone().into_scalar().elem::<f32>();
            let critic_loss_value = critic_loss.clone().into_scalar().elem::<f32>();

            if actor_loss_value.is_finite() {
                let grads = GradientsParams::from_grads(actor_loss.backward(), &self.actor);
                self.actor = self.actor_optim.step(lr, self.actor.clone(), grads);
                total_actor_loss += actor_loss_value;
                actor_steps += 1;
            } else {
                warn_non_finite("actor", actor_loss_value, epoch);
            }

            if critic_loss_value.is_finite() {
                let grads = GradientsParams::from_grads(critic_loss.backward(), &self.critic);
                self.critic = self.critic_optim.step(lr, self.critic.clone(), grads);
                total_critic_loss += critic_loss_value;
                critic_steps += 1;
            } else {
                warn_non_finite("critic", critic_loss_value, epoch);
            }

            debug!(epoch, actor_loss = actor_loss_value, critic_loss = critic_loss_value, "ppo epoch");
        }

        self.training_step += 1;

        UpdateReport {
            actor_loss: mean_over_steps(total_actor_loss, actor_steps),
            critic_loss: mean_over_steps(total_critic_loss, critic_steps),
            degenerate_advantages: false,
            skipped_steps: 2 * epochs - actor_steps - critic_steps,
        }
    }

    /// Number of completed `learn`/`update` calls
    pub fn training_step(&self) -> usize {
        self.training_step
    }

    pub fn config(&self) -> &PPOConfig {
        &self.config
    }

    pub fn head(&self) -> GaussianHead {
        self.head
    }

    pub fn actor(&self) -> &FeedForwardNetwork<B> {
        &self.actor
    }

    pub fn critic(&self) -> &FeedForwardNetwork<B> {
        &self.critic
    }

    pub fn observation_dim(&self) -> usize {
        self.obs_dim
    }

    pub fn action_dim(&self) -> usize {
        self.act_dim
    }
}

/// Per-sample clipped surrogate loss
///
/// `-min(r · A, clip(r, 1 - ε, 1 + ε) · A)`
pub fn clipped_surrogate(ratio: f32, advantage: f32, clip: f32) -> f32 {
    let unclipped = ratio * advantage;
    let clipped = ratio.clamp(1.0 - clip, 1.0 + clip) * advantage;
    -unclipped.min(clipped)
}

/// Batch mean of [`clipped_surrogate`] on tensors
pub fn clipped_surrogate_loss<B: Backend>(ratios: Tensor<B, 1>, advantages: Tensor<B, 1>, clip: f32) -> Tensor<B, 1> {
    let surr1 = ratios.clone() * advantages.clone();
    let surr2 = ratios.clamp(1.0 - clip, 1.0 + clip) * advantages;
    surr1.min_pair(surr2).neg().mean()
}

/// Mean squared error between predictions and targets
pub fn mse_loss<B: Backend, const D: usize>(predictions: Tensor<B, D>, targets: Tensor<B, D>) -> Tensor<B, 1> {
    let diff = predictions - targets;
    (diff.clone() * diff).mean()
}

/// Mean loss over the gradient steps actually taken, 0 when none were
fn mean_over_steps(total: f32, steps: usize) -> f32 {
    if steps == 0 { 0.0 } else { total / steps as f32 }
}

fn vector_tensor<B: Backend>(values: &[f32], device: &B::Device) -> Tensor<B, 1> {
    Tensor::from_data(TensorData::new(values.to_vec(), [values.len()]), device)
}

fn warn_non_finite(network: &str, loss: f32, epoch: usize) {
    let err = TrainError::NumericInstability(format!("{network} loss is {loss}"));
    warn!(%err, epoch, "skipping {network} gradient step");
}
