//! Two-stage policy: continuous Gaussian head, then discretization
//!
//! The actor network produces a mean vector. [`GaussianHead`] samples an
//! action vector around it with a fixed diagonal covariance, and a
//! [`Discretizer`] turns that vector into one of the four cardinal moves the
//! game accepts. PPO trains on the continuous vector; the game only ever sees
//! the direction.

use crate::env::Direction;
use burn::tensor::{Tensor, backend::Backend};
use rand::Rng;
use rand_distr::StandardNormal;

/// Multivariate normal with mean from the actor and fixed `variance · I`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GaussianHead {
    variance: f32,
}

impl GaussianHead {
    pub fn new(variance: f32) -> Self {
        Self { variance }
    }

    pub fn variance(&self) -> f32 {
        self.variance
    }

    /// Draw an action around `mean`, returning it with its log probability
    pub fn sample<R: Rng + ?Sized>(&self, mean: &[f32], rng: &mut R) -> (Vec<f32>, f32) {
        let std = self.variance.sqrt();
        let action: Vec<f32> = mean
            .iter()
            .map(|&mu| {
                let z: f32 = rng.sample(StandardNormal);
                mu + std * z
            })
            .collect();
        let log_prob = self.log_prob(mean, &action);
        (action, log_prob)
    }

    /// Log density of `action` under N(mean, variance · I)
    pub fn log_prob(&self, mean: &[f32], action: &[f32]) -> f32 {
        let squared: f32 = mean
            .iter()
            .zip(action)
            .map(|(mu, a)| (a - mu) * (a - mu))
            .sum();
        -0.5 * squared / self.variance - self.log_normalizer(mean.len())
    }

    /// Batched log density, `[batch, k]` means and actions → `[batch]`
    ///
    /// Gradients flow through `mean`.
    pub fn log_prob_batch<B: Backend>(&self, mean: Tensor<B, 2>, actions: Tensor<B, 2>) -> Tensor<B, 1> {
        let [_, k] = mean.dims();
        let squared = (actions - mean).powf_scalar(2.0).sum_dim(1).squeeze::<1>(1);
        squared
            .mul_scalar(-0.5 / self.variance)
            .sub_scalar(self.log_normalizer(k))
    }

    fn log_normalizer(&self, k: usize) -> f32 {
        0.5 * k as f32 * ((2.0 * std::f32::consts::PI).ln() + self.variance.ln())
    }
}

/// Deterministic mapping from a continuous action vector to a move
pub trait Discretizer {
    fn discretize(&self, action: &[f32]) -> Direction;
}

/// Picks the direction whose action component is largest
///
/// Ties resolve to the lowest index; an index outside the four directions
/// falls back to `Up`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ArgMaxDiscretizer;

impl Discretizer for ArgMaxDiscretizer {
    fn discretize(&self, action: &[f32]) -> Direction {
        Direction::from_index(argmax(action)).unwrap_or(Direction::Up)
    }
}

/// Index of the largest value, first one on ties, 0 for an empty slice
pub fn argmax(values: &[f32]) -> usize {
    values
        .iter()
        .enumerate()
        .fold((0, f32::NEG_INFINITY), |(best, best_val), (i, &v)| {
            if v > best_val { (i, v) } else { (best, best_val) }
        })
        .0
}
