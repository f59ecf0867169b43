//! Feed-forward function approximator
//!
//! The same architecture backs the PPO actor (outputs a Gaussian mean per
//! action component), the PPO critic (outputs one value) and the DQN
//! Q-network (outputs one value per direction).
//!
//! # Architecture
//!
//! ```text
//! Input: [batch, input_dim]
//!   ↓ Linear(input_dim → hidden_dim) + ReLU
//!   ↓ (hidden_count - 1) × Linear(hidden_dim → hidden_dim) + ReLU
//!   ↓ Linear(hidden_dim → output_dim)
//! Output: [batch, output_dim]
//! ```
//!
//! # Example
//!
//! ```rust
//! use maze_rl::rl::FeedForwardConfig;
//! use burn::backend::ndarray::{NdArray, NdArrayDevice};
//! use burn::tensor::Tensor;
//!
//! type Backend = NdArray<f32>;
//!
//! let device = NdArrayDevice::default();
//! let network = FeedForwardConfig::new(15, 32, 2, 4).init::<Backend>(&device);
//!
//! let observation = Tensor::zeros([8, 15], &device);
//! let output = network.forward(observation);
//! assert_eq!(output.dims(), [8, 4]);
//! ```

use burn::{
    module::Module,
    nn::{Linear, LinearConfig},
    tensor::{Tensor, TensorData, activation::relu, backend::Backend},
};
use serde::{Deserialize, Serialize};

/// Call contract of a function approximator for a single observation
///
/// Rollout collection and ε-greedy action selection only need this much;
/// batched training passes go through the tensor API instead.
pub trait Approximator {
    /// Map one observation vector to the approximator's output vector
    fn predict(&self, observation: &[f32]) -> Vec<f32>;
}

/// Configuration for a [`FeedForwardNetwork`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedForwardConfig {
    /// Length of the observation vector
    pub input_dim: usize,

    /// Width of each hidden layer
    pub hidden_dim: usize,

    /// Number of hidden layers (at least 1)
    pub hidden_count: usize,

    /// Length of the output vector
    pub output_dim: usize,
}

impl FeedForwardConfig {
    pub fn new(input_dim: usize, hidden_dim: usize, hidden_count: usize, output_dim: usize) -> Self {
        Self {
            input_dim,
            hidden_dim,
            hidden_count,
            output_dim,
        }
    }

    /// Initialize the network on `device`
    pub fn init<B: Backend>(&self, device: &B::Device) -> FeedForwardNetwork<B> {
        let hidden_count = self.hidden_count.max(1);

        let mut hidden = Vec::with_capacity(hidden_count);
        hidden.push(LinearConfig::new(self.input_dim, self.hidden_dim).init(device));
        for _ in 1..hidden_count {
            hidden.push(LinearConfig::new(self.hidden_dim, self.hidden_dim).init(device));
        }

        FeedForwardNetwork {
            hidden,
            output: LinearConfig::new(self.hidden_dim, self.output_dim).init(device),
        }
    }
}

/// Multi-layer perceptron with ReLU hidden activations
#[derive(Module, Debug)]
pub struct FeedForwardNetwork<B: Backend> {
    hidden: Vec<Linear<B>>,
    output: Linear<B>,
}

impl<B: Backend> FeedForwardNetwork<B> {
    /// Forward pass over a batch `[batch, input_dim]` → `[batch, output_dim]`
    pub fn forward(&self, input: Tensor<B, 2>) -> Tensor<B, 2> {
        let x = self
            .hidden
            .iter()
            .fold(input, |x, layer| relu(layer.forward(x)));
        self.output.forward(x)
    }

    /// Device the parameters live on
    pub fn device(&self) -> B::Device {
        self.output.weight.val().device()
    }
}

impl<B: Backend> Approximator for FeedForwardNetwork<B> {
    fn predict(&self, observation: &[f32]) -> Vec<f32> {
        let device = self.device();
        let input = Tensor::<B, 2>::from_data(
            TensorData::new(observation.to_vec(), [1, observation.len()]),
            &device,
        );
        self.forward(input).into_data().iter::<f32>().collect()
    }
}

/// Stack observation rows into one `[rows, dim]` tensor
pub fn rows_to_tensor<B: Backend>(rows: &[Vec<f32>], dim: usize, device: &B::Device) -> Tensor<B, 2> {
    let flat: Vec<f32> = rows.iter().flat_map(|row| row.iter().copied()).collect();
    Tensor::from_data(TensorData::new(flat, [rows.len(), dim]), device)
}
