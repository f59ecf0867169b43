//! Rewards-to-go and normalized advantages
//!
//! ```text
//! G_t = r_t + γ · G_{t+1}        (G after the last step of an episode = 0)
//! A_t = G_t - V(s_t)
//! Â_t = (A_t - mean(A)) / (std(A) + ε)
//! ```
//!
//! Statistics are population statistics over the whole batch.

/// Added to the standard deviation before dividing
pub const ADVANTAGE_EPSILON: f32 = 1e-10;

/// Discounted rewards-to-go for every step of every episode
///
/// The output is flat and in the same order as the batch: episode by
/// episode, each in forward time order. The discount accumulator restarts
/// at zero for every episode, so returns never leak across episode
/// boundaries.
pub fn rewards_to_go(rewards_per_episode: &[Vec<f32>], gamma: f32) -> Vec<f32> {
    let total: usize = rewards_per_episode.iter().map(Vec::len).sum();
    let mut rtgs = vec![0.0; total];

    let mut offset = 0;
    for episode in rewards_per_episode {
        let mut discounted = 0.0;
        for (t, &reward) in episode.iter().enumerate().rev() {
            discounted = reward + gamma * discounted;
            rtgs[offset + t] = discounted;
        }
        offset += episode.len();
    }

    rtgs
}

/// Advantages normalized across the batch
#[derive(Debug, Clone)]
pub struct Advantages {
    /// Normalized advantage per step
    pub values: Vec<f32>,
    /// Population standard deviation before normalization
    pub raw_std: f32,
}

impl Advantages {
    /// Whether the raw advantages were (almost) constant
    pub fn is_degenerate(&self) -> bool {
        self.raw_std <= ADVANTAGE_EPSILON
    }
}

/// `rtgs - values`, normalized to zero mean and unit variance
///
/// `values` must be detached critic estimates aligned with `rtgs`.
pub fn compute_advantages(rtgs: &[f32], values: &[f32]) -> Advantages {
    debug_assert_eq!(rtgs.len(), values.len());

    let mut advantages: Vec<f32> = rtgs.iter().zip(values).map(|(g, v)| g - v).collect();
    let raw_std = normalize(&mut advantages);

    Advantages {
        values: advantages,
        raw_std,
    }
}

/// Normalize in place, returning the standard deviation used
pub fn normalize(values: &mut [f32]) -> f32 {
    if values.is_empty() {
        return 0.0;
    }

    let n = values.len() as f64;
    let mean = values.iter().map(|&v| v as f64).sum::<f64>() / n;
    let variance = values
        .iter()
        .map(|&v| (v as f64 - mean).powi(2))
        .sum::<f64>()
        / n;
    let std = variance.sqrt();
    let denom = std + ADVANTAGE_EPSILON as f64;

    for v in values.iter_mut() {
        *v = ((*v as f64 - mean) / denom) as f32;
    }

    std as f32
}
