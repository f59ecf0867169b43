//! Training statistics tracking
//!
//! Rolling-window summaries of episode scores and lengths and of the actor
//! and critic losses reported by each PPO iteration.

use std::collections::VecDeque;

/// Training statistics tracker with rolling averages
///
/// # Example
///
/// ```rust
/// use maze_rl::metrics::TrainingStats;
///
/// let mut stats = TrainingStats::new(100);
///
/// stats.record_episode(12.0, 150);
/// stats.record_update(0.02, 0.05);
///
/// assert_eq!(stats.total_episodes(), 1);
/// println!("{}", stats.format_summary());
/// ```
#[derive(Debug, Clone)]
pub struct TrainingStats {
    /// Episode scores (rolling window)
    episode_scores: VecDeque<f32>,

    /// Episode lengths in steps (rolling window)
    episode_lengths: VecDeque<usize>,

    /// Actor (clipped surrogate) losses (rolling window)
    actor_losses: VecDeque<f32>,

    /// Critic (MSE) losses (rolling window)
    critic_losses: VecDeque<f32>,

    total_episodes: usize,
    total_steps: usize,
    total_updates: usize,

    /// Degenerate advantage batches and non-finite losses seen so far
    numeric_warnings: usize,

    window_size: usize,
}

impl TrainingStats {
    /// Create a tracker that averages over the last `window_size` entries
    pub fn new(window_size: usize) -> Self {
        Self {
            episode_scores: VecDeque::with_capacity(window_size),
            episode_lengths: VecDeque::with_capacity(window_size),
            actor_losses: VecDeque::with_capacity(window_size),
            critic_losses: VecDeque::with_capacity(window_size),
            total_episodes: 0,
            total_steps: 0,
            total_updates: 0,
            numeric_warnings: 0,
            window_size,
        }
    }

    /// Record the completion of an episode
    pub fn record_episode(&mut self, score: f32, length: usize) {
        Self::push_deque(&mut self.episode_scores, score, self.window_size);
        Self::push_deque(&mut self.episode_lengths, length, self.window_size);
        self.total_episodes += 1;
        self.total_steps += length;
    }

    /// Record the mean losses of one optimizer call
    pub fn record_update(&mut self, actor_loss: f32, critic_loss: f32) {
        Self::push_deque(&mut self.actor_losses, actor_loss, self.window_size);
        Self::push_deque(&mut self.critic_losses, critic_loss, self.window_size);
        self.total_updates += 1;
    }

    pub fn record_numeric_warning(&mut self) {
        self.numeric_warnings += 1;
    }

    pub fn mean_episode_score(&self) -> f32 {
        Self::mean(&self.episode_scores)
    }

    pub fn mean_episode_length(&self) -> f32 {
        if self.episode_lengths.is_empty() {
            0.0
        } else {
            let sum: usize = self.episode_lengths.iter().sum();
            sum as f32 / self.episode_lengths.len() as f32
        }
    }

    pub fn mean_actor_loss(&self) -> f32 {
        Self::mean(&self.actor_losses)
    }

    pub fn mean_critic_loss(&self) -> f32 {
        Self::mean(&self.critic_losses)
    }

    pub fn total_episodes(&self) -> usize {
        self.total_episodes
    }

    pub fn total_steps(&self) -> usize {
        self.total_steps
    }

    pub fn total_updates(&self) -> usize {
        self.total_updates
    }

    pub fn numeric_warnings(&self) -> usize {
        self.numeric_warnings
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    /// One-line summary of the current statistics
    pub fn format_summary(&self) -> String {
        format!(
            "Episodes: {} | Steps: {} | Updates: {} | Score: {:.2} | Len: {:.1} | Actor: {:.4} | Critic: {:.4} | Warnings: {}",
            self.total_episodes,
            self.total_steps,
            self.total_updates,
            self.mean_episode_score(),
            self.mean_episode_length(),
            self.mean_actor_loss(),
            self.mean_critic_loss(),
            self.numeric_warnings,
        )
    }

    fn mean(deque: &VecDeque<f32>) -> f32 {
        if deque.is_empty() {
            0.0
        } else {
            deque.iter().sum::<f32>() / deque.len() as f32
        }
    }

    fn push_deque<T>(deque: &mut VecDeque<T>, value: T, window_size: usize) {
        if deque.len() >= window_size {
            deque.pop_front();
        }
        deque.push_back(value);
    }
}
