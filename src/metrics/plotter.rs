//! Per-game score reporting
//!
//! Training loops hand every finished game's score to a [`ScoreSink`] and
//! never read anything back.

use tracing::info;

/// Receives the score of each completed game
pub trait ScoreSink {
    fn record(&mut self, score: f32);
}

impl<S: ScoreSink + ?Sized> ScoreSink for &mut S {
    fn record(&mut self, score: f32) {
        (**self).record(score);
    }
}

/// Keeps the score history with its running mean and logs each entry
#[derive(Debug, Clone, Default)]
pub struct ScorePlot {
    scores: Vec<f32>,
    mean_scores: Vec<f32>,
    total: f64,
}

impl ScorePlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scores(&self) -> &[f32] {
        &self.scores
    }

    /// Mean of all scores up to and including each game
    pub fn mean_scores(&self) -> &[f32] {
        &self.mean_scores
    }
}

impl ScoreSink for ScorePlot {
    fn record(&mut self, score: f32) {
        self.total += score as f64;
        self.scores.push(score);
        let mean = (self.total / self.scores.len() as f64) as f32;
        self.mean_scores.push(mean);

        info!(game = self.scores.len(), score, mean_score = mean, "game finished");
    }
}
