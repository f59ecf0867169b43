pub mod plotter;
pub mod training_stats;

pub use plotter::{ScorePlot, ScoreSink};
pub use training_stats::TrainingStats;
