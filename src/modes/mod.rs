pub mod dqn;
pub mod train;

pub use dqn::{DqnMode, DqnSummary};
pub use train::{TrainMode, TrainSummary};
