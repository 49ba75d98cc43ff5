//! Episode collection and the outer training loop.

pub mod metrics;
pub mod rollout;
pub mod trainer;

pub use metrics::TrainingMetrics;
pub use rollout::rollout;
pub use trainer::Trainer;
