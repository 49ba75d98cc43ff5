//! The COMA algorithm: a shared centralized critic scores every possible
//! action of each agent against the joint action of the others, and each
//! decentralized actor is trained with a counterfactual-baseline
//! advantage derived from those Q-values.

pub mod batch;
pub mod learner;
pub mod networks;
pub mod returns;

pub use batch::EpisodeBatch;
pub use learner::{ComaLearner, LearnMetrics};
pub use networks::{ActorNetwork, ActorNetworkConfig, CriticNetwork, CriticNetworkConfig};
pub use returns::td_lambda_targets;
