//! Coffee world: carry a cup of coffee across a slippery grid without spilling it.
//!
//! The world ([`environment`]) is solved two ways: by planning with value
//! iteration over the full transition model ([`value_iteration`]), and by
//! tabular Q-learning from sampled transitions only ([`rl`]). Both act through
//! the same [`Agent`] trait.

pub mod agent;
pub mod config;
pub mod environment;
pub mod error;
pub mod experiment;
pub mod policy;
pub mod rl;
pub mod value_iteration;

pub use agent::{run_episode, run_episodes, Agent, Episode};
pub use config::{AgentKind, ExperimentConfig};
pub use environment::{
    Action, CoffeeEnv, Environment, Model, OpenCoffeeEnv, Pos, State, Transition, DRINK_REWARD,
};
pub use error::{Error, Result};
pub use policy::{EpsilonGreedy, RandomPolicy};
pub use rl::{QLearning, QLearningAgent, QValues, SharedQValues, LEARNING_RATE_DECAY};
pub use value_iteration::{ValueIteration, CONVERGENCE_THRESHOLD};
