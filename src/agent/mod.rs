//! # Recurrent Double-DQN Agent
//!
//! The agent couples two instances of a [`RecurrentQNetwork`]: the online
//! network acts and learns, the target network trails it and values next
//! states during training.
//!
//! ## Core Concepts
//!
//! - **Trace**: a window of consecutive transitions of one episode; the
//!   network is unrolled over it from a zero recurrent state
//! - **Double DQN**: the online network selects the next action, the target
//!   network evaluates it
//! - **Warm-up**: the first steps follow the ground-truth (oracle) action
//! - **Epsilon-greedy**: afterwards, random actions with linearly annealed
//!   probability
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use leaf_drqn::agent::{DrqnAgent, EpsilonGreedy};
//! use leaf_drqn::config::DrqnConfig;
//! use leaf_drqn::network::DrqnNetwork;
//! use ndarray::Array3;
//!
//! let config = DrqnConfig::default();
//! let network = DrqnNetwork::new(&config.network).unwrap();
//! let mut agent = DrqnAgent::new(network, &config.training);
//! let explorer = EpsilonGreedy::from_config(&config.training);
//!
//! let frame = Array3::zeros(config.network.frame_shape_tuple());
//! let state = agent.initial_state();
//! let (q_values, _next_state) = agent.observe(&frame, &state).unwrap();
//! let (action, source) = explorer.select(&mut rand::thread_rng(), q_values.view(), 0).unwrap();
//! ```

pub mod explorer;
pub mod traits;

mod dqn;
pub use dqn::{double_q_targets, DrqnAgent};
pub use explorer::{ActionSource, EpsilonGreedy};
pub use traits::{argmax, Prediction, RecurrentQNetwork};
