//! # leaf-drqn - Recurrent Double-DQN Leaf Classifier
//!
//! An agent looks at leaf images one frame at a time and names the species of
//! each. Its action values come from a recurrent Q-network, so the agent is
//! trained on contiguous traces of whole episodes rather than on isolated
//! transitions.
//!
//! ## Key Features
//!
//! - **Recurrent Q-network**: convolutions, an LSTM and dueling heads on `ndarray`
//! - **Double DQN**: an online network selects, a trailing target network evaluates
//! - **Episode recorder**: bounded FIFO of episode traces, sampled as fixed-length windows
//! - **Oracle warm-up**: ground-truth actions before epsilon-greedy exploration
//! - **Checkpoints**: bincode snapshots of the online network
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use leaf_drqn::config::DrqnConfig;
//! use leaf_drqn::env::{LeafDataset, LeafGame};
//! use leaf_drqn::network::DrqnNetwork;
//! use leaf_drqn::trainer::Trainer;
//!
//! let config = DrqnConfig::default();
//! let dataset = LeafDataset::open("data", 64, 64).unwrap();
//! let game = LeafGame::new(dataset, config.data.episode_length, None).unwrap();
//! let network = DrqnNetwork::new(&config.network).unwrap();
//!
//! let mut trainer = Trainer::new(&config.training, game, network, None).unwrap();
//! let metrics = trainer.train().unwrap();
//! ```
//!
//! ## Module Organization
//!
//! - [`activations`] - Activation functions of the frame encoder
//! - [`agent`] - Double-DQN agent, epsilon-greedy selector and the network trait
//! - [`checkpoint`] - Checkpoint directory with rotation
//! - [`config`] - Hyperparameters, loadable from YAML
//! - [`env`] - Leaf dataset, training game and test set
//! - [`error`] - Error types and result handling
//! - [`inference`] - Test-mode run and results CSV
//! - [`layers`] - Convolution, dense and LSTM layers
//! - [`metrics`] - Training metrics and ASCII plots
//! - [`network`] - The recurrent dueling Q-network
//! - [`optimizer`] - SGD, Adam, RMSProp and gradient clipping
//! - [`replay_buffer`] - Transitions and the episode recorder
//! - [`trainer`] - The episode loop

pub mod activations;
pub mod agent;
pub mod checkpoint;
pub mod config;
pub mod env;
pub mod error;
pub mod inference;
pub mod layers;
pub mod metrics;
pub mod network;
pub mod optimizer;
pub mod replay_buffer;
pub mod trainer;

#[cfg(test)]
mod tests;
