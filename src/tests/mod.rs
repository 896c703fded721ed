// Test modules for all components
pub mod test_agent;
pub mod test_explorer;
pub mod test_layers;
pub mod test_replay_buffer;
pub mod test_trainer;

use ndarray::Array3;
use std::sync::Arc;

use crate::config::{ConvSpec, NetworkConfig, TrainingConfig};
use crate::env::{StepOutcome, TrainingEnvironment};
use crate::error::Result;
use crate::optimizer::OptimizerConfig;
use crate::replay_buffer::{Frame, Transition};

pub const FRAME: (usize, usize, usize) = (1, 6, 6);

/// A network small enough to train in unit tests: 3 actions, 6x6 frames.
pub fn tiny_network_config() -> NetworkConfig {
    NetworkConfig::default()
        .num_actions(3)
        .frame_shape(FRAME.0, FRAME.1, FRAME.2)
        .conv_layers(vec![ConvSpec { out_channels: 2, kernel_size: 3, stride: 1 }])
        .hidden_size(8)
        .learning_rate(1e-2)
        .optimizer(OptimizerConfig::Adam { beta1: 0.9, beta2: 0.999, epsilon: 1e-8 })
}

/// Short episodes of 6 steps, traces of 4, warm-up of one episode.
pub fn tiny_training_config() -> TrainingConfig {
    TrainingConfig::default()
        .batch_size(2)
        .trace_length(4)
        .max_episode_length(6)
        .num_episodes(4)
        .num_train_episodes(1)
        .pre_train_steps(6)
        .epsilon(1.0, 0.1, 20)
        .target_sync_interval(4)
        .keep_every(3)
        .checkpoint_interval(2)
        .seed(7)
}

pub fn frame(value: f32) -> Arc<Frame> {
    Arc::new(Array3::from_elem(FRAME, value))
}

/// A trace of `len` transitions; action `t` at step `t`, every reward `tag`.
pub fn tagged_trace(len: usize, tag: f32) -> Vec<Transition> {
    (0..len)
        .map(|t| Transition {
            state: frame(t as f32 / len as f32),
            action: t,
            reward: tag,
            next_state: frame((t + 1) as f32 / len as f32),
            done: t + 1 == len,
        })
        .collect()
}

/// Deterministic environment: the oracle action at step `t` is `t % actions`.
pub struct ScriptedEnv {
    pub num_actions: usize,
    pub episode_length: usize,
    pub step: usize,
    pub actions_taken: Vec<usize>,
    pub oracles: Vec<usize>,
}

impl ScriptedEnv {
    pub fn new(num_actions: usize, episode_length: usize) -> Self {
        ScriptedEnv { num_actions, episode_length, step: 0, actions_taken: Vec::new(), oracles: Vec::new() }
    }

    fn oracle(&self) -> usize {
        self.step % self.num_actions
    }

    fn current_frame(&self) -> Arc<Frame> {
        frame((self.step % 5) as f32 / 5.0)
    }
}

impl TrainingEnvironment for ScriptedEnv {
    fn num_actions(&self) -> usize {
        self.num_actions
    }

    fn reset(&mut self) -> Result<(Arc<Frame>, usize)> {
        self.step = 0;
        Ok((self.current_frame(), self.oracle()))
    }

    fn step(&mut self, action: usize) -> Result<StepOutcome> {
        let oracle = self.oracle();
        self.actions_taken.push(action);
        self.oracles.push(oracle);
        let reward = if action == oracle { 1.0 } else { -1.0 };
        self.step += 1;
        Ok(StepOutcome {
            next_frame: self.current_frame(),
            reward,
            done: self.step >= self.episode_length,
            oracle: self.oracle(),
        })
    }
}
