use ndarray::ArrayView1;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config::TrainingConfig;
use crate::error::{DrqnError, Result};
use super::traits::argmax;

/// Where a selected action came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionSource {
    /// Ground-truth action during warm-up
    Oracle,
    /// Uniformly random exploration
    Random,
    /// Argmax of the online network
    Greedy,
}

/// Epsilon-greedy action selection with an oracle warm-up.
///
/// While `total_steps < pre_train_steps` the oracle's action is taken.
/// Afterwards a random action is taken with probability epsilon, which drops
/// linearly by `(start_e - end_e) / annealing_steps` per step down to `end_e`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EpsilonGreedy {
    pub start_e: f32,
    pub end_e: f32,
    step_drop: f32,
    epsilon: f32,
    pre_train_steps: usize,
    total_steps: usize,
}

impl EpsilonGreedy {
    pub fn new(start_e: f32, end_e: f32, annealing_steps: usize, pre_train_steps: usize) -> Self {
        // Without annealing steps epsilon falls to end_e on the first step
        // after warm-up.
        let step_drop = if annealing_steps == 0 {
            start_e - end_e
        } else {
            (start_e - end_e) / annealing_steps as f32
        };
        EpsilonGreedy { start_e, end_e, step_drop, epsilon: start_e, pre_train_steps, total_steps: 0 }
    }

    pub fn from_config(config: &TrainingConfig) -> Self {
        Self::new(config.start_e, config.end_e, config.annealing_steps, config.pre_train_steps)
    }

    pub fn epsilon(&self) -> f32 {
        self.epsilon
    }

    pub fn total_steps(&self) -> usize {
        self.total_steps
    }

    pub fn in_warm_up(&self) -> bool {
        self.total_steps < self.pre_train_steps
    }

    /// Pick an action from the online Q-values of the current frame.
    pub fn select<R: Rng + ?Sized>(&self, rng: &mut R, q_values: ArrayView1<f32>, oracle: usize) -> Result<(usize, ActionSource)> {
        let num_actions = q_values.len();
        if num_actions == 0 {
            return Err(DrqnError::dimension_mismatch("at least one Q-value", "none"));
        }
        if self.in_warm_up() {
            if oracle >= num_actions {
                return Err(DrqnError::InvalidAction { action: oracle, max_actions: num_actions });
            }
            return Ok((oracle, ActionSource::Oracle));
        }
        if rng.gen::<f32>() < self.epsilon {
            Ok((rng.gen_range(0..num_actions), ActionSource::Random))
        } else {
            Ok((argmax(q_values), ActionSource::Greedy))
        }
    }

    /// Count one environment step. Returns `true` once warm-up is over; from
    /// then on epsilon is annealed.
    pub fn advance(&mut self) -> bool {
        self.total_steps += 1;
        if self.total_steps > self.pre_train_steps {
            if self.epsilon > self.end_e {
                self.epsilon = (self.epsilon - self.step_drop).max(self.end_e);
            }
            true
        } else {
            false
        }
    }
}
