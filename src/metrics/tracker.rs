use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::path::Path;

/// Number of correctly classified images implied by an episode's total
/// reward, assuming every step earned +1 or −1 over `episode_length` steps.
///
/// Only meaningful for full-length episodes; used for reporting.
pub fn correct_from_reward(total_reward: f32, episode_length: usize) -> usize {
    let length = episode_length as f32;
    let correct = if total_reward > 0.0 {
        length - ((length - total_reward) / 2.0).trunc()
    } else {
        ((total_reward + length) / 2.0).trunc()
    };
    correct.max(0.0) as usize
}

/// Stores training metrics over time
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TrainingMetrics {
    /// Steps per episode
    pub episode_lengths: Vec<usize>,

    /// Total reward per episode
    pub episode_rewards: Vec<f32>,

    /// Correct count of each episode after the training window
    pub correct_counts: Vec<usize>,

    /// Epsilon at the end of each episode
    pub epsilons: Vec<f32>,

    /// Most recent training losses
    pub losses: VecDeque<f32>,

    /// Training steps performed
    pub train_steps: usize,

    /// Target network synchronisations performed
    pub target_syncs: usize,
}

/// Tracks metrics during training
pub struct MetricsTracker {
    metrics: TrainingMetrics,
    loss_history: usize,

    current_episode_reward: f32,
    current_episode_length: usize,
    total_steps: usize,
}

impl MetricsTracker {
    /// `loss_history` bounds how many recent losses are kept.
    pub fn new(loss_history: usize) -> Self {
        MetricsTracker {
            metrics: TrainingMetrics::default(),
            loss_history: loss_history.max(1),
            current_episode_reward: 0.0,
            current_episode_length: 0,
            total_steps: 0,
        }
    }

    /// Record a training loss
    pub fn record_loss(&mut self, loss: f32) {
        if self.metrics.losses.len() >= self.loss_history {
            self.metrics.losses.pop_front();
        }
        self.metrics.losses.push_back(loss);
        self.metrics.train_steps += 1;
    }

    pub fn record_target_sync(&mut self) {
        self.metrics.target_syncs += 1;
    }

    /// Start a new episode
    pub fn start_episode(&mut self) {
        self.current_episode_reward = 0.0;
        self.current_episode_length = 0;
    }

    /// Record a step within an episode
    pub fn step(&mut self, reward: f32) {
        self.current_episode_reward += reward;
        self.current_episode_length += 1;
        self.total_steps += 1;
    }

    /// Close the current episode and return its total reward.
    ///
    /// `correct` is appended to the correct counts when given.
    pub fn end_episode(&mut self, epsilon: f32, correct: Option<usize>) -> f32 {
        self.metrics.episode_rewards.push(self.current_episode_reward);
        self.metrics.episode_lengths.push(self.current_episode_length);
        self.metrics.epsilons.push(epsilon);
        if let Some(correct) = correct {
            self.metrics.correct_counts.push(correct);
        }
        self.current_episode_reward
    }

    pub fn current_episode_reward(&self) -> f32 {
        self.current_episode_reward
    }

    pub fn current_episode_length(&self) -> usize {
        self.current_episode_length
    }

    /// Get a reference to the metrics
    pub fn metrics(&self) -> &TrainingMetrics {
        &self.metrics
    }

    pub fn into_metrics(self) -> TrainingMetrics {
        self.metrics
    }

    pub fn episode_count(&self) -> usize {
        self.metrics.episode_rewards.len()
    }

    pub fn total_steps(&self) -> usize {
        self.total_steps
    }

    /// Get recent average loss
    pub fn avg_loss(&self, window: usize) -> Option<f32> {
        if self.metrics.losses.is_empty() || window == 0 {
            return None;
        }

        let n = window.min(self.metrics.losses.len());
        let sum: f32 = self.metrics.losses.iter().rev().take(n).sum();
        Some(sum / n as f32)
    }

    /// Get recent average episode reward
    pub fn avg_episode_reward(&self, window: usize) -> Option<f32> {
        if self.metrics.episode_rewards.is_empty() || window == 0 {
            return None;
        }

        let n = window.min(self.metrics.episode_rewards.len());
        let sum: f32 = self.metrics.episode_rewards.iter().rev().take(n).sum();
        Some(sum / n as f32)
    }
}

impl Default for MetricsTracker {
    fn default() -> Self {
        Self::new(1000)
    }
}

impl TrainingMetrics {
    /// Save metrics to a JSON file
    pub fn save(&self, path: impl AsRef<Path>) -> crate::error::Result<()> {
        let serialized = serde_json::to_string_pretty(self)?;
        std::fs::write(path, serialized)?;
        Ok(())
    }

    /// Load metrics from a JSON file
    pub fn load(path: impl AsRef<Path>) -> crate::error::Result<Self> {
        let data = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&data)?)
    }
}
