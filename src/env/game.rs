use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;

use super::dataset::{LeafDataset, LeafImage};
use super::{InferenceEnvironment, InferenceStart, StepOutcome, TrainingEnvironment};
use crate::error::{DrqnError, Result};
use crate::replay_buffer::Frame;

/// Classification game over the training images.
///
/// An episode shows `episode_length` randomly drawn images, one per step.
/// Naming the species of the shown image earns +1, anything else −1. The
/// episode is done after the answer for the last image.
pub struct LeafGame {
    dataset: LeafDataset,
    episode_length: usize,
    rng: SmallRng,
    episode: Vec<LeafImage>,
    position: usize,
}

impl LeafGame {
    pub fn new(dataset: LeafDataset, episode_length: usize, seed: Option<u64>) -> Result<Self> {
        if dataset.train().is_empty() {
            return Err(DrqnError::InsufficientData("no training images".to_string()));
        }
        if episode_length == 0 {
            return Err(DrqnError::invalid_parameter("episode_length", "must be positive"));
        }
        let rng = match seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => SmallRng::from_entropy(),
        };
        Ok(LeafGame { dataset, episode_length, rng, episode: Vec::new(), position: 0 })
    }

    pub fn dataset(&self) -> &LeafDataset {
        &self.dataset
    }

    /// Image currently shown, if an episode is running.
    pub fn current(&self) -> Option<&LeafImage> {
        self.episode.get(self.position)
    }

    fn current_frame(&mut self) -> Result<(Arc<Frame>, usize)> {
        let image = self
            .episode
            .get(self.position)
            .cloned()
            .ok_or_else(|| DrqnError::InsufficientData("episode is over, call reset()".to_string()))?;
        Ok((self.dataset.frame(&image.id)?, image.label))
    }
}

impl TrainingEnvironment for LeafGame {
    fn num_actions(&self) -> usize {
        self.dataset.num_labels()
    }

    fn reset(&mut self) -> Result<(Arc<Frame>, usize)> {
        let train = self.dataset.train();
        let episode = (0..self.episode_length)
            .map(|_| train[self.rng.gen_range(0..train.len())].clone())
            .collect();
        self.episode = episode;
        self.position = 0;
        self.current_frame()
    }

    fn step(&mut self, action: usize) -> Result<StepOutcome> {
        let (frame, label) = self.current_frame()?;
        let num_actions = self.num_actions();
        if action >= num_actions {
            return Err(DrqnError::InvalidAction { action, max_actions: num_actions });
        }
        let reward = if action == label { 1.0 } else { -1.0 };

        if self.position + 1 >= self.episode.len() {
            // The last frame stays on screen once the episode is over.
            self.position = self.episode.len();
            return Ok(StepOutcome { next_frame: frame, reward, done: true, oracle: label });
        }
        self.position += 1;
        let (next_frame, oracle) = self.current_frame()?;
        Ok(StepOutcome { next_frame, reward, done: false, oracle })
    }
}

/// The test images, walked once in file order.
pub struct LeafTestSet {
    dataset: LeafDataset,
    position: usize,
}

impl LeafTestSet {
    pub fn new(dataset: LeafDataset) -> Self {
        LeafTestSet { dataset, position: 0 }
    }

    fn item(&mut self, position: usize) -> Result<(Arc<Frame>, String)> {
        let id = self
            .dataset
            .test_ids()
            .get(position)
            .cloned()
            .ok_or_else(|| DrqnError::InsufficientData(format!("no test image at position {}", position)))?;
        Ok((self.dataset.frame(&id)?, id))
    }
}

impl InferenceEnvironment for LeafTestSet {
    fn reset(&mut self) -> Result<InferenceStart> {
        self.position = 0;
        let (frame, item_id) = self.item(0)?;
        Ok(InferenceStart {
            frame,
            num_steps: self.dataset.test_ids().len(),
            item_id,
            labels: self.dataset.labels().to_vec(),
        })
    }

    fn step(&mut self, _action: usize) -> Result<(Arc<Frame>, String)> {
        self.position += 1;
        self.item(self.position)
    }
}
