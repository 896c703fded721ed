//! Environments the agent interacts with.
//!
//! Training uses a [`TrainingEnvironment`], which also reveals the correct
//! (oracle) action for the current frame. Inference walks a fixed list of
//! items through an [`InferenceEnvironment`].

pub mod dataset;
pub mod game;

use std::sync::Arc;

use crate::error::Result;
use crate::replay_buffer::Frame;

pub use dataset::{LeafDataset, LeafImage};
pub use game::{LeafGame, LeafTestSet};

/// Result of one training step.
#[derive(Clone, Debug)]
pub struct StepOutcome {
    pub next_frame: Arc<Frame>,
    pub reward: f32,
    pub done: bool,
    /// Correct action for `next_frame`
    pub oracle: usize,
}

pub trait TrainingEnvironment {
    fn num_actions(&self) -> usize;

    /// Start an episode: first frame and its oracle action.
    fn reset(&mut self) -> Result<(Arc<Frame>, usize)>;

    fn step(&mut self, action: usize) -> Result<StepOutcome>;
}

/// First observation of an inference run.
#[derive(Clone, Debug)]
pub struct InferenceStart {
    pub frame: Arc<Frame>,
    /// Number of items to process
    pub num_steps: usize,
    pub item_id: String,
    /// Names of the actions, in action order
    pub labels: Vec<String>,
}

pub trait InferenceEnvironment {
    fn reset(&mut self) -> Result<InferenceStart>;

    /// Move to the next item; returns its frame and id.
    fn step(&mut self, action: usize) -> Result<(Arc<Frame>, String)>;
}
