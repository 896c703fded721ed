use log::warn;
use ndarray::{Array1, Array3, Array4};
use rand::Rng;
use std::collections::VecDeque;
use std::sync::Arc;

use crate::error::{DrqnError, Result};
use crate::network::stack_frames;

/// One observation `[channels, height, width]`, values in `[0, 1]`.
pub type Frame = Array3<f32>;

/// A single environment step. Consecutive transitions of an episode share
/// their frames: `next_state` of step `t` is `state` of step `t + 1`.
#[derive(Clone, Debug, PartialEq)]
pub struct Transition {
    pub state: Arc<Frame>,
    pub action: usize,
    pub reward: f32,
    pub next_state: Arc<Frame>,
    pub done: bool,
}

/// Bounded FIFO of complete episode traces.
///
/// Only traces of at least `trace_length` transitions are stored; when the
/// buffer is full the oldest trace is evicted.
#[derive(Clone)]
pub struct EpisodeRecorder {
    buffer: VecDeque<Vec<Transition>>,
    capacity: usize,
    trace_length: usize,
}

impl EpisodeRecorder {
    /// A recorder holding at most `capacity` traces (at least one).
    pub fn new(capacity: usize, trace_length: usize) -> Self {
        let capacity = capacity.max(1);
        EpisodeRecorder {
            buffer: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
            trace_length,
        }
    }

    /// Store an episode trace. Returns `false`, leaving the buffer untouched,
    /// when the trace is shorter than the trace length.
    pub fn add(&mut self, trace: Vec<Transition>) -> bool {
        if trace.len() < self.trace_length {
            let err = DrqnError::ShortEpisode { length: trace.len(), required: self.trace_length };
            warn!("Episode not recorded: {}", err);
            return false;
        }
        while self.buffer.len() >= self.capacity {
            self.buffer.pop_front();
        }
        self.buffer.push_back(trace);
        true
    }

    /// Sample `batch_size` windows of `trace_length` consecutive transitions.
    ///
    /// Each window comes from a trace drawn uniformly with replacement among
    /// the stored traces that are long enough, starting at a uniform offset.
    /// Windows are laid out one after another in the returned batch.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R, batch_size: usize, trace_length: usize) -> Result<SampledBatch> {
        if batch_size == 0 || trace_length == 0 {
            return Err(DrqnError::invalid_parameter(
                "batch_size/trace_length".to_string(),
                format!("must be positive, got {}/{}", batch_size, trace_length),
            ));
        }
        let eligible: Vec<&Vec<Transition>> = self.buffer.iter().filter(|t| t.len() >= trace_length).collect();
        if eligible.is_empty() {
            return Err(DrqnError::InsufficientData(format!(
                "no stored trace of at least {} transitions ({} traces stored)",
                trace_length,
                self.buffer.len()
            )));
        }

        let mut transitions = Vec::with_capacity(batch_size * trace_length);
        for _ in 0..batch_size {
            let trace = eligible[rng.gen_range(0..eligible.len())];
            let start = rng.gen_range(0..=trace.len() - trace_length);
            transitions.extend_from_slice(&trace[start..start + trace_length]);
        }
        Ok(SampledBatch { transitions, batch_size, trace_length })
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn trace_length(&self) -> usize {
        self.trace_length
    }

    /// Number of transitions over all stored traces.
    pub fn total_transitions(&self) -> usize {
        self.buffer.iter().map(Vec::len).sum()
    }

    /// Stored traces, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &[Transition]> {
        self.buffer.iter().map(Vec::as_slice)
    }
}

/// `batch_size` windows of `trace_length` transitions, window-major:
/// transition `b * trace_length + t` is step `t` of window `b`.
#[derive(Clone, Debug)]
pub struct SampledBatch {
    pub transitions: Vec<Transition>,
    pub batch_size: usize,
    pub trace_length: usize,
}

impl SampledBatch {
    pub fn len(&self) -> usize {
        self.transitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transitions.is_empty()
    }

    /// Fails when the number of transitions does not match the declared
    /// batch layout.
    pub fn validate(&self) -> Result<()> {
        let expected = self.batch_size * self.trace_length;
        if self.transitions.len() != expected || expected == 0 {
            return Err(DrqnError::dimension_mismatch(
                format!("{} x {} transitions", self.batch_size, self.trace_length),
                format!("{}", self.transitions.len()),
            ));
        }
        Ok(())
    }

    pub fn windows(&self) -> impl Iterator<Item = &[Transition]> {
        self.transitions.chunks(self.trace_length.max(1))
    }

    pub fn states(&self, shape: (usize, usize, usize)) -> Result<Array4<f32>> {
        stack_frames(self.transitions.iter().map(|t| t.state.as_ref()), shape)
    }

    pub fn next_states(&self, shape: (usize, usize, usize)) -> Result<Array4<f32>> {
        stack_frames(self.transitions.iter().map(|t| t.next_state.as_ref()), shape)
    }

    pub fn actions(&self) -> Vec<usize> {
        self.transitions.iter().map(|t| t.action).collect()
    }

    pub fn rewards(&self) -> Array1<f32> {
        self.transitions.iter().map(|t| t.reward).collect()
    }

    pub fn dones(&self) -> Vec<bool> {
        self.transitions.iter().map(|t| t.done).collect()
    }
}
