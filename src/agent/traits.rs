use ndarray::{Array2, ArrayView1, ArrayView4};

use crate::error::Result;
use crate::layers::RecurrentState;

/// Greedy actions of a prediction together with the raw values.
#[derive(Clone, Debug)]
pub struct Prediction {
    pub actions: Vec<usize>,
    pub q_values: Array2<f32>,
    pub state: RecurrentState,
}

/// Recurrent action-value function used by the agent.
///
/// Frames come in as `[batch * trace_length, channels, height, width]`,
/// window-major: row `b * trace_length + t` is step `t` of trace `b`. The
/// recurrent state has one row per trace and is threaded explicitly, never
/// stored inside the network.
pub trait RecurrentQNetwork: Clone {
    fn num_actions(&self) -> usize;

    /// Zero hidden and cell state for `batch_size` traces.
    fn initial_state(&self, batch_size: usize) -> RecurrentState;

    /// Q-values `[batch * trace_length, num_actions]` and the state after
    /// the last step of every trace.
    fn evaluate(
        &mut self,
        frames: ArrayView4<f32>,
        trace_length: usize,
        state: &RecurrentState,
    ) -> Result<(Array2<f32>, RecurrentState)>;

    /// Greedy action per row, alongside the raw Q-values.
    fn predict(&mut self, frames: ArrayView4<f32>, trace_length: usize, state: &RecurrentState) -> Result<Prediction> {
        let (q_values, state) = self.evaluate(frames, trace_length, state)?;
        let actions = q_values.outer_iter().map(argmax).collect();
        Ok(Prediction { actions, q_values, state })
    }

    /// One gradient step towards `targets` for the taken `actions`; returns
    /// the loss before the step.
    fn update(
        &mut self,
        frames: ArrayView4<f32>,
        actions: &[usize],
        targets: ArrayView1<f32>,
        trace_length: usize,
        state: &RecurrentState,
    ) -> Result<f32>;

    /// Overwrite every parameter with the one of `other`.
    fn copy_parameters_from(&mut self, other: &Self);

    /// `θ ← τ θ_other + (1 − τ) θ`
    fn soft_update_from(&mut self, other: &Self, tau: f32);
}

/// Index of the largest value; the first one wins ties.
pub fn argmax(values: ArrayView1<f32>) -> usize {
    values
        .iter()
        .enumerate()
        .fold((0, f32::NEG_INFINITY), |(best, best_value), (i, &v)| {
            if v > best_value {
                (i, v)
            } else {
                (best, best_value)
            }
        })
        .0
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn argmax_picks_first_maximum() {
        assert_eq!(argmax(array![0.1, 0.7, 0.7, -1.0].view()), 1);
        assert_eq!(argmax(array![-3.0].view()), 0);
    }
}
