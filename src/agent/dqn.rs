use log::debug;
use ndarray::{Array1, ArrayView1, ArrayView2};

use crate::config::{TargetUpdate, TrainingConfig};
use crate::error::{DrqnError, Result};
use crate::layers::RecurrentState;
use crate::network::single_frame;
use crate::replay_buffer::{Frame, SampledBatch};
use super::traits::{argmax, RecurrentQNetwork};

/// Recurrent Double-DQN agent: an online network that learns and a target
/// network that trails it.
///
/// Training follows the Double-DQN rule on sampled traces: the online network
/// picks the best next action, the target network values it,
///
/// ```text
/// target = r + discount * Q_target(s', argmax_a Q_online(s', a))   (non-terminal)
/// target = r                                                       (terminal)
/// ```
///
/// Both networks start every training batch from a zero recurrent state.
pub struct DrqnAgent<Q: RecurrentQNetwork> {
    /// Network used for acting and learning
    pub online: Q,

    /// Trailing copy used to evaluate next states
    pub target: Q,

    pub discount: f32,

    pub target_update: TargetUpdate,

    /// Number of gradient steps performed
    pub train_steps: usize,

    /// Number of target synchronisations performed
    pub target_syncs: usize,
}

impl<Q: RecurrentQNetwork> DrqnAgent<Q> {
    /// Create an agent whose target network starts as an exact copy of `online`.
    pub fn new(online: Q, config: &TrainingConfig) -> Self {
        let target = online.clone();
        DrqnAgent {
            online,
            target,
            discount: config.discount,
            target_update: config.target_update,
            train_steps: 0,
            target_syncs: 0,
        }
    }

    /// Zero recurrent state for a single episode.
    pub fn initial_state(&self) -> RecurrentState {
        self.online.initial_state(1)
    }

    /// Run the online network one step on `frame`, returning the Q-values
    /// and the advanced recurrent state.
    pub fn observe(&mut self, frame: &Frame, state: &RecurrentState) -> Result<(Array1<f32>, RecurrentState)> {
        let frames = single_frame(frame);
        let (q_values, next_state) = self.online.evaluate(frames.view(), 1, state)?;
        let q_values = q_values.row(0).to_owned();
        Ok((q_values, next_state))
    }

    /// One Double-DQN update on a sampled batch; returns the loss.
    pub fn train_on_batch(&mut self, batch: &SampledBatch) -> Result<f32> {
        batch.validate()?;
        let shape = batch.transitions[0].state.dim();
        let (batch_size, trace_length) = (batch.batch_size, batch.trace_length);

        let states = batch.states(shape)?;
        let next_states = batch.next_states(shape)?;
        let actions = batch.actions();
        let num_actions = self.online.num_actions();
        if let Some(&action) = actions.iter().find(|&&a| a >= num_actions) {
            return Err(DrqnError::InvalidAction { action, max_actions: num_actions });
        }

        let online_state = self.online.initial_state(batch_size);
        let target_state = self.target.initial_state(batch_size);
        let (online_next, _) = self.online.evaluate(next_states.view(), trace_length, &online_state)?;
        let (target_next, _) = self.target.evaluate(next_states.view(), trace_length, &target_state)?;

        let targets = double_q_targets(
            batch.rewards().view(),
            &batch.dones(),
            online_next.view(),
            target_next.view(),
            self.discount,
        )?;

        let loss = self
            .online
            .update(states.view(), &actions, targets.view(), trace_length, &online_state)?;
        self.train_steps += 1;
        debug!("Training step {}: loss {:.6}", self.train_steps, loss);
        Ok(loss)
    }

    /// Bring the target network up to date with the online network.
    pub fn sync_target(&mut self) {
        match self.target_update {
            TargetUpdate::Hard => self.target.copy_parameters_from(&self.online),
            TargetUpdate::Soft { tau } => self.target.soft_update_from(&self.online, tau),
        }
        self.target_syncs += 1;
        debug!("Target network updated ({} syncs)", self.target_syncs);
    }
}

/// Double-DQN targets for one batch.
///
/// `online_next` selects the action per row, `target_next` supplies its
/// value. Terminal rows yield exactly their reward.
pub fn double_q_targets(
    rewards: ArrayView1<f32>,
    dones: &[bool],
    online_next: ArrayView2<f32>,
    target_next: ArrayView2<f32>,
    discount: f32,
) -> Result<Array1<f32>> {
    let n = rewards.len();
    if dones.len() != n || online_next.nrows() != n || online_next.dim() != target_next.dim() {
        return Err(DrqnError::dimension_mismatch(
            format!("{} rows of equally shaped Q-values", n),
            format!(
                "{} dones, online {:?}, target {:?}",
                dones.len(),
                online_next.dim(),
                target_next.dim()
            ),
        ));
    }

    let targets = (0..n)
        .map(|i| {
            if dones[i] {
                rewards[i]
            } else {
                let best = argmax(online_next.row(i));
                rewards[i] + discount * target_next[[i, best]]
            }
        })
        .collect();
    Ok(targets)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn terminal_target_is_reward() {
        let targets = double_q_targets(
            array![1.0].view(),
            &[true],
            array![[0.0, 50.0]].view(),
            array![[0.0, 50.0]].view(),
            0.99,
        )
        .unwrap();
        assert_eq!(targets[0], 1.0);
    }

    #[test]
    fn online_selects_and_target_evaluates() {
        let targets = double_q_targets(
            array![1.0, -1.0].view(),
            &[false, false],
            array![[0.0, 5.0], [3.0, 1.0]].view(),
            array![[10.0, 2.0], [4.0, 100.0]].view(),
            0.5,
        )
        .unwrap();
        // Row 0: online prefers action 1, target values it at 2.
        // Row 1: online prefers action 0, target values it at 4.
        assert_eq!(targets, array![2.0, 1.0]);
    }

    #[test]
    fn mismatched_rows_fail() {
        let result = double_q_targets(
            array![1.0, 2.0].view(),
            &[false],
            array![[0.0]].view(),
            array![[0.0]].view(),
            0.9,
        );
        assert!(result.is_err());
    }
}
