//! The recurrent dueling Q-network.
//!
//! Frames pass through a convolution stack and a dense projection, the
//! projected sequence runs through an LSTM, and the LSTM output is split in
//! half to feed an advantage and a value stream:
//!
//! ```text
//! Q(s, a) = V(s) + A(s, a) - mean_a' A(s, a')
//! ```
use ndarray::{s, Array2, Array3, Array4, ArrayD, ArrayView1, ArrayView4, ArrayViewD, ArrayViewMutD, Axis, Zip};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::activations::Activation;
use crate::agent::traits::RecurrentQNetwork;
use crate::config::NetworkConfig;
use crate::error::{DrqnError, Result};
use crate::layers::{Conv2DLayer, DenseLayer, LSTMLayer, RecurrentState};
use crate::optimizer::{Optimizer, OptimizerWrapper};

/// Trainable layers, kept apart from the optimizer so both can be borrowed
/// mutably during an update.
#[derive(Clone, Serialize, Deserialize)]
struct DrqnParams {
    convs: Vec<Conv2DLayer>,
    projection: DenseLayer,
    lstm: LSTMLayer,
    advantage: DenseLayer,
    value: DenseLayer,
}

impl DrqnParams {
    /// Every trainable tensor, in optimizer slot order.
    fn tensors(&self) -> Vec<ArrayViewD<'_, f32>> {
        let mut out = Vec::new();
        for conv in &self.convs {
            out.push(conv.kernels.view().into_dyn());
            out.push(conv.biases.view().into_dyn());
        }
        out.push(self.projection.weights.view().into_dyn());
        out.push(self.projection.biases.view().into_dyn());
        let lstm = &self.lstm;
        for tensor in [
            lstm.w_ii.view(), lstm.w_hi.view(),
            lstm.w_if.view(), lstm.w_hf.view(),
            lstm.w_ig.view(), lstm.w_hg.view(),
            lstm.w_io.view(), lstm.w_ho.view(),
        ] {
            out.push(tensor.into_dyn());
        }
        for bias in [lstm.b_i.view(), lstm.b_f.view(), lstm.b_g.view(), lstm.b_o.view()] {
            out.push(bias.into_dyn());
        }
        for head in [&self.advantage, &self.value] {
            out.push(head.weights.view().into_dyn());
            out.push(head.biases.view().into_dyn());
        }
        out
    }

    /// Mutable counterpart of [`tensors`](Self::tensors), same order.
    fn tensors_mut(&mut self) -> Vec<ArrayViewMutD<'_, f32>> {
        let DrqnParams { convs, projection, lstm, advantage, value } = self;
        let mut out = Vec::new();
        for conv in convs.iter_mut() {
            out.push(conv.kernels.view_mut().into_dyn());
            out.push(conv.biases.view_mut().into_dyn());
        }
        out.push(projection.weights.view_mut().into_dyn());
        out.push(projection.biases.view_mut().into_dyn());
        let LSTMLayer {
            w_ii, w_hi, b_i,
            w_if, w_hf, b_f,
            w_ig, w_hg, b_g,
            w_io, w_ho, b_o,
            ..
        } = lstm;
        for tensor in [w_ii, w_hi, w_if, w_hf, w_ig, w_hg, w_io, w_ho] {
            out.push(tensor.view_mut().into_dyn());
        }
        for bias in [b_i, b_f, b_g, b_o] {
            out.push(bias.view_mut().into_dyn());
        }
        for head in [advantage, value] {
            out.push(head.weights.view_mut().into_dyn());
            out.push(head.biases.view_mut().into_dyn());
        }
        out
    }
}

/// Shapes remembered by the forward pass for the backward pass.
struct ForwardShapes {
    batch_size: usize,
    trace_length: usize,
    conv_output: (usize, usize, usize, usize),
}

/// Recurrent dueling Q-network on `ndarray`.
#[derive(Clone, Serialize, Deserialize)]
pub struct DrqnNetwork {
    pub config: NetworkConfig,
    params: DrqnParams,
    optimizer: OptimizerWrapper,
    /// Number of gradient steps taken
    pub updates: usize,
}

impl DrqnNetwork {
    /// Create a network with parameters drawn from the thread-local RNG.
    pub fn new(config: &NetworkConfig) -> Result<Self> {
        Self::new_with_rng(config, &mut rand::thread_rng())
    }

    pub fn new_with_rng<R: Rng + ?Sized>(config: &NetworkConfig, rng: &mut R) -> Result<Self> {
        config.validate()?;

        let (mut channels, mut height, mut width) = config.frame_shape_tuple();
        let mut convs = Vec::with_capacity(config.conv_layers.len());
        for spec in &config.conv_layers {
            let conv = Conv2DLayer::new(
                channels,
                spec.out_channels,
                (spec.kernel_size, spec.kernel_size),
                (spec.stride, spec.stride),
                (0, 0),
                config.activation,
                rng,
            )?;
            let (h, w) = conv.output_dims(height, width)?;
            channels = spec.out_channels;
            height = h;
            width = w;
            convs.push(conv);
        }

        let features = channels * height * width;
        let half = config.hidden_size / 2;
        let params = DrqnParams {
            convs,
            projection: DenseLayer::new(features, config.hidden_size, config.activation, rng)?,
            lstm: LSTMLayer::new(config.hidden_size, config.hidden_size, rng)?,
            advantage: DenseLayer::new(half, config.num_actions, Activation::Linear, rng)?,
            value: DenseLayer::new(half, 1, Activation::Linear, rng)?,
        };

        Ok(DrqnNetwork {
            config: config.clone(),
            params,
            optimizer: config.optimizer.build(),
            updates: 0,
        })
    }

    /// Number of scalar parameters.
    pub fn num_parameters(&self) -> usize {
        self.params.tensors().iter().map(|t| t.len()).sum()
    }

    /// Trainable tensors in a fixed order; used to compare networks.
    pub fn parameters(&self) -> Vec<ArrayViewD<'_, f32>> {
        self.params.tensors()
    }

    fn check_frames(&self, frames: &ArrayView4<f32>, trace_length: usize, state: &RecurrentState) -> Result<usize> {
        let (n, c, h, w) = frames.dim();
        let expected = self.config.frame_shape_tuple();
        if (c, h, w) != expected {
            return Err(DrqnError::dimension_mismatch(
                format!("frames of shape {:?}", expected),
                format!("{:?}", (c, h, w)),
            ));
        }
        if trace_length == 0 || n == 0 || n % trace_length != 0 {
            return Err(DrqnError::dimension_mismatch(
                format!("a positive multiple of trace length {}", trace_length),
                format!("{} frames", n),
            ));
        }
        let batch_size = n / trace_length;
        if state.batch_size() != batch_size || state.hidden_size() != self.config.hidden_size {
            return Err(DrqnError::dimension_mismatch(
                format!("recurrent state {}x{}", batch_size, self.config.hidden_size),
                format!("{}x{}", state.batch_size(), state.hidden_size()),
            ));
        }
        Ok(batch_size)
    }

    fn forward(
        &mut self,
        frames: ArrayView4<f32>,
        trace_length: usize,
        state: &RecurrentState,
    ) -> Result<(Array2<f32>, RecurrentState, ForwardShapes)> {
        let batch_size = self.check_frames(&frames, trace_length, state)?;
        let n = frames.dim().0;

        let mut maps: Option<Array4<f32>> = None;
        for conv in self.params.convs.iter_mut() {
            let next = match &maps {
                Some(x) => conv.forward_batch(x.view())?,
                None => conv.forward_batch(frames)?,
            };
            maps = Some(next);
        }
        let maps = match maps {
            Some(maps) => maps,
            None => frames.to_owned(),
        };
        let conv_output = maps.dim();
        let features = conv_output.1 * conv_output.2 * conv_output.3;
        let flat = standard(maps).into_shape((n, features))?;

        let projected = self.params.projection.forward_batch(flat.view())?;
        let hidden = self.config.hidden_size;
        let sequence = standard(projected).into_shape((batch_size, trace_length, hidden))?;
        let (outputs, next_state) = self.params.lstm.forward_sequence(sequence.view(), state)?;
        let outputs = standard(outputs).into_shape((n, hidden))?;

        let half = hidden / 2;
        let advantage = self.params.advantage.forward_batch(outputs.slice(s![.., ..half]))?;
        let value = self.params.value.forward_batch(outputs.slice(s![.., half..]))?;
        let mean = advantage
            .mean_axis(Axis(1))
            .ok_or_else(|| DrqnError::NumericalError("no actions to average".to_string()))?;
        let q_values = &advantage - &mean.insert_axis(Axis(1)) + &value;

        if q_values.iter().any(|q| !q.is_finite()) {
            return Err(DrqnError::NumericalError("non-finite Q-values".to_string()));
        }
        Ok((q_values, next_state, ForwardShapes { batch_size, trace_length, conv_output }))
    }

    /// Backpropagate `dq` (`[n, num_actions]`) through the last forward pass.
    /// Returns one gradient per tensor, in slot order.
    fn backward(&self, dq: Array2<f32>, shapes: &ForwardShapes) -> Result<Vec<ArrayD<f32>>> {
        let n = dq.nrows();
        let num_actions = self.config.num_actions as f32;
        let hidden = self.config.hidden_size;
        let half = hidden / 2;

        // Q_j = V + A_j - mean(A): dV = sum_j dQ_j, dA_k = dQ_k - mean_j dQ_j
        let row_sum = dq.sum_axis(Axis(1)).insert_axis(Axis(1));
        let d_advantage = &dq - &(&row_sum / num_actions);
        let advantage = self.params.advantage.backward_batch(d_advantage.view())?;
        let value = self.params.value.backward_batch(row_sum.view())?;

        let mut d_outputs = Array2::zeros((n, hidden));
        d_outputs.slice_mut(s![.., ..half]).assign(&advantage.input);
        d_outputs.slice_mut(s![.., half..]).assign(&value.input);
        let d_outputs = d_outputs.into_shape((shapes.batch_size, shapes.trace_length, hidden))?;

        let lstm = self.params.lstm.backward_sequence(d_outputs.view())?;
        let d_sequence = standard(lstm.dx).into_shape((n, hidden))?;
        let projection = self.params.projection.backward_batch(d_sequence.view())?;

        let mut conv_grads = Vec::with_capacity(self.params.convs.len() * 2);
        let mut upstream: Array4<f32> = standard(projection.input).into_shape(shapes.conv_output)?;
        for (i, conv) in self.params.convs.iter().enumerate().rev() {
            let grads = conv.backward_batch(upstream.view(), i > 0)?;
            conv_grads.push((grads.kernels.into_dyn(), grads.biases.into_dyn()));
            if let Some(input) = grads.input {
                upstream = input;
            }
        }

        let mut out = Vec::with_capacity(conv_grads.len() * 2 + 16);
        for (kernels, biases) in conv_grads.into_iter().rev() {
            out.push(kernels);
            out.push(biases);
        }
        out.push(projection.weights.into_dyn());
        out.push(projection.biases.into_dyn());
        for tensor in [lstm.dw_ii, lstm.dw_hi, lstm.dw_if, lstm.dw_hf, lstm.dw_ig, lstm.dw_hg, lstm.dw_io, lstm.dw_ho] {
            out.push(tensor.into_dyn());
        }
        for bias in [lstm.db_i, lstm.db_f, lstm.db_g, lstm.db_o] {
            out.push(bias.into_dyn());
        }
        out.push(advantage.weights.into_dyn());
        out.push(advantage.biases.into_dyn());
        out.push(value.weights.into_dyn());
        out.push(value.biases.into_dyn());
        Ok(out)
    }

    /// Mean squared TD error over the unmasked steps, and its gradient with
    /// respect to the Q-values.
    fn td_loss(&self, q_values: &Array2<f32>, actions: &[usize], targets: ArrayView1<f32>, trace_length: usize) -> Result<(f32, Array2<f32>)> {
        let masked = self.config.masked_steps;
        let counted = (0..actions.len()).filter(|i| i % trace_length >= masked).count();
        if counted == 0 {
            return Err(DrqnError::invalid_parameter(
                "masked_steps".to_string(),
                format!("{} leaves no step of a trace of length {} in the loss", masked, trace_length),
            ));
        }

        let mut loss = 0.0;
        let mut dq = Array2::zeros(q_values.dim());
        for (i, (&action, &target)) in actions.iter().zip(targets.iter()).enumerate() {
            if i % trace_length < masked {
                continue;
            }
            let error = q_values[[i, action]] - target;
            loss += error * error;
            dq[[i, action]] = 2.0 * error / counted as f32;
        }
        Ok((loss / counted as f32, dq))
    }

    /// Save the network with bincode.
    pub fn save(&self, path: impl AsRef<std::path::Path>) -> Result<()> {
        let bytes = bincode::serialize(self)?;
        std::fs::write(path, bytes)?;
        Ok(())
    }

    /// Load a network written by [`save`](Self::save).
    pub fn load(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        Ok(bincode::deserialize(&bytes)?)
    }
}

/// Owned array in standard (row-major) layout, ready for `into_shape`.
fn standard<D: ndarray::Dimension>(array: ndarray::Array<f32, D>) -> ndarray::Array<f32, D> {
    if array.is_standard_layout() {
        array
    } else {
        array.as_standard_layout().into_owned()
    }
}

impl RecurrentQNetwork for DrqnNetwork {
    fn num_actions(&self) -> usize {
        self.config.num_actions
    }

    fn initial_state(&self, batch_size: usize) -> RecurrentState {
        RecurrentState::zeros(batch_size, self.config.hidden_size)
    }

    fn evaluate(&mut self, frames: ArrayView4<f32>, trace_length: usize, state: &RecurrentState) -> Result<(Array2<f32>, RecurrentState)> {
        let (q_values, next_state, _) = self.forward(frames, trace_length, state)?;
        Ok((q_values, next_state))
    }

    fn update(
        &mut self,
        frames: ArrayView4<f32>,
        actions: &[usize],
        targets: ArrayView1<f32>,
        trace_length: usize,
        state: &RecurrentState,
    ) -> Result<f32> {
        let n = frames.dim().0;
        if actions.len() != n || targets.len() != n {
            return Err(DrqnError::dimension_mismatch(
                format!("{} actions and targets", n),
                format!("{} actions, {} targets", actions.len(), targets.len()),
            ));
        }
        let num_actions = self.config.num_actions;
        if let Some(&action) = actions.iter().find(|&&a| a >= num_actions) {
            return Err(DrqnError::InvalidAction { action, max_actions: num_actions });
        }
        if targets.iter().any(|t| !t.is_finite()) {
            return Err(DrqnError::NumericalError("non-finite TD target".to_string()));
        }

        let (q_values, _, shapes) = self.forward(frames, trace_length, state)?;
        let (loss, dq) = self.td_loss(&q_values, actions, targets, trace_length)?;
        let mut gradients = self.backward(dq, &shapes)?;
        self.config.clipper.clip(&mut gradients);

        let learning_rate = self.config.learning_rate;
        for (slot, (param, grad)) in self.params.tensors_mut().into_iter().zip(gradients.iter()).enumerate() {
            self.optimizer.update(slot, param, grad.view(), learning_rate);
        }
        self.optimizer.step_done();
        self.updates += 1;
        Ok(loss)
    }

    fn copy_parameters_from(&mut self, other: &Self) {
        self.params = other.params.clone();
    }

    fn soft_update_from(&mut self, other: &Self, tau: f32) {
        for (target, online) in self.params.tensors_mut().into_iter().zip(other.params.tensors()) {
            Zip::from(target).and(&online).for_each(|t, &o| *t = tau * o + (1.0 - tau) * *t);
        }
    }
}

/// Stack frames `[c, h, w]` into a batch `[n, c, h, w]`.
pub fn stack_frames<'a, I>(frames: I, shape: (usize, usize, usize)) -> Result<Array4<f32>>
where
    I: IntoIterator<Item = &'a Array3<f32>>,
{
    let mut data = Vec::new();
    let mut n = 0;
    for frame in frames {
        if frame.dim() != shape {
            return Err(DrqnError::dimension_mismatch(format!("{:?}", shape), format!("{:?}", frame.dim())));
        }
        data.extend(frame.iter().copied());
        n += 1;
    }
    Ok(Array4::from_shape_vec((n, shape.0, shape.1, shape.2), data)?)
}

/// A single frame as a batch of one.
pub fn single_frame(frame: &Array3<f32>) -> Array4<f32> {
    frame.view().insert_axis(Axis(0)).to_owned()
}
