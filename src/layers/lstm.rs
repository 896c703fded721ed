use ndarray::{s, Array1, Array2, Array3, ArrayView2, ArrayView3, Axis};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{DrqnError, Result};
use super::initialization::WeightInit;

/// Hidden and cell state of an LSTM, one row per sequence in the batch.
///
/// The state is a plain value: callers own it, hand it to every forward call
/// and receive the advanced state back.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RecurrentState {
    pub hidden: Array2<f32>,
    pub cell: Array2<f32>,
}

impl RecurrentState {
    /// All-zero state for `batch_size` sequences.
    pub fn zeros(batch_size: usize, hidden_size: usize) -> Self {
        RecurrentState {
            hidden: Array2::zeros((batch_size, hidden_size)),
            cell: Array2::zeros((batch_size, hidden_size)),
        }
    }

    pub fn batch_size(&self) -> usize {
        self.hidden.nrows()
    }

    pub fn hidden_size(&self) -> usize {
        self.hidden.ncols()
    }
}

/// LSTM (Long Short-Term Memory) layer for sequence processing
///
/// Always returns the full output sequence `[batch, seq_len, hidden_size]`.
#[derive(Clone, Serialize, Deserialize)]
pub struct LSTMLayer {
    pub input_size: usize,
    pub hidden_size: usize,

    // Weight matrices for input gate
    pub w_ii: Array2<f32>, // Input to input gate
    pub w_hi: Array2<f32>, // Hidden to input gate
    pub b_i: Array1<f32>,

    // Weight matrices for forget gate
    pub w_if: Array2<f32>,
    pub w_hf: Array2<f32>,
    pub b_f: Array1<f32>,

    // Weight matrices for cell gate (candidate values)
    pub w_ig: Array2<f32>,
    pub w_hg: Array2<f32>,
    pub b_g: Array1<f32>,

    // Weight matrices for output gate
    pub w_io: Array2<f32>,
    pub w_ho: Array2<f32>,
    pub b_o: Array1<f32>,

    #[serde(skip)]
    cache: Option<LSTMCache>,
}

#[derive(Clone)]
struct LSTMCache {
    inputs: Array3<f32>,
    hidden_states: Vec<Array2<f32>>,
    cell_states: Vec<Array2<f32>>,
    input_gates: Vec<Array2<f32>>,
    forget_gates: Vec<Array2<f32>>,
    cell_gates: Vec<Array2<f32>>,
    output_gates: Vec<Array2<f32>>,
}

/// Gradients for LSTM layer
pub struct LSTMGradients {
    pub dw_ii: Array2<f32>, pub dw_hi: Array2<f32>, pub db_i: Array1<f32>,
    pub dw_if: Array2<f32>, pub dw_hf: Array2<f32>, pub db_f: Array1<f32>,
    pub dw_ig: Array2<f32>, pub dw_hg: Array2<f32>, pub db_g: Array1<f32>,
    pub dw_io: Array2<f32>, pub dw_ho: Array2<f32>, pub db_o: Array1<f32>,
    /// Gradient with respect to the input sequence
    pub dx: Array3<f32>,
}

impl LSTMLayer {
    /// Create a new LSTM layer
    pub fn new<R: Rng + ?Sized>(input_size: usize, hidden_size: usize, rng: &mut R) -> Result<Self> {
        let scale = (1.0 / (input_size + hidden_size) as f32).sqrt();
        let init = WeightInit::Uniform { min: -scale, max: scale };
        let mut input_weights = || init.initialize((input_size, hidden_size), input_size, hidden_size, &mut *rng);
        let (w_ii, w_if, w_ig, w_io) = (input_weights()?, input_weights()?, input_weights()?, input_weights()?);
        let mut hidden_weights = || init.initialize((hidden_size, hidden_size), hidden_size, hidden_size, &mut *rng);
        let (w_hi, w_hf, w_hg, w_ho) = (hidden_weights()?, hidden_weights()?, hidden_weights()?, hidden_weights()?);

        Ok(Self {
            input_size,
            hidden_size,
            w_ii,
            w_hi,
            b_i: Array1::zeros(hidden_size),
            w_if,
            w_hf,
            b_f: Array1::ones(hidden_size), // Forget gate bias starts at 1 for better gradient flow
            w_ig,
            w_hg,
            b_g: Array1::zeros(hidden_size),
            w_io,
            w_ho,
            b_o: Array1::zeros(hidden_size),
            cache: None,
        })
    }

    /// Forward pass for a sequence `[batch, seq_len, input_size]` starting from
    /// `initial`. Returns the output sequence and the state after the last step.
    pub fn forward_sequence(&mut self, input: ArrayView3<f32>, initial: &RecurrentState) -> Result<(Array3<f32>, RecurrentState)> {
        let (batch_size, seq_len, input_size) = input.dim();
        if input_size != self.input_size {
            return Err(DrqnError::dimension_mismatch(
                format!("{} input features", self.input_size),
                format!("{}", input_size),
            ));
        }
        if initial.batch_size() != batch_size || initial.hidden_size() != self.hidden_size {
            return Err(DrqnError::dimension_mismatch(
                format!("recurrent state {}x{}", batch_size, self.hidden_size),
                format!("{}x{}", initial.batch_size(), initial.hidden_size()),
            ));
        }

        let mut h_t = initial.hidden.clone();
        let mut c_t = initial.cell.clone();

        let mut outputs = Array3::zeros((batch_size, seq_len, self.hidden_size));
        let mut hidden_states = Vec::with_capacity(seq_len + 1);
        let mut cell_states = Vec::with_capacity(seq_len + 1);
        let mut input_gates = Vec::with_capacity(seq_len);
        let mut forget_gates = Vec::with_capacity(seq_len);
        let mut cell_gates = Vec::with_capacity(seq_len);
        let mut output_gates = Vec::with_capacity(seq_len);

        hidden_states.push(h_t.clone());
        cell_states.push(c_t.clone());

        for t in 0..seq_len {
            let x_t = input.slice(s![.., t, ..]);

            // i_t = sigmoid(x_t W_ii + h_{t-1} W_hi + b_i)
            let i_t = Self::sigmoid(&(x_t.dot(&self.w_ii) + h_t.dot(&self.w_hi) + &self.b_i));
            let f_t = Self::sigmoid(&(x_t.dot(&self.w_if) + h_t.dot(&self.w_hf) + &self.b_f));
            let g_t = Self::tanh(&(x_t.dot(&self.w_ig) + h_t.dot(&self.w_hg) + &self.b_g));
            let o_t = Self::sigmoid(&(x_t.dot(&self.w_io) + h_t.dot(&self.w_ho) + &self.b_o));

            // c_t = f_t * c_{t-1} + i_t * g_t
            c_t = &f_t * &c_t + &i_t * &g_t;
            // h_t = o_t * tanh(c_t)
            h_t = &o_t * &Self::tanh(&c_t);

            outputs.slice_mut(s![.., t, ..]).assign(&h_t);
            hidden_states.push(h_t.clone());
            cell_states.push(c_t.clone());
            input_gates.push(i_t);
            forget_gates.push(f_t);
            cell_gates.push(g_t);
            output_gates.push(o_t);
        }

        self.cache = Some(LSTMCache {
            inputs: input.to_owned(),
            hidden_states,
            cell_states,
            input_gates,
            forget_gates,
            cell_gates,
            output_gates,
        });

        Ok((outputs, RecurrentState { hidden: h_t, cell: c_t }))
    }

    /// Backpropagation through time for the sequence seen by the last
    /// forward call. Gradients flowing into the initial state are dropped.
    pub fn backward_sequence(&self, output_grad: ArrayView3<f32>) -> Result<LSTMGradients> {
        let cache = self.cache.as_ref().ok_or_else(|| {
            DrqnError::NumericalError("forward_sequence() must be called before backward_sequence()".to_string())
        })?;
        let (batch_size, seq_len, _) = cache.inputs.dim();
        if output_grad.dim() != (batch_size, seq_len, self.hidden_size) {
            return Err(DrqnError::dimension_mismatch(
                format!("{:?}", (batch_size, seq_len, self.hidden_size)),
                format!("{:?}", output_grad.dim()),
            ));
        }

        let mut dw_ii = Array2::zeros((self.input_size, self.hidden_size));
        let mut dw_hi = Array2::zeros((self.hidden_size, self.hidden_size));
        let mut db_i = Array1::zeros(self.hidden_size);

        let mut dw_if = Array2::zeros((self.input_size, self.hidden_size));
        let mut dw_hf = Array2::zeros((self.hidden_size, self.hidden_size));
        let mut db_f = Array1::zeros(self.hidden_size);

        let mut dw_ig = Array2::zeros((self.input_size, self.hidden_size));
        let mut dw_hg = Array2::zeros((self.hidden_size, self.hidden_size));
        let mut db_g = Array1::zeros(self.hidden_size);

        let mut dw_io = Array2::zeros((self.input_size, self.hidden_size));
        let mut dw_ho = Array2::zeros((self.hidden_size, self.hidden_size));
        let mut db_o = Array1::zeros(self.hidden_size);

        let mut dx = Array3::zeros((batch_size, seq_len, self.input_size));
        let mut dh_next = Array2::<f32>::zeros((batch_size, self.hidden_size));
        let mut dc_next = Array2::<f32>::zeros((batch_size, self.hidden_size));

        for t in (0..seq_len).rev() {
            let dh = &output_grad.slice(s![.., t, ..]) + &dh_next;
            let x_t = cache.inputs.slice(s![.., t, ..]);
            let h_prev = &cache.hidden_states[t];
            let c_t = &cache.cell_states[t + 1];
            let c_prev = &cache.cell_states[t];

            let i_t = &cache.input_gates[t];
            let f_t = &cache.forget_gates[t];
            let g_t = &cache.cell_gates[t];
            let o_t = &cache.output_gates[t];

            let tanh_c_t = Self::tanh(c_t);
            let do_t = &dh * &tanh_c_t;
            let dc = &dh * o_t * &Self::tanh_derivative(&tanh_c_t) + &dc_next;

            let di_t = &dc * g_t;
            let df_t = &dc * c_prev;
            let dg_t = &dc * i_t;
            dc_next = &dc * f_t;

            let di_gate = di_t * &Self::sigmoid_derivative(i_t);
            let df_gate = df_t * &Self::sigmoid_derivative(f_t);
            let dg_gate = dg_t * &Self::tanh_derivative(g_t);
            let do_gate = do_t * &Self::sigmoid_derivative(o_t);

            Self::accumulate(&mut dw_ii, &mut dw_hi, &mut db_i, x_t, h_prev.view(), &di_gate);
            Self::accumulate(&mut dw_if, &mut dw_hf, &mut db_f, x_t, h_prev.view(), &df_gate);
            Self::accumulate(&mut dw_ig, &mut dw_hg, &mut db_g, x_t, h_prev.view(), &dg_gate);
            Self::accumulate(&mut dw_io, &mut dw_ho, &mut db_o, x_t, h_prev.view(), &do_gate);

            let dx_t = di_gate.dot(&self.w_ii.t())
                + df_gate.dot(&self.w_if.t())
                + dg_gate.dot(&self.w_ig.t())
                + do_gate.dot(&self.w_io.t());
            dx.slice_mut(s![.., t, ..]).assign(&dx_t);

            dh_next = di_gate.dot(&self.w_hi.t())
                + df_gate.dot(&self.w_hf.t())
                + dg_gate.dot(&self.w_hg.t())
                + do_gate.dot(&self.w_ho.t());
        }

        Ok(LSTMGradients {
            dw_ii, dw_hi, db_i,
            dw_if, dw_hf, db_f,
            dw_ig, dw_hg, db_g,
            dw_io, dw_ho, db_o,
            dx,
        })
    }

    fn accumulate(
        dw_x: &mut Array2<f32>,
        dw_h: &mut Array2<f32>,
        db: &mut Array1<f32>,
        x_t: ArrayView2<f32>,
        h_prev: ArrayView2<f32>,
        gate_grad: &Array2<f32>,
    ) {
        *dw_x += &x_t.t().dot(gate_grad);
        *dw_h += &h_prev.t().dot(gate_grad);
        *db += &gate_grad.sum_axis(Axis(0));
    }

    fn sigmoid(x: &Array2<f32>) -> Array2<f32> {
        x.mapv(|v| 1.0 / (1.0 + (-v).exp()))
    }

    fn sigmoid_derivative(s: &Array2<f32>) -> Array2<f32> {
        s * &(1.0 - s)
    }

    fn tanh(x: &Array2<f32>) -> Array2<f32> {
        x.mapv(|v| v.tanh())
    }

    fn tanh_derivative(t: &Array2<f32>) -> Array2<f32> {
        1.0 - t * t
    }
}
