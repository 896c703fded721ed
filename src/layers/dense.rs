use ndarray::{Array1, Array2, ArrayView2, Axis};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::activations::Activation;
use crate::error::{DrqnError, Result};
use super::initialization::WeightInit;

/// A fully connected (dense) layer in a neural network
#[derive(Serialize, Deserialize, Clone)]
pub struct DenseLayer {
    pub weights: Array2<f32>,
    pub biases: Array1<f32>,
    pub activation: Activation,
    #[serde(skip)]
    pre_activation_output: Option<Array2<f32>>,
    #[serde(skip)]
    inputs: Option<Array2<f32>>,
}

/// Gradients produced by [`DenseLayer::backward_batch`].
pub struct DenseGradients {
    /// Gradient with respect to the layer input, `[batch, input_size]`
    pub input: Array2<f32>,
    pub weights: Array2<f32>,
    pub biases: Array1<f32>,
}

impl DenseLayer {
    /// Create a new dense layer with weights drawn for the given activation
    /// and zero biases.
    pub fn new<R: Rng + ?Sized>(input_size: usize, output_size: usize, activation: Activation, rng: &mut R) -> Result<Self> {
        let weights = WeightInit::for_activation(&activation)
            .initialize((input_size, output_size), input_size, output_size, rng)?;
        Ok(DenseLayer {
            weights,
            biases: Array1::zeros(output_size),
            activation,
            pre_activation_output: None,
            inputs: None,
        })
    }

    pub fn with_weights(mut self, weights: Array2<f32>) -> Self {
        assert_eq!(weights.dim(), self.weights.dim());
        self.weights = weights;
        self
    }

    pub fn with_biases(mut self, biases: Array1<f32>) -> Self {
        assert_eq!(biases.dim(), self.biases.dim());
        self.biases = biases;
        self
    }

    pub fn input_size(&self) -> usize {
        self.weights.nrows()
    }

    pub fn output_size(&self) -> usize {
        self.weights.ncols()
    }

    /// Forward pass for a batch `[batch, input_size]`; the inputs and
    /// pre-activations are kept for the next [`backward_batch`](Self::backward_batch).
    pub fn forward_batch(&mut self, inputs: ArrayView2<f32>) -> Result<Array2<f32>> {
        if inputs.ncols() != self.input_size() {
            return Err(DrqnError::dimension_mismatch(
                format!("{} input features", self.input_size()),
                format!("{}", inputs.ncols()),
            ));
        }
        self.inputs = Some(inputs.to_owned());
        let mut outputs = inputs.dot(&self.weights) + &self.biases.view().insert_axis(Axis(0));
        self.pre_activation_output = Some(outputs.clone());
        self.activation.apply(&mut outputs);
        Ok(outputs)
    }

    /// Backward pass for the batch seen by the last forward call.
    pub fn backward_batch(&self, output_errors: ArrayView2<f32>) -> Result<DenseGradients> {
        let (pre_activation_output, inputs) = match (&self.pre_activation_output, &self.inputs) {
            (Some(pre), Some(inputs)) => (pre, inputs),
            _ => {
                return Err(DrqnError::NumericalError(
                    "forward_batch() must be called before backward_batch()".to_string(),
                ))
            }
        };
        if output_errors.dim() != pre_activation_output.dim() {
            return Err(DrqnError::dimension_mismatch(
                format!("{:?}", pre_activation_output.dim()),
                format!("{:?}", output_errors.dim()),
            ));
        }

        let activation_deriv = self.activation.derivative(pre_activation_output.view());
        let adjusted_error = &output_errors * &activation_deriv;

        Ok(DenseGradients {
            input: adjusted_error.dot(&self.weights.t()),
            weights: inputs.t().dot(&adjusted_error),
            biases: adjusted_error.sum_axis(Axis(0)),
        })
    }
}
