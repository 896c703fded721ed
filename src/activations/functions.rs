use ndarray::{Array, ArrayView, Dimension};
use serde::{Deserialize, Serialize};

/// Activation functions available to the hidden layers of the Q-network.
///
/// Every method is generic over the array dimension so the same value can be
/// applied to dense activations `[batch, features]` and to convolution maps
/// `[batch, channels, height, width]`.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, Default, PartialEq)]
pub enum Activation {
    #[default]
    Relu,
    Linear,
    Sigmoid,
    Tanh,
    LeakyRelu { alpha: f32 },
}

impl Activation {
    /// Apply the activation function to an array in-place.
    pub fn apply<D: Dimension>(&self, input: &mut Array<f32, D>) {
        match self {
            Activation::Relu => {
                input.mapv_inplace(|v| v.max(0.0));
            }
            Activation::Linear => {}
            Activation::Sigmoid => {
                input.mapv_inplace(|v| 1.0 / (1.0 + (-v).exp()));
            }
            Activation::Tanh => {
                input.mapv_inplace(|v| v.tanh());
            }
            Activation::LeakyRelu { alpha } => {
                let a = *alpha;
                input.mapv_inplace(|v| if v > 0.0 { v } else { a * v });
            }
        }
    }

    /// Derivative of the activation evaluated at the pre-activation values.
    pub fn derivative<D: Dimension>(&self, pre_activation: ArrayView<f32, D>) -> Array<f32, D> {
        match self {
            Activation::Relu => pre_activation.mapv(|v| if v > 0.0 { 1.0 } else { 0.0 }),
            Activation::Linear => pre_activation.mapv(|_| 1.0),
            Activation::Sigmoid => pre_activation.mapv(|v| {
                let sigmoid = 1.0 / (1.0 + (-v).exp());
                sigmoid * (1.0 - sigmoid)
            }),
            Activation::Tanh => pre_activation.mapv(|v| {
                let tanh_v = v.tanh();
                1.0 - tanh_v * tanh_v
            }),
            Activation::LeakyRelu { alpha } => {
                let a = *alpha;
                pre_activation.mapv(|v| if v > 0.0 { 1.0 } else { a })
            }
        }
    }

    /// Whether He initialisation suits this activation better than Xavier.
    pub fn is_rectifier(&self) -> bool {
        matches!(self, Activation::Relu | Activation::LeakyRelu { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array4};

    #[test]
    fn relu_clamps_negatives_in_any_dimension() {
        let mut dense = array![[-1.0, 2.0], [0.5, -0.1]];
        Activation::Relu.apply(&mut dense);
        assert_eq!(dense, array![[0.0, 2.0], [0.5, 0.0]]);

        let mut maps = Array4::from_elem((1, 2, 2, 2), -3.0f32);
        Activation::Relu.apply(&mut maps);
        assert!(maps.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn leaky_relu_derivative_uses_slope() {
        let pre = array![-2.0f32, 3.0];
        let d = Activation::LeakyRelu { alpha: 0.1 }.derivative(pre.view());
        assert_eq!(d, array![0.1, 1.0]);
    }

    #[test]
    fn tanh_derivative_is_one_at_zero() {
        let pre = array![0.0f32];
        let d = Activation::Tanh.derivative(pre.view());
        assert!((d[0] - 1.0).abs() < 1e-6);
    }
}
