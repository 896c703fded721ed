use ndarray::{Array, Array2, Array4};
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::activations::Activation;
use crate::layers::{Conv2DLayer, DenseLayer, WeightInit};

fn close(numeric: f32, analytic: f32) -> bool {
    (numeric - analytic).abs() <= 1e-2 + 5e-2 * analytic.abs()
}

#[test]
fn test_dense_gradient_matches_finite_differences() {
    let mut rng = StdRng::seed_from_u64(4);
    let mut dense = DenseLayer::new(3, 2, Activation::Tanh, &mut rng).unwrap();
    let input = Array::from_shape_fn((2, 3), |(i, j)| 0.3 * (i as f32 + 1.0) - 0.2 * j as f32);
    let weights = Array2::from_shape_vec((2, 2), vec![1.0, -0.5, 0.25, 2.0]).unwrap();

    dense.forward_batch(input.view()).unwrap();
    let grads = dense.backward_batch(weights.view()).unwrap();

    let eps = 1e-2;
    for &(r, c) in &[(0usize, 0usize), (2, 1)] {
        let original = dense.weights[[r, c]];
        dense.weights[[r, c]] = original + eps;
        let plus = (&dense.forward_batch(input.view()).unwrap() * &weights).sum();
        dense.weights[[r, c]] = original - eps;
        let minus = (&dense.forward_batch(input.view()).unwrap() * &weights).sum();
        dense.weights[[r, c]] = original;
        let numeric = (plus - minus) / (2.0 * eps);
        assert!(close(numeric, grads.weights[[r, c]]), "w[{}, {}]: {} vs {}", r, c, numeric, grads.weights[[r, c]]);
    }
}

#[test]
fn test_strided_conv_gradient_matches_finite_differences() {
    let mut rng = StdRng::seed_from_u64(8);
    let mut conv = Conv2DLayer::new(2, 3, (3, 3), (2, 2), (1, 1), Activation::Tanh, &mut rng).unwrap();
    let input: Array4<f32> = Array::from_shape_fn((2, 2, 5, 5), |(b, c, h, w)| ((b + 2 * c + 3 * h + 5 * w) as f32 * 0.17).sin());

    let output = conv.forward_batch(input.view()).unwrap();
    let loss_weights = Array::from_shape_fn(output.dim(), |(b, c, h, w)| 0.1 * (1 + b + c + h * w) as f32);
    let grads = conv.backward_batch(loss_weights.view(), true).unwrap();

    let eps = 1e-2;
    for &idx in &[[0usize, 0, 0, 0], [2, 1, 1, 2]] {
        let original = conv.kernels[idx];
        conv.kernels[idx] = original + eps;
        let plus = (&conv.forward_batch(input.view()).unwrap() * &loss_weights).sum();
        conv.kernels[idx] = original - eps;
        let minus = (&conv.forward_batch(input.view()).unwrap() * &loss_weights).sum();
        conv.kernels[idx] = original;
        let numeric = (plus - minus) / (2.0 * eps);
        assert!(close(numeric, grads.kernels[idx]), "k{:?}: {} vs {}", idx, numeric, grads.kernels[idx]);
    }

    let input_grad = grads.input.unwrap();
    let mut perturbed = input.clone();
    let idx = [1usize, 1, 2, 2];
    perturbed[idx] += eps;
    let plus = (&conv.forward_batch(perturbed.view()).unwrap() * &loss_weights).sum();
    perturbed[idx] -= 2.0 * eps;
    let minus = (&conv.forward_batch(perturbed.view()).unwrap() * &loss_weights).sum();
    let numeric = (plus - minus) / (2.0 * eps);
    assert!(close(numeric, input_grad[idx]), "dx: {} vs {}", numeric, input_grad[idx]);
}

#[test]
fn test_uniform_init_rejects_empty_range() {
    let mut rng = StdRng::seed_from_u64(1);
    let result: crate::error::Result<Array2<f32>> =
        WeightInit::Uniform { min: 1.0, max: 1.0 }.initialize((2, 2), 2, 2, &mut rng);
    assert!(result.is_err());
}
