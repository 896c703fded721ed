use ndarray::{Array, Dimension, ShapeBuilder};
use ndarray_rand::rand_distr::{Normal, Uniform};
use ndarray_rand::RandomExt;
use rand::Rng;

use crate::activations::Activation;
use crate::error::{DrqnError, Result};

/// Weight initialization strategies
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WeightInit {
    /// Xavier/Glorot uniform initialization
    XavierUniform,

    /// He/Kaiming uniform initialization (for ReLU)
    HeUniform,

    /// He/Kaiming normal initialization (for ReLU)
    HeNormal,

    /// Uniform distribution with custom range
    Uniform { min: f32, max: f32 },
}

impl WeightInit {
    /// Draw a tensor of any rank.
    ///
    /// `fan_in` and `fan_out` are the number of inputs and outputs feeding a
    /// single unit; for a convolution this includes the kernel area.
    pub fn initialize<Sh, D, R>(&self, shape: Sh, fan_in: usize, fan_out: usize, rng: &mut R) -> Result<Array<f32, D>>
    where
        Sh: ShapeBuilder<Dim = D>,
        D: Dimension,
        R: Rng + ?Sized,
    {
        if fan_in == 0 || fan_out == 0 {
            return Err(DrqnError::invalid_parameter(
                "fan_in/fan_out".to_string(),
                format!("must be positive, got {}/{}", fan_in, fan_out),
            ));
        }

        let weights = match self {
            WeightInit::XavierUniform => {
                let limit = (6.0 / (fan_in + fan_out) as f32).sqrt();
                Array::random_using(shape, Uniform::new(-limit, limit), rng)
            }

            WeightInit::HeUniform => {
                let limit = (6.0 / fan_in as f32).sqrt();
                Array::random_using(shape, Uniform::new(-limit, limit), rng)
            }

            WeightInit::HeNormal => {
                let std = (2.0 / fan_in as f32).sqrt();
                let dist = Normal::new(0.0, std)
                    .map_err(|e| DrqnError::NumericalError(e.to_string()))?;
                Array::random_using(shape, dist, rng)
            }

            WeightInit::Uniform { min, max } => {
                if min >= max {
                    return Err(DrqnError::invalid_parameter(
                        "uniform range".to_string(),
                        format!("min {} must be below max {}", min, max),
                    ));
                }
                Array::random_using(shape, Uniform::new(*min, *max), rng)
            }
        };

        Ok(weights)
    }

    /// Get the recommended initialization for an activation function
    pub fn for_activation(activation: &Activation) -> Self {
        if activation.is_rectifier() {
            WeightInit::HeNormal
        } else {
            WeightInit::XavierUniform
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array2, Array4};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn xavier_respects_limit() {
        let mut rng = StdRng::seed_from_u64(3);
        let w: Array2<f32> = WeightInit::XavierUniform.initialize((20, 30), 20, 30, &mut rng).unwrap();
        let limit = (6.0f32 / 50.0).sqrt();
        assert!(w.iter().all(|&v| v.abs() <= limit));
    }

    #[test]
    fn conv_kernels_have_requested_shape() {
        let mut rng = StdRng::seed_from_u64(3);
        let k: Array4<f32> = WeightInit::HeNormal.initialize((4, 2, 3, 3), 18, 36, &mut rng).unwrap();
        assert_eq!(k.dim(), (4, 2, 3, 3));
    }

    #[test]
    fn zero_fan_is_rejected() {
        let mut rng = StdRng::seed_from_u64(3);
        let r: Result<Array2<f32>> = WeightInit::HeUniform.initialize((0, 3), 0, 3, &mut rng);
        assert!(r.is_err());
    }
}
