use ndarray::ArrayD;
use serde::{Deserialize, Serialize};

/// Gradient clipping methods
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum GradientClipper {
    /// Clip every gradient element into `[min, max]`
    ClipByValue { min: f32, max: f32 },

    /// Rescale all gradients together so their joint L2 norm is at most `max_norm`
    ClipByGlobalNorm { max_norm: f32 },

    /// No clipping
    None,
}

impl Default for GradientClipper {
    fn default() -> Self {
        GradientClipper::None
    }
}

impl GradientClipper {
    /// Clip the gradients of one update in place and return their global
    /// norm before clipping.
    pub fn clip(&self, gradients: &mut [ArrayD<f32>]) -> f32 {
        let norm = Self::global_norm(gradients);
        match self {
            GradientClipper::ClipByValue { min, max } => {
                for grad in gradients.iter_mut() {
                    grad.mapv_inplace(|g| g.max(*min).min(*max));
                }
            }

            GradientClipper::ClipByGlobalNorm { max_norm } => {
                if norm > *max_norm {
                    let scale = max_norm / norm;
                    for grad in gradients.iter_mut() {
                        grad.mapv_inplace(|g| g * scale);
                    }
                }
            }

            GradientClipper::None => {}
        }
        norm
    }

    /// L2 norm over all elements of all gradients
    pub fn global_norm(gradients: &[ArrayD<f32>]) -> f32 {
        gradients
            .iter()
            .map(|g| g.iter().map(|&x| x * x).sum::<f32>())
            .sum::<f32>()
            .sqrt()
    }
}
