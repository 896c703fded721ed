//! Convolutional layer for the frame encoder.
//!
//! Convolution is computed per frame as an im2col matrix product, and frames
//! of a batch are processed in parallel.

use ndarray::parallel::prelude::*;
use ndarray::{Array1, Array2, Array3, Array4, ArrayView2, ArrayView3, ArrayView4, Axis};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::activations::Activation;
use crate::error::{DrqnError, Result};
use super::initialization::WeightInit;

/// 2D Convolutional Layer
///
/// Input and output are laid out as `[batch, channels, height, width]`.
#[derive(Serialize, Deserialize, Clone)]
pub struct Conv2DLayer {
    /// Convolution kernels/filters [out_channels, in_channels, kernel_height, kernel_width]
    pub kernels: Array4<f32>,

    /// Bias terms for each output channel
    pub biases: Array1<f32>,

    pub activation: Activation,

    pub stride: (usize, usize),

    pub padding: (usize, usize),

    pub in_channels: usize,

    pub out_channels: usize,

    pub kernel_size: (usize, usize),

    /// Cached input for backward pass
    #[serde(skip)]
    cached_input: Option<Array4<f32>>,

    /// Cached pre-activation output
    #[serde(skip)]
    cached_pre_activation: Option<Array4<f32>>,
}

/// Gradients produced by [`Conv2DLayer::backward_batch`].
pub struct ConvGradients {
    /// Gradient with respect to the layer input, when requested
    pub input: Option<Array4<f32>>,
    pub kernels: Array4<f32>,
    pub biases: Array1<f32>,
}

impl Conv2DLayer {
    /// Create a new 2D convolutional layer
    pub fn new<R: Rng + ?Sized>(
        in_channels: usize,
        out_channels: usize,
        kernel_size: (usize, usize),
        stride: (usize, usize),
        padding: (usize, usize),
        activation: Activation,
        rng: &mut R,
    ) -> Result<Self> {
        if stride.0 == 0 || stride.1 == 0 {
            return Err(DrqnError::invalid_parameter("stride", "must be positive"));
        }
        let fan_in = in_channels * kernel_size.0 * kernel_size.1;
        let fan_out = out_channels * kernel_size.0 * kernel_size.1;

        let kernels = WeightInit::for_activation(&activation).initialize(
            (out_channels, in_channels, kernel_size.0, kernel_size.1),
            fan_in,
            fan_out,
            rng,
        )?;

        Ok(Conv2DLayer {
            kernels,
            biases: Array1::zeros(out_channels),
            activation,
            stride,
            padding,
            in_channels,
            out_channels,
            kernel_size,
            cached_input: None,
            cached_pre_activation: None,
        })
    }

    /// Spatial size of the output map for an input of `height x width`.
    pub fn output_dims(&self, height: usize, width: usize) -> Result<(usize, usize)> {
        let padded_h = height + 2 * self.padding.0;
        let padded_w = width + 2 * self.padding.1;
        if padded_h < self.kernel_size.0 || padded_w < self.kernel_size.1 {
            return Err(DrqnError::dimension_mismatch(
                format!("input of at least {:?}", self.kernel_size),
                format!("{}x{} (padding {:?})", height, width, self.padding),
            ));
        }
        Ok((
            (padded_h - self.kernel_size.0) / self.stride.0 + 1,
            (padded_w - self.kernel_size.1) / self.stride.1 + 1,
        ))
    }

    /// Number of values in one unrolled receptive field.
    fn patch_len(&self) -> usize {
        self.in_channels * self.kernel_size.0 * self.kernel_size.1
    }

    /// Unroll receptive fields of one frame into `[patch_len, out_h * out_w]`.
    /// Positions falling into the zero padding stay zero.
    fn im2col(&self, image: ArrayView3<f32>, out_h: usize, out_w: usize) -> Array2<f32> {
        let (_, height, width) = image.dim();
        let (kh, kw) = self.kernel_size;
        let mut cols = Array2::zeros((self.patch_len(), out_h * out_w));

        for ic in 0..self.in_channels {
            for ki in 0..kh {
                for kj in 0..kw {
                    let row = (ic * kh + ki) * kw + kj;
                    for oy in 0..out_h {
                        let y = (oy * self.stride.0 + ki) as isize - self.padding.0 as isize;
                        if y < 0 || y >= height as isize {
                            continue;
                        }
                        for ox in 0..out_w {
                            let x = (ox * self.stride.1 + kj) as isize - self.padding.1 as isize;
                            if x < 0 || x >= width as isize {
                                continue;
                            }
                            cols[[row, oy * out_w + ox]] = image[[ic, y as usize, x as usize]];
                        }
                    }
                }
            }
        }

        cols
    }

    /// Scatter-add unrolled patches back onto a frame (adjoint of `im2col`).
    fn col2im(&self, cols: ArrayView2<f32>, height: usize, width: usize, out_h: usize, out_w: usize) -> Array3<f32> {
        let (kh, kw) = self.kernel_size;
        let mut image = Array3::zeros((self.in_channels, height, width));

        for ic in 0..self.in_channels {
            for ki in 0..kh {
                for kj in 0..kw {
                    let row = (ic * kh + ki) * kw + kj;
                    for oy in 0..out_h {
                        let y = (oy * self.stride.0 + ki) as isize - self.padding.0 as isize;
                        if y < 0 || y >= height as isize {
                            continue;
                        }
                        for ox in 0..out_w {
                            let x = (ox * self.stride.1 + kj) as isize - self.padding.1 as isize;
                            if x < 0 || x >= width as isize {
                                continue;
                            }
                            image[[ic, y as usize, x as usize]] += cols[[row, oy * out_w + ox]];
                        }
                    }
                }
            }
        }

        image
    }

    fn kernel_matrix(&self) -> Result<ArrayView2<'_, f32>> {
        Ok(self.kernels.view().into_shape((self.out_channels, self.patch_len()))?)
    }

    /// Forward pass for batch of images [batch, channels, height, width]
    pub fn forward_batch(&mut self, input: ArrayView4<f32>) -> Result<Array4<f32>> {
        let (batch_size, channels, height, width) = input.dim();
        if channels != self.in_channels {
            return Err(DrqnError::dimension_mismatch(
                format!("{} input channels", self.in_channels),
                format!("{}", channels),
            ));
        }
        let (out_h, out_w) = self.output_dims(height, width)?;

        let kernel_matrix = self.kernel_matrix()?;
        let bias_column = self.biases.view().insert_axis(Axis(1));
        let maps: Vec<Array2<f32>> = input
            .axis_iter(Axis(0))
            .into_par_iter()
            .map(|image| {
                let cols = self.im2col(image, out_h, out_w);
                kernel_matrix.dot(&cols) + &bias_column
            })
            .collect();

        let mut pre_activation = Array4::zeros((batch_size, self.out_channels, out_h, out_w));
        for (i, map) in maps.into_iter().enumerate() {
            pre_activation
                .index_axis_mut(Axis(0), i)
                .assign(&map.into_shape((self.out_channels, out_h, out_w))?);
        }

        let mut output = pre_activation.clone();
        self.activation.apply(&mut output);

        self.cached_input = Some(input.to_owned());
        self.cached_pre_activation = Some(pre_activation);
        Ok(output)
    }

    /// Backward pass for the batch seen by the last forward call.
    ///
    /// The input gradient is only computed when `need_input_grad` is set; the
    /// first layer of a network never needs it.
    pub fn backward_batch(&self, output_gradient: ArrayView4<f32>, need_input_grad: bool) -> Result<ConvGradients> {
        let (input, pre_activation) = match (&self.cached_input, &self.cached_pre_activation) {
            (Some(input), Some(pre)) => (input, pre),
            _ => {
                return Err(DrqnError::NumericalError(
                    "forward_batch() must be called before backward_batch()".to_string(),
                ))
            }
        };
        if output_gradient.dim() != pre_activation.dim() {
            return Err(DrqnError::dimension_mismatch(
                format!("{:?}", pre_activation.dim()),
                format!("{:?}", output_gradient.dim()),
            ));
        }

        let (_, _, height, width) = input.dim();
        let (_, _, out_h, out_w) = pre_activation.dim();

        // Apply activation derivative
        let grad = &output_gradient * &self.activation.derivative(pre_activation.view());

        let kernel_matrix = self.kernel_matrix()?;
        let per_image: Vec<(Array2<f32>, Array1<f32>, Option<Array3<f32>>)> = input
            .axis_iter(Axis(0))
            .into_par_iter()
            .zip(grad.axis_iter(Axis(0)))
            .map(|(image, g)| -> Result<_> {
                let g = g.to_owned().into_shape((self.out_channels, out_h * out_w))?;
                let cols = self.im2col(image, out_h, out_w);
                let kernel_grad = g.dot(&cols.t());
                let bias_grad = g.sum_axis(Axis(1));
                let input_grad = if need_input_grad {
                    let col_grad = kernel_matrix.t().dot(&g);
                    Some(self.col2im(col_grad.view(), height, width, out_h, out_w))
                } else {
                    None
                };
                Ok((kernel_grad, bias_grad, input_grad))
            })
            .collect::<Result<_>>()?;

        let mut kernel_grads = Array2::<f32>::zeros((self.out_channels, self.patch_len()));
        let mut bias_grads = Array1::<f32>::zeros(self.out_channels);
        let mut input_grads = if need_input_grad {
            Some(Array4::zeros(input.dim()))
        } else {
            None
        };

        for (i, (kernel_grad, bias_grad, input_grad)) in per_image.into_iter().enumerate() {
            kernel_grads += &kernel_grad;
            bias_grads += &bias_grad;
            if let (Some(all), Some(one)) = (input_grads.as_mut(), input_grad) {
                all.index_axis_mut(Axis(0), i).assign(&one);
            }
        }

        Ok(ConvGradients {
            input: input_grads,
            kernels: kernel_grads.into_shape(self.kernels.dim())?,
            biases: bias_grads,
        })
    }
}
