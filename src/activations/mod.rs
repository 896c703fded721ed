//! # Activation Functions Module
//!
//! Non-linearities used by the convolution stack and the dense projection of
//! the recurrent Q-network. The LSTM gates use their own fixed sigmoid/tanh
//! and the dueling heads are always linear.
//!
//! ## Available Activations
//!
//! - **ReLU**: `max(0, x)`, the default for hidden layers
//! - **LeakyReLU**: ReLU with a small negative slope
//! - **Sigmoid** and **Tanh**
//! - **Linear**: identity
//!
//! ```rust
//! use leaf_drqn::activations::Activation;
//! use ndarray::array;
//!
//! let mut data = array![1.0, -0.5, 0.0, 2.0];
//! Activation::Relu.apply(&mut data);
//! assert_eq!(data, array![1.0, 0.0, 0.0, 2.0]);
//! ```

pub mod functions;

pub use functions::Activation;
