//! Building blocks of the recurrent Q-network.
//!
//! Layers cache what their backward pass needs during `forward_*` and
//! return gradients as plain values; applying them is the optimizer's job.

pub mod conv;
pub mod dense;
pub mod initialization;
pub mod lstm;

pub use conv::{Conv2DLayer, ConvGradients};
pub use dense::{DenseGradients, DenseLayer};
pub use initialization::WeightInit;
pub use lstm::{LSTMGradients, LSTMLayer, RecurrentState};
