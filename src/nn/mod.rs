//! Neural Network Module
//!
//! Building blocks for the graph convolutional network:
//! - Activation functions (ReLU, Linear) and log-softmax
//! - Graph convolution layers with forward and backward propagation
//! - Adam optimizer
//! - The three-layer fraud detection network

pub mod activation;
pub mod layer;
pub mod network;
pub mod optimizer;

pub use activation::{log_softmax, ActivationType};
pub use layer::{GraphConvLayer, LayerGradients};
pub use network::{FraudGcn, Mode};
pub use optimizer::{Adam, Optimizer};
