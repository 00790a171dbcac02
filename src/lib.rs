//! # GCN Fraud Detection
//!
//! Semi-supervised fraud scoring for transaction graphs. Addresses carry a
//! precomputed micro-score; a hybrid manual/threshold policy turns it into
//! hard labels for the confident nodes, and a three-layer graph
//! convolutional network trained on those labels scores every address.
//!
//! ## Modules
//!
//! - `graph` - Typed graph built from the JSON request payload
//! - `labeling` - Weak-supervision labeling policy and label partition
//! - `tensor` - Feature matrix, edge index, labels and normalized propagation
//! - `nn` - Graph convolution layers, activations, Adam and the GCN model
//! - `training` - Masked NLL loss and the fixed-epoch training loop
//! - `inference` - Thresholding, per-node reports and the response envelope
//! - `pipeline` - Request-scoped analysis context
//! - `config` - Injected hyperparameters
//! - `error` - Error types

pub mod config;
pub mod error;
pub mod graph;
pub mod inference;
pub mod labeling;
pub mod nn;
pub mod pipeline;
pub mod tensor;
pub mod training;

pub use config::Config;
pub use error::{Error, Result};
pub use graph::{Edge, Graph, GraphPayload, Node, NodeFeatures};
pub use inference::{AnalysisResponse, FraudReport, NodeReport, Prediction, Summary};
pub use labeling::{LabelPartition, LabelingPolicy, NodeLabel};
pub use nn::FraudGcn;
pub use pipeline::{analyze, analyze_json, handle_request, Analysis, AnalysisContext};
pub use tensor::GraphTensors;
pub use training::{Trainer, TrainingHistory};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
