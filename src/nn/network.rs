//! Fraud detection GCN
//!
//! Three graph convolutions: features → hidden → hidden → 2 classes
//! (clean, fraud), with ReLU and dropout after the first two and a row-wise
//! log-softmax on the output.

use ndarray::Array2;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::debug;

use super::activation::{log_softmax, log_softmax_backward, ActivationType};
use super::layer::{GraphConvLayer, LayerGradients};
use super::optimizer::Optimizer;
use crate::config::{ModelConfig, NUM_CLASSES};
use crate::error::{Error, Result};
use crate::tensor::Propagation;

/// Regime the model runs in. Only dropout depends on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Train,
    Eval,
}

/// Three-layer graph convolutional network producing per-node
/// log-probabilities over {clean, fraud}.
#[derive(Debug)]
pub struct FraudGcn {
    pub layers: Vec<GraphConvLayer>,
    pub config: ModelConfig,
    mode: Mode,
    rng: StdRng,
    last_log_probs: Option<Array2<f64>>,
}

impl FraudGcn {
    /// Build a freshly initialized model.
    ///
    /// A seed makes weight initialization and every dropout mask
    /// reproducible; without one the generator is seeded from the OS.
    pub fn new(config: &ModelConfig, seed: Option<u64>) -> Self {
        let mut rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let layers = vec![
            GraphConvLayer::new(
                config.num_features,
                config.hidden_dim,
                ActivationType::ReLU,
                &mut rng,
            )
            .with_dropout(config.dropout),
            GraphConvLayer::new(
                config.hidden_dim,
                config.hidden_dim,
                ActivationType::ReLU,
                &mut rng,
            )
            .with_dropout(config.dropout),
            GraphConvLayer::new(
                config.hidden_dim,
                NUM_CLASSES,
                ActivationType::Linear,
                &mut rng,
            ),
        ];

        Self {
            layers,
            config: config.clone(),
            mode: Mode::Train,
            rng,
            last_log_probs: None,
        }
    }

    /// Switch to training mode (dropout active, activations cached).
    pub fn train(&mut self) {
        self.mode = Mode::Train;
    }

    /// Switch to evaluation mode (dropout disabled, nothing cached).
    pub fn eval(&mut self) {
        self.mode = Mode::Eval;
        self.zero_grad();
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Discard everything cached by the previous training pass.
    pub fn zero_grad(&mut self) {
        for layer in &mut self.layers {
            layer.clear_cache();
        }
        self.last_log_probs = None;
    }

    /// Forward pass over the whole graph, returning `[num_nodes, 2]`
    /// log-probabilities.
    pub fn forward(
        &mut self,
        features: &Array2<f64>,
        propagation: &Propagation,
    ) -> Result<Array2<f64>> {
        if features.ncols() != self.config.num_features {
            return Err(Error::ShapeMismatch(format!(
                "model expects {} features per node, got {}",
                self.config.num_features,
                features.ncols()
            )));
        }
        if features.nrows() != propagation.num_nodes() {
            return Err(Error::ShapeMismatch(format!(
                "feature matrix has {} rows but the graph has {} nodes",
                features.nrows(),
                propagation.num_nodes()
            )));
        }

        let training = self.mode == Mode::Train;
        let mut output = features.clone();
        for layer in &mut self.layers {
            output = layer.forward(&output, propagation, training, &mut self.rng);
        }

        let log_probs = log_softmax(&output);
        if training {
            self.last_log_probs = Some(log_probs.clone());
        }
        Ok(log_probs)
    }

    /// Backpropagate the gradient of the loss w.r.t. the log-probabilities.
    ///
    /// Returns one [`LayerGradients`] per layer, in layer order.
    pub fn backward(
        &self,
        grad_log_probs: &Array2<f64>,
        propagation: &Propagation,
    ) -> Result<Vec<LayerGradients>> {
        let log_probs = self.last_log_probs.as_ref().ok_or_else(|| {
            Error::ModelState("backward called without a training forward pass".into())
        })?;
        if log_probs.dim() != grad_log_probs.dim() {
            return Err(Error::ShapeMismatch(format!(
                "gradient shape {:?} does not match output shape {:?}",
                grad_log_probs.dim(),
                log_probs.dim()
            )));
        }

        let mut gradient = log_softmax_backward(log_probs, grad_log_probs);
        let mut all = Vec::with_capacity(self.layers.len());
        for layer in self.layers.iter().rev() {
            let grads = layer.backward(&gradient, propagation)?;
            gradient = grads.input.clone();
            all.push(grads);
        }
        all.reverse();
        Ok(all)
    }

    /// Apply one optimizer step per layer.
    pub fn apply_gradients(
        &mut self,
        gradients: &[LayerGradients],
        optimizers: &mut [Box<dyn Optimizer>],
    ) -> Result<()> {
        if gradients.len() != self.layers.len() || optimizers.len() != self.layers.len() {
            return Err(Error::ShapeMismatch(format!(
                "{} layers, {} gradients, {} optimizers",
                self.layers.len(),
                gradients.len(),
                optimizers.len()
            )));
        }

        for ((layer, grads), optimizer) in self
            .layers
            .iter_mut()
            .zip(gradients)
            .zip(optimizers.iter_mut())
        {
            optimizer.update_weights(&mut layer.weights, &grads.weights);
            optimizer.update_biases(&mut layer.biases, &grads.biases);
        }
        Ok(())
    }

    /// Get total number of parameters
    pub fn num_parameters(&self) -> usize {
        self.layers.iter().map(|l| l.num_parameters()).sum()
    }

    /// Log a layer-by-layer summary at debug level
    pub fn summary(&self) {
        for (i, layer) in self.layers.iter().enumerate() {
            debug!(
                "Layer {}: {} -> {} ({:?}, dropout {}), params: {}",
                i + 1,
                layer.input_size,
                layer.output_size,
                layer.activation_type,
                layer.dropout_rate,
                layer.num_parameters()
            );
        }
        debug!("Total parameters: {}", self.num_parameters());
    }
}
