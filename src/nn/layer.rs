//! Graph Convolution Layer
//!
//! output = dropout(activation(Â · input · W + b)), where Â is the
//! normalized propagation operator of the graph.

use ndarray::{Array1, Array2, Axis};
use ndarray_rand::rand_distr::Uniform;
use ndarray_rand::RandomExt;
use rand::Rng;

use super::activation::{create_activation, ActivationType};
use crate::error::{Error, Result};
use crate::tensor::Propagation;

/// Gradients of one layer's parameters and of its input
#[derive(Debug, Clone)]
pub struct LayerGradients {
    pub input: Array2<f64>,
    pub weights: Array2<f64>,
    pub biases: Array1<f64>,
}

/// Graph convolution with weights, biases, activation and dropout
#[derive(Debug)]
pub struct GraphConvLayer {
    /// Weight matrix (input_size x output_size)
    pub weights: Array2<f64>,
    /// Bias vector (output_size)
    pub biases: Array1<f64>,
    /// Activation function type
    pub activation_type: ActivationType,
    /// Input size
    pub input_size: usize,
    /// Output size
    pub output_size: usize,
    /// Dropout rate (0.0 = no dropout)
    pub dropout_rate: f64,

    // Cached values for backpropagation, only filled by training passes
    last_input: Option<Array2<f64>>,
    last_z: Option<Array2<f64>>,
    dropout_mask: Option<Array2<f64>>,
}

impl GraphConvLayer {
    /// Create a new layer with Glorot-uniform weights and zero bias
    pub fn new<R: Rng>(
        input_size: usize,
        output_size: usize,
        activation: ActivationType,
        rng: &mut R,
    ) -> Self {
        let limit = (6.0 / (input_size + output_size) as f64).sqrt();
        let weights = Array2::random_using(
            (input_size, output_size),
            Uniform::new(-limit, limit),
            rng,
        );
        let biases = Array1::zeros(output_size);

        Self {
            weights,
            biases,
            activation_type: activation,
            input_size,
            output_size,
            dropout_rate: 0.0,
            last_input: None,
            last_z: None,
            dropout_mask: None,
        }
    }

    /// Create layer with specific dropout rate
    pub fn with_dropout(mut self, rate: f64) -> Self {
        self.dropout_rate = rate.clamp(0.0, 1.0);
        self
    }

    /// Forward pass over every node of the graph.
    ///
    /// With `training` set, dropout is applied and the intermediate values
    /// are cached for [`GraphConvLayer::backward`]; otherwise dropout is the
    /// identity and nothing is cached.
    pub fn forward<R: Rng>(
        &mut self,
        input: &Array2<f64>,
        propagation: &Propagation,
        training: bool,
        rng: &mut R,
    ) -> Array2<f64> {
        let transformed = input.dot(&self.weights);
        let mut z = propagation.forward(&transformed.view());
        z += &self.biases;

        let activation = create_activation(self.activation_type);
        let mut output = activation.forward_batch(&z);

        if training {
            if self.dropout_rate > 0.0 {
                let scale = 1.0 / (1.0 - self.dropout_rate);
                let mask = Array2::from_shape_fn(output.dim(), |_| {
                    if rng.gen::<f64>() >= self.dropout_rate {
                        scale
                    } else {
                        0.0
                    }
                });
                output = &output * &mask;
                self.dropout_mask = Some(mask);
            } else {
                self.dropout_mask = None;
            }
            self.last_input = Some(input.clone());
            self.last_z = Some(z);
        }

        output
    }

    /// Backward pass from the gradient of this layer's output.
    pub fn backward(
        &self,
        output_gradient: &Array2<f64>,
        propagation: &Propagation,
    ) -> Result<LayerGradients> {
        let (input, z) = match (&self.last_input, &self.last_z) {
            (Some(input), Some(z)) => (input, z),
            _ => {
                return Err(Error::ModelState(
                    "backward called without a training forward pass".into(),
                ))
            }
        };

        let grad = match &self.dropout_mask {
            Some(mask) => output_gradient * mask,
            None => output_gradient.clone(),
        };

        let activation = create_activation(self.activation_type);
        let delta = &grad * &activation.backward_batch(z);

        let bias_gradient = delta.sum_axis(Axis(0));

        // Gradient w.r.t. (input · W) before propagation
        let transformed_grad = propagation.backward(&delta.view());
        let weight_gradient = input.t().dot(&transformed_grad);
        let input_gradient = transformed_grad.dot(&self.weights.t());

        Ok(LayerGradients {
            input: input_gradient,
            weights: weight_gradient,
            biases: bias_gradient,
        })
    }

    /// Drop cached activations from the last training pass
    pub fn clear_cache(&mut self) {
        self.last_input = None;
        self.last_z = None;
        self.dropout_mask = None;
    }

    /// Get number of parameters
    pub fn num_parameters(&self) -> usize {
        self.weights.len() + self.biases.len()
    }
}
