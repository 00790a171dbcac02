//! Activation Functions
//!
//! Element-wise activations with their derivatives, plus the row-wise
//! log-softmax that turns class scores into log-probabilities.

use ndarray::{Array2, Axis};
use serde::{Deserialize, Serialize};

/// Types of activation functions available
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ActivationType {
    /// Rectified Linear Unit: max(0, x)
    ReLU,
    /// Linear (identity): x
    Linear,
}

/// Activation function trait with forward and backward passes
pub trait Activation: Send + Sync {
    /// Apply to 2D array (one row per node)
    fn forward_batch(&self, x: &Array2<f64>) -> Array2<f64>;

    /// Derivative evaluated at the pre-activation values
    fn backward_batch(&self, x: &Array2<f64>) -> Array2<f64>;
}

/// ReLU activation function
pub struct ReLU;

impl Activation for ReLU {
    fn forward_batch(&self, x: &Array2<f64>) -> Array2<f64> {
        x.mapv(|v| v.max(0.0))
    }

    fn backward_batch(&self, x: &Array2<f64>) -> Array2<f64> {
        x.mapv(|v| if v > 0.0 { 1.0 } else { 0.0 })
    }
}

/// Linear (identity) activation function
pub struct Linear;

impl Activation for Linear {
    fn forward_batch(&self, x: &Array2<f64>) -> Array2<f64> {
        x.clone()
    }

    fn backward_batch(&self, x: &Array2<f64>) -> Array2<f64> {
        Array2::ones(x.dim())
    }
}

/// Create an activation function from type
pub fn create_activation(activation_type: ActivationType) -> Box<dyn Activation> {
    match activation_type {
        ActivationType::ReLU => Box::new(ReLU),
        ActivationType::Linear => Box::new(Linear),
    }
}

/// Row-wise log-softmax, shifted by the row max for stability.
pub fn log_softmax(x: &Array2<f64>) -> Array2<f64> {
    let mut out = x.clone();
    for mut row in out.axis_iter_mut(Axis(0)) {
        let max = row.fold(f64::NEG_INFINITY, |m, &v| m.max(v));
        let log_sum = row.mapv(|v| (v - max).exp()).sum().ln() + max;
        row.mapv_inplace(|v| v - log_sum);
    }
    out
}

/// Gradient through [`log_softmax`]: `g - softmax * rowsum(g)`.
pub fn log_softmax_backward(log_probs: &Array2<f64>, grad: &Array2<f64>) -> Array2<f64> {
    let probs = log_probs.mapv(f64::exp);
    let row_sums = grad.sum_axis(Axis(1)).insert_axis(Axis(1));
    grad - &(&probs * &row_sums)
}
