//! Adam optimizer
//!
//! Each layer owns one [`Adam`], which keeps the first and second moment
//! estimates for that layer's weight matrix and bias vector.

use ndarray::{Array, Array1, Array2, Dimension, Ix1, Ix2, Zip};

/// Parameter update rule applied once per layer per epoch.
pub trait Optimizer: Send + Sync {
    /// Update the weight matrix. Each call advances the step count.
    fn update_weights(&mut self, weights: &mut Array2<f64>, gradients: &Array2<f64>);

    /// Update the bias vector at the step count of the last weight update.
    fn update_biases(&mut self, biases: &mut Array1<f64>, gradients: &Array1<f64>);

    fn clone_box(&self) -> Box<dyn Optimizer>;
}

#[derive(Debug, Clone, Copy)]
struct Hyperparameters {
    learning_rate: f64,
    beta1: f64,
    beta2: f64,
    epsilon: f64,
}

/// Running moment estimates of one parameter tensor.
#[derive(Debug, Clone)]
struct Moments<D: Dimension> {
    mean: Array<f64, D>,
    variance: Array<f64, D>,
}

impl<D: Dimension> Moments<D> {
    fn zeros(dim: D) -> Self {
        Self {
            mean: Array::zeros(dim.clone()),
            variance: Array::zeros(dim),
        }
    }

    fn apply(
        &mut self,
        param: &mut Array<f64, D>,
        grad: &Array<f64, D>,
        hp: Hyperparameters,
        step: usize,
    ) {
        let t = step.max(1) as i32;
        let mean_correction = 1.0 - hp.beta1.powi(t);
        let variance_correction = 1.0 - hp.beta2.powi(t);

        Zip::from(param)
            .and(&mut self.mean)
            .and(&mut self.variance)
            .and(grad)
            .for_each(|p, m, v, &g| {
                *m = hp.beta1 * *m + (1.0 - hp.beta1) * g;
                *v = hp.beta2 * *v + (1.0 - hp.beta2) * g * g;
                let m_hat = *m / mean_correction;
                let v_hat = *v / variance_correction;
                *p -= hp.learning_rate * m_hat / (v_hat.sqrt() + hp.epsilon);
            });
    }
}

/// Bias-corrected Adam with betas (0.9, 0.999) and epsilon 1e-8.
#[derive(Debug, Clone)]
pub struct Adam {
    hp: Hyperparameters,
    step: usize,
    weights: Option<Moments<Ix2>>,
    biases: Option<Moments<Ix1>>,
}

impl Adam {
    pub fn new(learning_rate: f64) -> Self {
        Self {
            hp: Hyperparameters {
                learning_rate,
                beta1: 0.9,
                beta2: 0.999,
                epsilon: 1e-8,
            },
            step: 0,
            weights: None,
            biases: None,
        }
    }

    /// Number of weight updates applied so far
    pub fn steps(&self) -> usize {
        self.step
    }
}

impl Optimizer for Adam {
    fn update_weights(&mut self, weights: &mut Array2<f64>, gradients: &Array2<f64>) {
        self.step += 1;
        let (hp, step) = (self.hp, self.step);
        self.weights
            .get_or_insert_with(|| Moments::zeros(weights.raw_dim()))
            .apply(weights, gradients, hp, step);
    }

    fn update_biases(&mut self, biases: &mut Array1<f64>, gradients: &Array1<f64>) {
        let (hp, step) = (self.hp, self.step);
        self.biases
            .get_or_insert_with(|| Moments::zeros(biases.raw_dim()))
            .apply(biases, gradients, hp, step);
    }

    fn clone_box(&self) -> Box<dyn Optimizer> {
        Box::new(self.clone())
    }
}
