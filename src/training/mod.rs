//! Training loop.
//!
//! Full-graph training for a fixed number of epochs: every epoch runs one
//! forward pass over all nodes, scores only the labeled ones, and takes one
//! Adam step per layer. There is no early stopping.

mod loss;

pub use loss::{masked_nll_gradient, masked_nll_loss};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::TrainingConfig;
use crate::error::{Error, Result};
use crate::nn::{Adam, FraudGcn, Optimizer};
use crate::tensor::{GraphTensors, Propagation};

/// Loss recorded after every epoch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainingHistory {
    pub losses: Vec<f64>,
}

impl TrainingHistory {
    pub fn epochs(&self) -> usize {
        self.losses.len()
    }

    pub fn initial_loss(&self) -> Option<f64> {
        self.losses.first().copied()
    }

    pub fn final_loss(&self) -> Option<f64> {
        self.losses.last().copied()
    }

    /// Relative loss reduction from the first to the last epoch.
    pub fn improvement(&self) -> Option<f64> {
        match (self.initial_loss(), self.final_loss()) {
            (Some(first), Some(last)) if first > 0.0 => Some((first - last) / first),
            _ => None,
        }
    }
}

/// Runs the masked training loop with injected hyperparameters.
#[derive(Debug, Clone)]
pub struct Trainer {
    config: TrainingConfig,
}

impl Trainer {
    pub fn new(config: &TrainingConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    /// One fresh Adam optimizer per model layer.
    pub fn optimizers_for(&self, model: &FraudGcn) -> Vec<Box<dyn Optimizer>> {
        let adam = Adam::new(self.config.learning_rate);
        model.layers.iter().map(|_| adam.clone_box()).collect()
    }

    /// Train `model` on `data` with freshly created optimizers.
    pub fn train(&self, model: &mut FraudGcn, data: &GraphTensors) -> Result<TrainingHistory> {
        let propagation = data.propagation();
        let mut optimizers = self.optimizers_for(model);
        self.train_with(model, data, &propagation, &mut optimizers)
    }

    /// Train with caller-owned propagation operator and optimizer state.
    ///
    /// Fails with [`Error::EmptySupervision`] before the first epoch when no
    /// node is labeled, and with [`Error::NumericalInstability`] as soon as
    /// the loss stops being finite.
    pub fn train_with(
        &self,
        model: &mut FraudGcn,
        data: &GraphTensors,
        propagation: &Propagation,
        optimizers: &mut [Box<dyn Optimizer>],
    ) -> Result<TrainingHistory> {
        let labeled = data.num_labeled();
        if labeled == 0 {
            return Err(Error::EmptySupervision);
        }

        info!(
            "Training GCN: {} nodes ({} labeled), {} edges, {} epochs, lr={}",
            data.num_nodes(),
            labeled,
            data.num_edges(),
            self.config.epochs,
            self.config.learning_rate
        );
        model.summary();

        let mut history = TrainingHistory {
            losses: Vec::with_capacity(self.config.epochs),
        };

        for epoch in 0..self.config.epochs {
            model.train();
            model.zero_grad();

            let log_probs = model.forward(&data.features, propagation)?;
            let loss = masked_nll_loss(&log_probs, &data.labels, &data.train_mask)?;
            if !loss.is_finite() {
                return Err(Error::NumericalInstability { epoch });
            }

            let grad = masked_nll_gradient(&log_probs, &data.labels, &data.train_mask)?;
            let gradients = model.backward(&grad, propagation)?;
            model.apply_gradients(&gradients, optimizers)?;

            history.losses.push(loss);
            debug!("epoch {}: loss = {:.6}", epoch, loss);
            if self.config.log_every > 0 && epoch % self.config.log_every == 0 {
                info!("Epoch {}: {:.4}", epoch, loss);
            }
        }

        if let (Some(first), Some(last)) = (history.initial_loss(), history.final_loss()) {
            info!("Training complete: loss {:.4} -> {:.4}", first, last);
        }
        Ok(history)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{LabelingConfig, ModelConfig};
    use crate::graph::{Edge, Graph, Node, NodeFeatures};
    use crate::labeling::LabelingPolicy;

    fn node(id: &str, micro_score: f64, degree: f64) -> Node {
        Node::new(
            id,
            NodeFeatures {
                degree,
                in_degree: degree / 2.0,
                out_degree: degree / 2.0,
                pagerank: 0.1 + micro_score / 10.0,
                tx_entropy: micro_score * 2.0,
                micro_score,
            },
        )
    }

    fn tensors(threshold: f64) -> GraphTensors {
        let graph = Graph::new(
            vec![
                node("f1", 0.95, 4.0),
                node("f2", 0.90, 6.0),
                node("c1", 0.05, 1.0),
                node("c2", 0.10, 2.0),
                node("u1", 0.60, 3.0),
            ],
            vec![
                Edge::new("f1", "f2"),
                Edge::new("f2", "u1"),
                Edge::new("c1", "c2"),
                Edge::new("u1", "c2"),
            ],
            threshold,
        )
        .unwrap();
        let partition = LabelingPolicy::new(&LabelingConfig {
            manual_fraud: Vec::new(),
            ..LabelingConfig::default()
        })
        .label(&graph, threshold);
        GraphTensors::from_graph(&graph, &partition)
    }

    fn config(epochs: usize) -> TrainingConfig {
        TrainingConfig {
            epochs,
            seed: Some(11),
            ..TrainingConfig::default()
        }
    }

    #[test]
    fn test_runs_every_epoch() {
        let data = tensors(0.5);
        let mut model = FraudGcn::new(&ModelConfig::default(), Some(11));
        let history = Trainer::new(&config(100)).train(&mut model, &data).unwrap();

        assert_eq!(history.epochs(), 100);
        assert!(history.losses.iter().all(|l| l.is_finite() && *l >= 0.0));
    }

    #[test]
    fn test_loss_decreases_without_dropout() {
        let data = tensors(0.5);
        let model_config = ModelConfig {
            dropout: 0.0,
            ..ModelConfig::default()
        };
        let mut model = FraudGcn::new(&model_config, Some(5));
        let history = Trainer::new(&config(100)).train(&mut model, &data).unwrap();

        assert!(history.final_loss().unwrap() < history.initial_loss().unwrap());
        assert!(history.improvement().unwrap() > 0.0);
    }

    #[test]
    fn test_empty_supervision_fails_before_training() {
        // threshold 0.7: fraud_cut 1.12, clean_cut 0.56 but every node has degree > 2
        let graph = Graph::new(
            vec![node("a", 0.3, 5.0), node("b", 0.9, 3.0)],
            vec![Edge::new("a", "b")],
            0.7,
        )
        .unwrap();
        let partition = LabelingPolicy::new(&LabelingConfig {
            manual_fraud: Vec::new(),
            ..LabelingConfig::default()
        })
        .label(&graph, 0.7);
        let data = GraphTensors::from_graph(&graph, &partition);

        let mut model = FraudGcn::new(&ModelConfig::default(), Some(0));
        let result = Trainer::new(&config(100)).train(&mut model, &data);
        assert!(matches!(result, Err(Error::EmptySupervision)));
    }

    #[test]
    fn test_history_diagnostics() {
        let history = TrainingHistory {
            losses: vec![0.8, 0.6, 0.4],
        };
        assert_eq!(history.initial_loss(), Some(0.8));
        assert_eq!(history.final_loss(), Some(0.4));
        assert!((history.improvement().unwrap() - 0.5).abs() < 1e-12);
        assert_eq!(TrainingHistory::default().improvement(), None);
    }
}
