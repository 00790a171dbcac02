//! Inference and result aggregation.
//!
//! Runs the trained model once in evaluation mode, thresholds the fraud
//! probability, and merges it with the micro-score and label provenance
//! into the per-node report and summary returned to the caller.

use ndarray::Array1;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::InferenceConfig;
use crate::error::{Error, Result};
use crate::graph::Graph;
use crate::labeling::{LabelPartition, NodeLabel};
use crate::nn::FraudGcn;
use crate::tensor::{GraphTensors, Propagation};

/// Predicted class of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Prediction {
    Fraud,
    Clean,
}

impl Prediction {
    /// FRAUD iff `probability > threshold`; a tie is CLEAN.
    pub fn from_probability(probability: f64, threshold: f64) -> Self {
        if probability > threshold {
            Prediction::Fraud
        } else {
            Prediction::Clean
        }
    }
}

/// One row of the response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeReport {
    pub address: String,
    pub micro_score: f64,
    pub gcn_probability: f64,
    pub prediction: Prediction,
    pub label: NodeLabel,
}

/// Aggregate counts over all nodes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub total_nodes: usize,
    pub fraud_predicted: usize,
    pub clean_predicted: usize,
    pub labeled_fraud: usize,
    pub labeled_clean: usize,
    pub unknown: usize,
}

impl Summary {
    /// Both count identities hold.
    pub fn reconciles(&self) -> bool {
        self.fraud_predicted + self.clean_predicted == self.total_nodes
            && self.labeled_fraud + self.labeled_clean + self.unknown == self.total_nodes
    }
}

/// Per-node results plus summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FraudReport {
    pub results: Vec<NodeReport>,
    pub summary: Summary,
}

impl FraudReport {
    /// Merge probabilities with the graph and its partition.
    ///
    /// Re-verifies the partition and the summary identities; any violation is
    /// reported as an error instead of a response.
    pub fn aggregate(
        graph: &Graph,
        partition: &LabelPartition,
        tensors: &GraphTensors,
        probabilities: &Array1<f64>,
        config: &InferenceConfig,
    ) -> Result<Self> {
        partition.verify(graph)?;
        if probabilities.len() != graph.node_count() {
            return Err(Error::ShapeMismatch(format!(
                "{} probabilities for {} nodes",
                probabilities.len(),
                graph.node_count()
            )));
        }

        let mut results = Vec::with_capacity(graph.node_count());
        for node in &graph.nodes {
            let index = tensors.node_index.index_of(&node.id).ok_or_else(|| {
                Error::PartitionViolation(format!("node '{}' has no tensor index", node.id))
            })?;
            let probability = probabilities[index];
            results.push(NodeReport {
                address: node.id.clone(),
                micro_score: node.features.micro_score,
                gcn_probability: probability,
                prediction: Prediction::from_probability(probability, config.decision_threshold),
                label: partition.label_of(&node.id),
            });
        }

        let fraud_predicted = results
            .iter()
            .filter(|r| r.prediction == Prediction::Fraud)
            .count();
        let summary = Summary {
            total_nodes: results.len(),
            fraud_predicted,
            clean_predicted: results.len() - fraud_predicted,
            labeled_fraud: partition.fraud().len(),
            labeled_clean: partition.clean().len(),
            unknown: partition.unknown().len(),
        };
        if !summary.reconciles() {
            return Err(Error::PartitionViolation(format!(
                "summary counts do not reconcile: {:?}",
                summary
            )));
        }

        info!(
            "Predictions: {} fraud, {} clean of {} nodes",
            summary.fraud_predicted, summary.clean_predicted, summary.total_nodes
        );
        Ok(Self { results, summary })
    }
}

/// Fraud-class probability of every node, from one evaluation-mode pass.
pub fn predict(
    model: &mut FraudGcn,
    tensors: &GraphTensors,
    propagation: &Propagation,
) -> Result<Array1<f64>> {
    model.eval();
    let log_probs = model.forward(&tensors.features, propagation)?;
    Ok(log_probs.column(1).mapv(f64::exp))
}

/// JSON envelope handed back to the request layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnalysisResponse {
    Success {
        success: bool,
        results: Vec<NodeReport>,
        summary: Summary,
    },
    Failure {
        success: bool,
        error: String,
    },
}

impl AnalysisResponse {
    pub fn success(report: FraudReport) -> Self {
        AnalysisResponse::Success {
            success: true,
            results: report.results,
            summary: report.summary,
        }
    }

    pub fn failure(error: &Error) -> Self {
        AnalysisResponse::Failure {
            success: false,
            error: error.to_string(),
        }
    }

    pub fn from_result(result: Result<FraudReport>) -> Self {
        match result {
            Ok(report) => Self::success(report),
            Err(err) => Self::failure(&err),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, AnalysisResponse::Success { .. })
    }
}
