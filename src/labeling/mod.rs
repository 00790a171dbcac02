//! Hybrid weak-supervision labeling.
//!
//! A node's training label comes from a manual override if one exists,
//! otherwise from thresholding its micro-score. Nodes that neither rule
//! claims stay unlabeled and are excluded from the loss.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::{info, warn};

use crate::config::LabelingConfig;
use crate::error::{Error, Result};
use crate::graph::Graph;

/// Training label assigned to a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NodeLabel {
    #[serde(rename = "FRAUD_LABELED")]
    Fraud,
    #[serde(rename = "CLEAN_LABELED")]
    Clean,
    Unknown,
}

impl NodeLabel {
    /// Whether the node contributes to the supervised loss.
    pub fn is_labeled(&self) -> bool {
        !matches!(self, NodeLabel::Unknown)
    }
}

/// Why a node carries its label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LabelSource {
    Manual,
    Threshold,
    None,
}

/// The fraud / clean / unknown split of one graph.
///
/// Built once by [`LabelingPolicy::label`] and shared by reference with
/// tensorization and aggregation so every stage sees the same answer.
#[derive(Debug, Clone)]
pub struct LabelPartition {
    fraud: Vec<String>,
    clean: Vec<String>,
    unknown: Vec<String>,
    assignments: HashMap<String, (NodeLabel, LabelSource)>,
}

impl LabelPartition {
    fn from_assignments(graph: &Graph, assigned: Vec<(NodeLabel, LabelSource)>) -> Self {
        let mut fraud = Vec::new();
        let mut clean = Vec::new();
        let mut unknown = Vec::new();
        let mut assignments = HashMap::with_capacity(graph.node_count());

        for (node, (label, source)) in graph.nodes.iter().zip(assigned) {
            match label {
                NodeLabel::Fraud => fraud.push(node.id.clone()),
                NodeLabel::Clean => clean.push(node.id.clone()),
                NodeLabel::Unknown => unknown.push(node.id.clone()),
            }
            assignments.insert(node.id.clone(), (label, source));
        }

        Self {
            fraud,
            clean,
            unknown,
            assignments,
        }
    }

    /// Fraud-labeled ids, in graph order.
    pub fn fraud(&self) -> &[String] {
        &self.fraud
    }

    /// Clean-labeled ids, in graph order.
    pub fn clean(&self) -> &[String] {
        &self.clean
    }

    /// Unlabeled ids, in graph order.
    pub fn unknown(&self) -> &[String] {
        &self.unknown
    }

    /// Label of a node; ids outside the graph are [`NodeLabel::Unknown`].
    pub fn label_of(&self, id: &str) -> NodeLabel {
        self.assignments
            .get(id)
            .map(|(label, _)| *label)
            .unwrap_or(NodeLabel::Unknown)
    }

    pub fn source_of(&self, id: &str) -> LabelSource {
        self.assignments
            .get(id)
            .map(|(_, source)| *source)
            .unwrap_or(LabelSource::None)
    }

    pub fn is_labeled(&self, id: &str) -> bool {
        self.label_of(id).is_labeled()
    }

    pub fn num_labeled(&self) -> usize {
        self.fraud.len() + self.clean.len()
    }

    pub fn len(&self) -> usize {
        self.fraud.len() + self.clean.len() + self.unknown.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Count of labeled nodes that came from a manual override.
    pub fn num_manual(&self) -> usize {
        self.assignments
            .values()
            .filter(|(_, source)| *source == LabelSource::Manual)
            .count()
    }

    /// Check that the three sets are disjoint and cover exactly the graph's nodes.
    pub fn verify(&self, graph: &Graph) -> Result<()> {
        let mut seen: HashSet<&str> = HashSet::with_capacity(self.len());
        for id in self.fraud.iter().chain(&self.clean).chain(&self.unknown) {
            if !seen.insert(id.as_str()) {
                return Err(Error::PartitionViolation(format!(
                    "node '{}' appears in more than one label set",
                    id
                )));
            }
        }

        if seen.len() != graph.node_count() {
            return Err(Error::PartitionViolation(format!(
                "partition covers {} nodes but the graph has {}",
                seen.len(),
                graph.node_count()
            )));
        }
        if let Some(missing) = graph.node_ids().find(|id| !seen.contains(id)) {
            return Err(Error::PartitionViolation(format!(
                "node '{}' has no label",
                missing
            )));
        }

        Ok(())
    }
}

/// Manual overrides plus micro-score thresholds.
#[derive(Debug, Clone)]
pub struct LabelingPolicy {
    manual_fraud: HashSet<String>,
    manual_clean: HashSet<String>,
    fraud_multiplier: f64,
    clean_multiplier: f64,
    max_clean_degree: f64,
}

impl LabelingPolicy {
    pub fn new(config: &LabelingConfig) -> Self {
        Self {
            manual_fraud: config.manual_fraud.iter().cloned().collect(),
            manual_clean: config.manual_clean.iter().cloned().collect(),
            fraud_multiplier: config.fraud_multiplier,
            clean_multiplier: config.clean_multiplier,
            max_clean_degree: config.max_clean_degree,
        }
    }

    /// Threshold at or above which a micro-score is labeled fraud.
    pub fn fraud_cut(&self, threshold: f64) -> f64 {
        threshold * self.fraud_multiplier
    }

    /// Threshold at or below which a low-degree node is labeled clean.
    pub fn clean_cut(&self, threshold: f64) -> f64 {
        threshold * self.clean_multiplier
    }

    /// Partition every node of `graph` into fraud, clean and unknown.
    ///
    /// Non-positive thresholds are applied literally.
    pub fn label(&self, graph: &Graph, threshold: f64) -> LabelPartition {
        let fraud_cut = self.fraud_cut(threshold);
        let clean_cut = self.clean_cut(threshold);

        for id in self.manual_fraud.iter().chain(&self.manual_clean) {
            if !graph.contains(id) {
                warn!("manual override '{}' is not in the graph, ignoring", id);
            }
        }

        let assigned: Vec<(NodeLabel, LabelSource)> = graph
            .nodes
            .iter()
            .map(|node| {
                if self.manual_fraud.contains(&node.id) {
                    (NodeLabel::Fraud, LabelSource::Manual)
                } else if self.manual_clean.contains(&node.id) {
                    (NodeLabel::Clean, LabelSource::Manual)
                } else if node.features.micro_score >= fraud_cut {
                    (NodeLabel::Fraud, LabelSource::Threshold)
                } else if node.features.micro_score <= clean_cut
                    && node.features.degree <= self.max_clean_degree
                {
                    (NodeLabel::Clean, LabelSource::Threshold)
                } else {
                    (NodeLabel::Unknown, LabelSource::None)
                }
            })
            .collect();

        let partition = LabelPartition::from_assignments(graph, assigned);
        info!(
            "Labels: {} fraud, {} clean, {} unknown ({} manual; fraud_cut={:.4}, clean_cut={:.4})",
            partition.fraud().len(),
            partition.clean().len(),
            partition.unknown().len(),
            partition.num_manual(),
            fraud_cut,
            clean_cut
        );
        partition
    }
}

impl Default for LabelingPolicy {
    fn default() -> Self {
        Self::new(&LabelingConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Node, NodeFeatures};

    fn node(id: &str, micro_score: f64, degree: f64) -> Node {
        Node::new(
            id,
            NodeFeatures {
                degree,
                in_degree: degree,
                out_degree: 0.0,
                pagerank: 0.1,
                tx_entropy: 0.3,
                micro_score,
            },
        )
    }

    fn policy(manual_fraud: &[&str], manual_clean: &[&str]) -> LabelingPolicy {
        LabelingPolicy::new(&LabelingConfig {
            manual_fraud: manual_fraud.iter().map(|s| s.to_string()).collect(),
            manual_clean: manual_clean.iter().map(|s| s.to_string()).collect(),
            ..LabelingConfig::default()
        })
    }

    #[test]
    fn test_threshold_rules() {
        // threshold 0.5: fraud_cut 0.8, clean_cut 0.4
        let graph = Graph::new(
            vec![
                node("high", 0.8, 10.0),
                node("low", 0.4, 2.0),
                node("low_hub", 0.1, 3.0),
                node("middle", 0.6, 1.0),
            ],
            Vec::new(),
            0.5,
        )
        .unwrap();

        let partition = policy(&[], &[]).label(&graph, 0.5);
        assert_eq!(partition.fraud(), &["high".to_string()]);
        assert_eq!(partition.clean(), &["low".to_string()]);
        assert_eq!(
            partition.unknown(),
            &["low_hub".to_string(), "middle".to_string()]
        );
        assert_eq!(partition.source_of("high"), LabelSource::Threshold);
        assert!(partition.verify(&graph).is_ok());
    }

    #[test]
    fn test_manual_override_wins() {
        let graph = Graph::new(
            vec![node("wallet", 0.0, 1.0), node("exchange", 5.0, 50.0)],
            Vec::new(),
            0.5,
        )
        .unwrap();

        let partition = policy(&["wallet"], &["exchange"]).label(&graph, 0.5);
        assert_eq!(partition.label_of("wallet"), NodeLabel::Fraud);
        assert_eq!(partition.label_of("exchange"), NodeLabel::Clean);
        assert_eq!(partition.source_of("wallet"), LabelSource::Manual);
        assert_eq!(partition.num_manual(), 2);
    }

    #[test]
    fn test_manual_fraud_beats_manual_clean() {
        let graph = Graph::new(vec![node("both", 0.0, 1.0)], Vec::new(), 0.5).unwrap();
        let partition = policy(&["both"], &["both"]).label(&graph, 0.5);
        assert_eq!(partition.label_of("both"), NodeLabel::Fraud);
        assert!(partition.verify(&graph).is_ok());
    }

    #[test]
    fn test_absent_manual_ids_are_ignored() {
        let graph = Graph::new(vec![node("A", 0.6, 5.0)], Vec::new(), 0.5).unwrap();
        let partition = LabelingPolicy::default().label(&graph, 0.5);

        assert!(partition.fraud().is_empty());
        assert_eq!(partition.len(), 1);
        assert_eq!(partition.label_of("BinanceWallet"), NodeLabel::Unknown);
    }

    #[test]
    fn test_zero_threshold_applied_literally() {
        let graph = Graph::new(
            vec![node("zero", 0.0, 1.0), node("negative", -0.1, 1.0)],
            Vec::new(),
            0.0,
        )
        .unwrap();

        let partition = policy(&[], &[]).label(&graph, 0.0);
        // both cuts are 0: the fraud test runs first and catches 0.0
        assert_eq!(partition.label_of("zero"), NodeLabel::Fraud);
        assert_eq!(partition.label_of("negative"), NodeLabel::Clean);
    }

    #[test]
    fn test_verify_detects_missing_node() {
        let graph = Graph::new(vec![node("A", 0.9, 1.0)], Vec::new(), 0.5).unwrap();
        let partition = policy(&[], &[]).label(&graph, 0.5);

        let bigger = Graph::new(
            vec![node("A", 0.9, 1.0), node("B", 0.9, 1.0)],
            Vec::new(),
            0.5,
        )
        .unwrap();
        assert!(matches!(
            partition.verify(&bigger),
            Err(Error::PartitionViolation(_))
        ));
    }

    #[test]
    fn test_label_serialization() {
        assert_eq!(
            serde_json::to_string(&NodeLabel::Fraud).unwrap(),
            "\"FRAUD_LABELED\""
        );
        assert_eq!(
            serde_json::to_string(&NodeLabel::Clean).unwrap(),
            "\"CLEAN_LABELED\""
        );
        assert_eq!(
            serde_json::to_string(&NodeLabel::Unknown).unwrap(),
            "\"UNKNOWN\""
        );
    }
}
