//! End-to-end analysis of one request.
//!
//! Every request gets its own [`AnalysisContext`]: nothing (model, optimizer
//! state, RNG) outlives it or is shared with another request.

use tracing::info;

use crate::config::Config;
use crate::error::Result;
use crate::graph::Graph;
use crate::inference::{predict, AnalysisResponse, FraudReport};
use crate::labeling::{LabelPartition, LabelingPolicy};
use crate::nn::{FraudGcn, Optimizer};
use crate::tensor::{GraphTensors, Propagation};
use crate::training::{Trainer, TrainingHistory};

/// State threaded through the stages of a single analysis.
pub struct AnalysisContext {
    pub graph: Graph,
    pub partition: LabelPartition,
    pub tensors: GraphTensors,
    pub propagation: Propagation,
    pub model: FraudGcn,
    optimizers: Vec<Box<dyn Optimizer>>,
    trainer: Trainer,
    config: Config,
}

impl AnalysisContext {
    /// Label and tensorize `graph`, and build a freshly initialized model.
    pub fn new(graph: Graph, config: &Config) -> Result<Self> {
        config.validate()?;
        info!(
            "Received graph: {} nodes, {} edges, risk threshold {}",
            graph.node_count(),
            graph.edge_count(),
            graph.risk_threshold
        );

        let partition = LabelingPolicy::new(&config.labeling).label(&graph, graph.risk_threshold);
        partition.verify(&graph)?;

        let tensors = GraphTensors::from_graph(&graph, &partition);
        let propagation = tensors.propagation();
        let model = FraudGcn::new(&config.model, config.training.seed);
        let trainer = Trainer::new(&config.training);
        let optimizers = trainer.optimizers_for(&model);

        Ok(Self {
            graph,
            partition,
            tensors,
            propagation,
            model,
            optimizers,
            trainer,
            config: config.clone(),
        })
    }

    /// Train the model in place.
    pub fn train(&mut self) -> Result<TrainingHistory> {
        self.trainer.train_with(
            &mut self.model,
            &self.tensors,
            &self.propagation,
            &mut self.optimizers,
        )
    }

    /// Score every node with the current weights.
    pub fn report(&mut self) -> Result<FraudReport> {
        let probabilities = predict(&mut self.model, &self.tensors, &self.propagation)?;
        FraudReport::aggregate(
            &self.graph,
            &self.partition,
            &self.tensors,
            &probabilities,
            &self.config.inference,
        )
    }
}

/// Result of a full analysis, including the training trace.
#[derive(Debug, Clone)]
pub struct Analysis {
    pub report: FraudReport,
    pub history: TrainingHistory,
}

/// Label, train and score one graph.
pub fn analyze(graph: Graph, config: &Config) -> Result<Analysis> {
    let mut context = AnalysisContext::new(graph, config)?;
    let history = context.train()?;
    let report = context.report()?;
    Ok(Analysis { report, history })
}

/// Decode a JSON request body and analyze it.
pub fn analyze_json(body: &str, config: &Config) -> Result<Analysis> {
    let graph = Graph::from_json(body)?;
    analyze(graph, config)
}

/// Full request handling: JSON in, response envelope out. Never fails; errors
/// become the `success: false` envelope.
pub fn handle_request(body: &str, config: &Config) -> AnalysisResponse {
    AnalysisResponse::from_result(analyze_json(body, config).map(|analysis| analysis.report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::graph::{Edge, Node, NodeFeatures};

    fn node(id: &str, micro_score: f64, degree: f64) -> Node {
        Node::new(
            id,
            NodeFeatures {
                degree,
                in_degree: degree,
                out_degree: 0.0,
                pagerank: 0.1,
                tx_entropy: 0.5,
                micro_score,
            },
        )
    }

    fn seeded(epochs: usize) -> Config {
        let mut config = Config::default();
        config.training.epochs = epochs;
        config.training.seed = Some(9);
        config
    }

    #[test]
    fn test_context_stages() {
        let graph = Graph::new(
            vec![node("BinanceWallet", 0.1, 5.0), node("x", 0.05, 1.0), node("y", 0.5, 4.0)],
            vec![Edge::new("x", "BinanceWallet"), Edge::new("y", "x")],
            0.5,
        )
        .unwrap();
        let mut context = AnalysisContext::new(graph, &seeded(10)).unwrap();
        assert_eq!(context.partition.fraud(), ["BinanceWallet".to_string()]);
        assert_eq!(context.partition.clean(), ["x".to_string()]);
        assert_eq!(context.tensors.num_edges(), 2);

        let history = context.train().unwrap();
        assert_eq!(history.epochs(), 10);
        let report = context.report().unwrap();
        assert_eq!(report.summary.total_nodes, 3);
        assert_eq!(report.summary.unknown, 1);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let graph = Graph::new(vec![node("a", 0.9, 1.0)], Vec::new(), 0.5).unwrap();
        let mut config = Config::default();
        config.model.dropout = 1.0;
        assert!(matches!(
            AnalysisContext::new(graph, &config),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_handle_request_reports_failures() {
        let response = handle_request(r#"{"nodes": []}"#, &seeded(5));
        assert!(!response.is_success());

        let response = handle_request("not json", &seeded(5));
        assert!(!response.is_success());
    }
}
