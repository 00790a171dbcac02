//! Dense tensor layout of a labeled graph.
//!
//! Everything here is indexed by the same node-index map, built once from
//! node order: row `i` of the feature matrix, entry `i` of the label vector
//! and mask, and the integer ids in the edge index all refer to the node at
//! position `i` of the graph.

mod propagation;

pub use propagation::Propagation;

use ndarray::{Array1, Array2};
use std::collections::HashMap;
use tracing::debug;

use crate::config::FEATURE_NAMES;
use crate::graph::Graph;
use crate::labeling::{LabelPartition, NodeLabel};

/// Bijection between node ids and dense row indices.
#[derive(Debug, Clone, Default)]
pub struct NodeIndexMap {
    ids: Vec<String>,
    index: HashMap<String, usize>,
}

impl NodeIndexMap {
    /// Enumerate the graph's nodes in order.
    pub fn from_graph(graph: &Graph) -> Self {
        let ids: Vec<String> = graph.nodes.iter().map(|n| n.id.clone()).collect();
        let index = ids
            .iter()
            .enumerate()
            .map(|(i, id)| (id.clone(), i))
            .collect();
        Self { ids, index }
    }

    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    pub fn id_of(&self, index: usize) -> Option<&str> {
        self.ids.get(index).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Ids in index order.
    pub fn ids(&self) -> &[String] {
        &self.ids
    }
}

/// Feature matrix, edge index, labels and train mask for one graph.
#[derive(Debug, Clone)]
pub struct GraphTensors {
    /// Node features `[num_nodes, 6]`
    pub features: Array2<f64>,
    /// Directed edges `[2, num_edges]`: row 0 sources, row 1 targets
    pub edge_index: Array2<usize>,
    /// 1 for fraud-labeled nodes, 0 otherwise
    pub labels: Array1<usize>,
    /// True for nodes that contribute to the loss
    pub train_mask: Array1<bool>,
    /// Id ↔ index mapping shared by all of the above
    pub node_index: NodeIndexMap,
}

impl GraphTensors {
    /// Lay out `graph` as tensors using the labels in `partition`.
    ///
    /// Edges that reference an id outside the graph are dropped.
    pub fn from_graph(graph: &Graph, partition: &LabelPartition) -> Self {
        let node_index = NodeIndexMap::from_graph(graph);
        let n = node_index.len();

        let rows: Vec<[f64; 6]> = graph
            .nodes
            .iter()
            .map(|node| node.features.to_array())
            .collect();
        let features = Array2::from_shape_fn((n, FEATURE_NAMES.len()), |(i, j)| rows[i][j]);

        let labels = graph
            .nodes
            .iter()
            .map(|node| match partition.label_of(&node.id) {
                NodeLabel::Fraud => 1,
                NodeLabel::Clean | NodeLabel::Unknown => 0,
            })
            .collect::<Array1<usize>>();

        let train_mask = graph
            .nodes
            .iter()
            .map(|node| partition.is_labeled(&node.id))
            .collect::<Array1<bool>>();

        let mut pairs = Vec::with_capacity(graph.edge_count());
        for edge in &graph.edges {
            match (
                node_index.index_of(&edge.source),
                node_index.index_of(&edge.target),
            ) {
                (Some(s), Some(t)) => pairs.push((s, t)),
                _ => debug!(
                    "dropping edge {} -> {}: endpoint not in graph",
                    edge.source, edge.target
                ),
            }
        }

        let edge_index = Array2::from_shape_fn((2, pairs.len()), |(row, e)| {
            let (s, t) = pairs[e];
            if row == 0 {
                s
            } else {
                t
            }
        });

        Self {
            features,
            edge_index,
            labels,
            train_mask,
            node_index,
        }
    }

    pub fn num_nodes(&self) -> usize {
        self.features.nrows()
    }

    pub fn num_features(&self) -> usize {
        self.features.ncols()
    }

    pub fn num_edges(&self) -> usize {
        self.edge_index.ncols()
    }

    /// Number of rows selected by the train mask.
    pub fn num_labeled(&self) -> usize {
        self.train_mask.iter().filter(|&&m| m).count()
    }

    /// Edges as `(source, target)` index pairs.
    pub fn edges(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.edge_index
            .row(0)
            .into_iter()
            .zip(self.edge_index.row(1))
            .map(|(&s, &t)| (s, t))
    }

    /// Normalized propagation operator for the convolution layers.
    pub fn propagation(&self) -> Propagation {
        Propagation::new(self.num_nodes(), self.edges())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LabelingConfig;
    use crate::graph::{Edge, Node, NodeFeatures};
    use crate::labeling::LabelingPolicy;
    use ndarray::array;

    fn node(id: &str, micro_score: f64, degree: f64) -> Node {
        Node::new(
            id,
            NodeFeatures {
                degree,
                in_degree: 1.0,
                out_degree: 2.0,
                pagerank: 0.25,
                tx_entropy: 0.75,
                micro_score,
            },
        )
    }

    fn labeled(graph: &Graph) -> LabelPartition {
        LabelingPolicy::new(&LabelingConfig {
            manual_fraud: Vec::new(),
            ..LabelingConfig::default()
        })
        .label(graph, graph.risk_threshold)
    }

    fn sample_graph(edges: Vec<Edge>) -> Graph {
        Graph::new(
            vec![
                node("A", 0.9, 5.0),
                node("B", 0.1, 1.0),
                node("C", 0.6, 4.0),
            ],
            edges,
            0.5,
        )
        .unwrap()
    }

    #[test]
    fn test_feature_rows_follow_node_order() {
        let graph = sample_graph(Vec::new());
        let tensors = GraphTensors::from_graph(&graph, &labeled(&graph));

        assert_eq!(tensors.features.dim(), (3, 6));
        for node in &graph.nodes {
            let i = tensors.node_index.index_of(&node.id).unwrap();
            assert_eq!(tensors.features.row(i).to_vec(), node.features.to_array().to_vec());
            assert_eq!(tensors.node_index.id_of(i), Some(node.id.as_str()));
        }
    }

    #[test]
    fn test_labels_and_mask() {
        let graph = sample_graph(Vec::new());
        let tensors = GraphTensors::from_graph(&graph, &labeled(&graph));

        // A fraud, B clean, C unknown
        assert_eq!(tensors.labels.to_vec(), vec![1, 0, 0]);
        assert_eq!(tensors.train_mask.to_vec(), vec![true, true, false]);
        assert_eq!(tensors.num_labeled(), 2);
    }

    #[test]
    fn test_edge_index_keeps_direction_and_duplicates() {
        let graph = sample_graph(vec![
            Edge::new("A", "B"),
            Edge::new("C", "A"),
            Edge::new("C", "A"),
            Edge::new("B", "B"),
        ]);
        let tensors = GraphTensors::from_graph(&graph, &labeled(&graph));

        assert_eq!(tensors.edge_index, array![[0, 2, 2, 1], [1, 0, 0, 1]]);
        assert_eq!(
            tensors.edges().collect::<Vec<_>>(),
            vec![(0, 1), (2, 0), (2, 0), (1, 1)]
        );
    }

    #[test]
    fn test_unknown_endpoints_dropped() {
        let graph = sample_graph(vec![
            Edge::new("A", "ghost"),
            Edge::new("ghost", "B"),
            Edge::new("B", "C"),
        ]);
        let tensors = GraphTensors::from_graph(&graph, &labeled(&graph));

        assert_eq!(tensors.num_edges(), 1);
        assert_eq!(tensors.edges().collect::<Vec<_>>(), vec![(1, 2)]);
    }

    #[test]
    fn test_no_edges_is_well_formed() {
        let graph = sample_graph(Vec::new());
        let tensors = GraphTensors::from_graph(&graph, &labeled(&graph));

        assert_eq!(tensors.edge_index.dim(), (2, 0));
        assert_eq!(tensors.num_edges(), 0);
    }
}
