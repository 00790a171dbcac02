//! Wire-format mirror of the request body.

use serde::{Deserialize, Serialize};

use super::{Edge, Graph, Node, NodeFeatures};
use crate::error::{Error, Result};

/// Request body as decoded from JSON, before validation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphPayload {
    #[serde(default)]
    pub nodes: Vec<NodePayload>,
    #[serde(default)]
    pub edges: Vec<EdgePayload>,
    pub metadata: Option<MetadataPayload>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodePayload {
    pub id: Option<String>,
    pub features: Option<FeaturesPayload>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeaturesPayload {
    pub degree: Option<f64>,
    pub in_degree: Option<f64>,
    pub out_degree: Option<f64>,
    pub pagerank: Option<f64>,
    pub tx_entropy: Option<f64>,
    pub micro_score: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EdgePayload {
    pub source: Option<String>,
    pub target: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetadataPayload {
    pub risk_threshold: Option<f64>,
}

impl GraphPayload {
    /// Check required fields and convert into a [`Graph`].
    pub fn validate(self) -> Result<Graph> {
        let risk_threshold = self
            .metadata
            .and_then(|m| m.risk_threshold)
            .ok_or_else(|| Error::MalformedInput("missing 'metadata.risk_threshold'".into()))?;

        let nodes = self
            .nodes
            .into_iter()
            .enumerate()
            .map(|(position, node)| node.validate(position))
            .collect::<Result<Vec<_>>>()?;

        let edges = self
            .edges
            .into_iter()
            .enumerate()
            .map(|(position, edge)| edge.validate(position))
            .collect::<Result<Vec<_>>>()?;

        Graph::new(nodes, edges, risk_threshold)
    }
}

impl NodePayload {
    fn validate(self, position: usize) -> Result<Node> {
        let id = self.id.ok_or_else(|| {
            Error::MalformedInput(format!("node at position {} is missing 'id'", position))
        })?;
        let features = self
            .features
            .ok_or_else(|| Error::MalformedInput(format!("node '{}' is missing 'features'", id)))?
            .validate(&id)?;

        Ok(Node { id, features })
    }
}

impl FeaturesPayload {
    fn validate(self, id: &str) -> Result<NodeFeatures> {
        let require = |value: Option<f64>, name: &str| {
            value.ok_or_else(|| {
                Error::MalformedInput(format!("node '{}' is missing feature '{}'", id, name))
            })
        };

        Ok(NodeFeatures {
            degree: require(self.degree, "degree")?,
            in_degree: require(self.in_degree, "in_degree")?,
            out_degree: require(self.out_degree, "out_degree")?,
            pagerank: require(self.pagerank, "pagerank")?,
            tx_entropy: require(self.tx_entropy, "tx_entropy")?,
            micro_score: require(self.micro_score, "micro_score")?,
        })
    }
}

impl EdgePayload {
    fn validate(self, position: usize) -> Result<Edge> {
        match (self.source, self.target) {
            (Some(source), Some(target)) => Ok(Edge { source, target }),
            (None, _) => Err(Error::MalformedInput(format!(
                "edge at position {} is missing 'source'",
                position
            ))),
            (_, None) => Err(Error::MalformedInput(format!(
                "edge at position {} is missing 'target'",
                position
            ))),
        }
    }
}
