//! Transaction graph types.
//!
//! The request layer hands us loosely typed JSON. [`GraphPayload`] mirrors
//! that wire shape with every field optional; [`Graph`] is the validated form
//! the pipeline runs on.

mod payload;

pub use payload::{EdgePayload, FeaturesPayload, GraphPayload, MetadataPayload, NodePayload};

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::error::{Error, Result};

/// Precomputed per-address features.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NodeFeatures {
    pub degree: f64,
    pub in_degree: f64,
    pub out_degree: f64,
    pub pagerank: f64,
    pub tx_entropy: f64,
    pub micro_score: f64,
}

impl NodeFeatures {
    /// Feature vector in the fixed column order used by the model.
    pub fn to_array(&self) -> [f64; 6] {
        [
            self.degree,
            self.in_degree,
            self.out_degree,
            self.pagerank,
            self.tx_entropy,
            self.micro_score,
        ]
    }
}

/// An address in the transaction graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    pub features: NodeFeatures,
}

impl Node {
    pub fn new(id: impl Into<String>, features: NodeFeatures) -> Self {
        Self {
            id: id.into(),
            features,
        }
    }
}

/// A directed transaction between two addresses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub source: String,
    pub target: String,
}

impl Edge {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
        }
    }
}

/// Request-scoped transaction graph.
///
/// Node order is significant: it defines each node's tensor index.
#[derive(Debug, Clone, PartialEq)]
pub struct Graph {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
    pub risk_threshold: f64,
}

impl Graph {
    /// Build a graph, rejecting duplicate node ids.
    pub fn new(nodes: Vec<Node>, edges: Vec<Edge>, risk_threshold: f64) -> Result<Self> {
        let mut seen = HashSet::with_capacity(nodes.len());
        for node in &nodes {
            if !seen.insert(node.id.as_str()) {
                return Err(Error::MalformedInput(format!(
                    "duplicate node id '{}'",
                    node.id
                )));
            }
        }

        Ok(Self {
            nodes,
            edges,
            risk_threshold,
        })
    }

    /// Validate a decoded payload.
    pub fn from_payload(payload: GraphPayload) -> Result<Self> {
        payload.validate()
    }

    /// Decode and validate a JSON request body.
    pub fn from_json(body: &str) -> Result<Self> {
        let payload: GraphPayload = serde_json::from_str(body)?;
        Self::from_payload(payload)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Node ids in graph order.
    pub fn node_ids(&self) -> impl Iterator<Item = &str> {
        self.nodes.iter().map(|n| n.id.as_str())
    }

    /// Whether a node with this id exists.
    pub fn contains(&self, id: &str) -> bool {
        self.nodes.iter().any(|n| n.id == id)
    }
}

impl TryFrom<GraphPayload> for Graph {
    type Error = Error;

    fn try_from(payload: GraphPayload) -> Result<Self> {
        payload.validate()
    }
}
