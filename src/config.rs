//! Configuration handling.
//!
//! Every hyperparameter of the pipeline lives here so that callers inject
//! it instead of the core embedding constants.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{Error, Result};

/// Column order of the per-node feature vector.
pub const FEATURE_NAMES: [&str; 6] = [
    "degree",
    "in_degree",
    "out_degree",
    "pagerank",
    "tx_entropy",
    "micro_score",
];

/// Number of output classes (clean, fraud).
pub const NUM_CLASSES: usize = 2;

/// Main configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Model architecture
    pub model: ModelConfig,
    /// Training loop
    pub training: TrainingConfig,
    /// Weak-supervision labeling policy
    pub labeling: LabelingConfig,
    /// Prediction thresholding
    pub inference: InferenceConfig,
}

impl Config {
    /// Load configuration from TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check every section for values the pipeline can't run with.
    pub fn validate(&self) -> Result<()> {
        self.model.validate()?;
        self.training.validate()?;
        self.labeling.validate()?;
        self.inference.validate()
    }
}

/// Graph convolution stack configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Number of input features per node
    pub num_features: usize,
    /// Hidden dimension of the first two layers
    pub hidden_dim: usize,
    /// Dropout probability applied after each hidden layer while training
    pub dropout: f64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            num_features: FEATURE_NAMES.len(),
            hidden_dim: 16,
            dropout: 0.5,
        }
    }
}

impl ModelConfig {
    fn validate(&self) -> Result<()> {
        if self.num_features != FEATURE_NAMES.len() {
            return Err(Error::Config(format!(
                "num_features must be {} (one per node feature), got {}",
                FEATURE_NAMES.len(),
                self.num_features
            )));
        }
        if self.hidden_dim == 0 {
            return Err(Error::Config("hidden_dim must be positive".into()));
        }
        if !(0.0..1.0).contains(&self.dropout) {
            return Err(Error::Config(format!(
                "dropout must be in [0, 1), got {}",
                self.dropout
            )));
        }
        Ok(())
    }
}

/// Training loop configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Number of full-graph epochs, always run to completion
    pub epochs: usize,
    /// Adam learning rate
    pub learning_rate: f64,
    /// Log the loss every N epochs (0 disables progress lines)
    pub log_every: usize,
    /// Seed for weight initialization and dropout masks
    pub seed: Option<u64>,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            epochs: 100,
            learning_rate: 0.01,
            log_every: 20,
            seed: None,
        }
    }
}

impl TrainingConfig {
    fn validate(&self) -> Result<()> {
        if self.epochs == 0 {
            return Err(Error::Config("epochs must be positive".into()));
        }
        if !self.learning_rate.is_finite() || self.learning_rate <= 0.0 {
            return Err(Error::Config(format!(
                "learning_rate must be positive, got {}",
                self.learning_rate
            )));
        }
        Ok(())
    }
}

/// Hybrid manual/threshold labeling configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LabelingConfig {
    /// Addresses always labeled fraud
    pub manual_fraud: Vec<String>,
    /// Addresses always labeled clean
    pub manual_clean: Vec<String>,
    /// `micro_score >= threshold * fraud_multiplier` labels fraud
    pub fraud_multiplier: f64,
    /// `micro_score <= threshold * clean_multiplier` labels clean (with low degree)
    pub clean_multiplier: f64,
    /// Highest degree a node may have to be labeled clean by threshold
    pub max_clean_degree: f64,
}

impl Default for LabelingConfig {
    fn default() -> Self {
        Self {
            manual_fraud: vec!["BinanceWallet".to_string()],
            manual_clean: Vec::new(),
            fraud_multiplier: 1.6,
            clean_multiplier: 0.8,
            max_clean_degree: 2.0,
        }
    }
}

impl LabelingConfig {
    fn validate(&self) -> Result<()> {
        if !self.fraud_multiplier.is_finite() || !self.clean_multiplier.is_finite() {
            return Err(Error::Config("threshold multipliers must be finite".into()));
        }
        Ok(())
    }
}

/// Inference configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InferenceConfig {
    /// A node is FRAUD iff its probability is strictly greater than this
    pub decision_threshold: f64,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            decision_threshold: 0.5,
        }
    }
}

impl InferenceConfig {
    fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.decision_threshold) {
            return Err(Error::Config(format!(
                "decision_threshold must be in [0, 1], got {}",
                self.decision_threshold
            )));
        }
        Ok(())
    }
}
