//! Error types for the fraud scoring pipeline

use thiserror::Error;

/// Result type alias for this crate
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the library
#[derive(Error, Debug)]
pub enum Error {
    /// A required field is missing or the payload has the wrong shape
    #[error("Malformed input: {0}")]
    MalformedInput(String),

    /// The train mask selects no rows, so the loss is undefined
    #[error("No labeled nodes to train on: every node is UNKNOWN for this threshold")]
    EmptySupervision,

    /// Fraud/clean/unknown sets overlap or do not cover the graph
    #[error("Label partition violated: {0}")]
    PartitionViolation(String),

    /// Tensor dimensions disagree with the model configuration
    #[error("Shape mismatch: {0}")]
    ShapeMismatch(String),

    /// Backward pass requested without a cached training forward pass
    #[error("Model state error: {0}")]
    ModelState(String),

    /// Loss became NaN or infinite during training
    #[error("Training diverged: non-finite loss at epoch {epoch}")]
    NumericalInstability { epoch: usize },

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether the failure was caused by the request payload rather than by
    /// the pipeline itself.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Error::MalformedInput(_) | Error::EmptySupervision | Error::Json(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_errors() {
        assert!(Error::MalformedInput("x".into()).is_client_error());
        assert!(Error::EmptySupervision.is_client_error());
        assert!(!Error::NumericalInstability { epoch: 3 }.is_client_error());
    }

    #[test]
    fn test_messages_are_descriptive() {
        let err = Error::MalformedInput("node 'a' is missing feature 'pagerank'".into());
        assert_eq!(
            err.to_string(),
            "Malformed input: node 'a' is missing feature 'pagerank'"
        );
        assert!(Error::EmptySupervision.to_string().contains("No labeled nodes"));
    }
}
