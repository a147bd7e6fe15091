//! Error types for the risk inference pipeline.

use thiserror::Error;

/// Errors raised by the inference core and the artifact store.
///
/// Client-input problems ([`Schema`](PipelineError::Schema),
/// [`Numeric`](PipelineError::Numeric)) are deterministic functions of the
/// request and are never retried. [`ArtifactLoad`](PipelineError::ArtifactLoad)
/// is fatal at startup: the service refuses to serve with partially-loaded
/// state.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Input does not match the feature contract.
    #[error("schema mismatch: expected {expected} features, got {actual}")]
    Schema { expected: usize, actual: usize },

    /// A feature value cannot be imputed or scaled.
    #[error("invalid value for {feature}: {value} is not finite")]
    Numeric { feature: &'static str, value: f64 },

    /// An artifact is missing, corrupt, or inconsistent with the rest of
    /// its bundle.
    #[error("artifact load failed: {0}")]
    ArtifactLoad(String),

    /// A transform was applied before fitting (training-side misuse).
    #[error("{component} is not fitted")]
    NotFitted { component: &'static str },

    /// A class index outside the codec's range.
    #[error("class index {index} out of range (classes: {n_classes})")]
    UnknownClass { index: usize, n_classes: usize },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl PipelineError {
    /// Helper for artifact-load failures with formatted context.
    pub fn artifact(msg: impl Into<String>) -> Self {
        Self::ArtifactLoad(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PipelineError::Schema {
            expected: 6,
            actual: 4,
        };
        assert!(err.to_string().contains("expected 6"));

        let err = PipelineError::Numeric {
            feature: "Age",
            value: f64::NAN,
        };
        assert!(err.to_string().contains("Age"));
    }
}
