//! Error types for the galley-serving crate.

use galley_checkpoint::CheckpointError;
use galley_data::DataError;
use galley_training::TrainingError;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for serving operations.
pub type ServingResult<T> = Result<T, ServingError>;

/// Errors that can occur while training, loading or predicting.
#[derive(Debug, Error)]
pub enum ServingError {
    /// Dataset loading or categorical encoding failed.
    #[error(transparent)]
    Data(#[from] DataError),

    /// Model fitting or evaluation failed.
    #[error(transparent)]
    Training(#[from] TrainingError),

    /// Bundle persistence failed.
    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),

    /// A request value cannot be turned into a feature.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// A batch request file could not be read.
    #[error("Failed to read batch input {path}: {source}")]
    BatchInput {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

impl ServingError {
    /// Create an invalid request error.
    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::InvalidRequest(msg.into())
    }

    /// `(attribute, value)` when this is an unknown-category rejection.
    pub fn unknown_category(&self) -> Option<(&str, &str)> {
        match self {
            Self::Data(e) => e.unknown_category(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_category_passthrough() {
        let err: ServingError = DataError::UnknownCategory {
            attribute: "origin".to_string(),
            value: "ZZZ".to_string(),
        }
        .into();
        assert_eq!(err.unknown_category(), Some(("origin", "ZZZ")));
        assert!(err.to_string().contains("ZZZ"));
        assert_eq!(ServingError::invalid_request("x").unknown_category(), None);
    }
}
