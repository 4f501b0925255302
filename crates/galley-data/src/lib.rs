//! Consumption dataset loading and feature engineering for Galley.
//!
//! This crate turns the historical catering consumption export into the
//! numeric training table consumed by `galley-training`:
//!
//! - [`load`] reads the CSV export into [`ConsumptionRecord`]s
//! - [`preprocess`] filters, derives ratios, encodes categoricals and builds
//!   the seven-column [`FeatureTable`]
//! - [`CategoryEncoders`] are the string to code lookup tables that travel
//!   with a trained model
//! - [`summarize`] produces the grouped consumption report used when
//!   exploring a new export
//!
//! # Example
//!
//! ```no_run
//! use galley_data::{load, preprocess};
//!
//! fn main() -> galley_data::Result<()> {
//!     let corpus = load("data/consumption.csv")?;
//!     let prepared = preprocess(&corpus);
//!     println!(
//!         "{} rows x {} features",
//!         prepared.features.n_rows(),
//!         prepared.features.n_features()
//!     );
//!     Ok(())
//! }
//! ```

pub mod encoder;
pub mod loader;
pub mod preprocess;
pub mod record;
pub mod summary;

pub use encoder::{CategoryEncoder, CategoryEncoders};
pub use loader::{load, load_from_reader};
pub use preprocess::{
    derive_metrics, is_issue_note, preprocess, DerivedMetrics, FeatureTable, PreprocessStats,
    PreprocessedCorpus, FEATURE_NAMES, ISSUE_PHRASES, TARGET_COLUMN,
};
pub use record::{CategoricalAttribute, ConsumptionRecord, Corpus, REQUIRED_COLUMNS};
pub use summary::{summarize, CorpusSummary, GroupStat, ProductStat};

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading or encoding consumption data.
#[derive(Error, Debug)]
pub enum DataError {
    /// The dataset file does not exist.
    #[error("Dataset not found: {0}")]
    NotFound(PathBuf),

    /// I/O error while reading the dataset.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path being read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The CSV reader rejected the file (bad quoting, ragged rows, ...).
    #[error("Malformed CSV in {path}: {source}")]
    Csv {
        /// Path being read.
        path: PathBuf,
        /// Underlying CSV error.
        #[source]
        source: csv::Error,
    },

    /// A required column is absent from the header.
    #[error("Missing required column '{column}' in {path}")]
    MissingColumn {
        /// Expected column name.
        column: String,
        /// Path being read.
        path: PathBuf,
    },

    /// A numeric cell could not be parsed.
    #[error("Invalid value '{value}' for column '{column}' at line {line}")]
    InvalidValue {
        /// Column name.
        column: String,
        /// Raw cell content.
        value: String,
        /// 1-based line number in the source file.
        line: u64,
    },

    /// A categorical value was never seen when the encoder was fit.
    #[error("Unknown {attribute} value '{value}' (not seen during training)")]
    UnknownCategory {
        /// Attribute name, e.g. `origin`.
        attribute: String,
        /// The offending value.
        value: String,
    },
}

impl DataError {
    /// Returns the offending `(attribute, value)` pair for unknown-category errors.
    pub fn unknown_category(&self) -> Option<(&str, &str)> {
        match self {
            Self::UnknownCategory { attribute, value } => Some((attribute, value)),
            _ => None,
        }
    }
}

/// Result type for data operations.
pub type Result<T> = std::result::Result<T, DataError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_category_accessor() {
        let err = DataError::UnknownCategory {
            attribute: "origin".to_string(),
            value: "ZZZ".to_string(),
        };
        assert_eq!(err.unknown_category(), Some(("origin", "ZZZ")));
        assert!(err.to_string().contains("origin"));
        assert!(err.to_string().contains("ZZZ"));

        let other = DataError::NotFound(PathBuf::from("/missing.csv"));
        assert!(other.unknown_category().is_none());
    }
}
