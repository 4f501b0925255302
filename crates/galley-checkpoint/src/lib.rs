//! Artifact bundles for trained demand models.
//!
//! A bundle is one directory holding three files:
//!
//! - [`MODEL_FILENAME`]: the fitted forest, bincode encoded
//! - [`ENCODERS_FILENAME`]: the categorical encoders, JSON
//! - [`METADATA_FILENAME`]: feature order, target column, format version and
//!   the training report, JSON
//!
//! Bundles are validated as a whole on load, so a loaded bundle is always
//! safe to predict with. The metadata records checksums of the other two
//! artifacts, which catches a directory holding parts of different saves.
//!
//! ```no_run
//! use galley_checkpoint::ArtifactBundle;
//!
//! fn main() -> galley_checkpoint::Result<()> {
//!     let bundle = ArtifactBundle::load("models/latest")?;
//!     println!("{} trees", bundle.model.forest.n_trees());
//!     Ok(())
//! }
//! ```

mod bundle;
mod codec;
mod metadata;

pub use bundle::{ArtifactBundle, ENCODERS_FILENAME, METADATA_FILENAME, MODEL_FILENAME};
pub use metadata::{ArtifactChecksums, BundleMetadata, FORMAT_VERSION};

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while saving or loading a bundle.
#[derive(Debug, Error)]
pub enum CheckpointError {
    /// The bundle directory or one of its files could not be written.
    #[error("Failed to persist {path}: {source}")]
    Persist {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// An artifact could not be encoded.
    #[error("Failed to encode {artifact}: {reason}")]
    Encode {
        artifact: &'static str,
        reason: String,
    },

    /// An expected artifact file is absent.
    #[error("Missing artifact {artifact} in {dir}")]
    ArtifactMissing { artifact: &'static str, dir: PathBuf },

    /// An artifact is unreadable, undecodable or inconsistent with the rest
    /// of the bundle.
    #[error("Corrupt artifact {artifact} at {path}: {reason}")]
    ArtifactCorrupt {
        artifact: &'static str,
        path: PathBuf,
        reason: String,
    },
}

impl CheckpointError {
    /// File name of the artifact this error is about, if any.
    pub fn artifact(&self) -> Option<&'static str> {
        match self {
            Self::Encode { artifact, .. }
            | Self::ArtifactMissing { artifact, .. }
            | Self::ArtifactCorrupt { artifact, .. } => Some(*artifact),
            Self::Persist { .. } => None,
        }
    }
}

/// Result type for bundle operations.
pub type Result<T> = std::result::Result<T, CheckpointError>;
