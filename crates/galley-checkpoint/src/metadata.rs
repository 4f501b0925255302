//! The metadata artifact: what the model expects as input and how it was
//! trained.

use galley_training::{FeatureImportance, TrainingReport};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Bundle layout version written by this crate.
pub const FORMAT_VERSION: u32 = 1;

/// SHA-256 digests of the other two artifacts, as written by the same save.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactChecksums {
    /// Digest of the bincode forest.
    pub model: String,
    /// Digest of the encoder JSON.
    pub encoders: String,
}

/// Contents of the metadata artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BundleMetadata {
    /// Layout version; loads reject anything but [`FORMAT_VERSION`].
    pub format_version: u32,
    /// Feature columns in model input order.
    pub feature_names: Vec<String>,
    /// Name of the predicted column.
    pub target_column: String,
    /// Sorted by importance, highest first.
    #[serde(default)]
    pub feature_importances: Option<Vec<FeatureImportance>>,
    /// Metrics of the run that produced the model.
    #[serde(default)]
    pub training: Option<TrainingReport>,
    /// Filled in by `ArtifactBundle::save`; a bundle read back from disk
    /// always carries them.
    #[serde(default)]
    pub checksums: Option<ArtifactChecksums>,
    /// Seconds since the Unix epoch.
    pub created_at: u64,
}

impl BundleMetadata {
    /// Metadata stamped with the current time and no training report.
    pub fn new(feature_names: Vec<String>, target_column: impl Into<String>) -> Self {
        let created_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        Self {
            format_version: FORMAT_VERSION,
            feature_names,
            target_column: target_column.into(),
            feature_importances: None,
            training: None,
            checksums: None,
            created_at,
        }
    }

    /// Attaches a training report and its importance ranking.
    pub fn with_training(mut self, report: &TrainingReport) -> Self {
        self.feature_importances = Some(report.feature_importances.clone());
        self.training = Some(report.clone());
        self
    }
}
