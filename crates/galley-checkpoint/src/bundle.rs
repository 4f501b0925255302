//! Saving and loading the three-file bundle.

use crate::codec::{
    decode_bincode, decode_json, digest, encode_bincode, encode_json, read_bytes, stage,
};
use crate::metadata::{ArtifactChecksums, BundleMetadata, FORMAT_VERSION};
use crate::{CheckpointError, Result};
use galley_data::{CategoryEncoders, FEATURE_NAMES, TARGET_COLUMN};
use galley_training::{RandomForestRegressor, TrainedModel, TrainingReport};
use std::collections::HashSet;
use std::path::Path;

/// Forest artifact.
pub const MODEL_FILENAME: &str = "random_forest_model.bin";
/// Encoder artifact.
pub const ENCODERS_FILENAME: &str = "label_encoders.json";
/// Metadata artifact.
pub const METADATA_FILENAME: &str = "model_metadata.json";

/// A trained model and its metadata, as stored on disk.
#[derive(Debug, Clone, PartialEq)]
pub struct ArtifactBundle {
    pub model: TrainedModel,
    pub metadata: BundleMetadata,
}

impl ArtifactBundle {
    /// Wraps a trained model, optionally recording its training report.
    pub fn new(model: TrainedModel, report: Option<&TrainingReport>) -> Self {
        let mut metadata = BundleMetadata::new(model.feature_names.clone(), TARGET_COLUMN);
        if let Some(report) = report {
            metadata = metadata.with_training(report);
        }
        Self { model, metadata }
    }

    /// Writes the three artifacts into `dir`, creating it if needed and
    /// overwriting an existing bundle.
    ///
    /// Nothing in `dir` is replaced until all three files have been written
    /// to temporary files beside their destinations. The metadata is renamed
    /// last and carries checksums of the other two, so an interrupted save
    /// fails to load instead of mixing two models.
    pub fn save(&self, dir: impl AsRef<Path>) -> Result<()> {
        let dir = dir.as_ref();
        tracing::info!(
            dir = %dir.display(),
            trees = self.model.forest.n_trees(),
            features = self.model.feature_names.len(),
            "Saving model bundle"
        );

        std::fs::create_dir_all(dir).map_err(|e| CheckpointError::Persist {
            path: dir.to_path_buf(),
            source: e,
        })?;

        let model_bytes = encode_bincode(MODEL_FILENAME, &self.model.forest)?;
        let encoder_bytes = encode_json(ENCODERS_FILENAME, &self.model.encoders)?;
        let mut metadata = self.metadata.clone();
        metadata.checksums = Some(ArtifactChecksums {
            model: digest(&model_bytes),
            encoders: digest(&encoder_bytes),
        });
        let metadata_bytes = encode_json(METADATA_FILENAME, &metadata)?;

        let staged = [
            stage(dir.join(MODEL_FILENAME), &model_bytes)?,
            stage(dir.join(ENCODERS_FILENAME), &encoder_bytes)?,
            stage(dir.join(METADATA_FILENAME), &metadata_bytes)?,
        ];
        for artifact in staged {
            artifact.commit()?;
        }

        tracing::info!(dir = %dir.display(), "Model bundle saved");
        Ok(())
    }

    /// Reads and validates the bundle in `dir`.
    ///
    /// # Errors
    ///
    /// [`CheckpointError::ArtifactMissing`] names the first absent file;
    /// [`CheckpointError::ArtifactCorrupt`] covers undecodable files, files
    /// whose checksum disagrees with the metadata and bundles whose parts
    /// disagree.
    pub fn load(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        tracing::info!(dir = %dir.display(), "Loading model bundle");

        for artifact in [MODEL_FILENAME, ENCODERS_FILENAME, METADATA_FILENAME] {
            if !dir.join(artifact).exists() {
                return Err(CheckpointError::ArtifactMissing {
                    artifact,
                    dir: dir.to_path_buf(),
                });
            }
        }

        let metadata_path = dir.join(METADATA_FILENAME);
        let metadata: BundleMetadata = decode_json(
            METADATA_FILENAME,
            &metadata_path,
            &read_bytes(METADATA_FILENAME, &metadata_path)?,
        )?;
        if metadata.format_version != FORMAT_VERSION {
            return Err(corrupt(
                dir,
                METADATA_FILENAME,
                format!(
                    "unsupported format version {} (expected {FORMAT_VERSION})",
                    metadata.format_version
                ),
            ));
        }
        check_feature_names(&metadata.feature_names).map_err(|r| corrupt(dir, METADATA_FILENAME, r))?;
        let checksums = metadata.checksums.clone().ok_or_else(|| {
            corrupt(dir, METADATA_FILENAME, "artifact checksums are missing".to_string())
        })?;

        let encoders_path = dir.join(ENCODERS_FILENAME);
        let encoder_bytes = read_bytes(ENCODERS_FILENAME, &encoders_path)?;
        check_digest(dir, ENCODERS_FILENAME, &encoder_bytes, &checksums.encoders)?;
        let encoders: CategoryEncoders = decode_json(ENCODERS_FILENAME, &encoders_path, &encoder_bytes)?;
        encoders
            .validate()
            .map_err(|r| corrupt(dir, ENCODERS_FILENAME, r))?;

        let model_path = dir.join(MODEL_FILENAME);
        let model_bytes = read_bytes(MODEL_FILENAME, &model_path)?;
        check_digest(dir, MODEL_FILENAME, &model_bytes, &checksums.model)?;
        let forest: RandomForestRegressor = decode_bincode(MODEL_FILENAME, &model_path, &model_bytes)?;
        forest.validate().map_err(|r| corrupt(dir, MODEL_FILENAME, r))?;
        if forest.n_features() != metadata.feature_names.len() {
            return Err(corrupt(
                dir,
                MODEL_FILENAME,
                format!(
                    "model expects {} features but metadata lists {}",
                    forest.n_features(),
                    metadata.feature_names.len()
                ),
            ));
        }

        tracing::info!(
            dir = %dir.display(),
            trees = forest.n_trees(),
            created_at = metadata.created_at,
            "Model bundle loaded"
        );

        Ok(Self {
            model: TrainedModel {
                forest,
                encoders,
                feature_names: metadata.feature_names.clone(),
            },
            metadata,
        })
    }
}

fn check_digest(dir: &Path, artifact: &'static str, bytes: &[u8], expected: &str) -> Result<()> {
    let actual = digest(bytes);
    if actual == expected {
        Ok(())
    } else {
        Err(corrupt(
            dir,
            artifact,
            format!("checksum {actual} does not match metadata ({expected})"),
        ))
    }
}

fn corrupt(dir: &Path, artifact: &'static str, reason: String) -> CheckpointError {
    CheckpointError::ArtifactCorrupt {
        artifact,
        path: dir.join(artifact),
        reason,
    }
}

/// Every name must be a known feature, listed once.
fn check_feature_names(names: &[String]) -> std::result::Result<(), String> {
    if names.is_empty() {
        return Err("feature name list is empty".to_string());
    }
    let mut seen = HashSet::new();
    for name in names {
        if !FEATURE_NAMES.contains(&name.as_str()) {
            return Err(format!("unknown feature name '{name}'"));
        }
        if !seen.insert(name.as_str()) {
            return Err(format!("feature '{name}' listed twice"));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use galley_data::{CategoricalAttribute, CategoryEncoder};
    use galley_training::ForestConfig;
    use tempfile::tempdir;

    fn sample_model() -> TrainedModel {
        let rows: Vec<Vec<f64>> = (0..12)
            .map(|i| {
                vec![
                    (i % 2) as f64,
                    (i % 2) as f64,
                    0.0,
                    100.0 + i as f64,
                    0.0,
                    0.5,
                    0.0,
                ]
            })
            .collect();
        let target: Vec<f64> = (0..12).map(|i| 50.0 + 3.0 * i as f64).collect();
        let config = ForestConfig::default().with_n_estimators(5);
        let forest = RandomForestRegressor::fit(&rows, &target, &config, 42).expect("fit");
        TrainedModel {
            forest,
            encoders: CategoryEncoders {
                origin: CategoryEncoder::fit(CategoricalAttribute::Origin, ["DOH", "JFK"]),
                flight_type: CategoryEncoder::fit(
                    CategoricalAttribute::FlightType,
                    ["long-haul", "short-haul"],
                ),
                service_type: CategoryEncoder::fit(CategoricalAttribute::ServiceType, ["Retail"]),
                product_name: CategoryEncoder::fit(CategoricalAttribute::ProductName, ["Water"]),
            },
            feature_names: FEATURE_NAMES.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn test_save_load_roundtrip() {
        let dir = tempdir().unwrap();
        let bundle = ArtifactBundle::new(sample_model(), None);
        bundle.save(dir.path()).unwrap();

        for artifact in [MODEL_FILENAME, ENCODERS_FILENAME, METADATA_FILENAME] {
            assert!(dir.path().join(artifact).exists(), "{artifact} not written");
        }

        let loaded = ArtifactBundle::load(dir.path()).unwrap();
        assert_eq!(loaded.model, bundle.model);
        assert_eq!(loaded.metadata.feature_names, bundle.metadata.feature_names);
        assert_eq!(loaded.metadata.target_column, "quantity_consumed");
        assert!(loaded.metadata.checksums.is_some());
        // No staging files left behind.
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 3);
    }

    #[test]
    fn test_save_overwrites() {
        let dir = tempdir().unwrap();
        ArtifactBundle::new(sample_model(), None).save(dir.path()).unwrap();
        ArtifactBundle::new(sample_model(), None).save(dir.path()).unwrap();
        assert!(ArtifactBundle::load(dir.path()).is_ok());
    }

    #[test]
    fn test_missing_artifact_is_named() {
        let dir = tempdir().unwrap();
        ArtifactBundle::new(sample_model(), None).save(dir.path()).unwrap();
        std::fs::remove_file(dir.path().join(ENCODERS_FILENAME)).unwrap();

        let err = ArtifactBundle::load(dir.path()).unwrap_err();
        assert!(matches!(err, CheckpointError::ArtifactMissing { artifact: ENCODERS_FILENAME, .. }));
        assert!(err.to_string().contains(ENCODERS_FILENAME));
    }

    #[test]
    fn test_corrupt_model_rejected() {
        let dir = tempdir().unwrap();
        ArtifactBundle::new(sample_model(), None).save(dir.path()).unwrap();
        std::fs::write(dir.path().join(MODEL_FILENAME), b"not a forest").unwrap();

        let err = ArtifactBundle::load(dir.path()).unwrap_err();
        assert_eq!(err.artifact(), Some(MODEL_FILENAME));
        assert!(matches!(err, CheckpointError::ArtifactCorrupt { .. }));
    }

    #[test]
    fn test_width_mismatch_rejected() {
        let dir = tempdir().unwrap();
        let mut bundle = ArtifactBundle::new(sample_model(), None);
        bundle.metadata.feature_names.pop();
        bundle.save(dir.path()).unwrap();

        let err = ArtifactBundle::load(dir.path()).unwrap_err();
        assert!(
            matches!(&err, CheckpointError::ArtifactCorrupt { reason, .. } if reason.contains("7 features")),
            "unexpected error: {err}"
        );
    }

    #[test]
    fn test_unknown_feature_name_rejected() {
        let dir = tempdir().unwrap();
        let mut bundle = ArtifactBundle::new(sample_model(), None);
        bundle.metadata.feature_names[0] = "seat_pitch".to_string();
        bundle.save(dir.path()).unwrap();

        let err = ArtifactBundle::load(dir.path()).unwrap_err();
        assert_eq!(err.artifact(), Some(METADATA_FILENAME));
        assert!(err.to_string().contains("seat_pitch"));
    }

    #[test]
    fn test_unsupported_version_rejected() {
        let dir = tempdir().unwrap();
        let mut bundle = ArtifactBundle::new(sample_model(), None);
        bundle.metadata.format_version = FORMAT_VERSION + 1;
        bundle.save(dir.path()).unwrap();

        let err = ArtifactBundle::load(dir.path()).unwrap_err();
        assert!(err.to_string().contains("unsupported format version"));
    }

    #[test]
    fn test_save_into_file_path_fails() {
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("occupied");
        std::fs::write(&blocker, b"").unwrap();
        let err = ArtifactBundle::new(sample_model(), None)
            .save(&blocker)
            .unwrap_err();
        assert!(matches!(err, CheckpointError::Persist { .. }));
    }

    #[test]
    fn test_parts_of_different_saves_rejected() {
        let first = tempdir().unwrap();
        let second = tempdir().unwrap();
        ArtifactBundle::new(sample_model(), None).save(first.path()).unwrap();

        let mut other = sample_model();
        other.forest = RandomForestRegressor::fit(
            &[vec![0.0; 7], vec![1.0; 7]],
            &[1.0, 2.0],
            &ForestConfig::default().with_n_estimators(2),
            7,
        )
        .unwrap();
        ArtifactBundle::new(other, None).save(second.path()).unwrap();

        std::fs::copy(
            second.path().join(MODEL_FILENAME),
            first.path().join(MODEL_FILENAME),
        )
        .unwrap();
        let err = ArtifactBundle::load(first.path()).unwrap_err();
        assert_eq!(err.artifact(), Some(MODEL_FILENAME));
        assert!(err.to_string().contains("checksum"), "unexpected error: {err}");
    }

    #[test]
    fn test_interrupted_save_is_not_loadable() {
        let dir = tempdir().unwrap();
        let first = ArtifactBundle::new(sample_model(), None);
        first.save(dir.path()).unwrap();
        let before = std::fs::read(dir.path().join(MODEL_FILENAME)).unwrap();

        // The encoder destination becomes a directory, so its rename fails.
        std::fs::remove_file(dir.path().join(ENCODERS_FILENAME)).unwrap();
        std::fs::create_dir(dir.path().join(ENCODERS_FILENAME)).unwrap();
        std::fs::write(dir.path().join(ENCODERS_FILENAME).join("keep"), b"").unwrap();

        let mut second = sample_model();
        second.forest = RandomForestRegressor::fit(
            &[vec![0.0; 7], vec![1.0; 7]],
            &[1.0, 2.0],
            &ForestConfig::default().with_n_estimators(2),
            7,
        )
        .unwrap();
        let err = ArtifactBundle::new(second, None).save(dir.path()).unwrap_err();
        assert!(matches!(err, CheckpointError::Persist { .. }));
        assert_ne!(std::fs::read(dir.path().join(MODEL_FILENAME)).unwrap(), before);

        // Restore the old encoders: the new model must still be refused.
        std::fs::remove_dir_all(dir.path().join(ENCODERS_FILENAME)).unwrap();
        std::fs::write(
            dir.path().join(ENCODERS_FILENAME),
            encode_json(ENCODERS_FILENAME, &first.model.encoders).unwrap(),
        )
        .unwrap();
        let err = ArtifactBundle::load(dir.path()).unwrap_err();
        assert_eq!(err.artifact(), Some(MODEL_FILENAME));
    }

    #[test]
    fn test_missing_checksums_rejected() {
        let dir = tempdir().unwrap();
        ArtifactBundle::new(sample_model(), None).save(dir.path()).unwrap();
        let path = dir.path().join(METADATA_FILENAME);
        let mut metadata: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        metadata["checksums"] = serde_json::Value::Null;
        std::fs::write(&path, serde_json::to_vec(&metadata).unwrap()).unwrap();

        let err = ArtifactBundle::load(dir.path()).unwrap_err();
        assert_eq!(err.artifact(), Some(METADATA_FILENAME));
    }
}
