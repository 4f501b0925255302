//! Per-artifact encode, decode and file helpers.
//!
//! Writes are staged: every artifact is first written to a temporary file
//! next to its destination and only renamed into place once all of them
//! exist on disk.

use crate::{CheckpointError, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// An artifact written to a temporary file, waiting to be renamed.
pub(crate) struct StagedArtifact {
    file: NamedTempFile,
    dest: PathBuf,
}

/// Writes `bytes` to a temporary file in `dest`'s directory.
pub(crate) fn stage(dest: PathBuf, bytes: &[u8]) -> Result<StagedArtifact> {
    let dir = dest.parent().map(Path::to_path_buf).unwrap_or_default();
    let persist_err = |source| CheckpointError::Persist {
        path: dest.clone(),
        source,
    };
    let mut file = NamedTempFile::new_in(&dir).map_err(persist_err)?;
    file.write_all(bytes).map_err(persist_err)?;
    file.as_file().sync_all().map_err(persist_err)?;
    tracing::debug!(path = %dest.display(), size = bytes.len(), "Artifact staged");
    Ok(StagedArtifact { file, dest })
}

impl StagedArtifact {
    /// Renames the staged file over its destination.
    pub(crate) fn commit(self) -> Result<()> {
        let dest = self.dest;
        self.file
            .persist(&dest)
            .map_err(|e| CheckpointError::Persist {
                path: dest.clone(),
                source: e.error,
            })?;
        tracing::debug!(path = %dest.display(), "Artifact written");
        Ok(())
    }
}

/// Hex SHA-256 of an encoded artifact.
pub(crate) fn digest(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

pub(crate) fn read_bytes(artifact: &'static str, path: &Path) -> Result<Vec<u8>> {
    if !path.exists() {
        return Err(CheckpointError::ArtifactMissing {
            artifact,
            dir: path.parent().map(Path::to_path_buf).unwrap_or_default(),
        });
    }
    std::fs::read(path).map_err(|e| CheckpointError::ArtifactCorrupt {
        artifact,
        path: path.to_path_buf(),
        reason: format!("unreadable: {e}"),
    })
}

pub(crate) fn encode_json<T: Serialize>(artifact: &'static str, value: &T) -> Result<Vec<u8>> {
    serde_json::to_vec_pretty(value).map_err(|e| CheckpointError::Encode {
        artifact,
        reason: e.to_string(),
    })
}

pub(crate) fn decode_json<T: DeserializeOwned>(
    artifact: &'static str,
    path: &Path,
    bytes: &[u8],
) -> Result<T> {
    serde_json::from_slice(bytes).map_err(|e| CheckpointError::ArtifactCorrupt {
        artifact,
        path: path.to_path_buf(),
        reason: format!("JSON decoding failed: {e}"),
    })
}

pub(crate) fn encode_bincode<T: Serialize>(artifact: &'static str, value: &T) -> Result<Vec<u8>> {
    bincode::serialize(value).map_err(|e| CheckpointError::Encode {
        artifact,
        reason: e.to_string(),
    })
}

pub(crate) fn decode_bincode<T: DeserializeOwned>(
    artifact: &'static str,
    path: &Path,
    bytes: &[u8],
) -> Result<T> {
    bincode::deserialize(bytes).map_err(|e| CheckpointError::ArtifactCorrupt {
        artifact,
        path: path.to_path_buf(),
        reason: format!("bincode decoding failed: {e}"),
    })
}
