//! [`KeyMaterialStore`]: JSON persistence for per-file key material.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use common::protocol::KeyMaterial;
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::StorageLayout;

/// Errors produced by the key-material store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The file name is empty or could escape the files directory.
    #[error("invalid file name: {0:?}")]
    InvalidFileName(String),

    /// No record has been saved for this file name.
    #[error("no key material for {0}")]
    RecordNotFound(String),

    /// The record exists but is not `{ "key": string, "iv": string }` JSON,
    /// or its fields are not base64.
    #[error("corrupt key material for {file_name}: {source}")]
    CorruptRecord {
        file_name: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Reading or writing the record failed.
    #[error("key material I/O failed at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Reject names that are empty, contain a path separator, or are `.`/`..`.
///
/// Uploads are stored under their original name, so this is what keeps every
/// derived path inside the files directory.
pub fn validate_file_name(file_name: &str) -> Result<(), StoreError> {
    let unsafe_name = file_name.trim().is_empty()
        || file_name == "."
        || file_name == ".."
        || file_name.contains(['/', '\\', '\0']);
    if unsafe_name {
        return Err(StoreError::InvalidFileName(file_name.to_owned()));
    }
    Ok(())
}

/// Sibling of `path` used while its new content is written. The random
/// suffix keeps concurrent writers of the same name apart.
pub fn staging_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{name}.{}.part", Uuid::new_v4().simple()))
}

/// Remove a staging file left by a failed write.
pub async fn discard_staged(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        if e.kind() != ErrorKind::NotFound {
            warn!(path = %path.display(), error = %e, "failed to remove staging file");
        }
    }
}

/// Reads and writes `certs-<file name>` records in the files directory.
#[derive(Clone, Debug)]
pub struct KeyMaterialStore {
    layout: StorageLayout,
}

impl KeyMaterialStore {
    /// Create a store rooted at `layout.files_dir`.
    pub fn new(layout: StorageLayout) -> Self {
        Self { layout }
    }

    /// Path of the record for `file_name`.
    pub fn record_path(&self, file_name: &str) -> PathBuf {
        self.layout.key_material_path(file_name)
    }

    /// Persist `material` for `file_name`, replacing any previous record.
    ///
    /// The record is written to a staging file and renamed into place, so a
    /// failed save leaves the previous record readable.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidFileName`] for unsafe names and
    /// [`StoreError::Io`] if the write fails.
    pub async fn save(&self, file_name: &str, material: &KeyMaterial) -> Result<(), StoreError> {
        validate_file_name(file_name)?;
        let path = self.record_path(file_name);
        let json = serde_json::to_vec(material).map_err(|source| StoreError::CorruptRecord {
            file_name: file_name.to_owned(),
            source: source.into(),
        })?;
        let staging = staging_path(&path);
        let written = match tokio::fs::write(&staging, json).await {
            Ok(()) => tokio::fs::rename(&staging, &path).await,
            Err(e) => Err(e),
        };
        if let Err(source) = written {
            discard_staged(&staging).await;
            return Err(io_error(&path, source));
        }
        debug!(file_name, "key material saved");
        Ok(())
    }

    /// Read the record for `file_name`.
    ///
    /// # Errors
    ///
    /// - [`StoreError::InvalidFileName`] for unsafe names.
    /// - [`StoreError::RecordNotFound`] if nothing was saved for `file_name`.
    /// - [`StoreError::CorruptRecord`] if the content is not a valid record.
    /// - [`StoreError::Io`] for any other read failure.
    pub async fn load(&self, file_name: &str) -> Result<KeyMaterial, StoreError> {
        validate_file_name(file_name)?;
        let path = self.record_path(file_name);
        let bytes = tokio::fs::read(&path).await.map_err(|source| {
            if source.kind() == ErrorKind::NotFound {
                StoreError::RecordNotFound(file_name.to_owned())
            } else {
                io_error(&path, source)
            }
        })?;
        serde_json::from_slice(&bytes).map_err(|source| StoreError::CorruptRecord {
            file_name: file_name.to_owned(),
            source: source.into(),
        })
    }
}

fn io_error(path: &Path, source: std::io::Error) -> StoreError {
    StoreError::Io {
        path: path.to_path_buf(),
        source,
    }
}
