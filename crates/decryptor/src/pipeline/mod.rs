//! Decryption orchestration: server key loading, the file and text flows,
//! and uploads.
//!
//! Every operation is an ordered chain of fallible steps. Filesystem access
//! is the only suspension point; the crypto in between is synchronous.
//! Nothing is retried and nothing terminates the process: fatal conditions
//! are reported through [`PipelineError::is_fatal`] and the caller decides.

pub mod keys;
pub mod service;

pub use service::DecryptionPipeline;

use std::path::PathBuf;

use common::ServiceError;
use thiserror::Error;

use crate::crypto::CryptoError;
use crate::keystore::StoreError;

/// Errors produced by the orchestration layer.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A server key file could not be opened or read.
    #[error("key file unavailable at {}: {source}", path.display())]
    KeyFileUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The configured public key is not the public half of the private key.
    #[error("public key does not match private key")]
    KeyPairMismatch,

    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error(transparent)]
    Store(#[from] StoreError),

    /// A request field is not valid base64.
    #[error("{field} is not valid base64: {source}")]
    InvalidEncoding {
        field: &'static str,
        #[source]
        source: base64::DecodeError,
    },

    /// No uploaded file exists under this name.
    #[error("no uploaded file named {0}")]
    UploadNotFound(String),

    /// Reading the upload or writing output failed.
    #[error("I/O failed at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl PipelineError {
    /// Returns `true` for conditions that make the service unusable as a
    /// whole rather than failing one request: missing or mismatched server keys.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            PipelineError::KeyFileUnavailable { .. } | PipelineError::KeyPairMismatch
        )
    }
}

impl From<PipelineError> for ServiceError {
    fn from(err: PipelineError) -> Self {
        let message = err.to_string();
        match err {
            PipelineError::KeyFileUnavailable { .. } | PipelineError::KeyPairMismatch => {
                ServiceError::Unavailable("server key pair unavailable".into())
            }
            PipelineError::Crypto(
                CryptoError::EmptyKeyMaterial | CryptoError::InvalidKeyFormat(_),
            ) => ServiceError::Unavailable("server key pair unavailable".into()),
            PipelineError::Crypto(_) => ServiceError::DecryptionFailure(message),
            PipelineError::InvalidEncoding { .. }
            | PipelineError::Store(StoreError::InvalidFileName(_)) => {
                ServiceError::BadRequest(message)
            }
            PipelineError::Store(StoreError::RecordNotFound(_))
            | PipelineError::UploadNotFound(_) => ServiceError::NotFound(message),
            PipelineError::Store(StoreError::CorruptRecord { .. })
            | PipelineError::Store(StoreError::Io { .. })
            | PipelineError::Io { .. } => ServiceError::Internal(message),
        }
    }
}
