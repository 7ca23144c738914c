//! Server key pair loading.
//!
//! Keys are re-read from disk on every request so that replacing the files
//! takes effect without a restart.

use std::path::Path;

use tracing::info;

use super::PipelineError;
use crate::config::StorageLayout;
use crate::crypto::{pem, RsaDecryptionKey, RsaEncryptionKey};

async fn read_key_file(path: &Path) -> Result<String, PipelineError> {
    tokio::fs::read_to_string(path)
        .await
        .map_err(|source| PipelineError::KeyFileUnavailable {
            path: path.to_path_buf(),
            source,
        })
}

/// Load the PKCS#8 private key as a decrypt-only handle.
///
/// # Errors
///
/// [`PipelineError::KeyFileUnavailable`] if the file cannot be read, or a
/// crypto error if its PEM body is empty or not an RSA PKCS#8 key.
pub async fn load_private_key(layout: &StorageLayout) -> Result<RsaDecryptionKey, PipelineError> {
    let text = read_key_file(&layout.private_key_path).await?;
    Ok(RsaDecryptionKey::from_pem(&text)?)
}

/// Load the public key and return its base64 PEM body for distribution.
///
/// # Errors
///
/// [`PipelineError::KeyFileUnavailable`] if the file cannot be read, or
/// [`crate::crypto::CryptoError::EmptyKeyMaterial`] if it has no body.
pub async fn load_public_key(layout: &StorageLayout) -> Result<String, PipelineError> {
    let text = read_key_file(&layout.public_key_path).await?;
    Ok(pem::parse(&text, pem::PUBLIC_KEY_HEADER, pem::PUBLIC_KEY_FOOTER)?)
}

/// Load both keys and check they form a pair. Used once at startup.
///
/// # Errors
///
/// Any loading error, or [`PipelineError::KeyPairMismatch`].
pub async fn verify_key_pair(layout: &StorageLayout) -> Result<(), PipelineError> {
    let private = load_private_key(layout).await?;
    let public_text = read_key_file(&layout.public_key_path).await?;
    let public = RsaEncryptionKey::from_pem(&public_text)?;
    if !private.matches(&public) {
        return Err(PipelineError::KeyPairMismatch);
    }
    info!(
        public_key = %layout.public_key_path.display(),
        private_key = %layout.private_key_path.display(),
        "server key pair loaded"
    );
    Ok(())
}
