//! Hybrid RSA-OAEP / AES-CBC decryption primitives.
//!
//! This module is free of filesystem and HTTP dependencies. Everything here
//! is a pure, synchronous transformation over in-memory bytes.
//!
//! # Scheme
//!
//! ```text
//! wrapped_key = RSA-OAEP-SHA256(public_key, aes_key)      aes_key: 16 | 24 | 32 bytes
//! payload     = AES-CBC-PKCS7(aes_key, iv, plaintext)     iv: 16 bytes, sent in clear
//! ```
//!
//! There is no MAC over the payload. Adding one would break compatibility
//! with ciphertext produced by existing clients.

pub mod aes_key;
pub mod hybrid;
pub mod pem;
pub mod rsa_key;

pub use hybrid::decrypt;
pub use rsa_key::{RsaDecryptionKey, RsaEncryptionKey};

use thiserror::Error;

/// Errors produced by the crypto layer.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// A PEM block had no body between its header and footer lines.
    #[error("key file contains no key material")]
    EmptyKeyMaterial,

    /// Key bytes are not a valid PKCS#8 / SPKI RSA key.
    #[error("invalid key format: {0}")]
    InvalidKeyFormat(String),

    /// Unwrapped AES key has a length other than 16, 24 or 32 bytes.
    #[error("invalid AES key length: {0} bytes")]
    InvalidKeyLength(usize),

    /// The IV is not exactly one AES block.
    #[error("invalid IV length: expected 16 bytes, got {0}")]
    InvalidIvLength(usize),

    /// RSA-OAEP decryption of the wrapped AES key failed.
    #[error("failed to unwrap AES key")]
    KeyUnwrapFailure,

    /// AES-CBC ciphertext is not block-aligned or has invalid padding.
    #[error("failed to decrypt payload")]
    PayloadDecryptFailure,
}
