//! RSA-OAEP key unwrap followed by AES-CBC payload decryption.

use tracing::debug;

use super::{aes_key::AesKey, rsa_key::RsaDecryptionKey, CryptoError};

/// Decrypt `payload` with the AES key recovered from `wrapped_key`.
///
/// Steps run in order and stop at the first failure:
/// 1. RSA-OAEP unwrap → [`CryptoError::KeyUnwrapFailure`]
/// 2. AES key import → [`CryptoError::InvalidKeyLength`]
/// 3. AES-CBC decrypt → [`CryptoError::InvalidIvLength`] /
///    [`CryptoError::PayloadDecryptFailure`]
///
/// The OAEP check in step 1 is the only integrity check: a tampered payload
/// either fails unpadding or decrypts to different bytes.
pub fn decrypt(
    wrapped_key: &[u8],
    iv: &[u8],
    payload: &[u8],
    private_key: &RsaDecryptionKey,
) -> Result<Vec<u8>, CryptoError> {
    let raw_key = private_key.unwrap_key(wrapped_key)?;
    let aes_key = AesKey::import(&raw_key)?;
    debug!(aes_bits = aes_key.key_len() * 8, payload_len = payload.len(), "AES key unwrapped");
    aes_key.decrypt(iv, payload)
}
