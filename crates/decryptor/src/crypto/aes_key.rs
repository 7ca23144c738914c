//! AES-CBC with PKCS#7 padding for 128, 192 and 256-bit keys.

use aes::cipher::{block_padding::Pkcs7, BlockDecryptMut, KeyIvInit};

use zeroize::Zeroizing;

use super::CryptoError;

/// AES block size, which is also the required IV length.
pub const BLOCK_LEN: usize = 16;

/// Raw AES key lengths accepted by [`AesKey::import`].
pub const KEY_LENS: [usize; 3] = [16, 24, 32];

/// Imported AES-CBC key, usable for both directions.
///
/// The key bytes are zeroed on drop and never printed.
pub struct AesKey {
    bytes: Zeroizing<Vec<u8>>,
}

impl AesKey {
    /// Import raw key bytes.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::InvalidKeyLength`] unless `raw` is 16, 24 or 32 bytes.
    pub fn import(raw: &[u8]) -> Result<Self, CryptoError> {
        if !KEY_LENS.contains(&raw.len()) {
            return Err(CryptoError::InvalidKeyLength(raw.len()));
        }
        Ok(Self {
            bytes: Zeroizing::new(raw.to_vec()),
        })
    }

    /// Key length in bytes.
    pub fn key_len(&self) -> usize {
        self.bytes.len()
    }

    /// Decrypt a CBC ciphertext and strip PKCS#7 padding.
    ///
    /// # Errors
    ///
    /// - [`CryptoError::InvalidIvLength`] if `iv` is not [`BLOCK_LEN`] bytes.
    /// - [`CryptoError::PayloadDecryptFailure`] if `ciphertext` is empty, is
    ///   not a multiple of [`BLOCK_LEN`], or has invalid padding.
    pub fn decrypt(&self, iv: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        check_iv(iv)?;
        if ciphertext.is_empty() || ciphertext.len() % BLOCK_LEN != 0 {
            return Err(CryptoError::PayloadDecryptFailure);
        }
        let key = &self.bytes[..];
        let plaintext = match key.len() {
            16 => cbc::Decryptor::<aes::Aes128>::new_from_slices(key, iv)
                .map_err(|_| CryptoError::InvalidKeyLength(key.len()))?
                .decrypt_padded_vec_mut::<Pkcs7>(ciphertext),
            24 => cbc::Decryptor::<aes::Aes192>::new_from_slices(key, iv)
                .map_err(|_| CryptoError::InvalidKeyLength(key.len()))?
                .decrypt_padded_vec_mut::<Pkcs7>(ciphertext),
            32 => cbc::Decryptor::<aes::Aes256>::new_from_slices(key, iv)
                .map_err(|_| CryptoError::InvalidKeyLength(key.len()))?
                .decrypt_padded_vec_mut::<Pkcs7>(ciphertext),
            n => return Err(CryptoError::InvalidKeyLength(n)),
        };
        plaintext.map_err(|_| CryptoError::PayloadDecryptFailure)
    }

    /// Encrypt `plaintext` with PKCS#7 padding. Inverse of [`AesKey::decrypt`].
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::InvalidIvLength`] if `iv` is not [`BLOCK_LEN`] bytes.
    #[cfg(test)]
    pub fn encrypt(&self, iv: &[u8], plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        use aes::cipher::BlockEncryptMut;

        check_iv(iv)?;
        let key = &self.bytes[..];
        let ciphertext = match key.len() {
            16 => cbc::Encryptor::<aes::Aes128>::new_from_slices(key, iv)
                .map_err(|_| CryptoError::InvalidKeyLength(key.len()))?
                .encrypt_padded_vec_mut::<Pkcs7>(plaintext),
            24 => cbc::Encryptor::<aes::Aes192>::new_from_slices(key, iv)
                .map_err(|_| CryptoError::InvalidKeyLength(key.len()))?
                .encrypt_padded_vec_mut::<Pkcs7>(plaintext),
            32 => cbc::Encryptor::<aes::Aes256>::new_from_slices(key, iv)
                .map_err(|_| CryptoError::InvalidKeyLength(key.len()))?
                .encrypt_padded_vec_mut::<Pkcs7>(plaintext),
            n => return Err(CryptoError::InvalidKeyLength(n)),
        };
        Ok(ciphertext)
    }
}

fn check_iv(iv: &[u8]) -> Result<(), CryptoError> {
    if iv.len() != BLOCK_LEN {
        return Err(CryptoError::InvalidIvLength(iv.len()));
    }
    Ok(())
}

impl std::fmt::Debug for AesKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "AesKey(AES-{}, [REDACTED])", self.bytes.len() * 8)
    }
}
