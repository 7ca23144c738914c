//! Shared fixtures for unit tests: one RSA key pair per test binary, sealing
//! helpers that play the client's role, and temp-dir storage layouts.

use std::path::Path;
use std::sync::OnceLock;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use common::protocol::KeyMaterial;
use rand::RngCore;
use rsa::pkcs8::{EncodePrivateKey, EncodePublicKey, LineEnding};
use rsa::RsaPrivateKey;

use crate::config::StorageLayout;
use crate::crypto::{aes_key::AesKey, RsaDecryptionKey};

// 1024 bits keeps debug-build key generation fast and still fits a
// 32-byte AES key under OAEP-SHA256.
const TEST_KEY_BITS: usize = 1024;

fn private_key() -> &'static RsaPrivateKey {
    static KEY: OnceLock<RsaPrivateKey> = OnceLock::new();
    KEY.get_or_init(|| {
        RsaPrivateKey::new(&mut rand::thread_rng(), TEST_KEY_BITS).expect("generate RSA test key")
    })
}

/// PKCS#8 PEM of the shared test key.
pub fn private_pem() -> String {
    private_key()
        .to_pkcs8_pem(LineEnding::LF)
        .expect("encode PKCS#8 PEM")
        .as_str()
        .to_owned()
}

/// SPKI PEM of the shared test key.
pub fn public_pem() -> String {
    private_key()
        .to_public_key()
        .to_public_key_pem(LineEnding::LF)
        .expect("encode SPKI PEM")
}

/// Decrypt-only handle for the shared test key.
pub fn decryption_key() -> &'static RsaDecryptionKey {
    static KEY: OnceLock<RsaDecryptionKey> = OnceLock::new();
    KEY.get_or_init(|| RsaDecryptionKey::from_pem(&private_pem()).expect("import test key"))
}

/// Output of [`seal`]: what a client would send.
pub struct Sealed {
    pub wrapped_key: Vec<u8>,
    pub iv: Vec<u8>,
    pub payload: Vec<u8>,
}

impl Sealed {
    /// Base64 key material record for this message.
    pub fn key_material(&self) -> KeyMaterial {
        KeyMaterial {
            key: STANDARD.encode(&self.wrapped_key),
            iv: STANDARD.encode(&self.iv),
        }
    }

    /// Base64 of the AES-CBC payload.
    pub fn payload_b64(&self) -> String {
        STANDARD.encode(&self.payload)
    }
}

/// Encrypt `plaintext` under a fresh AES key of `key_len` bytes and wrap
/// that key with the shared test public key.
pub fn seal(plaintext: &[u8], key_len: usize) -> Sealed {
    let mut rng = rand::thread_rng();
    let mut raw_key = vec![0u8; key_len];
    rng.fill_bytes(&mut raw_key);
    let mut iv = vec![0u8; 16];
    rng.fill_bytes(&mut iv);

    let aes_key = AesKey::import(&raw_key).expect("valid AES key length");
    let payload = aes_key.encrypt(&iv, plaintext).expect("valid IV");
    let wrapped_key = decryption_key()
        .encryption_key()
        .wrap_key(&mut rng, &raw_key)
        .expect("wrap AES key");

    Sealed {
        wrapped_key,
        iv,
        payload,
    }
}

/// Build a default storage layout under `base` with the test key pair
/// written to `keys/` and an empty `files/` directory.
pub fn storage(base: &Path) -> StorageLayout {
    let layout = StorageLayout::with_defaults(base);
    std::fs::create_dir_all(layout.private_key_path.parent().expect("key dir")).unwrap();
    std::fs::create_dir_all(&layout.files_dir).unwrap();
    std::fs::write(&layout.private_key_path, private_pem()).unwrap();
    std::fs::write(&layout.public_key_path, public_pem()).unwrap();
    layout
}
