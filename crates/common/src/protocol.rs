//! Request, response and persisted record types.
//!
//! Field names follow the JSON the browser client sends, so some structs use
//! camelCase renames.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Key material
// ---------------------------------------------------------------------------

/// Wrapped AES key and IV belonging to one encrypted file or message.
///
/// `key` is the base64 of an RSA-OAEP ciphertext whose plaintext is the raw
/// AES key. `iv` is the base64 of the 16-byte CBC initialisation vector and
/// is not encrypted. This is also the on-disk `certs-<name>` record format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyMaterial {
    /// Base64 RSA-OAEP ciphertext of the AES key.
    pub key: String,
    /// Base64 AES-CBC initialisation vector.
    pub iv: String,
}

// ---------------------------------------------------------------------------
// Decrypt endpoints
// ---------------------------------------------------------------------------

/// Request body for `PATCH /decrypt`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecryptFileRequest {
    /// Name the file was uploaded under.
    #[serde(rename = "fileName")]
    pub file_name: String,
}

/// Request body for `POST /decryptText`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecryptTextRequest {
    /// Base64 AES-CBC ciphertext.
    pub message: String,
    /// Base64 RSA-OAEP wrapped AES key.
    pub key: String,
    /// Base64 initialisation vector.
    pub iv: String,
}

// ---------------------------------------------------------------------------
// Error response
// ---------------------------------------------------------------------------

/// Standard error response body returned on any non-2xx status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Short machine-readable error code (e.g. `"not_found"`).
    pub code: String,
    /// Human-readable description safe to expose to callers.
    pub message: String,
}

impl ErrorResponse {
    /// Construct an [`ErrorResponse`] from a code and message.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}
