//! Boundary error type shared across crates.

use thiserror::Error;

/// Top-level service error type.
///
/// Variants map to HTTP status codes returned to callers:
/// - [`ServiceError::BadRequest`] → 400
/// - [`ServiceError::NotFound`] → 404
/// - [`ServiceError::PayloadTooLarge`] → 413
/// - [`ServiceError::DecryptionFailure`] → 422
/// - [`ServiceError::Unavailable`] → 503
/// - [`ServiceError::Internal`] → 500
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The request was malformed: missing field, invalid base64, or an unsafe file name.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// No uploaded file or key material exists for the requested name.
    #[error("not found: {0}")]
    NotFound(String),

    /// The request body exceeds the configured size limit.
    #[error("payload too large: {0}")]
    PayloadTooLarge(String),

    /// The supplied key material or ciphertext could not be decrypted.
    #[error("decryption failure: {0}")]
    DecryptionFailure(String),

    /// The server key pair cannot be read or parsed.
    #[error("service unavailable: {0}")]
    Unavailable(String),

    /// An unexpected internal error occurred.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    /// Returns the HTTP status code that should be sent for this error.
    pub fn http_status(&self) -> u16 {
        match self {
            ServiceError::BadRequest(_) => 400,
            ServiceError::NotFound(_) => 404,
            ServiceError::PayloadTooLarge(_) => 413,
            ServiceError::DecryptionFailure(_) => 422,
            ServiceError::Unavailable(_) => 503,
            ServiceError::Internal(_) => 500,
        }
    }

    /// Short machine-readable code used in [`crate::protocol::ErrorResponse`].
    pub fn code(&self) -> &'static str {
        match self {
            ServiceError::BadRequest(_) => "bad_request",
            ServiceError::NotFound(_) => "not_found",
            ServiceError::PayloadTooLarge(_) => "payload_too_large",
            ServiceError::DecryptionFailure(_) => "decryption_failed",
            ServiceError::Unavailable(_) => "service_unavailable",
            ServiceError::Internal(_) => "internal_error",
        }
    }
}
