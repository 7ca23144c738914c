//! Shared application state injected into every Axum handler.

use crate::pipeline::DecryptionPipeline;

/// Application state shared across all request handlers.
///
/// Cheap to clone: the pipeline only holds resolved paths.
#[derive(Clone, Debug)]
pub struct AppState {
    /// Decryption, upload and key-distribution flows.
    pub pipeline: DecryptionPipeline,
    /// Largest accepted request body in bytes.
    pub max_body_bytes: usize,
}

impl AppState {
    /// Create a new [`AppState`] around `pipeline`.
    pub fn new(pipeline: DecryptionPipeline, max_body_bytes: usize) -> Self {
        Self {
            pipeline,
            max_body_bytes,
        }
    }
}
