//! Wire types and errors shared by the hybrid decryption service crates.

pub mod error;
pub mod protocol;

pub use error::ServiceError;
