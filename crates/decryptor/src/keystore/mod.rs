//! On-disk key-material records (`certs-<file name>`).
//!
//! # Lifecycle
//!
//! 1. At upload time the client-supplied `{key, iv}` pair is written next to
//!    the encrypted file by [`KeyMaterialStore::save`].
//! 2. Every file decryption reads it back once via [`KeyMaterialStore::load`].
//! 3. Records are never mutated in place or deleted; a second upload under the
//!    same name replaces the previous record by renaming a staged copy over it.
//!
//! Concurrent `save`/`load` calls for the same name are not serialised.

pub mod store;

pub use store::{discard_staged, staging_path, validate_file_name, KeyMaterialStore, StoreError};
