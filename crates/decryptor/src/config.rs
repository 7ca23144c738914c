//! Configuration loading and validation for the decryption service.
//!
//! All values are read from environment variables at startup. The process will
//! exit with a clear error message if any variable is invalid.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

/// Validated service configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Base directory that every storage path is resolved against.
    #[serde(default = "default_storage_dir")]
    pub storage_dir: String,

    /// SPKI PEM public key handed out to clients, relative to `storage_dir`.
    #[serde(default = "default_public_key_file")]
    pub public_key_file: String,

    /// Unencrypted PKCS#8 PEM private key, relative to `storage_dir`.
    #[serde(default = "default_private_key_file")]
    pub private_key_file: String,

    /// Directory for uploads, key-material records and decrypted output,
    /// relative to `storage_dir`.
    #[serde(default = "default_files_dir")]
    pub files_dir: String,

    /// Port the HTTP server listens on.
    #[serde(default = "default_listen_port")]
    pub listen_port: u16,

    /// Largest accepted request body, in bytes.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,

    /// Tracing log level (e.g. `"info"`, `"debug"`).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// OTLP collector endpoint. Span export is disabled when unset.
    #[serde(default)]
    pub otel_exporter_otlp_endpoint: Option<String>,
}

fn default_storage_dir() -> String {
    ".".into()
}
fn default_public_key_file() -> String {
    "keys/pub.pem".into()
}
fn default_private_key_file() -> String {
    "keys/pkcs8.key".into()
}
fn default_files_dir() -> String {
    "files".into()
}
fn default_listen_port() -> u16 {
    3000
}
fn default_max_body_bytes() -> usize {
    10 * 1024 * 1024
}
fn default_log_level() -> String {
    "info".into()
}

impl Config {
    /// Load and validate configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable cannot be parsed or fails validation.
    pub fn from_env() -> Result<Self> {
        let cfg = config::Config::builder()
            .add_source(config::Environment::default())
            .build()
            .context("failed to build configuration from environment")?;

        let c: Config = cfg
            .try_deserialize()
            .context("failed to deserialise configuration")?;

        c.validate()?;
        Ok(c)
    }

    /// Resolve the configured paths into a [`StorageLayout`].
    pub fn storage_layout(&self) -> StorageLayout {
        let base = PathBuf::from(&self.storage_dir);
        StorageLayout {
            public_key_path: base.join(&self.public_key_file),
            private_key_path: base.join(&self.private_key_file),
            files_dir: base.join(&self.files_dir),
        }
    }

    /// Validate all fields, returning a descriptive error on the first failure.
    fn validate(&self) -> Result<()> {
        ensure_non_empty(&self.storage_dir, "STORAGE_DIR")?;
        ensure_relative(&self.public_key_file, "PUBLIC_KEY_FILE")?;
        ensure_relative(&self.private_key_file, "PRIVATE_KEY_FILE")?;
        ensure_relative(&self.files_dir, "FILES_DIR")?;

        if self.listen_port == 0 {
            anyhow::bail!("LISTEN_PORT must be > 0");
        }
        if self.max_body_bytes == 0 {
            anyhow::bail!("MAX_BODY_BYTES must be > 0");
        }
        if let Some(endpoint) = &self.otel_exporter_otlp_endpoint {
            ensure_non_empty(endpoint, "OTEL_EXPORTER_OTLP_ENDPOINT")?;
        }
        Ok(())
    }
}

fn ensure_non_empty(value: &str, name: &str) -> Result<()> {
    if value.trim().is_empty() {
        anyhow::bail!("{name} is required and must not be empty");
    }
    Ok(())
}

fn ensure_relative(value: &str, name: &str) -> Result<()> {
    ensure_non_empty(value, name)?;
    if Path::new(value).is_absolute() {
        anyhow::bail!("{name} must be relative to STORAGE_DIR");
    }
    Ok(())
}

/// Resolved on-disk locations used by the key loaders, the key-material
/// store and the file orchestrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageLayout {
    /// Server public key, PEM SPKI.
    pub public_key_path: PathBuf,
    /// Server private key, PEM PKCS#8.
    pub private_key_path: PathBuf,
    /// Uploads, `certs-*` records and `decrypted-*` output.
    pub files_dir: PathBuf,
}

impl StorageLayout {
    /// Default layout (`keys/pub.pem`, `keys/pkcs8.key`, `files/`) under `base`.
    #[cfg(test)]
    pub fn with_defaults(base: impl AsRef<Path>) -> Self {
        let base = base.as_ref();
        Self {
            public_key_path: base.join(default_public_key_file()),
            private_key_path: base.join(default_private_key_file()),
            files_dir: base.join(default_files_dir()),
        }
    }

    /// Path of an uploaded (encrypted) file.
    pub fn upload_path(&self, file_name: &str) -> PathBuf {
        self.files_dir.join(file_name)
    }

    /// Path of the `certs-<name>` key-material record for `file_name`.
    pub fn key_material_path(&self, file_name: &str) -> PathBuf {
        self.files_dir.join(format!("certs-{file_name}"))
    }

    /// Path the plaintext of `file_name` is written to.
    pub fn decrypted_path(&self, file_name: &str) -> PathBuf {
        self.files_dir.join(format!("decrypted-{file_name}"))
    }
}
