//! Structured logging and optional OpenTelemetry span export.
//!
//! # Telemetry invariants
//!
//! - **No key material or plaintext** may appear in any span attribute or
//!   log field. File names and byte counts are fine.
//! - Log level is configurable via `LOG_LEVEL` (default: `info`).

pub mod init;

pub use init::{init_telemetry, shutdown_telemetry};
