//! `decryptor`: hybrid decryption service entry point.
//!
//! Startup sequence:
//! 1. Load and validate [`Config`] from environment variables.
//! 2. Initialise the telemetry pipeline (JSON logs, optional OTLP).
//! 3. Load and cross-check the server key pair; failure ends the process.
//! 4. Ensure the files directory exists.
//! 5. Build the Axum router and serve until Ctrl-C / SIGTERM.

mod config;
mod crypto;
mod keystore;
mod pipeline;
mod server;
mod telemetry;

#[cfg(test)]
mod test_support;

use anyhow::{Context, Result};
use tracing::{error, info};

use config::Config;
use pipeline::DecryptionPipeline;
use server::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // -----------------------------------------------------------------------
    // 1. Configuration
    // -----------------------------------------------------------------------
    let cfg = Config::from_env().map_err(|e| {
        // Telemetry is not yet up; write to stderr directly.
        eprintln!("ERROR: configuration invalid: {e}");
        e
    })?;

    // -----------------------------------------------------------------------
    // 2. Telemetry
    // -----------------------------------------------------------------------
    telemetry::init_telemetry(cfg.otel_exporter_otlp_endpoint.as_deref(), &cfg.log_level)?;
    info!(
        version = env!("CARGO_PKG_VERSION"),
        port = cfg.listen_port,
        storage_dir = %cfg.storage_dir,
        "decryptor starting"
    );

    // -----------------------------------------------------------------------
    // 3. Server key pair
    // -----------------------------------------------------------------------
    let layout = cfg.storage_layout();
    if let Err(e) = pipeline::keys::verify_key_pair(&layout).await {
        error!(error = %e, fatal = e.is_fatal(), "server key pair rejected");
        return Err(e).context("cannot start without a usable server key pair");
    }

    // -----------------------------------------------------------------------
    // 4. Storage
    // -----------------------------------------------------------------------
    tokio::fs::create_dir_all(&layout.files_dir)
        .await
        .with_context(|| format!("failed to create {}", layout.files_dir.display()))?;

    // -----------------------------------------------------------------------
    // 5. HTTP server
    // -----------------------------------------------------------------------
    let state = AppState::new(DecryptionPipeline::new(layout), cfg.max_body_bytes);
    let router = server::router::build(state);

    let addr: std::net::SocketAddr = ([0, 0, 0, 0], cfg.listen_port).into();
    info!(addr = %addr, "listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("shut down");
    telemetry::shutdown_telemetry();
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for Ctrl-C");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
