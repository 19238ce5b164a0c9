//! term-bridge server.
//!
//! Bridges browser terminals over WebSocket to shells running in
//! Kubernetes pods (or local processes with `--backend pty`).
//!
//! Run with: cargo run -p term-bridge-server -- --backend pty
//!
//! Then open http://localhost:3000 in your browser.

mod config;
mod web;

use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use axum::{Router, routing::get};
use clap::Parser;
use term_bridge_core::ExecBackend;
use term_bridge_kube::KubeBackend;
use term_bridge_pty::PtyBackend;
use term_bridge_session::SessionOrchestrator;
use term_bridge_transport::websocket::create_ws_router;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{BackendKind, Config, default_config_path};

/// Terminal bridge from WebSocket clients to pod exec sessions.
#[derive(Parser, Debug)]
#[command(name = "term-bridge")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Address to listen on (e.g. 0.0.0.0:3000)
    #[arg(short, long, value_name = "ADDR")]
    listen: Option<String>,

    /// Where sessions run
    #[arg(short, long, value_enum)]
    backend: Option<BackendKind>,

    /// Default log level when RUST_LOG is unset
    #[arg(long, value_name = "LEVEL")]
    log_level: Option<String>,
}

impl Cli {
    fn apply(self, config: &mut Config) {
        if let Some(listen) = self.listen {
            config.server.listen = listen;
        }
        if let Some(backend) = self.backend {
            config.backend.kind = backend;
        }
        if let Some(level) = self.log_level {
            config.server.log_level = level;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let mut cli = Cli::parse();

    let path = cli.config.take().unwrap_or_else(default_config_path);
    let mut config = Config::load(&path)?;
    config.apply_env_overrides();
    cli.apply(&mut config);
    config.validate().context("Invalid configuration")?;

    init_tracing(&config.server.log_level);
    tracing::debug!(path = %path.display(), ?config, "configuration loaded");

    let backend: Arc<dyn ExecBackend> = match config.backend.kind {
        BackendKind::Kube => Arc::new(
            KubeBackend::connect(&config.backend.kube)
                .await
                .context("Failed to connect to the cluster")?,
        ),
        BackendKind::Pty => Arc::new(PtyBackend::new(config.backend.pty.clone())),
    };
    tracing::info!(backend = ?config.backend.kind, "exec backend ready");

    let orchestrator = SessionOrchestrator::new(backend, config.session.clone());
    let encoding = orchestrator.config().encoding;

    let app = Router::new()
        .route("/", get(move || async move { web::index_page(encoding) }))
        .merge(create_ws_router(orchestrator, config.server.outbound_capacity))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr = config.listen_addr()?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    tracing::info!("Server listening on http://{addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("Server stopped");
    Ok(())
}

fn init_tracing(default_level: &str) {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .init();
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_overrides_config() {
        let cli = Cli::parse_from([
            "term-bridge",
            "--listen",
            "0.0.0.0:4000",
            "--backend",
            "pty",
            "--log-level",
            "debug",
        ]);
        let mut config = Config::default();
        cli.apply(&mut config);

        assert_eq!(config.server.listen, "0.0.0.0:4000");
        assert_eq!(config.backend.kind, BackendKind::Pty);
        assert_eq!(config.server.log_level, "debug");
    }

    #[test]
    fn test_cli_defaults_leave_config_alone() {
        let cli = Cli::parse_from(["term-bridge", "-c", "/tmp/tb.toml"]);
        assert_eq!(cli.config.as_deref(), Some(std::path::Path::new("/tmp/tb.toml")));

        let mut config = Config::default();
        cli.apply(&mut config);
        assert_eq!(config, Config::default());
    }
}
