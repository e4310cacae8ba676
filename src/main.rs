//! SocialSKK - An SKK dictionary server backed by Social IME
//!
//! Parses options, builds the shared lookup service, and serves SKK clients
//! until interrupted.

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use social_skk::server::host_of_machine;
use social_skk::{Cli, LookupService, Server};

/// Main entry point for the SocialSKK server.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Parse command line options (with environment fallbacks)
/// 3. Build the lookup service: cache store plus Social IME client
/// 4. Bind the listener and report where it is serving
/// 5. Serve clients until SIGINT/SIGTERM, then log cache statistics
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "social_skk=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Cli::parse()
        .into_config()
        .context("Failed to read configuration")?;

    let service = Arc::new(
        LookupService::from_config(&config).context("Failed to create the backend client")?,
    );

    let server = Server::bind(&config, Arc::clone(&service))
        .await
        .with_context(|| format!("Failed to bind {}:{}", config.host, config.port))?;

    info!("Server is on {}", server.local_addr()?);
    info!("Host identifies as {}", host_of_machine().await.trim_end());
    if let Some(proxy) = &config.proxy {
        info!("Proxy is {}", proxy);
    }
    info!("Cache keep time {}sec", config.cache_ttl.as_secs());
    info!("Backend is {} (timeout {:?})", config.backend_url, config.backend_timeout);

    let result = server.run(shutdown_signal()).await;

    info!("Cache statistics: {}", service.stats().await);
    if let Err(e) = &result {
        error!("Listener failed: {}", e);
    }
    result.context("Server stopped unexpectedly")
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }
}
