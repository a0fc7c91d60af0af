//! 📮 factrelay — accept facts over HTTP, buffer them, forward them one by one.
//!
//! The binary crate loads config and sets up logging; everything else lives here.

pub mod app_config;
mod backends;
mod buffer;
mod common;
mod gateway;
mod supervisors;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info};

use crate::app_config::AppConfig;
use crate::backends::SinkBackend;
use crate::supervisors::Supervisor;

pub use crate::backends::{CollectorSinkConfig, InMemorySinkConfig};
pub use crate::common::Fact;

/// 🚀 Bind, serve, supervise — until SIGINT or SIGTERM.
///
/// On shutdown the listener stops accepting, in-flight requests finish, the buffer gets
/// one last flush and the delivery worker drains whatever is already queued. That drain
/// gets `runtime.drain_timeout_ms`, or until a second signal, and then it is abandoned.
/// Failing to bind the listen address is fatal. Nothing downstream ever is.
pub async fn run(app_config: AppConfig) -> Result<()> {
    let sink = SinkBackend::from_config(&app_config.sink_config)
        .context("💀 Failed to build the sink from sink_config")?;

    let listener = TcpListener::bind(&app_config.server.listen_addr)
        .await
        .with_context(|| {
            format!(
                "💀 Failed to bind '{}'. Is something else already listening there?",
                app_config.server.listen_addr
            )
        })?;

    let (ingestor, handles) = Supervisor::new(app_config.runtime.clone()).start(sink);

    info!("🚀 Server started, accepting facts on {}", app_config.server.listen_addr);
    axum::serve(listener, gateway::router(ingestor))
        .with_graceful_shutdown(wait_for_shutdown())
        .await
        .context("💀 The HTTP server fell over")?;

    let drain_timeout = app_config.runtime.drain_timeout();
    info!(
        "🏁 Server stopped, draining the pipeline (up to {:?}, signal again to skip)",
        drain_timeout
    );
    handles.shutdown(drain_timeout, wait_for_shutdown()).await?;
    info!("👋 Pipeline drained. Goodbye.");
    Ok(())
}

/// 🛑 Resolves on SIGINT (Ctrl-C) or, on unix, SIGTERM.
///
/// A handler that fails to install is logged and never fires, the other one still can.
async fn wait_for_shutdown() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            error!("💀 Could not install the Ctrl-C handler: {}", err);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                error!("💀 Could not install the SIGTERM handler: {}", err);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("🛑 Received Ctrl-C, shutting down"),
        _ = terminate => info!("🛑 Received SIGTERM, shutting down"),
    }
}
