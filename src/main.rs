use std::sync::Arc;

use anyhow::Context;
use prometheus::Registry;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use ci_latency::config::Config;
use ci_latency::metrics::{BuildInfo, GithubMetrics, register_build_info};
use ci_latency::processor::{EventProcessor, spawn_processor};
use ci_latency::server::{AppState, build_router};

/// Log filter used when `RUST_LOG` is unset.
const DEFAULT_LOG_FILTER: &str = "ci_latency=info";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().context("invalid configuration")?;
    let build_info = BuildInfo::current();
    info!("Starting ci-latency {}", build_info);
    info!("{}", config);

    let registry = Registry::new();
    register_build_info(&registry, &build_info)?;
    let metrics = Arc::new(GithubMetrics::new(&registry)?);

    let processor = EventProcessor::new(
        metrics,
        config.context_rules.clone(),
        config.track_build_times,
    );
    let (handle, processor_task) = spawn_processor(processor, config.queue_capacity.get());

    let app = build_router(
        AppState::new(handle, config.webhook_secret.clone(), registry),
        &config.paths,
    );

    let shutdown = CancellationToken::new();
    tokio::spawn(cancel_on_signal(shutdown.clone()));

    let addr = config.listen_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await
        .context("server error")?;

    // The router held the last processor handle; wait for the backlog.
    let processor = processor_task.await.context("event processor panicked")?;
    info!(
        live = processor.live_count(),
        "Shutdown complete, discarding live state"
    );
    Ok(())
}

/// Cancels `token` on SIGINT or SIGTERM.
async fn cancel_on_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT, initiating graceful shutdown"),
        _ = terminate => info!("Received SIGTERM, initiating graceful shutdown"),
    }
    token.cancel();
}
