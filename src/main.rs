use std::net::SocketAddr;

use anyhow::Context;
use tokio::sync::watch;
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use terrenos_api::app;
use terrenos_api::config;
use terrenos_api::scheduler::{AuditArchiveScheduler, DailySchedule};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up DATABASE_URL, JWT_SECRET, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = config::config();
    config.validate().map_err(anyhow::Error::msg).context("invalid configuration")?;
    info!("Starting Terrenos API in {:?} mode", config.environment);

    let state = app::state_from_config(config).await.context("failed to open audit store")?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let scheduler_task = if config.audit.archive_enabled {
        let schedule = DailySchedule::new(config.audit.archive_hour, config.audit.archive_minute)?;
        let scheduler = AuditArchiveScheduler::new(schedule, state.scheduler.clone());
        if let Ok(next) = scheduler.next_run() {
            info!("Audit archival scheduled daily, next run at {}", next);
        }
        Some(scheduler.spawn(shutdown_rx))
    } else {
        info!("Audit archival scheduler disabled");
        None
    };

    let mut router = app::router(state);
    if let Some(cors) = app::cors_layer() {
        router = router.layer(cors);
    }
    if config.api.enable_request_logging {
        router = router.layer(TraceLayer::new_for_http());
    }

    let bind_addr = SocketAddr::from(([0, 0, 0, 0], config.api.port));
    let listener = tokio::net::TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;

    info!("Terrenos API listening on http://{}", bind_addr);

    axum::serve(listener, router.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    let _ = shutdown_tx.send(true);
    if let Some(task) = scheduler_task {
        if let Err(e) = task.await {
            error!("Scheduler task ended abnormally: {}", e);
        }
    }

    info!("Terrenos API stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
