//! rowqueue server: keeps the job store tidy.
//!
//! Registers this process as a server, heartbeats, and runs the expiration
//! sweeper until Ctrl-C. Job handlers are registered by applications that
//! embed `rowqueue-worker`; this binary performs no jobs itself.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::{EnvFilter, fmt};
use uuid::Uuid;

use rowqueue_core::config::AppConfig;
use rowqueue_core::error::AppError;
use rowqueue_core::traits::{Clock, SystemClock};
use rowqueue_database::Storage;
use rowqueue_worker::{DistributedLock, ExpirationSweeper, ServerHeartbeat};

#[tokio::main]
async fn main() {
    let env = std::env::var("ROWQUEUE_ENV").unwrap_or_else(|_| "development".to_string());
    let config = match AppConfig::load(&env) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    init_logging(&config);

    if let Err(e) = run(config).await {
        tracing::error!(error = %e, "Server error");
        std::process::exit(1);
    }
}

/// Initialize tracing/logging
fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format.as_str() {
        "json" => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .init();
        }
        _ => {
            fmt()
                .pretty()
                .with_env_filter(filter)
                .with_target(true)
                .init();
        }
    }
}

/// Main server run function
async fn run(config: AppConfig) -> Result<(), AppError> {
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        provider = %config.storage.provider,
        "Starting rowqueue server"
    );

    let storage = Storage::from_config(&config.storage, &config.database).await?;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let lock = DistributedLock::from_config(storage.locks.clone(), clock.clone(), &config.lock)?;

    let server_id = format!("rowqueue:{}:{}", std::process::id(), Uuid::new_v4());
    let data = serde_json::json!({
        "queues": config.queue.queues,
        "started_at": clock.now(),
    })
    .to_string();
    let heartbeat = ServerHeartbeat::new(
        storage.servers.clone(),
        clock.clone(),
        server_id,
        data,
        config.server.clone(),
    );

    let cancel = CancellationToken::new();
    let mut tasks = Vec::new();

    tasks.push(tokio::spawn({
        let cancel = cancel.clone();
        async move { heartbeat.run(cancel).await }
    }));

    if config.sweeper.enabled {
        let sweeper = ExpirationSweeper::from_config(
            storage.counters.clone(),
            storage.expiration.clone(),
            clock.clone(),
            lock,
            &config.sweeper,
        )?;
        tasks.push(tokio::spawn({
            let cancel = cancel.clone();
            async move { sweeper.run(cancel).await }
        }));
    } else {
        tracing::info!("Expiration sweeper disabled");
    }

    tokio::signal::ctrl_c()
        .await
        .map_err(|e| AppError::internal(format!("Failed to listen for shutdown signal: {e}")))?;
    tracing::info!("Shutdown signal received");
    cancel.cancel();

    for task in tasks {
        if let Err(e) = task.await {
            tracing::warn!(error = %e, "Background task ended abnormally");
        }
    }

    tracing::info!("rowqueue server stopped");
    Ok(())
}
