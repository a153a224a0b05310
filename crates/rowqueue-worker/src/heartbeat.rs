//! Server registration and liveness heartbeats.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use rowqueue_core::config::ServerConfig;
use rowqueue_core::result::AppResult;
use rowqueue_core::traits::{Clock, ServerStore};

use crate::polling::to_chrono;

/// Keeps this process's `server` row fresh and prunes dead servers.
#[derive(Debug, Clone)]
pub struct ServerHeartbeat {
    servers: Arc<dyn ServerStore>,
    clock: Arc<dyn Clock>,
    server_id: String,
    data: String,
    config: ServerConfig,
}

impl ServerHeartbeat {
    /// Create a heartbeat for `server_id`, described by opaque `data`.
    pub fn new(
        servers: Arc<dyn ServerStore>,
        clock: Arc<dyn Clock>,
        server_id: impl Into<String>,
        data: impl Into<String>,
        config: ServerConfig,
    ) -> Self {
        Self {
            servers,
            clock,
            server_id: server_id.into(),
            data: data.into(),
            config,
        }
    }

    /// Identifier of this server.
    pub fn server_id(&self) -> &str {
        &self.server_id
    }

    /// Register (or re-register) this server.
    pub async fn announce(&self) -> AppResult<()> {
        self.servers
            .announce(&self.server_id, &self.data, self.clock.now())
            .await
    }

    /// One heartbeat plus pruning of servers that stopped reporting.
    /// Returns the number of servers removed.
    pub async fn beat(&self) -> AppResult<u64> {
        let now = self.clock.now();
        if !self.servers.heartbeat(&self.server_id, now).await? {
            warn!(server_id = %self.server_id, "Server row was removed, announcing again");
            self.announce().await?;
        }

        let timeout = to_chrono(self.config.server_timeout(), "server.server_timeout_seconds")?;
        let removed = self.servers.remove_timed_out(now - timeout).await?;
        if removed > 0 {
            info!(removed, "Removed timed out servers");
        }
        Ok(removed)
    }

    /// Announce, beat on an interval until `cancel` fires, then deregister.
    pub async fn run(&self, cancel: CancellationToken) {
        if let Err(e) = self.announce().await {
            warn!(server_id = %self.server_id, error = %e, "Failed to announce server");
        }
        info!(server_id = %self.server_id, "Server announced");

        let interval = self.config.heartbeat_interval();
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(interval) => {}
            }
            if let Err(e) = self.beat().await {
                warn!(server_id = %self.server_id, error = %e, "Heartbeat failed");
            }
        }

        match self.servers.remove(&self.server_id).await {
            Ok(_) => info!(server_id = %self.server_id, "Server removed"),
            Err(e) => warn!(server_id = %self.server_id, error = %e, "Failed to remove server"),
        }
    }
}
