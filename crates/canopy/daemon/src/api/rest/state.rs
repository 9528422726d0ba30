//! Shared state for REST handlers.

use std::sync::Arc;

use canopy_lifecycle::LifecycleOrchestrator;
use chrono::{DateTime, Utc};
use tokio::sync::watch;

/// Everything a handler needs, cheap to clone per request.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<LifecycleOrchestrator>,
    pub shutdown_tx: Arc<watch::Sender<bool>>,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(orchestrator: Arc<LifecycleOrchestrator>, shutdown_tx: watch::Sender<bool>) -> Self {
        Self {
            orchestrator,
            shutdown_tx: Arc::new(shutdown_tx),
            started_at: Utc::now(),
        }
    }

    /// Whole seconds since the daemon started.
    pub fn uptime_seconds(&self) -> i64 {
        (Utc::now() - self.started_at).num_seconds()
    }
}
