use serde::Serialize;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::AppConfig;
use crate::db::Database;
use crate::events::EventHub;

/// Shared application state passed to all API handlers via axum's State extractor.
pub struct AppState {
    pub db: Database,
    pub config: AppConfig,
    pub event_hub: EventHub,
    pub status: tokio::sync::RwLock<DaemonStatus>,
    /// Per-run cancellation token, replaced on each new run.
    cancel_token: tokio::sync::Mutex<CancellationToken>,
    /// Handle to the currently running optimizer task.
    pub background_task: tokio::sync::Mutex<Option<JoinHandle<()>>>,
}

impl AppState {
    pub fn new(db: Database, config: AppConfig, event_hub: EventHub) -> Self {
        Self {
            db,
            config,
            event_hub,
            status: tokio::sync::RwLock::new(DaemonStatus::idle()),
            cancel_token: tokio::sync::Mutex::new(CancellationToken::new()),
            background_task: tokio::sync::Mutex::new(None),
        }
    }

    /// Create a fresh `CancellationToken` for a new run.
    /// Returns a clone for the spawned task to monitor.
    pub async fn new_operation_token(&self) -> CancellationToken {
        let token = CancellationToken::new();
        *self.cancel_token.lock().await = token.clone();
        token
    }

    /// Cancel the current run. Safe to call repeatedly and with no run active.
    pub async fn request_cancel(&self) {
        self.cancel_token.lock().await.cancel();
    }
}

/// The daemon's operating state, serialized to the API as a lowercase string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DaemonState {
    Idle,
    Optimizing,
}

#[derive(Debug, Clone, Serialize)]
pub struct DaemonStatus {
    pub state: DaemonState,
    pub detail: Option<String>,
    pub run_id: Option<i64>,
}

impl DaemonStatus {
    pub const fn idle() -> Self {
        Self { state: DaemonState::Idle, detail: None, run_id: None }
    }

    pub fn optimizing(run_id: i64, detail: impl Into<String>) -> Self {
        Self { state: DaemonState::Optimizing, detail: Some(detail.into()), run_id: Some(run_id) }
    }
}
