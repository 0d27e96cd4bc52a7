use crate::db::{OptimizationRun, RunPlacement};
use serde::{Deserialize, Serialize};

/// Generic API response wrapper.
#[derive(Debug, Serialize)]
pub(crate) struct ApiResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub(crate) const fn ok(data: T) -> Self {
        Self { success: true, data: Some(data), error: None }
    }

    pub(crate) fn err(msg: impl Into<String>) -> Self {
        Self { success: false, data: None, error: Some(msg.into()) }
    }
}

/// Request body for POST /api/optimize. Omitted fields fall back to settings.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct OptimizeRequest {
    pub max_mappings: Option<u64>,
    /// 0 disables the limit for this run.
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Serialize)]
pub(crate) struct OptimizeStartedResponse {
    pub run_id: i64,
}

/// Request body for POST /api/settings.
#[derive(Debug, Deserialize)]
pub(crate) struct SettingsUpdateRequest {
    pub max_mappings: Option<u64>,
    pub progress_interval_ms: Option<u64>,
    pub search_timeout_secs: Option<u64>,
    pub log_mappings: Option<bool>,
}

#[derive(Debug, Serialize)]
pub(crate) struct StatusResponse {
    pub state: crate::DaemonState,
    pub detail: Option<String>,
    pub run_id: Option<i64>,
    pub version: String,
}

/// A run together with the placements of its first mapping.
#[derive(Debug, Serialize)]
pub(crate) struct RunDetail {
    #[serde(flatten)]
    pub run: OptimizationRun,
    pub placements: Vec<RunPlacement>,
}
