use crate::api::responses::{ApiResponse, OptimizeRequest, OptimizeStartedResponse};
use crate::runner;
use crate::{AppState, DaemonState, DaemonStatus};
use axum::{extract::State, response::IntoResponse, Json};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

pub(crate) async fn start_optimize(
    State(state): State<Arc<AppState>>,
    body: Option<Json<OptimizeRequest>>,
) -> impl IntoResponse {
    let req = body.map(|Json(req)| req).unwrap_or_default();
    let max_mappings = req.max_mappings.unwrap_or(state.config.max_mappings);
    let timeout = match req.timeout_secs {
        Some(0) => None,
        Some(secs) => Some(Duration::from_secs(secs)),
        None => state.config.search_timeout(),
    };

    // Held from the idle check until the run owns the daemon, so concurrent
    // requests cannot both start.
    let (run_id, token) = {
        let mut status = state.status.write().await;
        if status.state != DaemonState::Idle {
            return Json(ApiResponse::<OptimizeStartedResponse>::err(format!(
                "Cannot optimize: daemon is currently {:?}",
                status.state
            )));
        }

        let run_id = match state.db.create_run(max_mappings) {
            Ok(id) => id,
            Err(e) => return Json(ApiResponse::err(format!("Failed to create run: {e}"))),
        };
        let token = state.new_operation_token().await;
        *status = DaemonStatus::optimizing(run_id, "Loading inventory...");
        (run_id, token)
    };

    let timer = timeout.map(|limit| {
        let token = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(limit).await;
            warn!("Run {} hit its {}s time limit, cancelling", run_id, limit.as_secs());
            token.cancel();
        })
    });

    let state_clone = state.clone();
    let rt = tokio::runtime::Handle::current();
    let mut slot = state.background_task.lock().await;
    let handle = tokio::task::spawn_blocking(move || {
        let result = std::panic::catch_unwind(AssertUnwindSafe(|| {
            runner::run_optimization(&state_clone, run_id, max_mappings, token)
        }));

        match result {
            Ok(Ok(status)) => info!("Run {} finished: {}", run_id, status),
            Ok(Err(e)) => {
                error!("Run {} failed: {:#}", run_id, e);
                runner::fail_run(&state_clone, run_id, &format!("Optimization failed: {e}"));
            }
            Err(_) => {
                error!("Run {} panicked!", run_id);
                let message = format!("Optimization panicked for run {run_id}");
                runner::fail_run(&state_clone, run_id, &message);
            }
        }

        if let Some(timer) = timer {
            timer.abort();
        }

        // ALWAYS reset to idle, on success, error and panic alike. The task slot
        // is locked first so a run started right after the reset keeps its handle.
        rt.block_on(async {
            let mut task = state_clone.background_task.lock().await;
            *state_clone.status.write().await = DaemonStatus::idle();
            *task = None;
        });
    });

    *slot = Some(handle);
    drop(slot);

    Json(ApiResponse::ok(OptimizeStartedResponse { run_id }))
}
