use crate::api::responses::{ApiResponse, RunDetail};
use crate::AppState;
use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use std::sync::Arc;
use tracing::info;

pub(crate) async fn get_run(
    State(state): State<Arc<AppState>>,
    Path(run_id): Path<i64>,
) -> impl IntoResponse {
    let run = match state.db.get_run(run_id) {
        Ok(Some(run)) => run,
        Ok(None) => return Json(ApiResponse::<RunDetail>::err("Run not found")),
        Err(e) => return Json(ApiResponse::err(format!("{e}"))),
    };

    match state.db.get_run_placements(run_id) {
        Ok(placements) => Json(ApiResponse::ok(RunDetail { run, placements })),
        Err(e) => Json(ApiResponse::err(format!("{e}"))),
    }
}

pub(crate) async fn cancel_run(
    State(state): State<Arc<AppState>>,
    Path(run_id): Path<i64>,
) -> impl IntoResponse {
    {
        let status = state.status.read().await;
        if status.run_id != Some(run_id) {
            return Json(ApiResponse::<&str>::err(format!("Run {run_id} is not active")));
        }
    }

    state.request_cancel().await;
    info!("Cancellation requested for run {}", run_id);
    Json(ApiResponse::ok("Cancellation requested"))
}
