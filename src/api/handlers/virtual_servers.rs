use crate::api::responses::ApiResponse;
use crate::cluster::validate_virtual_server;
use crate::db::VirtualServer;
use crate::AppState;
use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use std::sync::Arc;
use tracing::info;

pub(crate) async fn get_virtual_servers(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.db.get_all_virtual_servers() {
        Ok(virtual_servers) => Json(ApiResponse::ok(virtual_servers)),
        Err(e) => Json(ApiResponse::err(format!("Failed to get virtual servers: {e}"))),
    }
}

pub(crate) async fn upsert_virtual_server(
    State(state): State<Arc<AppState>>,
    Json(vs): Json<VirtualServer>,
) -> impl IntoResponse {
    if let Err(e) = validate_virtual_server(&vs) {
        return Json(ApiResponse::<&str>::err(format!("Invalid virtual server: {e}")));
    }

    match state.db.upsert_virtual_server(&vs) {
        Ok(_) => {
            info!("Virtual server {} saved with {} disks", vs.hostname, vs.disks.len());
            Json(ApiResponse::ok("Virtual server saved"))
        }
        Err(e) => Json(ApiResponse::<&str>::err(format!("Failed to save virtual server: {e}"))),
    }
}

pub(crate) async fn delete_virtual_server(
    State(state): State<Arc<AppState>>,
    Path(hostname): Path<String>,
) -> impl IntoResponse {
    match state.db.delete_virtual_server(&hostname) {
        Ok(true) => {
            info!("Virtual server {} deleted", hostname);
            Json(ApiResponse::ok("Virtual server deleted"))
        }
        Ok(false) => Json(ApiResponse::<&str>::err("Virtual server not found")),
        Err(e) => {
            Json(ApiResponse::<&str>::err(format!("Failed to delete virtual server: {e}")))
        }
    }
}
