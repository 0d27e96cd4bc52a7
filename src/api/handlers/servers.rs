use crate::api::responses::ApiResponse;
use crate::cluster::validate_server;
use crate::db::{Disk, Server};
use crate::AppState;
use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use std::sync::Arc;
use tracing::info;

pub(crate) async fn get_servers(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.db.get_all_servers() {
        Ok(servers) => Json(ApiResponse::ok(servers)),
        Err(e) => Json(ApiResponse::err(format!("Failed to get servers: {e}"))),
    }
}

pub(crate) async fn upsert_server(
    State(state): State<Arc<AppState>>,
    Json(server): Json<Server>,
) -> impl IntoResponse {
    if let Err(e) = validate_server(&server) {
        return Json(ApiResponse::<&str>::err(format!("Invalid server: {e}")));
    }

    match state.db.upsert_server(&server) {
        Ok(_) => {
            let bytes: u64 = server.disks.iter().map(Disk::capacity_bytes).sum();
            info!(
                "Server {} saved with {} disks ({} GiB)",
                server.hostname,
                server.disks.len(),
                bytes >> 30
            );
            Json(ApiResponse::ok("Server saved"))
        }
        Err(e) => Json(ApiResponse::<&str>::err(format!("Failed to save server: {e}"))),
    }
}

pub(crate) async fn delete_server(
    State(state): State<Arc<AppState>>,
    Path(hostname): Path<String>,
) -> impl IntoResponse {
    match state.db.delete_server(&hostname) {
        Ok(true) => {
            info!("Server {} deleted", hostname);
            Json(ApiResponse::ok("Server deleted"))
        }
        Ok(false) => Json(ApiResponse::<&str>::err("Server not found")),
        Err(e) => Json(ApiResponse::<&str>::err(format!("Failed to delete server: {e}"))),
    }
}
