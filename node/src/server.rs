// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use axum::{
    extract::{Query, State},
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::api::*;
use crate::errors::{NodeError, NodeResult};
use crate::namenode::NameNode;

pub type SharedNameNode = Arc<NameNode>;

pub fn build_router(state: SharedNameNode) -> Router {
    Router::new()
        // Namespace v1
        .route("/v1/namespace/mkdir", post(mkdir))
        .route("/v1/namespace/create", post(create_file))
        .route("/v1/namespace/digest", get(digest))
        // Storage nodes v1
        .route("/v1/datanode/register", post(register))
        .route("/v1/datanode/heartbeat", post(heartbeat))
        .route("/v1/datanode/allocate", post(allocate))
        // Replication v1
        .route("/v1/replication/edits", get(fetch_edits))
        .route("/v1/replication/checkpoint", post(update_checkpoint))
        // Admin v1
        .route("/v1/admin/shutdown", post(shutdown))
        // Observability
        .route("/metrics", get(metrics_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn mkdir(
    State(state): State<SharedNameNode>,
    Json(req): Json<MkdirRequest>,
) -> NodeResult<Json<MutationResponse>> {
    let success = state.mkdir(&req.path)?;
    Ok(Json(MutationResponse { success }))
}

async fn create_file(
    State(state): State<SharedNameNode>,
    Json(req): Json<CreateFileRequest>,
) -> NodeResult<Json<MutationResponse>> {
    let success = state.create_file(&req.path)?;
    Ok(Json(MutationResponse { success }))
}

async fn digest(State(state): State<SharedNameNode>) -> Json<DigestResponse> {
    Json(state.digest())
}

async fn register(
    State(state): State<SharedNameNode>,
    Json(req): Json<DataNodeRequest>,
) -> Json<DataNodeResponse> {
    Json(DataNodeResponse { success: state.register(req) })
}

async fn heartbeat(
    State(state): State<SharedNameNode>,
    Json(req): Json<DataNodeRequest>,
) -> NodeResult<Json<DataNodeResponse>> {
    let success = state.heartbeat(&req)?;
    Ok(Json(DataNodeResponse { success }))
}

async fn allocate(
    State(state): State<SharedNameNode>,
    Json(req): Json<AllocateRequest>,
) -> NodeResult<Json<AllocateResponse>> {
    if req.file_name.is_empty() {
        return Err(NodeError::InvalidInput("file_name must not be empty".to_string()));
    }
    let targets = state.allocate_replica_targets(&req.file_name, req.size_bytes);
    Ok(Json(AllocateResponse { targets }))
}

async fn fetch_edits(
    State(state): State<SharedNameNode>,
    Query(params): Query<FetchEditsParams>,
) -> NodeResult<Json<FetchEditsResponse>> {
    // Cache misses read a segment file.
    let records = tokio::task::spawn_blocking(move || state.fetch_edits(params.after_txid))
        .await
        .map_err(|e| NodeError::Internal(e.to_string()))??;
    Ok(Json(FetchEditsResponse { records }))
}

async fn update_checkpoint(
    State(state): State<SharedNameNode>,
    Json(req): Json<CheckpointRequest>,
) -> NodeResult<Json<CheckpointResponse>> {
    let checkpoint_txid = tokio::task::spawn_blocking(move || state.update_checkpoint_txid(req.txid))
        .await
        .map_err(|e| NodeError::Internal(e.to_string()))??;
    Ok(Json(CheckpointResponse { checkpoint_txid }))
}

async fn shutdown(State(state): State<SharedNameNode>) -> NodeResult<Json<ShutdownResponse>> {
    tracing::warn!("Shutdown requested over RPC");
    let node = state.clone();
    tokio::task::spawn_blocking(move || node.shutdown_close())
        .await
        .map_err(|e| NodeError::Internal(e.to_string()))??;
    Ok(Json(ShutdownResponse {
        last_txid: state.namesystem().applied_txid(),
        checkpoint_txid: state.checkpoint_txid(),
    }))
}

async fn metrics_handler() -> String {
    crate::telemetry::get_metrics()
}
