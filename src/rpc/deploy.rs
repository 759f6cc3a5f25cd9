//! Deploy RPCs (spec §6), on the default port 9005.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::deploy::controller::{DeploymentController, DeploymentInput};
use crate::deploy::store::DeploymentStore;
use crate::models::deployment::Deployment;
use crate::models::quality_gate::QualityGate;

use super::error::RpcError;

#[derive(Clone)]
pub struct DeployState {
    pub controller: Arc<DeploymentController>,
    pub store: Arc<dyn DeploymentStore>,
}

pub fn router(state: DeployState) -> Router {
    Router::new()
        .route("/v1/deployments", post(create_deployment).get(list_deployments))
        .route("/v1/deployments/:id", get(get_deployment))
        .route("/v1/deployments/:id/approve", post(approve_deployment))
        .route("/v1/deployments/:id/rollback", post(rollback_deployment))
        .route("/v1/deployments/:id/cancel", post(cancel_deployment))
        .route("/v1/deployments/:id/status", get(get_deployment_status))
        .route("/v1/quality_gates", post(create_quality_gate))
        .route("/v1/quality_gates/:prompt_id", get(list_quality_gates))
        .route("/v1/health", get(health))
        .with_state(state)
}

async fn create_deployment(State(state): State<DeployState>, Json(input): Json<DeploymentInput>) -> Result<Json<Deployment>, RpcError> {
    Ok(Json(state.controller.create(input).await?))
}

async fn get_deployment(State(state): State<DeployState>, Path(id): Path<Uuid>) -> Result<Json<Option<Deployment>>, RpcError> {
    Ok(Json(state.store.get(id).await?))
}

#[derive(Deserialize, Default)]
struct ListQuery {
    prompt_id: Option<Uuid>,
}

async fn list_deployments(State(state): State<DeployState>, Query(query): Query<ListQuery>) -> Result<Json<Vec<Deployment>>, RpcError> {
    Ok(Json(state.store.list(query.prompt_id).await?))
}

#[derive(Deserialize)]
struct ApproveRequest {
    actor: String,
    comment: Option<String>,
}

async fn approve_deployment(State(state): State<DeployState>, Path(id): Path<Uuid>, Json(body): Json<ApproveRequest>) -> Result<Json<Deployment>, RpcError> {
    Ok(Json(state.controller.approve(id, body.actor, body.comment).await?))
}

#[derive(Deserialize)]
struct ReasonRequest {
    reason: String,
}

#[derive(Serialize)]
struct RollbackResponse {
    original: Deployment,
    reverse: Deployment,
}

async fn rollback_deployment(State(state): State<DeployState>, Path(id): Path<Uuid>, Json(body): Json<ReasonRequest>) -> Result<Json<RollbackResponse>, RpcError> {
    let (original, reverse) = state.controller.rollback(id, body.reason).await?;
    Ok(Json(RollbackResponse { original, reverse }))
}

async fn cancel_deployment(State(state): State<DeployState>, Path(id): Path<Uuid>, Json(body): Json<ReasonRequest>) -> Result<Json<Deployment>, RpcError> {
    Ok(Json(state.controller.cancel(id, body.reason).await?))
}

async fn get_deployment_status(State(state): State<DeployState>, Path(id): Path<Uuid>) -> Result<Json<Deployment>, RpcError> {
    let deployment = state
        .store
        .get(id)
        .await?
        .ok_or_else(|| crate::error::PlatformError::not_found(format!("deployment {id} not found")))?;
    Ok(Json(deployment))
}

async fn create_quality_gate(State(state): State<DeployState>, Json(gate): Json<QualityGate>) -> Result<Json<QualityGate>, RpcError> {
    Ok(Json(state.store.create_quality_gate(gate).await?))
}

async fn list_quality_gates(State(state): State<DeployState>, Path(prompt_id): Path<Uuid>) -> Result<Json<Vec<QualityGate>>, RpcError> {
    Ok(Json(state.store.list_quality_gates(prompt_id).await?))
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}
