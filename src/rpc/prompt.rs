//! Prompt RPCs (spec §6), on the default port 9002.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::prompt::Prompt;
use crate::prompt::service::{CompareResult, ListFilter, OrderBy, PromptService};
use crate::models::prompt::PromptStatus;

use super::error::RpcError;

#[derive(Clone)]
pub struct PromptState {
    pub service: Arc<PromptService>,
}

pub fn router(state: PromptState) -> Router {
    Router::new()
        .route("/v1/prompts", post(create_prompt).get(list_prompts))
        .route("/v1/prompts/:id", get(get_prompt).put(update_prompt).delete(delete_prompt))
        .route("/v1/prompts/reference/:reference", get(get_prompt_by_reference))
        .route("/v1/prompts/:id/history", get(get_prompt_history))
        .route("/v1/prompts/:id/compare", get(compare_versions))
        .route("/v1/health", get(health))
        .with_state(state)
}

async fn create_prompt(State(state): State<PromptState>, Json(prompt): Json<Prompt>) -> Result<Json<Prompt>, RpcError> {
    Ok(Json(state.service.create_prompt(prompt).await?))
}

#[derive(Deserialize)]
struct UpdateRequest {
    prompt: Prompt,
    change_description: String,
    actor: Option<String>,
}

async fn update_prompt(State(state): State<PromptState>, Path(_id): Path<Uuid>, Json(body): Json<UpdateRequest>) -> Result<Json<Prompt>, RpcError> {
    Ok(Json(state.service.update_prompt(body.prompt, body.change_description, body.actor).await?))
}

async fn get_prompt(State(state): State<PromptState>, Path(id): Path<Uuid>) -> Result<Json<Option<Prompt>>, RpcError> {
    Ok(Json(state.service.get_prompt_by_id(id).await?))
}

async fn get_prompt_by_reference(State(state): State<PromptState>, Path(reference): Path<String>) -> Result<Json<Option<Prompt>>, RpcError> {
    Ok(Json(state.service.get_prompt_by_reference(&reference).await?))
}

#[derive(Deserialize, Default)]
struct ListQuery {
    search: Option<String>,
    #[serde(default)]
    tags: Vec<String>,
    status: Option<PromptStatus>,
    #[serde(default)]
    include_archived: bool,
    order_by: Option<String>,
    #[serde(default)]
    descending: bool,
    #[serde(default)]
    offset: usize,
    limit: Option<usize>,
}

async fn list_prompts(State(state): State<PromptState>, Query(query): Query<ListQuery>) -> Result<Json<Vec<Prompt>>, RpcError> {
    let order_by = match query.order_by.as_deref() {
        Some("updated_at") => OrderBy::UpdatedAt,
        Some("name") => OrderBy::Name,
        _ => OrderBy::CreatedAt,
    };
    let filter = ListFilter {
        search: query.search,
        tags: query.tags,
        status: query.status,
        include_archived: query.include_archived,
        order_by,
        descending: query.descending,
        offset: query.offset,
        limit: query.limit,
    };
    Ok(Json(state.service.list_prompts(filter).await?))
}

#[derive(Deserialize, Default)]
struct DeleteQuery {
    actor: Option<String>,
}

async fn delete_prompt(State(state): State<PromptState>, Path(id): Path<Uuid>, Query(query): Query<DeleteQuery>) -> Result<(), RpcError> {
    state.service.delete_prompt(id, query.actor).await?;
    Ok(())
}

#[derive(Deserialize, Default)]
struct HistoryQuery {
    limit: Option<usize>,
}

async fn get_prompt_history(
    State(state): State<PromptState>,
    Path(id): Path<Uuid>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<crate::models::prompt::PromptVersionRecord>>, RpcError> {
    Ok(Json(state.service.get_prompt_history(id, query.limit).await?))
}

#[derive(Deserialize)]
struct CompareQuery {
    version_a: u32,
    version_b: u32,
}

async fn compare_versions(State(state): State<PromptState>, Path(id): Path<Uuid>, Query(query): Query<CompareQuery>) -> Result<Json<CompareResult>, RpcError> {
    Ok(Json(state.service.compare_versions(id, query.version_a, query.version_b).await?))
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}
