//! Runtime RPCs (spec §6): `complete`, `complete_stream`, `embed`,
//! `list_providers`, `health`, on the default port 9001.

use std::sync::Arc;

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use futures::StreamExt;
use serde::Serialize;

use crate::llm::service::RuntimeService;
use crate::llm::{CompletionRequest, CompletionResult, EmbeddingRequest, EmbeddingResult, RequestContext};

use super::error::RpcError;

#[derive(Clone)]
pub struct RuntimeState {
    pub service: Arc<RuntimeService>,
}

pub fn router(state: RuntimeState) -> Router {
    Router::new()
        .route("/v1/complete", post(complete))
        .route("/v1/complete_stream", post(complete_stream))
        .route("/v1/embed", post(embed))
        .route("/v1/providers", get(list_providers))
        .route("/v1/health", get(health))
        .with_state(state)
}

async fn complete(State(state): State<RuntimeState>, Json(request): Json<CompletionRequest>) -> Result<Json<CompletionResult>, RpcError> {
    let ctx = RequestContext::default();
    let result = state.service.complete(request, &ctx).await?;
    Ok(Json(result))
}

async fn complete_stream(State(state): State<RuntimeState>, Json(request): Json<CompletionRequest>) -> Result<impl IntoResponse, RpcError> {
    let ctx = RequestContext::default();
    let stream = state.service.complete_stream(request, &ctx).await?;

    let events = stream.map(|chunk| {
        let payload = serde_json::to_string(&chunk).unwrap_or_else(|_| "{}".to_string());
        Ok::<_, std::convert::Infallible>(Event::default().data(payload))
    });

    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}

async fn embed(State(state): State<RuntimeState>, Json(request): Json<EmbeddingRequest>) -> Result<Json<EmbeddingResult>, RpcError> {
    let result = state.service.embed(request).await?;
    Ok(Json(result))
}

#[derive(Serialize)]
struct ProviderSummary {
    name: String,
    models: Vec<String>,
    available: bool,
    cost_table: std::collections::HashMap<String, (f64, f64)>,
}

async fn list_providers(State(state): State<RuntimeState>) -> Json<Vec<ProviderSummary>> {
    let adapters = state.service.router().registry().all();
    let summaries = adapters
        .iter()
        .map(|adapter| ProviderSummary {
            name: adapter.name().to_string(),
            models: adapter.models().iter().map(|m| m.name.clone()).collect(),
            available: adapter.available(),
            cost_table: adapter
                .models()
                .iter()
                .map(|m| (m.name.clone(), (m.cost_per_1k_input_tokens, m.cost_per_1k_output_tokens)))
                .collect(),
        })
        .collect();
    Json(summaries)
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    per_provider_status: std::collections::HashMap<String, bool>,
}

async fn health(State(state): State<RuntimeState>) -> Json<HealthResponse> {
    let per_provider_status = state.service.router().registry().all().iter().map(|a| (a.name().to_string(), a.available())).collect();
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        per_provider_status,
    })
}
