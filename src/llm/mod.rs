//! Runtime Gateway (spec §4.1–§4.5): the normalizing fan-out layer in front
//! of heterogeneous LLM providers.
//!
//! [`CompletionRequest`]/[`CompletionResult`]/[`StreamChunk`] are the one
//! contract every [`traits::ProviderAdapter`] translates to and from; nothing
//! downstream of [`service::RuntimeService`] ever sees a vendor-specific
//! shape.

pub mod context;
pub mod cost;
pub mod event_stream;
pub mod ndjson;
pub mod providers;
pub mod registry;
pub mod router;
pub mod service;
pub mod sse;
pub mod traits;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{ErrorKind, PlatformError};
use crate::models::Role;

pub use context::RequestContext;

/// One message in the normalized chat contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// Provider selection policy (spec §4.3).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutingStrategy {
    SpecificProvider,
    #[default]
    CostOptimized,
    LatencyOptimized,
    QualityOptimized,
}

/// A normalized completion request (spec §3 `CompletionRequest`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub messages: Vec<ChatMessage>,
    #[serde(default)]
    pub routing: RoutingStrategy,
    pub provider: Option<String>,
    pub model: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub top_p: Option<f32>,
    #[serde(default)]
    pub stop: Vec<String>,
    /// `slug[:(v)N|latest]` — resolved by the caller/service layer before
    /// the adapter ever sees the request; adapters only ever see rendered
    /// `messages`.
    pub prompt_reference: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl CompletionRequest {
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self {
            messages,
            routing: RoutingStrategy::default(),
            provider: None,
            model: None,
            temperature: None,
            max_tokens: None,
            top_p: None,
            stop: Vec::new(),
            prompt_reference: None,
            metadata: HashMap::new(),
        }
    }
}

/// Token accounting and the derived cost for one completion (spec §3/§4.1).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
    pub cost_usd: f64,
}

impl TokenUsage {
    pub fn new(prompt_tokens: u32, completion_tokens: u32, rate_per_1k: f64) -> Self {
        let total_tokens = prompt_tokens + completion_tokens;
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens,
            cost_usd: (total_tokens as f64 / 1000.0) * rate_per_1k,
        }
    }
}

/// A normalized completion result (spec §3 `CompletionRequest/Result`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionResult {
    pub id: String,
    pub content: String,
    pub usage: TokenUsage,
    pub provider: String,
    pub model: String,
    pub cached: bool,
    pub trace_id: String,
}

/// One chunk of a streaming completion (spec §3 `StreamChunk`).
///
/// For interior chunks, exactly one of `delta` (non-empty) or `terminal`
/// carries information — a terminal chunk with no error always carries
/// `final_content`/`final_usage`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StreamChunk {
    pub delta: String,
    pub terminal: bool,
    pub final_content: Option<String>,
    pub final_usage: Option<TokenUsage>,
    pub error: Option<String>,
}

impl StreamChunk {
    pub fn delta(text: impl Into<String>) -> Self {
        Self {
            delta: text.into(),
            ..Default::default()
        }
    }

    pub fn terminal(final_content: impl Into<String>, final_usage: TokenUsage) -> Self {
        Self {
            terminal: true,
            final_content: Some(final_content.into()),
            final_usage: Some(final_usage),
            ..Default::default()
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            terminal: true,
            error: Some(message.into()),
            ..Default::default()
        }
    }
}

/// An embedding request: one or more input texts against one model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingRequest {
    pub texts: Vec<String>,
    pub model: Option<String>,
    pub provider: Option<String>,
}

/// The result of embedding a batch of texts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingResult {
    pub embeddings: Vec<Vec<f32>>,
    pub model: String,
    pub provider: String,
    pub usage: TokenUsage,
}

/// Adapter-internal failure modes (spec §4.1), mapped down to the shared
/// [`PlatformError`] taxonomy at the service boundary (spec §7).
#[derive(Debug, Clone, thiserror::Error)]
pub enum AdapterError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("upstream error ({status}): {message}")]
    Upstream { status: u16, message: String },

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("empty response from provider")]
    EmptyResponse,

    #[error("unsupported operation: {0}")]
    UnsupportedOperation(String),
}

impl From<AdapterError> for PlatformError {
    fn from(err: AdapterError) -> Self {
        match &err {
            AdapterError::Transport(_) => PlatformError::new(ErrorKind::Unavailable, err.to_string()),
            AdapterError::Upstream { status, .. } if *status == 429 || *status >= 500 => {
                PlatformError::new(ErrorKind::Unavailable, err.to_string())
            }
            AdapterError::Upstream { .. } => {
                PlatformError::new(ErrorKind::InvalidArgument, err.to_string())
            }
            AdapterError::Protocol(_) => PlatformError::new(ErrorKind::Internal, err.to_string()),
            AdapterError::EmptyResponse => PlatformError::new(ErrorKind::Internal, err.to_string()),
            AdapterError::UnsupportedOperation(_) => {
                PlatformError::new(ErrorKind::Internal, err.to_string())
            }
        }
    }
}

pub type AdapterResult<T> = std::result::Result<T, AdapterError>;
