//! The provider adapter capability set (spec §4.1, component C1).
//!
//! Every vendor is a struct implementing [`ProviderAdapter`] rather than a
//! subclass of some shared base — capabilities that don't apply to a given
//! vendor (embeddings on a chat-only model, say) return
//! [`AdapterError::UnsupportedOperation`] instead of being absent from the
//! trait.

use async_trait::async_trait;
use futures::stream::BoxStream;

use super::{AdapterResult, CompletionRequest, CompletionResult, EmbeddingRequest, EmbeddingResult, RequestContext, StreamChunk};

/// Static facts about one model a provider exposes, used by the router's
/// cost/quality/latency strategies (spec §4.3).
#[derive(Debug, Clone, PartialEq)]
pub struct ModelInfo {
    pub name: String,
    pub cost_per_1k_input_tokens: f64,
    pub cost_per_1k_output_tokens: f64,
    /// Coarse relative quality score in `[0, 1]`, used only to break ties in
    /// `quality_optimized` routing — not a claim of absolute model quality.
    pub quality_score: f64,
    pub supports_streaming: bool,
    pub supports_embeddings: bool,
}

#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Stable identifier used in routing config and `provider` fields on
    /// results (e.g. `"openai"`, `"anthropic"`, `"bedrock"`).
    fn name(&self) -> &str;

    /// Models this adapter instance is configured to serve.
    fn models(&self) -> &[ModelInfo];

    fn model_info(&self, model: &str) -> Option<&ModelInfo> {
        self.models().iter().find(|m| m.name == model)
    }

    /// Cheap readiness check — e.g. "was the API key configured" — not a
    /// live upstream health probe (spec §4.1 `available`).
    fn available(&self) -> bool;

    async fn complete(
        &self,
        request: &CompletionRequest,
        ctx: &RequestContext,
    ) -> AdapterResult<CompletionResult>;

    /// Streamed completion; the returned stream must yield a single
    /// terminal [`StreamChunk`] (success or error) as its last item and
    /// stop promptly once `ctx` is cancelled (spec §4.4, §5).
    async fn complete_stream(
        &self,
        request: &CompletionRequest,
        ctx: &RequestContext,
    ) -> AdapterResult<BoxStream<'static, StreamChunk>>;

    async fn embed(&self, request: &EmbeddingRequest) -> AdapterResult<EmbeddingResult> {
        let _ = request;
        Err(super::AdapterError::UnsupportedOperation(format!(
            "{} does not support embeddings",
            self.name()
        )))
    }

    fn cost_per_1k_tokens(&self, model: &str) -> Option<(f64, f64)> {
        self.model_info(model)
            .map(|m| (m.cost_per_1k_input_tokens, m.cost_per_1k_output_tokens))
    }
}
