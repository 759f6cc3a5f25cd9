//! Routing policy (spec §4.3, component C3): picks a provider/model for a
//! [`CompletionRequest`] and retries across providers on transient failure.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::{ErrorKind, PlatformError, Result};
use crate::llm::registry::ProviderRegistry;
use crate::llm::traits::{ModelInfo, ProviderAdapter};
use crate::llm::{CompletionRequest, CompletionResult, RequestContext, RoutingStrategy};

#[derive(Debug, Clone)]
pub struct RouterConfig {
    pub max_retries: u32,
    pub retry_delay_ms: u64,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            retry_delay_ms: 250,
        }
    }
}

pub struct Router {
    registry: Arc<ProviderRegistry>,
    config: RouterConfig,
}

impl Router {
    pub fn new(registry: Arc<ProviderRegistry>) -> Self {
        Self {
            registry,
            config: RouterConfig::default(),
        }
    }

    pub fn with_config(registry: Arc<ProviderRegistry>, config: RouterConfig) -> Self {
        Self { registry, config }
    }

    pub fn registry(&self) -> &Arc<ProviderRegistry> {
        &self.registry
    }

    /// Resolve a request to an ordered preference list of candidate
    /// providers for that request's model (spec §4.3). The first candidate
    /// is tried first; later candidates are fallbacks used only when the
    /// prior candidate's adapter returns a retryable error.
    pub fn candidates(&self, request: &CompletionRequest) -> Result<Vec<Arc<dyn ProviderAdapter>>> {
        if let Some(name) = &request.provider {
            let adapter = self.registry.get(name).ok_or_else(|| {
                PlatformError::new(ErrorKind::NotFound, format!("provider '{name}' is not registered"))
            })?;
            if !adapter.available() {
                return Err(PlatformError::new(ErrorKind::Unavailable, format!("provider_unavailable: '{name}' is not available")));
            }
            return Ok(vec![adapter]);
        }

        let model = request.model.as_deref();
        let mut pool: Vec<Arc<dyn ProviderAdapter>> = match model {
            Some(model) => self
                .registry
                .available_providers()
                .into_iter()
                .filter(|a| a.model_info(model).is_some())
                .collect(),
            None => self.registry.available_providers(),
        };

        if pool.is_empty() {
            return Err(PlatformError::new(
                ErrorKind::Unavailable,
                "no available provider can serve this request",
            ));
        }

        let model_for = |adapter: &Arc<dyn ProviderAdapter>| -> Option<ModelInfo> {
            match model {
                Some(m) => adapter.model_info(m).cloned(),
                None => adapter.models().first().cloned(),
            }
        };

        match request.routing {
            RoutingStrategy::SpecificProvider => {
                // No provider pinned but strategy asked for one — degrade to
                // cost-optimized rather than fail the request outright.
                pool.sort_by(|a, b| cost_key(&model_for(a)).partial_cmp(&cost_key(&model_for(b))).unwrap());
            }
            RoutingStrategy::CostOptimized => {
                pool.sort_by(|a, b| cost_key(&model_for(a)).partial_cmp(&cost_key(&model_for(b))).unwrap());
            }
            RoutingStrategy::QualityOptimized => {
                pool.sort_by(|a, b| {
                    let qa = model_for(a).map(|m| m.quality_score).unwrap_or(0.0);
                    let qb = model_for(b).map(|m| m.quality_score).unwrap_or(0.0);
                    qb.partial_cmp(&qa).unwrap()
                });
            }
            RoutingStrategy::LatencyOptimized => {
                // No live latency telemetry is tracked in-process yet; fall
                // back to registration order, which favors locally-hosted
                // adapters (ollama) registered first by convention.
                debug!("latency_optimized routing has no latency samples yet, using registration order");
            }
        }

        Ok(pool)
    }

    pub async fn complete(&self, request: &CompletionRequest, ctx: &RequestContext) -> Result<CompletionResult> {
        let candidates = self.candidates(request)?;
        let mut last_err: Option<PlatformError> = None;

        for adapter in &candidates {
            let mut attempt = 0;
            loop {
                match adapter.complete(request, ctx).await {
                    Ok(result) => return Ok(result),
                    Err(err) => {
                        let platform_err: PlatformError = err.into();
                        let retryable = platform_err.kind == ErrorKind::Unavailable;
                        warn!(provider = adapter.name(), attempt, error = %platform_err, "completion attempt failed");
                        last_err = Some(platform_err);

                        if !retryable || attempt >= self.config.max_retries {
                            break;
                        }
                        attempt += 1;
                        tokio::time::sleep(Duration::from_millis(self.config.retry_delay_ms * attempt as u64)).await;
                    }
                }
            }
        }

        Err(last_err.unwrap_or_else(|| PlatformError::new(ErrorKind::Unavailable, "no provider produced a result")))
    }
}

fn cost_key(model: &Option<ModelInfo>) -> f64 {
    model
        .as_ref()
        .map(|m| m.cost_per_1k_input_tokens + m.cost_per_1k_output_tokens)
        .unwrap_or(f64::MAX)
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use futures::stream::{self, BoxStream};

    use super::*;
    use crate::llm::{AdapterResult, EmbeddingRequest, EmbeddingResult, StreamChunk, TokenUsage};

    struct StubAdapter {
        name: &'static str,
        cost: f64,
    }

    #[async_trait]
    impl ProviderAdapter for StubAdapter {
        fn name(&self) -> &str {
            self.name
        }

        fn models(&self) -> &[ModelInfo] {
            Box::leak(Box::new(vec![ModelInfo {
                name: "m".into(),
                cost_per_1k_input_tokens: self.cost,
                cost_per_1k_output_tokens: self.cost,
                quality_score: 0.5,
                supports_streaming: false,
                supports_embeddings: false,
            }]))
        }

        fn available(&self) -> bool {
            true
        }

        async fn complete(&self, _request: &CompletionRequest, _ctx: &RequestContext) -> AdapterResult<CompletionResult> {
            Ok(CompletionResult {
                id: "id".into(),
                content: "ok".into(),
                usage: TokenUsage::default(),
                provider: self.name.into(),
                model: "m".into(),
                cached: false,
                trace_id: "t".into(),
            })
        }

        async fn complete_stream(&self, _request: &CompletionRequest, _ctx: &RequestContext) -> AdapterResult<BoxStream<'static, StreamChunk>> {
            Ok(Box::pin(stream::empty()))
        }

        async fn embed(&self, _request: &EmbeddingRequest) -> AdapterResult<EmbeddingResult> {
            unimplemented!()
        }
    }

    #[test]
    fn cost_optimized_prefers_cheaper_provider() {
        let registry = Arc::new(
            ProviderRegistry::builder()
                .register(Arc::new(StubAdapter { name: "pricey", cost: 10.0 }))
                .register(Arc::new(StubAdapter { name: "cheap", cost: 0.1 }))
                .build(),
        );
        let router = Router::new(registry);
        let mut request = CompletionRequest::new(vec![]);
        request.model = Some("m".into());

        let candidates = router.candidates(&request).unwrap();
        assert_eq!(candidates[0].name(), "cheap");
    }

    #[test]
    fn explicit_provider_overrides_strategy() {
        let registry = Arc::new(
            ProviderRegistry::builder()
                .register(Arc::new(StubAdapter { name: "pricey", cost: 10.0 }))
                .register(Arc::new(StubAdapter { name: "cheap", cost: 0.1 }))
                .build(),
        );
        let router = Router::new(registry);
        let mut request = CompletionRequest::new(vec![]);
        request.provider = Some("pricey".into());

        let candidates = router.candidates(&request).unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].name(), "pricey");
    }

    #[tokio::test]
    async fn complete_returns_unavailable_when_no_candidates() {
        let registry = Arc::new(ProviderRegistry::builder().build());
        let router = Router::new(registry);
        let request = CompletionRequest::new(vec![]);
        let ctx = RequestContext::default();

        let err = router.complete(&request, &ctx).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Unavailable);
    }
}
