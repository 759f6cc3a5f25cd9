//! Provider registry (spec §4.2, component C2): a read-dominated lookup
//! table populated once at startup and held behind `Arc`. No lock is taken
//! after construction — adapters are registered before the registry is
//! ever handed to a router or service.

use std::collections::HashMap;
use std::sync::Arc;

use super::traits::ProviderAdapter;

pub struct ProviderRegistry {
    adapters: HashMap<String, Arc<dyn ProviderAdapter>>,
}

impl ProviderRegistry {
    pub fn builder() -> ProviderRegistryBuilder {
        ProviderRegistryBuilder::default()
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn ProviderAdapter>> {
        self.adapters.get(name).cloned()
    }

    pub fn available_providers(&self) -> Vec<Arc<dyn ProviderAdapter>> {
        self.adapters.values().filter(|a| a.available()).cloned().collect()
    }

    pub fn all(&self) -> Vec<Arc<dyn ProviderAdapter>> {
        self.adapters.values().cloned().collect()
    }

    pub fn find_provider_for_model(&self, model: &str) -> Option<Arc<dyn ProviderAdapter>> {
        self.adapters
            .values()
            .find(|a| a.available() && a.model_info(model).is_some())
            .cloned()
    }
}

#[derive(Default)]
pub struct ProviderRegistryBuilder {
    adapters: HashMap<String, Arc<dyn ProviderAdapter>>,
}

impl ProviderRegistryBuilder {
    pub fn register(mut self, adapter: Arc<dyn ProviderAdapter>) -> Self {
        self.adapters.insert(adapter.name().to_string(), adapter);
        self
    }

    pub fn build(self) -> ProviderRegistry {
        ProviderRegistry {
            adapters: self.adapters,
        }
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use futures::stream::{self, BoxStream};

    use super::*;
    use crate::llm::{AdapterResult, CompletionRequest, CompletionResult, EmbeddingRequest, EmbeddingResult, RequestContext, StreamChunk, TokenUsage};
    use crate::llm::traits::ModelInfo;

    struct StubAdapter {
        name: &'static str,
        models: Vec<ModelInfo>,
        up: bool,
    }

    #[async_trait]
    impl ProviderAdapter for StubAdapter {
        fn name(&self) -> &str {
            self.name
        }

        fn models(&self) -> &[ModelInfo] {
            &self.models
        }

        fn available(&self) -> bool {
            self.up
        }

        async fn complete(&self, _request: &CompletionRequest, _ctx: &RequestContext) -> AdapterResult<CompletionResult> {
            Ok(CompletionResult {
                id: "stub".into(),
                content: "ok".into(),
                usage: TokenUsage::default(),
                provider: self.name.into(),
                model: "stub-model".into(),
                cached: false,
                trace_id: "t".into(),
            })
        }

        async fn complete_stream(&self, _request: &CompletionRequest, _ctx: &RequestContext) -> AdapterResult<BoxStream<'static, StreamChunk>> {
            Ok(Box::pin(stream::empty()))
        }

        async fn embed(&self, _request: &EmbeddingRequest) -> AdapterResult<EmbeddingResult> {
            Err(crate::llm::AdapterError::UnsupportedOperation("stub".into()))
        }
    }

    fn stub(name: &'static str, up: bool) -> Arc<dyn ProviderAdapter> {
        Arc::new(StubAdapter {
            name,
            models: vec![ModelInfo {
                name: "stub-model".into(),
                cost_per_1k_input_tokens: 0.001,
                cost_per_1k_output_tokens: 0.002,
                quality_score: 0.5,
                supports_streaming: true,
                supports_embeddings: false,
            }],
            up,
        })
    }

    #[test]
    fn available_providers_excludes_unavailable() {
        let registry = ProviderRegistry::builder()
            .register(stub("up", true))
            .register(stub("down", false))
            .build();

        let names: Vec<_> = registry.available_providers().iter().map(|a| a.name().to_string()).collect();
        assert_eq!(names, vec!["up".to_string()]);
    }

    #[test]
    fn find_provider_for_model_skips_unavailable() {
        let registry = ProviderRegistry::builder().register(stub("down", false)).build();
        assert!(registry.find_provider_for_model("stub-model").is_none());
    }
}
