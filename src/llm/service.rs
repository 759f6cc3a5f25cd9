//! Runtime Service Core (spec §4.5, component C5): the entry point the
//! external RPC surface calls into. Wraps [`Router`] with the interceptor
//! chain (timeout → logging → recovery) and resolves `prompt_reference`
//! before handing the request to a provider.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{interceptors, PlatformError, Result};
use crate::llm::router::Router;
use crate::llm::{ChatMessage, CompletionRequest, CompletionResult, EmbeddingRequest, EmbeddingResult, RequestContext, StreamChunk};

/// Resolves a `slug[:(v)N|latest]` prompt reference into rendered chat
/// messages. Implemented by [`crate::prompt::service::PromptService`];
/// kept as a trait here so the runtime gateway doesn't depend on the
/// prompt store's storage backend.
#[async_trait]
pub trait PromptResolver: Send + Sync {
    async fn render(&self, reference: &str, variables: &std::collections::HashMap<String, serde_json::Value>) -> Result<Vec<ChatMessage>>;
}

pub struct RuntimeService {
    router: Arc<Router>,
    prompt_resolver: Option<Arc<dyn PromptResolver>>,
    default_timeout: Duration,
}

impl RuntimeService {
    pub fn new(router: Arc<Router>) -> Self {
        Self {
            router,
            prompt_resolver: None,
            default_timeout: Duration::from_secs(60),
        }
    }

    pub fn with_prompt_resolver(mut self, resolver: Arc<dyn PromptResolver>) -> Self {
        self.prompt_resolver = Some(resolver);
        self
    }

    pub fn router(&self) -> &Arc<Router> {
        &self.router
    }

    async fn resolve_messages(&self, request: &mut CompletionRequest) -> Result<()> {
        let Some(reference) = request.prompt_reference.clone() else {
            return Ok(());
        };
        let resolver = self
            .prompt_resolver
            .as_ref()
            .ok_or_else(|| PlatformError::failed_precondition("prompt_reference given but no prompt store is configured"))?;
        let variables = request.metadata.clone();
        request.messages = resolver.render(&reference, &variables).await?;
        Ok(())
    }

    pub async fn complete(&self, mut request: CompletionRequest, ctx: &RequestContext) -> Result<CompletionResult> {
        self.resolve_messages(&mut request).await?;
        let router = self.router.clone();
        let ctx = ctx.clone();
        let request = request.clone();

        interceptors::with_timeout(
            self.default_timeout,
            interceptors::with_logging("runtime.complete", interceptors::with_recovery(async move { router.complete(&request, &ctx).await })),
        )
        .await
    }

    pub async fn complete_stream(&self, mut request: CompletionRequest, ctx: &RequestContext) -> Result<futures::stream::BoxStream<'static, StreamChunk>> {
        self.resolve_messages(&mut request).await?;
        let candidates = self.router.candidates(&request)?;
        let adapter = candidates.into_iter().next().ok_or_else(|| PlatformError::unavailable("no provider can serve this request"))?;

        adapter.complete_stream(&request, ctx).await.map_err(Into::into)
    }

    pub async fn embed(&self, request: EmbeddingRequest) -> Result<EmbeddingResult> {
        let provider = request.provider.clone().unwrap_or_else(|| "openai".to_string());
        let candidates_request = CompletionRequest {
            provider: Some(provider),
            model: request.model.clone(),
            ..CompletionRequest::new(vec![])
        };
        let candidates = self
            .router
            .candidates(&candidates_request)
            .map_err(|_| PlatformError::unavailable("no_embedding_provider: no provider can serve this embedding request"))?;
        let adapter = candidates
            .into_iter()
            .next()
            .ok_or_else(|| PlatformError::unavailable("no_embedding_provider: no provider can serve this embedding request"))?;
        adapter.embed(&request).await.map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::registry::ProviderRegistry;
    use crate::models::Role;

    struct NoopResolver;

    #[async_trait]
    impl PromptResolver for NoopResolver {
        async fn render(&self, _reference: &str, _variables: &std::collections::HashMap<String, serde_json::Value>) -> Result<Vec<ChatMessage>> {
            Ok(vec![ChatMessage::new(Role::User, "resolved")])
        }
    }

    #[tokio::test]
    async fn complete_fails_precondition_when_prompt_reference_given_without_resolver() {
        let registry = Arc::new(ProviderRegistry::builder().build());
        let router = Arc::new(Router::new(registry));
        let service = RuntimeService::new(router);

        let mut request = CompletionRequest::new(vec![]);
        request.prompt_reference = Some("greeting:latest".to_string());
        let ctx = RequestContext::default();

        let err = service.complete(request, &ctx).await.unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::FailedPrecondition);
    }

    #[tokio::test]
    async fn complete_resolves_prompt_reference_before_routing() {
        let registry = Arc::new(ProviderRegistry::builder().build());
        let router = Arc::new(Router::new(registry));
        let service = RuntimeService::new(router).with_prompt_resolver(Arc::new(NoopResolver));

        let mut request = CompletionRequest::new(vec![]);
        request.prompt_reference = Some("greeting:latest".to_string());
        let ctx = RequestContext::default();

        // No providers registered, so routing itself fails — but it must
        // fail with "unavailable", proving resolution ran and didn't short
        // circuit on "failed_precondition" first.
        let err = service.complete(request, &ctx).await.unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::Unavailable);
    }
}
