use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt};
use reqwest::Client;
use tracing::{debug, error};

use crate::llm::sse::{is_done_sentinel, parse_sse_stream};
use crate::llm::traits::{ModelInfo, ProviderAdapter};
use crate::llm::{AdapterError, AdapterResult, CompletionRequest, CompletionResult, EmbeddingRequest, EmbeddingResult, RequestContext, StreamChunk, TokenUsage};
use crate::models::Role;

use super::config::OpenAICompatConfig;
use super::types::{OpenAIChatMessage, OpenAIEmbeddingRequest, OpenAIEmbeddingResponse, OpenAIErrorResponse, OpenAIRequest, OpenAIResponse, OpenAIStreamChunk};

/// Adapter for any OpenAI-chat-completions-compatible provider. OpenAI
/// itself, Together AI, and OpenRouter are all instances of this client
/// with a different `base_url`/model table (spec §4.1).
pub struct OpenAICompatAdapter {
    client: Client,
    config: OpenAICompatConfig,
}

impl OpenAICompatAdapter {
    pub fn new(config: OpenAICompatConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    fn convert_messages(request: &CompletionRequest) -> Vec<OpenAIChatMessage> {
        request
            .messages
            .iter()
            .map(|m| OpenAIChatMessage {
                role: role_str(m.role).to_string(),
                content: m.content.clone(),
            })
            .collect()
    }

    fn convert_request(&self, request: &CompletionRequest, model: &str, stream: bool) -> OpenAIRequest {
        OpenAIRequest {
            model: model.to_string(),
            messages: Self::convert_messages(request),
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            top_p: request.top_p,
            stop: request.stop.clone(),
            stream,
        }
    }

    fn resolve_model<'a>(&'a self, request: &'a CompletionRequest) -> AdapterResult<&'a str> {
        match request.model.as_deref() {
            Some(m) => Ok(m),
            None => self
                .config
                .models
                .first()
                .map(|m| m.name.as_str())
                .ok_or_else(|| AdapterError::Protocol("no default model configured".into())),
        }
    }

    async fn handle_error_response(response: reqwest::Response) -> AdapterError {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<OpenAIErrorResponse>(&body)
            .map(|e| e.error.message)
            .unwrap_or(body);
        AdapterError::Upstream { status, message }
    }

    fn usage_from(&self, model: &str, prompt_tokens: u32, completion_tokens: u32) -> TokenUsage {
        match self.config.models.iter().find(|m| m.name == model) {
            Some(m) => crate::llm::cost::usage_for(m, prompt_tokens, completion_tokens),
            None => TokenUsage::new(prompt_tokens, completion_tokens, 0.0),
        }
    }
}

/// Folds one parsed SSE event into the running accumulated content, returning
/// the [`StreamChunk`] (if any) it produces. `None` means the event carried
/// nothing worth forwarding (a `[DONE]` sentinel, an empty delta).
fn decode_stream_event(
    event: AdapterResult<crate::llm::sse::SSEEvent>,
    accumulated: &mut String,
    models: &[ModelInfo],
) -> Option<StreamChunk> {
    let event = match event {
        Ok(e) => e,
        Err(e) => return Some(StreamChunk::error(e.to_string())),
    };
    if is_done_sentinel(&event.data) {
        return None;
    }
    let chunk: OpenAIStreamChunk = match serde_json::from_str(&event.data) {
        Ok(c) => c,
        Err(e) => return Some(StreamChunk::error(format!("malformed stream chunk: {e}"))),
    };
    let choice = chunk.choices.first()?;
    if let Some(content) = &choice.delta.content {
        accumulated.push_str(content);
        if choice.finish_reason.is_none() {
            return Some(StreamChunk::delta(content.clone()));
        }
    }
    if choice.finish_reason.is_some() {
        let usage = chunk
            .usage
            .map(|u| match models.iter().find(|m| m.name == chunk.model) {
                Some(m) => crate::llm::cost::usage_for(m, u.prompt_tokens, u.completion_tokens),
                None => TokenUsage::new(u.prompt_tokens, u.completion_tokens, 0.0),
            })
            .unwrap_or_default();
        return Some(StreamChunk::terminal(accumulated.clone(), usage));
    }
    None
}

fn role_str(role: Role) -> &'static str {
    match role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
    }
}

#[async_trait]
impl ProviderAdapter for OpenAICompatAdapter {
    fn name(&self) -> &str {
        &self.config.provider_name
    }

    fn models(&self) -> &[ModelInfo] {
        &self.config.models
    }

    fn available(&self) -> bool {
        !self.config.api_key.is_empty()
    }

    async fn complete(&self, request: &CompletionRequest, ctx: &RequestContext) -> AdapterResult<CompletionResult> {
        let model = self.resolve_model(request)?.to_string();
        let body = self.convert_request(request, &model, false);
        let url = format!("{}/chat/completions", self.config.base_url);

        debug!(provider = %self.config.provider_name, %model, trace_id = %ctx.trace_id, "sending completion request");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .timeout(std::time::Duration::from_secs(self.config.timeout_seconds))
            .send()
            .await
            .map_err(|e| AdapterError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            let err = Self::handle_error_response(response).await;
            error!(provider = %self.config.provider_name, %err, "upstream returned an error");
            return Err(err);
        }

        let parsed: OpenAIResponse = response.json().await.map_err(|e| AdapterError::Protocol(e.to_string()))?;
        let choice = parsed.choices.into_iter().next().ok_or(AdapterError::EmptyResponse)?;
        let content = choice.message.content.unwrap_or_default();
        let usage = self.usage_from(&parsed.model, parsed.usage.prompt_tokens, parsed.usage.completion_tokens);

        Ok(CompletionResult {
            id: parsed.id,
            content,
            usage,
            provider: self.config.provider_name.clone(),
            model: parsed.model,
            cached: false,
            trace_id: ctx.trace_id.clone(),
        })
    }

    async fn complete_stream(&self, request: &CompletionRequest, ctx: &RequestContext) -> AdapterResult<BoxStream<'static, StreamChunk>> {
        let model = self.resolve_model(request)?.to_string();
        let body = self.convert_request(request, &model, true);
        let url = format!("{}/chat/completions", self.config.base_url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .timeout(std::time::Duration::from_secs(self.config.timeout_seconds))
            .send()
            .await
            .map_err(|e| AdapterError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(Self::handle_error_response(response).await);
        }

        let models = self.config.models.clone();
        let cancel = ctx.child_token();

        let byte_stream = response.bytes_stream();
        let sse = parse_sse_stream(byte_stream);

        let stream = sse
            .take_until(async move { cancel.cancelled().await })
            .scan(String::new(), move |accumulated, event| {
                let models = models.clone();
                let chunk = decode_stream_event(event, accumulated, &models);
                futures::future::ready(Some(chunk))
            })
            .filter_map(futures::future::ready);

        Ok(Box::pin(stream))
    }

    /// OpenAI (and the Together AI lookalike) batch every input text into a
    /// single `/embeddings` call (spec §4.1). OpenRouter has no embeddings
    /// endpoint of its own despite sharing this adapter's chat wire format.
    async fn embed(&self, request: &EmbeddingRequest) -> AdapterResult<EmbeddingResult> {
        if self.config.provider_name == "openrouter" {
            return Err(AdapterError::UnsupportedOperation("openrouter does not support embeddings".to_string()));
        }

        let model = request
            .model
            .clone()
            .or_else(|| self.config.models.iter().find(|m| m.supports_embeddings).map(|m| m.name.clone()))
            .ok_or_else(|| AdapterError::UnsupportedOperation(format!("{} has no embedding model configured", self.config.provider_name)))?;

        let url = format!("{}/embeddings", self.config.base_url);
        let body = OpenAIEmbeddingRequest {
            model: model.clone(),
            input: request.texts.clone(),
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .timeout(std::time::Duration::from_secs(self.config.timeout_seconds))
            .send()
            .await
            .map_err(|e| AdapterError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(Self::handle_error_response(response).await);
        }

        let parsed: OpenAIEmbeddingResponse = response.json().await.map_err(|e| AdapterError::Protocol(e.to_string()))?;
        let usage = self.usage_from(&parsed.model, parsed.usage.prompt_tokens, 0);

        Ok(EmbeddingResult {
            embeddings: parsed.data.into_iter().map(|d| d.embedding).collect(),
            model: parsed.model,
            provider: self.config.provider_name.clone(),
            usage,
        })
    }
}
