use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt};
use reqwest::Client;
use tracing::{debug, error};

use crate::llm::sse::parse_sse_stream;
use crate::llm::traits::{ModelInfo, ProviderAdapter};
use crate::llm::{AdapterError, AdapterResult, CompletionRequest, CompletionResult, RequestContext, StreamChunk, TokenUsage};
use crate::models::Role;

use super::config::AnthropicConfig;
use super::types::{AnthropicErrorResponse, AnthropicMessage, AnthropicRequest, AnthropicResponse, AnthropicStreamEvent};

pub struct AnthropicAdapter {
    client: Client,
    config: AnthropicConfig,
}

impl AnthropicAdapter {
    pub fn new(config: AnthropicConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    fn endpoint(&self, model: &str, stream: bool) -> String {
        match &self.config.vertex {
            Some(v) => {
                let method = if stream { "streamRawPredict" } else { "rawPredict" };
                format!(
                    "https://{loc}-aiplatform.googleapis.com/v1/projects/{proj}/locations/{loc}/publishers/anthropic/models/{model}:{method}",
                    loc = v.location,
                    proj = v.project_id,
                    model = model,
                    method = method,
                )
            }
            None => format!("{}/messages", self.config.base_url),
        }
    }

    fn convert_request(&self, request: &CompletionRequest, model: &str, stream: bool) -> AnthropicRequest {
        let mut system = None;
        let mut messages = Vec::new();
        for m in &request.messages {
            if m.role == Role::System {
                system = Some(m.content.clone());
            } else {
                messages.push(AnthropicMessage {
                    role: if m.role == Role::Assistant { "assistant".to_string() } else { "user".to_string() },
                    content: m.content.clone(),
                });
            }
        }

        AnthropicRequest {
            anthropic_version: self.config.vertex.as_ref().map(|_| self.config.api_version.clone()),
            model: self.config.vertex.as_ref().map_or_else(|| Some(model.to_string()), |_| None),
            messages,
            max_tokens: request.max_tokens.unwrap_or(1024),
            temperature: request.temperature,
            top_p: request.top_p,
            stop_sequences: request.stop.clone(),
            stream,
            system,
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

    fn authorize(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.config.vertex {
            Some(_) => builder.bearer_auth(&self.config.api_key),
            None => builder
                .header("x-api-key", &self.config.api_key)
                .header("anthropic-version", &self.config.api_version),
        }
    }

    async fn handle_error_response(response: reqwest::Response) -> AdapterError {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<AnthropicErrorResponse>(&body)
            .map(|e| e.error.message)
            .unwrap_or(body);
        AdapterError::Upstream { status, message }
    }
}

#[async_trait]
impl ProviderAdapter for AnthropicAdapter {
    fn name(&self) -> &str {
        self.config.provider_name()
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
        let url = self.endpoint(&model, false);

        debug!(provider = self.name(), %model, trace_id = %ctx.trace_id, "sending completion request");

        let request_builder = self.client.post(&url).json(&body).timeout(std::time::Duration::from_secs(self.config.timeout_seconds));
        let response = self
            .authorize(request_builder)
            .send()
            .await
            .map_err(|e| AdapterError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            let err = Self::handle_error_response(response).await;
            error!(provider = self.name(), %err, "upstream returned an error");
            return Err(err);
        }

        let parsed: AnthropicResponse = response.json().await.map_err(|e| AdapterError::Protocol(e.to_string()))?;
        let content = parsed.text();
        if content.is_empty() {
            return Err(AdapterError::EmptyResponse);
        }
        let usage = match self.config.models.iter().find(|m| m.name == parsed.model) {
            Some(m) => crate::llm::cost::usage_for(m, parsed.usage.input_tokens, parsed.usage.output_tokens),
            None => TokenUsage::new(parsed.usage.input_tokens, parsed.usage.output_tokens, 0.0),
        };

        Ok(CompletionResult {
            id: parsed.id,
            content,
            usage,
            provider: self.name().to_string(),
            model: parsed.model,
            cached: false,
            trace_id: ctx.trace_id.clone(),
        })
    }

    async fn complete_stream(&self, request: &CompletionRequest, ctx: &RequestContext) -> AdapterResult<BoxStream<'static, StreamChunk>> {
        let model = self.resolve_model(request)?.to_string();
        let body = self.convert_request(request, &model, true);
        let url = self.endpoint(&model, true);

        let request_builder = self.client.post(&url).json(&body).timeout(std::time::Duration::from_secs(self.config.timeout_seconds));
        let response = self
            .authorize(request_builder)
            .send()
            .await
            .map_err(|e| AdapterError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(Self::handle_error_response(response).await);
        }

        let models = self.config.models.clone();
        let cancel = ctx.child_token();
        let sse = parse_sse_stream(response.bytes_stream());

        let stream = sse
            .take_until(async move { cancel.cancelled().await })
            .scan((String::new(), 0u32), move |(accumulated, input_tokens), event| {
                let chunk = decode_anthropic_event(event, accumulated, input_tokens, &models);
                futures::future::ready(Some(chunk))
            })
            .filter_map(futures::future::ready);

        Ok(Box::pin(stream))
    }
}

fn decode_anthropic_event(
    event: AdapterResult<crate::llm::sse::SSEEvent>,
    accumulated: &mut String,
    input_tokens: &mut u32,
    models: &[ModelInfo],
) -> Option<StreamChunk> {
    let event = match event {
        Ok(e) => e,
        Err(e) => return Some(StreamChunk::error(e.to_string())),
    };
    if event.data.trim().is_empty() {
        return None;
    }
    let parsed: AnthropicStreamEvent = match serde_json::from_str(&event.data) {
        Ok(p) => p,
        Err(e) => return Some(StreamChunk::error(format!("malformed stream event: {e}"))),
    };

    match parsed {
        AnthropicStreamEvent::MessageStart { message } => {
            *input_tokens = message.usage.input_tokens;
            None
        }
        AnthropicStreamEvent::ContentBlockDelta { delta } => {
            let text = delta.text?;
            accumulated.push_str(&text);
            Some(StreamChunk::delta(text))
        }
        AnthropicStreamEvent::MessageDelta { usage, .. } => {
            let output_tokens = usage.map(|u| u.output_tokens).unwrap_or(0);
            let usage = match models.first() {
                Some(m) => crate::llm::cost::usage_for(m, *input_tokens, output_tokens),
                None => TokenUsage::new(*input_tokens, output_tokens, 0.0),
            };
            Some(StreamChunk::terminal(accumulated.clone(), usage))
        }
        AnthropicStreamEvent::MessageStop | AnthropicStreamEvent::Ping | AnthropicStreamEvent::Other => None,
    }
}
