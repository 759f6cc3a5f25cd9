use async_trait::async_trait;
use base64::Engine;
use futures::stream::{BoxStream, StreamExt};
use reqwest::Client;
use tracing::{debug, error};

use crate::llm::event_stream::{EventStreamMessage, EventStreamParser};
use crate::llm::traits::{ModelInfo, ProviderAdapter};
use crate::llm::{
    AdapterError, AdapterResult, CompletionRequest, CompletionResult, EmbeddingRequest, EmbeddingResult, RequestContext, StreamChunk,
    TokenUsage,
};
use crate::models::Role;

use super::config::BedrockConfig;
use super::sigv4::SigV4Signer;
use super::types::{
    BedrockChunkEnvelope, BedrockEmbedRequest, BedrockEmbedResponse, BedrockErrorResponse, BedrockInvokeRequest, BedrockInvokeResponse,
    BedrockMessage, BedrockStreamEvent,
};

const ANTHROPIC_VERSION: &str = "bedrock-2023-05-31";

pub struct BedrockAdapter {
    client: Client,
    config: BedrockConfig,
}

impl BedrockAdapter {
    pub fn new(config: BedrockConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    fn convert_request(&self, request: &CompletionRequest) -> BedrockInvokeRequest {
        let mut system = None;
        let mut messages = Vec::new();
        for m in &request.messages {
            if m.role == Role::System {
                system = Some(m.content.clone());
            } else {
                messages.push(BedrockMessage {
                    role: if m.role == Role::Assistant { "assistant".to_string() } else { "user".to_string() },
                    content: m.content.clone(),
                });
            }
        }

        BedrockInvokeRequest {
            anthropic_version: ANTHROPIC_VERSION.to_string(),
            messages,
            max_tokens: request.max_tokens.unwrap_or(1024),
            temperature: request.temperature,
            top_p: request.top_p,
            stop_sequences: request.stop.clone(),
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

    fn host(&self) -> String {
        format!("bedrock-runtime.{}.amazonaws.com", self.config.region)
    }

    fn signed_request(&self, model: &str, body: &[u8], stream: bool) -> (String, Vec<(String, String)>) {
        let action = if stream { "invoke-with-response-stream" } else { "invoke" };
        let path = format!("/model/{}/{}", urlencoding::encode(model), action);
        let host = self.host();

        let signer = SigV4Signer {
            access_key_id: &self.config.access_key_id,
            secret_access_key: &self.config.secret_access_key,
            session_token: self.config.session_token.as_deref(),
            region: &self.config.region,
            service: "bedrock",
        };
        let signed = signer.sign("POST", &host, &path, body, chrono::Utc::now());

        let url = format!("{}{}", self.config.endpoint(), path);
        (url, signed.headers)
    }
}

#[async_trait]
impl ProviderAdapter for BedrockAdapter {
    fn name(&self) -> &str {
        "bedrock"
    }

    fn models(&self) -> &[ModelInfo] {
        &self.config.models
    }

    fn available(&self) -> bool {
        !self.config.access_key_id.is_empty() && !self.config.secret_access_key.is_empty()
    }

    async fn complete(&self, request: &CompletionRequest, ctx: &RequestContext) -> AdapterResult<CompletionResult> {
        let model = self.resolve_model(request)?.to_string();
        let body = self.convert_request(request);
        let body_bytes = serde_json::to_vec(&body).map_err(|e| AdapterError::Protocol(e.to_string()))?;
        let (url, headers) = self.signed_request(&model, &body_bytes, false);

        debug!(provider = "bedrock", %model, trace_id = %ctx.trace_id, "sending completion request");

        let mut builder = self.client.post(&url).header("content-type", "application/json").body(body_bytes);
        for (name, value) in &headers {
            builder = builder.header(name, value);
        }

        let response = builder.send().await.map_err(|e| AdapterError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<BedrockErrorResponse>(&body).map(|e| e.message).unwrap_or(body);
            error!(provider = "bedrock", status, %message, "upstream returned an error");
            return Err(AdapterError::Upstream { status, message });
        }

        let parsed: BedrockInvokeResponse = response.json().await.map_err(|e| AdapterError::Protocol(e.to_string()))?;
        let content = parsed.text();
        if content.is_empty() {
            return Err(AdapterError::EmptyResponse);
        }

        let usage = match self.config.models.iter().find(|m| m.name == model) {
            Some(m) => crate::llm::cost::usage_for(m, parsed.usage.input_tokens, parsed.usage.output_tokens),
            None => TokenUsage::new(parsed.usage.input_tokens, parsed.usage.output_tokens, 0.0),
        };

        Ok(CompletionResult {
            id: uuid::Uuid::new_v4().to_string(),
            content,
            usage,
            provider: "bedrock".to_string(),
            model,
            cached: false,
            trace_id: ctx.trace_id.clone(),
        })
    }

    async fn complete_stream(&self, request: &CompletionRequest, ctx: &RequestContext) -> AdapterResult<BoxStream<'static, StreamChunk>> {
        let model = self.resolve_model(request)?.to_string();
        let body = self.convert_request(request);
        let body_bytes = serde_json::to_vec(&body).map_err(|e| AdapterError::Protocol(e.to_string()))?;
        let (url, headers) = self.signed_request(&model, &body_bytes, true);

        let mut builder = self.client.post(&url).header("content-type", "application/json").body(body_bytes);
        for (name, value) in &headers {
            builder = builder.header(name, value);
        }

        let response = builder.send().await.map_err(|e| AdapterError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<BedrockErrorResponse>(&body).map(|e| e.message).unwrap_or(body);
            return Err(AdapterError::Upstream { status, message });
        }

        let models = self.config.models.clone();
        let cancel = ctx.child_token();
        let byte_stream = response.bytes_stream();

        let frames = {
            let mut parser = EventStreamParser::new();
            byte_stream
                .map(move |chunk| match chunk {
                    Ok(bytes) => parser.parse_chunk(&bytes),
                    Err(e) => Err(AdapterError::Transport(e.to_string())),
                })
                .flat_map(|result| {
                    futures::stream::iter(match result {
                        Ok(frames) => frames.into_iter().map(Ok).collect::<Vec<_>>(),
                        Err(e) => vec![Err(e)],
                    })
                })
        };

        let stream = frames
            .take_until(async move { cancel.cancelled().await })
            .scan((String::new(), 0u32), move |(accumulated, input_tokens), frame| {
                let chunk = decode_bedrock_frame(frame, accumulated, input_tokens, &models);
                futures::future::ready(Some(chunk))
            })
            .filter_map(futures::future::ready);

        Ok(Box::pin(stream))
    }

    /// Titan's embeddings model batches every input text into a single
    /// `InvokeModel` call, same as OpenAI/Together (spec §4.1).
    async fn embed(&self, request: &EmbeddingRequest) -> AdapterResult<EmbeddingResult> {
        let model = request
            .model
            .clone()
            .or_else(|| self.config.models.iter().find(|m| m.supports_embeddings).map(|m| m.name.clone()))
            .ok_or_else(|| AdapterError::UnsupportedOperation("bedrock has no embedding model configured".to_string()))?;

        let body = BedrockEmbedRequest { input_texts: request.texts.clone() };
        let body_bytes = serde_json::to_vec(&body).map_err(|e| AdapterError::Protocol(e.to_string()))?;
        let (url, headers) = self.signed_request(&model, &body_bytes, false);

        let mut builder = self.client.post(&url).header("content-type", "application/json").body(body_bytes);
        for (name, value) in &headers {
            builder = builder.header(name, value);
        }

        let response = builder.send().await.map_err(|e| AdapterError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<BedrockErrorResponse>(&body).map(|e| e.message).unwrap_or(body);
            return Err(AdapterError::Upstream { status, message });
        }

        let parsed: BedrockEmbedResponse = response.json().await.map_err(|e| AdapterError::Protocol(e.to_string()))?;
        let usage = match self.config.models.iter().find(|m| m.name == model) {
            Some(m) => crate::llm::cost::usage_for(m, parsed.input_text_token_count, 0),
            None => TokenUsage::new(parsed.input_text_token_count, 0, 0.0),
        };

        Ok(EmbeddingResult {
            embeddings: parsed.embeddings,
            model,
            provider: "bedrock".to_string(),
            usage,
        })
    }
}

fn decode_bedrock_frame(
    frame: AdapterResult<EventStreamMessage>,
    accumulated: &mut String,
    input_tokens: &mut u32,
    models: &[ModelInfo],
) -> Option<StreamChunk> {
    let frame = match frame {
        Ok(f) => f,
        Err(e) => return Some(StreamChunk::error(e.to_string())),
    };

    let envelope: BedrockChunkEnvelope = match serde_json::from_slice(&frame.payload) {
        Ok(e) => e,
        Err(e) => return Some(StreamChunk::error(format!("malformed chunk envelope: {e}"))),
    };
    let decoded = match base64::engine::general_purpose::STANDARD.decode(envelope.bytes) {
        Ok(d) => d,
        Err(e) => return Some(StreamChunk::error(format!("malformed chunk payload: {e}"))),
    };
    let event: BedrockStreamEvent = match serde_json::from_slice(&decoded) {
        Ok(e) => e,
        Err(e) => return Some(StreamChunk::error(format!("malformed stream event: {e}"))),
    };

    match event {
        BedrockStreamEvent::MessageStart { message } => {
            *input_tokens = message.usage.input_tokens;
            None
        }
        BedrockStreamEvent::ContentBlockDelta { delta } => {
            let text = delta.text?;
            accumulated.push_str(&text);
            Some(StreamChunk::delta(text))
        }
        BedrockStreamEvent::MessageDelta { usage } => {
            let output_tokens = usage.map(|u| u.output_tokens).unwrap_or(0);
            let usage = match models.first() {
                Some(m) => crate::llm::cost::usage_for(m, *input_tokens, output_tokens),
                None => TokenUsage::new(*input_tokens, output_tokens, 0.0),
            };
            Some(StreamChunk::terminal(accumulated.clone(), usage))
        }
        BedrockStreamEvent::MessageStop | BedrockStreamEvent::Other => None,
    }
}
