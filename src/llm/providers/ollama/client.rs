use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt};
use reqwest::Client;
use tracing::{debug, error};

use crate::llm::ndjson::parse_ndjson_stream;
use crate::llm::traits::{ModelInfo, ProviderAdapter};
use crate::llm::{AdapterError, AdapterResult, CompletionRequest, CompletionResult, EmbeddingRequest, EmbeddingResult, RequestContext, StreamChunk, TokenUsage};
use crate::models::Role;

use super::config::OllamaConfig;
use super::types::{OllamaChatMessage, OllamaEmbeddingRequest, OllamaEmbeddingResponse, OllamaErrorResponse, OllamaOptions, OllamaRequest, OllamaResponse};

pub struct OllamaAdapter {
    client: Client,
    config: OllamaConfig,
}

impl OllamaAdapter {
    pub fn new(config: OllamaConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    fn convert_request(&self, request: &CompletionRequest, model: &str, stream: bool) -> OllamaRequest {
        OllamaRequest {
            model: model.to_string(),
            messages: request
                .messages
                .iter()
                .map(|m| OllamaChatMessage {
                    role: role_str(m.role).to_string(),
                    content: m.content.clone(),
                })
                .collect(),
            stream,
            options: OllamaOptions {
                temperature: request.temperature,
                top_p: request.top_p,
                num_predict: request.max_tokens.map(|t| t as i32),
                stop: request.stop.clone(),
            },
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
}

fn role_str(role: Role) -> &'static str {
    match role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
    }
}

#[async_trait]
impl ProviderAdapter for OllamaAdapter {
    fn name(&self) -> &str {
        "ollama"
    }

    fn models(&self) -> &[ModelInfo] {
        &self.config.models
    }

    fn available(&self) -> bool {
        !self.config.base_url.is_empty()
    }

    async fn complete(&self, request: &CompletionRequest, ctx: &RequestContext) -> AdapterResult<CompletionResult> {
        let model = self.resolve_model(request)?.to_string();
        let body = self.convert_request(request, &model, false);
        let url = format!("{}/api/chat", self.config.base_url);

        debug!(provider = "ollama", %model, trace_id = %ctx.trace_id, "sending completion request");

        let response = self
            .client
            .post(&url)
            .json(&body)
            .timeout(std::time::Duration::from_secs(self.config.timeout_seconds))
            .send()
            .await
            .map_err(|e| AdapterError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<OllamaErrorResponse>(&body).map(|e| e.error).unwrap_or(body);
            error!(provider = "ollama", status, %message, "upstream returned an error");
            return Err(AdapterError::Upstream { status, message });
        }

        let parsed: OllamaResponse = response.json().await.map_err(|e| AdapterError::Protocol(e.to_string()))?;
        if parsed.message.content.is_empty() {
            return Err(AdapterError::EmptyResponse);
        }

        let prompt_tokens = parsed.prompt_eval_count.unwrap_or(0);
        let completion_tokens = parsed.eval_count.unwrap_or(0);

        Ok(CompletionResult {
            id: uuid::Uuid::new_v4().to_string(),
            content: parsed.message.content,
            usage: TokenUsage::new(prompt_tokens, completion_tokens, 0.0),
            provider: "ollama".to_string(),
            model: parsed.model,
            cached: false,
            trace_id: ctx.trace_id.clone(),
        })
    }

    async fn complete_stream(&self, request: &CompletionRequest, ctx: &RequestContext) -> AdapterResult<BoxStream<'static, StreamChunk>> {
        let model = self.resolve_model(request)?.to_string();
        let body = self.convert_request(request, &model, true);
        let url = format!("{}/api/chat", self.config.base_url);

        let response = self
            .client
            .post(&url)
            .json(&body)
            .timeout(std::time::Duration::from_secs(self.config.timeout_seconds))
            .send()
            .await
            .map_err(|e| AdapterError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<OllamaErrorResponse>(&body).map(|e| e.error).unwrap_or(body);
            return Err(AdapterError::Upstream { status, message });
        }

        let cancel = ctx.child_token();
        let lines = parse_ndjson_stream(response.bytes_stream());

        let stream = lines
            .take_until(async move { cancel.cancelled().await })
            .scan(String::new(), move |accumulated, line| {
                futures::future::ready(Some(decode_ollama_line(line, accumulated)))
            })
            .filter_map(futures::future::ready);

        Ok(Box::pin(stream))
    }

    /// Ollama's `/api/embeddings` takes one prompt per call; there is no
    /// batch form (spec §4.1).
    async fn embed(&self, request: &EmbeddingRequest) -> AdapterResult<EmbeddingResult> {
        let model = request
            .model
            .clone()
            .or_else(|| self.config.models.iter().find(|m| m.supports_embeddings).map(|m| m.name.clone()))
            .ok_or_else(|| AdapterError::UnsupportedOperation("ollama has no embedding model configured".to_string()))?;

        let url = format!("{}/api/embeddings", self.config.base_url);
        let mut embeddings = Vec::with_capacity(request.texts.len());
        for text in &request.texts {
            let body = OllamaEmbeddingRequest { model: model.clone(), prompt: text.clone() };
            let response = self
                .client
                .post(&url)
                .json(&body)
                .timeout(std::time::Duration::from_secs(self.config.timeout_seconds))
                .send()
                .await
                .map_err(|e| AdapterError::Transport(e.to_string()))?;

            if !response.status().is_success() {
                let status = response.status().as_u16();
                let body = response.text().await.unwrap_or_default();
                let message = serde_json::from_str::<OllamaErrorResponse>(&body).map(|e| e.error).unwrap_or(body);
                return Err(AdapterError::Upstream { status, message });
            }

            let parsed: OllamaEmbeddingResponse = response.json().await.map_err(|e| AdapterError::Protocol(e.to_string()))?;
            embeddings.push(parsed.embedding);
        }

        Ok(EmbeddingResult {
            embeddings,
            model,
            provider: "ollama".to_string(),
            usage: TokenUsage::default(),
        })
    }
}

fn decode_ollama_line(line: AdapterResult<String>, accumulated: &mut String) -> Option<StreamChunk> {
    let line = match line {
        Ok(l) => l,
        Err(e) => return Some(StreamChunk::error(e.to_string())),
    };
    let parsed: OllamaResponse = match serde_json::from_str(&line) {
        Ok(p) => p,
        Err(e) => return Some(StreamChunk::error(format!("malformed stream line: {e}"))),
    };

    if !parsed.message.content.is_empty() {
        accumulated.push_str(&parsed.message.content);
    }

    if parsed.done {
        let usage = TokenUsage::new(parsed.prompt_eval_count.unwrap_or(0), parsed.eval_count.unwrap_or(0), 0.0);
        Some(StreamChunk::terminal(accumulated.clone(), usage))
    } else if !parsed.message.content.is_empty() {
        Some(StreamChunk::delta(parsed.message.content))
    } else {
        None
    }
}
