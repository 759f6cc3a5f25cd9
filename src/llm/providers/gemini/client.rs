use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt};
use reqwest::Client;
use tracing::{debug, error};

use crate::llm::ndjson::parse_ndjson_stream;
use crate::llm::traits::{ModelInfo, ProviderAdapter};
use crate::llm::{AdapterError, AdapterResult, CompletionRequest, CompletionResult, EmbeddingRequest, EmbeddingResult, RequestContext, StreamChunk, TokenUsage};
use crate::models::Role;

use super::config::GeminiConfig;
use super::types::{GeminiContent, GeminiEmbedRequest, GeminiEmbedResponse, GeminiErrorResponse, GeminiGenerationConfig, GeminiPart, GeminiRequest, GeminiResponse};

/// Gemini speaks a bracketed-JSON-array stream for `streamGenerateContent`
/// rather than SSE or NDJSON proper; treating the response body as a
/// concatenation of top-level JSON objects (stripping `[`, `]`, and `,`
/// separators) lets the same incremental line-buffering idiom used for
/// Ollama's NDJSON apply here too.
pub struct GeminiAdapter {
    client: Client,
    config: GeminiConfig,
}

impl GeminiAdapter {
    pub fn new(config: GeminiConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    fn endpoint(&self, model: &str, method: &str) -> String {
        match &self.config.vertex {
            Some(v) => format!(
                "https://{loc}-aiplatform.googleapis.com/v1/projects/{proj}/locations/{loc}/publishers/google/models/{model}:{method}",
                loc = v.location,
                proj = v.project_id,
                model = model,
                method = method,
            ),
            None => format!("{}/models/{}:{}?key={}", self.config.base_url, model, method, self.config.api_key),
        }
    }

    fn convert_request(&self, request: &CompletionRequest) -> (GeminiRequest, Option<GeminiContent>) {
        let mut system = None;
        let mut contents = Vec::new();
        for m in &request.messages {
            match m.role {
                Role::System => {
                    system = Some(GeminiContent {
                        role: "system".to_string(),
                        parts: vec![GeminiPart { text: m.content.clone() }],
                    });
                }
                Role::Assistant => contents.push(GeminiContent {
                    role: "model".to_string(),
                    parts: vec![GeminiPart { text: m.content.clone() }],
                }),
                Role::User => contents.push(GeminiContent {
                    role: "user".to_string(),
                    parts: vec![GeminiPart { text: m.content.clone() }],
                }),
            }
        }

        let generation_config = GeminiGenerationConfig {
            temperature: request.temperature,
            top_p: request.top_p,
            max_output_tokens: request.max_tokens,
            stop_sequences: request.stop.clone(),
        };

        (
            GeminiRequest {
                contents,
                system_instruction: system.clone(),
                generation_config,
            },
            system,
        )
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
            None => builder,
        }
    }

    async fn handle_error_response(response: reqwest::Response) -> AdapterError {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<GeminiErrorResponse>(&body)
            .map(|e| e.error.message)
            .unwrap_or(body);
        AdapterError::Upstream { status, message }
    }
}

#[async_trait]
impl ProviderAdapter for GeminiAdapter {
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
        let (body, _) = self.convert_request(request);
        let url = self.endpoint(&model, "generateContent");

        debug!(provider = self.name(), %model, trace_id = %ctx.trace_id, "sending completion request");

        let builder = self.client.post(&url).json(&body).timeout(std::time::Duration::from_secs(60));
        let response = self.authorize(builder).send().await.map_err(|e| AdapterError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            let err = Self::handle_error_response(response).await;
            error!(provider = self.name(), %err, "upstream returned an error");
            return Err(err);
        }

        let parsed: GeminiResponse = response.json().await.map_err(|e| AdapterError::Protocol(e.to_string()))?;
        let content = parsed.text();
        if content.is_empty() {
            return Err(AdapterError::EmptyResponse);
        }
        let (prompt_tokens, completion_tokens) = parsed
            .usage_metadata
            .as_ref()
            .map(|u| (u.prompt_token_count, u.candidates_token_count))
            .unwrap_or((0, 0));
        let usage = match self.config.models.iter().find(|m| m.name == model) {
            Some(m) => crate::llm::cost::usage_for(m, prompt_tokens, completion_tokens),
            None => TokenUsage::new(prompt_tokens, completion_tokens, 0.0),
        };

        Ok(CompletionResult {
            id: uuid::Uuid::new_v4().to_string(),
            content,
            usage,
            provider: self.name().to_string(),
            model,
            cached: false,
            trace_id: ctx.trace_id.clone(),
        })
    }

    async fn complete_stream(&self, request: &CompletionRequest, ctx: &RequestContext) -> AdapterResult<BoxStream<'static, StreamChunk>> {
        let model = self.resolve_model(request)?.to_string();
        let (body, _) = self.convert_request(request);
        let url = self.endpoint(&model, "streamGenerateContent");

        let builder = self.client.post(&url).json(&body).timeout(std::time::Duration::from_secs(60));
        let response = self.authorize(builder).send().await.map_err(|e| AdapterError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(Self::handle_error_response(response).await);
        }

        let models = self.config.models.clone();
        let cancel = ctx.child_token();
        // Gemini's streaming body is a top-level JSON array; the ndjson
        // framer's line-buffering is reused after stripping the array
        // punctuation from each line.
        let lines = parse_ndjson_stream(response.bytes_stream());

        let stream = lines
            .take_until(async move { cancel.cancelled().await })
            .scan((String::new(), 0u32), move |(accumulated, prompt_tokens), line| {
                let chunk = decode_gemini_line(line, accumulated, prompt_tokens, &models);
                futures::future::ready(Some(chunk))
            })
            .filter_map(futures::future::ready);

        Ok(Box::pin(stream))
    }

    /// Gemini has no batch embeddings endpoint; each input text gets its own
    /// `embedContent` call (spec §4.1).
    async fn embed(&self, request: &EmbeddingRequest) -> AdapterResult<EmbeddingResult> {
        let model = request
            .model
            .clone()
            .or_else(|| self.config.models.iter().find(|m| m.supports_embeddings).map(|m| m.name.clone()))
            .ok_or_else(|| AdapterError::UnsupportedOperation(format!("{} has no embedding model configured", self.name())))?;

        let mut embeddings = Vec::with_capacity(request.texts.len());
        for text in &request.texts {
            let body = GeminiEmbedRequest {
                content: GeminiContent { role: "user".to_string(), parts: vec![GeminiPart { text: text.clone() }] },
            };
            let url = self.endpoint(&model, "embedContent");
            let builder = self.client.post(&url).json(&body).timeout(std::time::Duration::from_secs(60));
            let response = self.authorize(builder).send().await.map_err(|e| AdapterError::Transport(e.to_string()))?;

            if !response.status().is_success() {
                return Err(Self::handle_error_response(response).await);
            }

            let parsed: GeminiEmbedResponse = response.json().await.map_err(|e| AdapterError::Protocol(e.to_string()))?;
            embeddings.push(parsed.embedding.values);
        }

        Ok(EmbeddingResult {
            embeddings,
            model,
            provider: self.name().to_string(),
            usage: TokenUsage::default(),
        })
    }
}

fn decode_gemini_line(
    line: AdapterResult<String>,
    accumulated: &mut String,
    prompt_tokens: &mut u32,
    models: &[ModelInfo],
) -> Option<StreamChunk> {
    let line = match line {
        Ok(l) => l,
        Err(e) => return Some(StreamChunk::error(e.to_string())),
    };
    let trimmed = line.trim().trim_start_matches('[').trim_end_matches(',').trim_end_matches(']').trim();
    if trimmed.is_empty() {
        return None;
    }
    let parsed: GeminiResponse = match serde_json::from_str(trimmed) {
        Ok(p) => p,
        Err(_) => return None,
    };

    let text = parsed.text();
    if !text.is_empty() {
        accumulated.push_str(&text);
    }
    if let Some(usage) = &parsed.usage_metadata {
        *prompt_tokens = usage.prompt_token_count;
    }

    let finished = parsed.candidates.first().and_then(|c| c.finish_reason.as_deref()).is_some();
    if finished {
        let completion_tokens = parsed.usage_metadata.as_ref().map(|u| u.candidates_token_count).unwrap_or(0);
        let usage = match models.first() {
            Some(m) => crate::llm::cost::usage_for(m, *prompt_tokens, completion_tokens),
            None => TokenUsage::new(*prompt_tokens, completion_tokens, 0.0),
        };
        Some(StreamChunk::terminal(accumulated.clone(), usage))
    } else if !text.is_empty() {
        Some(StreamChunk::delta(text))
    } else {
        None
    }
}
