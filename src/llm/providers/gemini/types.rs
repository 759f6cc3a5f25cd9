use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize)]
pub struct GeminiPart {
    pub text: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct GeminiContent {
    pub role: String,
    pub parts: Vec<GeminiPart>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct GeminiGenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub stop_sequences: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GeminiRequest {
    pub contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<GeminiContent>,
    pub generation_config: GeminiGenerationConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeminiUsageMetadata {
    #[serde(default)]
    pub prompt_token_count: u32,
    #[serde(default)]
    pub candidates_token_count: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeminiCandidate {
    pub content: GeminiContent2,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeminiContent2 {
    #[serde(default)]
    pub parts: Vec<GeminiPart2>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeminiPart2 {
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeminiResponse {
    #[serde(default)]
    pub candidates: Vec<GeminiCandidate>,
    pub usage_metadata: Option<GeminiUsageMetadata>,
}

impl GeminiResponse {
    pub fn text(&self) -> String {
        self.candidates
            .first()
            .map(|c| c.content.parts.iter().filter_map(|p| p.text.as_deref()).collect())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeminiErrorBody {
    pub message: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeminiErrorResponse {
    pub error: GeminiErrorBody,
}

#[derive(Debug, Clone, Serialize)]
pub struct GeminiEmbedRequest {
    pub content: GeminiContent,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeminiEmbedding {
    pub values: Vec<f32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeminiEmbedResponse {
    pub embedding: GeminiEmbedding,
}
