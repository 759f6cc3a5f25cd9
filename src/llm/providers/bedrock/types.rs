//! Bedrock's `InvokeModel` body for Anthropic models mirrors the direct
//! Anthropic Messages API shape (minus the top-level `model` field, which
//! Bedrock takes from the URL path instead), so these types are a near
//! copy of [`crate::llm::providers::anthropic::types`].

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize)]
pub struct BedrockMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct BedrockInvokeRequest {
    pub anthropic_version: String,
    pub messages: Vec<BedrockMessage>,
    pub max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub stop_sequences: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BedrockUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BedrockContentBlock {
    #[serde(rename = "type")]
    pub block_type: String,
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BedrockInvokeResponse {
    pub content: Vec<BedrockContentBlock>,
    pub usage: BedrockUsage,
}

impl BedrockInvokeResponse {
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter(|b| b.block_type == "text")
            .filter_map(|b| b.text.as_deref())
            .collect()
    }
}

/// The JSON envelope carried in the `:event-type: chunk` frame's payload —
/// the actual stream event is base64-encoded inside `bytes`.
#[derive(Debug, Clone, Deserialize)]
pub struct BedrockChunkEnvelope {
    pub bytes: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum BedrockStreamEvent {
    #[serde(rename = "message_start")]
    MessageStart { message: BedrockMessageStart },
    #[serde(rename = "content_block_delta")]
    ContentBlockDelta { delta: BedrockDelta },
    #[serde(rename = "message_delta")]
    MessageDelta { usage: Option<BedrockPartialUsage> },
    #[serde(rename = "message_stop")]
    MessageStop,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BedrockMessageStart {
    pub usage: BedrockUsage,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BedrockDelta {
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BedrockPartialUsage {
    #[serde(default)]
    pub output_tokens: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BedrockErrorResponse {
    pub message: String,
}

/// Titan's embeddings `InvokeModel` body batches every text into one call,
/// unlike its single-prompt text-generation counterpart.
#[derive(Debug, Clone, Serialize)]
pub struct BedrockEmbedRequest {
    #[serde(rename = "inputTexts")]
    pub input_texts: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BedrockEmbedResponse {
    pub embeddings: Vec<Vec<f32>>,
    #[serde(rename = "inputTextTokenCount")]
    pub input_text_token_count: u32,
}
