//! Anthropic adapter configuration, including the Vertex AI parameterization
//! (spec §4.1: Vertex Claude is a config variant, not a separate adapter).

use crate::llm::traits::ModelInfo;

#[derive(Debug, Clone)]
pub struct AnthropicConfig {
    pub api_key: String,
    pub base_url: String,
    pub api_version: String,
    pub timeout_seconds: u64,
    pub models: Vec<ModelInfo>,
    /// `Some` when this config targets Claude-on-Vertex instead of the
    /// direct Anthropic API; changes the request path and auth scheme.
    pub vertex: Option<VertexTarget>,
}

#[derive(Debug, Clone)]
pub struct VertexTarget {
    pub project_id: String,
    pub location: String,
}

impl AnthropicConfig {
    pub fn anthropic(api_key: String) -> Self {
        Self {
            api_key,
            base_url: "https://api.anthropic.com/v1".to_string(),
            api_version: "2023-06-01".to_string(),
            timeout_seconds: 120,
            models: default_models(),
            vertex: None,
        }
    }

    pub fn vertex_claude(access_token: String, project_id: String, location: String) -> Self {
        Self {
            api_key: access_token,
            base_url: String::new(),
            api_version: "vertex-2023-10-16".to_string(),
            timeout_seconds: 120,
            models: default_models(),
            vertex: Some(VertexTarget { project_id, location }),
        }
    }

    pub fn provider_name(&self) -> &'static str {
        if self.vertex.is_some() {
            "vertex-claude"
        } else {
            "anthropic"
        }
    }
}

fn default_models() -> Vec<ModelInfo> {
    vec![
        ModelInfo {
            name: "claude-3-5-sonnet-20241022".to_string(),
            cost_per_1k_input_tokens: 0.003,
            cost_per_1k_output_tokens: 0.015,
            quality_score: 0.93,
            supports_streaming: true,
            supports_embeddings: false,
        },
        ModelInfo {
            name: "claude-3-5-haiku-20241022".to_string(),
            cost_per_1k_input_tokens: 0.0008,
            cost_per_1k_output_tokens: 0.004,
            quality_score: 0.78,
            supports_streaming: true,
            supports_embeddings: false,
        },
    ]
}
