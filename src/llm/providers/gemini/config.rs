//! Gemini adapter configuration, including the Vertex AI parameterization
//! (spec §4.1: Vertex Gemini is a config variant, not a separate adapter).

use crate::llm::traits::ModelInfo;

#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub base_url: String,
    pub models: Vec<ModelInfo>,
    pub vertex: Option<VertexTarget>,
}

#[derive(Debug, Clone)]
pub struct VertexTarget {
    pub project_id: String,
    pub location: String,
}

impl GeminiConfig {
    pub fn gemini(api_key: String) -> Self {
        Self {
            api_key,
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            models: default_models(),
            vertex: None,
        }
    }

    pub fn vertex_gemini(access_token: String, project_id: String, location: String) -> Self {
        Self {
            api_key: access_token,
            base_url: String::new(),
            models: default_models(),
            vertex: Some(VertexTarget { project_id, location }),
        }
    }

    pub fn provider_name(&self) -> &'static str {
        if self.vertex.is_some() {
            "vertex-gemini"
        } else {
            "gemini"
        }
    }
}

fn default_models() -> Vec<ModelInfo> {
    vec![
        ModelInfo {
            name: "gemini-1.5-pro".to_string(),
            cost_per_1k_input_tokens: 0.00125,
            cost_per_1k_output_tokens: 0.005,
            quality_score: 0.9,
            supports_streaming: true,
            supports_embeddings: false,
        },
        ModelInfo {
            name: "gemini-1.5-flash".to_string(),
            cost_per_1k_input_tokens: 0.000075,
            cost_per_1k_output_tokens: 0.0003,
            quality_score: 0.75,
            supports_streaming: true,
            supports_embeddings: false,
        },
        ModelInfo {
            name: "text-embedding-004".to_string(),
            cost_per_1k_input_tokens: 0.0,
            cost_per_1k_output_tokens: 0.0,
            quality_score: 0.7,
            supports_streaming: false,
            supports_embeddings: true,
        },
    ]
}
