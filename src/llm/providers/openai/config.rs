//! OpenAI-compatible adapter configuration.
//!
//! This same config shape backs Together AI and OpenRouter (spec §4.1):
//! both speak the OpenAI chat-completions wire format, so they reuse this
//! client with a different `base_url`/model list rather than duplicating
//! the adapter.

use crate::llm::traits::ModelInfo;

#[derive(Debug, Clone)]
pub struct OpenAICompatConfig {
    pub provider_name: String,
    pub api_key: String,
    pub base_url: String,
    pub organization: Option<String>,
    pub timeout_seconds: u64,
    pub models: Vec<ModelInfo>,
}

impl OpenAICompatConfig {
    pub fn openai(api_key: String) -> Self {
        Self {
            provider_name: "openai".to_string(),
            api_key,
            base_url: "https://api.openai.com/v1".to_string(),
            organization: None,
            timeout_seconds: 120,
            models: default_openai_models(),
        }
    }

    /// Together AI speaks the same chat-completions wire format as OpenAI
    /// (spec §4.1) — only the base URL, key, and model catalog differ.
    pub fn together(api_key: String) -> Self {
        Self {
            provider_name: "together".to_string(),
            api_key,
            base_url: "https://api.together.xyz/v1".to_string(),
            organization: None,
            timeout_seconds: 120,
            models: default_together_models(),
        }
    }

    /// OpenRouter is an aggregator that fronts many vendors behind one
    /// OpenAI-compatible endpoint; we model it the same way.
    pub fn openrouter(api_key: String) -> Self {
        Self {
            provider_name: "openrouter".to_string(),
            api_key,
            base_url: "https://openrouter.ai/api/v1".to_string(),
            organization: None,
            timeout_seconds: 120,
            models: default_openrouter_models(),
        }
    }
}

fn default_together_models() -> Vec<ModelInfo> {
    vec![ModelInfo {
        name: "meta-llama/Llama-3.3-70B-Instruct-Turbo".to_string(),
        cost_per_1k_input_tokens: 0.00088,
        cost_per_1k_output_tokens: 0.00088,
        quality_score: 0.82,
        supports_streaming: true,
        supports_embeddings: false,
    }]
}

fn default_openrouter_models() -> Vec<ModelInfo> {
    vec![ModelInfo {
        name: "anthropic/claude-3.5-sonnet".to_string(),
        cost_per_1k_input_tokens: 0.003,
        cost_per_1k_output_tokens: 0.015,
        quality_score: 0.92,
        supports_streaming: true,
        supports_embeddings: false,
    }]
}

fn default_openai_models() -> Vec<ModelInfo> {
    vec![
        ModelInfo {
            name: "gpt-4o".to_string(),
            cost_per_1k_input_tokens: 0.0025,
            cost_per_1k_output_tokens: 0.01,
            quality_score: 0.95,
            supports_streaming: true,
            supports_embeddings: false,
        },
        ModelInfo {
            name: "gpt-4o-mini".to_string(),
            cost_per_1k_input_tokens: 0.00015,
            cost_per_1k_output_tokens: 0.0006,
            quality_score: 0.8,
            supports_streaming: true,
            supports_embeddings: false,
        },
        ModelInfo {
            name: "text-embedding-3-small".to_string(),
            cost_per_1k_input_tokens: 0.00002,
            cost_per_1k_output_tokens: 0.0,
            quality_score: 0.7,
            supports_streaming: false,
            supports_embeddings: true,
        },
    ]
}
