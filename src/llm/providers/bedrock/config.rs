use crate::llm::traits::ModelInfo;

#[derive(Debug, Clone)]
pub struct BedrockConfig {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
    pub region: String,
    pub models: Vec<ModelInfo>,
}

impl BedrockConfig {
    pub fn new(access_key_id: String, secret_access_key: String, session_token: Option<String>, region: String) -> Self {
        Self {
            access_key_id,
            secret_access_key,
            session_token,
            region,
            models: default_models(),
        }
    }

    pub fn endpoint(&self) -> String {
        format!("https://bedrock-runtime.{}.amazonaws.com", self.region)
    }
}

fn default_models() -> Vec<ModelInfo> {
    vec![
        ModelInfo {
            name: "anthropic.claude-3-5-sonnet-20241022-v2:0".to_string(),
            cost_per_1k_input_tokens: 0.003,
            cost_per_1k_output_tokens: 0.015,
            quality_score: 0.93,
            supports_streaming: true,
            supports_embeddings: false,
        },
        ModelInfo {
            name: "amazon.titan-text-express-v1".to_string(),
            cost_per_1k_input_tokens: 0.0002,
            cost_per_1k_output_tokens: 0.0006,
            quality_score: 0.65,
            supports_streaming: true,
            supports_embeddings: false,
        },
        ModelInfo {
            name: "amazon.titan-embed-text-v2:0".to_string(),
            cost_per_1k_input_tokens: 0.00002,
            cost_per_1k_output_tokens: 0.0,
            quality_score: 0.8,
            supports_streaming: false,
            supports_embeddings: true,
        },
    ]
}
