use crate::llm::traits::ModelInfo;

#[derive(Debug, Clone)]
pub struct OllamaConfig {
    pub base_url: String,
    pub timeout_seconds: u64,
    /// Ollama serves whatever's locally pulled; the operator lists which
    /// model names to expose rather than this adapter discovering them.
    pub models: Vec<ModelInfo>,
}

impl OllamaConfig {
    pub fn new(base_url: String, model_names: Vec<String>) -> Self {
        Self {
            base_url,
            timeout_seconds: 300,
            models: model_names
                .into_iter()
                .map(|name| ModelInfo {
                    name,
                    cost_per_1k_input_tokens: 0.0,
                    cost_per_1k_output_tokens: 0.0,
                    quality_score: 0.6,
                    supports_streaming: true,
                    supports_embeddings: false,
                })
                .collect(),
        }
    }
}
