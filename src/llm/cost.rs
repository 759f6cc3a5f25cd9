//! Cost accounting helpers shared by the router and the provider adapters
//! (spec §4.1, §4.3).

use super::TokenUsage;
use super::traits::ModelInfo;

/// Combines input/output token counts with a model's per-1k rates into a
/// [`TokenUsage`] with `cost_usd` populated.
pub fn usage_for(model: &ModelInfo, prompt_tokens: u32, completion_tokens: u32) -> TokenUsage {
    let cost_usd = (prompt_tokens as f64 / 1000.0) * model.cost_per_1k_input_tokens
        + (completion_tokens as f64 / 1000.0) * model.cost_per_1k_output_tokens;
    TokenUsage {
        prompt_tokens,
        completion_tokens,
        total_tokens: prompt_tokens + completion_tokens,
        cost_usd,
    }
}

/// A rough, provider-agnostic token estimate (4 characters per token) used
/// only when a provider's response omits usage accounting.
pub fn estimate_tokens(text: &str) -> u32 {
    ((text.chars().count() as f64) / 4.0).ceil() as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model() -> ModelInfo {
        ModelInfo {
            name: "m".into(),
            cost_per_1k_input_tokens: 1.0,
            cost_per_1k_output_tokens: 2.0,
            quality_score: 0.5,
            supports_streaming: true,
            supports_embeddings: false,
        }
    }

    #[test]
    fn usage_for_computes_blended_cost() {
        let usage = usage_for(&model(), 1000, 500);
        assert_eq!(usage.total_tokens, 1500);
        assert!((usage.cost_usd - 2.0).abs() < 1e-9);
    }

    #[test]
    fn estimate_tokens_rounds_up() {
        assert_eq!(estimate_tokens("abcde"), 2);
        assert_eq!(estimate_tokens(""), 0);
    }
}
