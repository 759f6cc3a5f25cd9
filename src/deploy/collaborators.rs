//! Evaluation Collaborator Contract (spec §4.14, component C14): three
//! narrow trait boundaries the controller calls into for gate conditions.
//! None of these traits score anything themselves — production wiring to
//! the real evaluation/observability services is out of scope; the structs
//! in this module are the in-memory fakes tests and examples use instead.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;

use crate::error::Result;
use crate::models::quality_gate::GateCondition;

#[async_trait]
pub trait EvalScorer: Send + Sync {
    /// Maps a dataset/eval-run pair to a `0..1` score.
    async fn score(&self, dataset_id: Option<&str>, eval_run_id: Option<&str>) -> Result<f64>;
}

#[async_trait]
pub trait MetricsSampler: Send + Sync {
    async fn latency_ms(&self, prompt_id: uuid::Uuid, version: u32, environment: &str) -> Result<f64>;

    async fn cost_usd(&self, prompt_id: uuid::Uuid, version: u32, environment: &str) -> Result<f64>;
}

#[async_trait]
pub trait CustomGateChecker: Send + Sync {
    /// Maps a condition's free-form `custom_config` to an observed value to
    /// compare against the condition's threshold/operator.
    async fn evaluate(&self, condition: &GateCondition) -> Result<f64>;
}

/// Fixed-score fake: every dataset/run pair gets the same configured score.
pub struct FixedEvalScorer {
    pub score: f64,
}

#[async_trait]
impl EvalScorer for FixedEvalScorer {
    async fn score(&self, _dataset_id: Option<&str>, _eval_run_id: Option<&str>) -> Result<f64> {
        Ok(self.score)
    }
}

/// In-memory fake keyed by `(prompt_id, version, environment)`, letting
/// tests stage specific latency/cost readings per deployment target.
#[derive(Default)]
pub struct InMemoryMetricsSampler {
    latencies: RwLock<HashMap<(uuid::Uuid, u32, String), f64>>,
    costs: RwLock<HashMap<(uuid::Uuid, u32, String), f64>>,
}

impl InMemoryMetricsSampler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_latency(&self, prompt_id: uuid::Uuid, version: u32, environment: &str, latency_ms: f64) {
        self.latencies.write().unwrap().insert((prompt_id, version, environment.to_string()), latency_ms);
    }

    pub fn set_cost(&self, prompt_id: uuid::Uuid, version: u32, environment: &str, cost_usd: f64) {
        self.costs.write().unwrap().insert((prompt_id, version, environment.to_string()), cost_usd);
    }
}

#[async_trait]
impl MetricsSampler for InMemoryMetricsSampler {
    async fn latency_ms(&self, prompt_id: uuid::Uuid, version: u32, environment: &str) -> Result<f64> {
        Ok(self.latencies.read().unwrap().get(&(prompt_id, version, environment.to_string())).copied().unwrap_or(0.0))
    }

    async fn cost_usd(&self, prompt_id: uuid::Uuid, version: u32, environment: &str) -> Result<f64> {
        Ok(self.costs.read().unwrap().get(&(prompt_id, version, environment.to_string())).copied().unwrap_or(0.0))
    }
}

/// Always-pass fake for `custom` conditions: returns the condition's own
/// threshold so `Operator::evaluate` trivially passes regardless of
/// operator, unless a test overrides the returned value.
pub struct AlwaysPassCustomGateChecker;

#[async_trait]
impl CustomGateChecker for AlwaysPassCustomGateChecker {
    async fn evaluate(&self, condition: &GateCondition) -> Result<f64> {
        Ok(condition.threshold)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fixed_eval_scorer_ignores_its_inputs() {
        let scorer = FixedEvalScorer { score: 0.87 };
        assert_eq!(scorer.score(Some("ds"), Some("run")).await.unwrap(), 0.87);
        assert_eq!(scorer.score(None, None).await.unwrap(), 0.87);
    }

    #[tokio::test]
    async fn metrics_sampler_defaults_to_zero_for_unset_keys() {
        let sampler = InMemoryMetricsSampler::new();
        let prompt_id = uuid::Uuid::new_v4();
        assert_eq!(sampler.latency_ms(prompt_id, 1, "prod").await.unwrap(), 0.0);

        sampler.set_latency(prompt_id, 1, "prod", 120.0);
        assert_eq!(sampler.latency_ms(prompt_id, 1, "prod").await.unwrap(), 120.0);
    }
}
