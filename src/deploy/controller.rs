//! Deployment Controller (spec §4.8, component C9): the state machine that
//! drives a prompt version from proposal through approval, quality-gate
//! evaluation, rollout, and rollback.
//!
//! ```text
//!                   approve / skip_approval
//! pending_approval ─────────────────────────▶ pending_gates
//!       │                                         │
//!       │ cancel                                  │ evaluate_gates
//!       ▼                                         ▼
//!   cancelled                              ┌──gates_pass──▶ in_progress ──complete──▶ completed
//!                                          │                    │
//!                                          ▼                    │ auto_rollback or manual
//!                                    gates_failed                ▼
//!                                                            rolled_back
//! ```

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rand::Rng;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{ErrorKind, PlatformError, Result};
use crate::models::deployment::{ConditionResult, Deployment, DeploymentStatus, GateResult, RolloutProgress, Strategy};
use crate::models::quality_gate::{ConditionType, GateCondition};

use super::collaborators::{CustomGateChecker, EvalScorer, MetricsSampler};
use super::store::DeploymentStore;

const GATE_EVAL_MAX_ATTEMPTS: u32 = 3;
const GATE_EVAL_BASE_DELAY_MS: u64 = 100;

/// Input for [`DeploymentController::create`].
#[derive(Debug, Clone, serde::Deserialize)]
pub struct DeploymentInput {
    pub prompt_id: Uuid,
    pub to_version: u32,
    pub environment: String,
    pub strategy: Strategy,
    pub skip_approval: bool,
    pub created_by: Option<String>,
    pub metadata: std::collections::HashMap<String, serde_json::Value>,
}

pub struct DeploymentController {
    store: Arc<dyn DeploymentStore>,
    eval_scorer: Arc<dyn EvalScorer>,
    metrics_sampler: Arc<dyn MetricsSampler>,
    custom_checker: Arc<dyn CustomGateChecker>,
}

/// Retries a gate-evaluation call up to [`GATE_EVAL_MAX_ATTEMPTS`] with
/// exponential backoff and jitter, but only for transient (`unavailable`)
/// failures — anything else propagates immediately.
async fn retry_transient<F, Fut, T>(op: F) -> Result<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0u32;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if err.kind == ErrorKind::Unavailable && attempt + 1 < GATE_EVAL_MAX_ATTEMPTS => {
                attempt += 1;
                let backoff_ms = GATE_EVAL_BASE_DELAY_MS * 2u64.pow(attempt);
                let jitter_ms = rand::thread_rng().gen_range(0..GATE_EVAL_BASE_DELAY_MS);
                warn!(attempt, error = %err, "gate evaluation call failed, retrying");
                tokio::time::sleep(Duration::from_millis(backoff_ms + jitter_ms)).await;
            }
            Err(err) => return Err(err),
        }
    }
}

fn require_status(deployment: &Deployment, allowed: &[DeploymentStatus]) -> Result<()> {
    if allowed.contains(&deployment.status) {
        Ok(())
    } else {
        Err(PlatformError::failed_precondition(format!(
            "deployment {} is in state {:?}, which does not allow this transition",
            deployment.id, deployment.status
        )))
    }
}

impl DeploymentController {
    pub fn new(
        store: Arc<dyn DeploymentStore>,
        eval_scorer: Arc<dyn EvalScorer>,
        metrics_sampler: Arc<dyn MetricsSampler>,
        custom_checker: Arc<dyn CustomGateChecker>,
    ) -> Self {
        Self { store, eval_scorer, metrics_sampler, custom_checker }
    }

    pub async fn create(&self, input: DeploymentInput) -> Result<Deployment> {
        let current = self.store.get_current_deployment(input.prompt_id, &input.environment).await?;
        let from_version = current.map(|d| d.to_version).unwrap_or(0);

        let status = if input.skip_approval { DeploymentStatus::PendingGates } else { DeploymentStatus::PendingApproval };

        let rollout = if input.strategy.has_rollout_progress() {
            let now = Utc::now();
            Some(RolloutProgress {
                current_percentage: input.strategy.initial_percentage,
                last_increment_at: now,
                next_increment_at: now + chrono::Duration::seconds(input.strategy.interval_seconds as i64),
            })
        } else {
            None
        };

        let deployment = Deployment {
            id: Uuid::new_v4(),
            prompt_id: input.prompt_id,
            from_version,
            to_version: input.to_version,
            environment: input.environment,
            strategy: input.strategy,
            status,
            status_message: None,
            gate_results: vec![],
            gates_passed: false,
            rollout,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            created_by: input.created_by,
            approved_by: None,
            metadata: input.metadata,
        };

        self.store.create(deployment).await
    }

    pub async fn approve(&self, id: Uuid, actor: String, _comment: Option<String>) -> Result<Deployment> {
        let mut deployment = self.get_or_not_found(id).await?;
        require_status(&deployment, &[DeploymentStatus::PendingApproval])?;

        deployment.approved_by = Some(actor);
        deployment.status = DeploymentStatus::PendingGates;
        self.store.update(deployment).await
    }

    async fn evaluate_condition(&self, deployment: &Deployment, condition: &GateCondition) -> Result<ConditionResult> {
        let observed = match condition.condition_type {
            ConditionType::EvalScore => {
                retry_transient(|| self.eval_scorer.score(condition.dataset_id.as_deref(), condition.eval_run_id.as_deref())).await?
            }
            ConditionType::Latency => {
                retry_transient(|| self.metrics_sampler.latency_ms(deployment.prompt_id, deployment.to_version, &deployment.environment)).await?
            }
            ConditionType::Cost => {
                retry_transient(|| self.metrics_sampler.cost_usd(deployment.prompt_id, deployment.to_version, &deployment.environment)).await?
            }
            ConditionType::Custom => retry_transient(|| self.custom_checker.evaluate(condition)).await?,
        };

        Ok(ConditionResult {
            condition_type: condition.condition_type,
            operator: condition.operator,
            threshold: condition.threshold,
            observed,
            passed: condition.operator.evaluate(observed, condition.threshold),
        })
    }

    pub async fn evaluate_gates(&self, id: Uuid) -> Result<Deployment> {
        let mut deployment = self.get_or_not_found(id).await?;
        require_status(&deployment, &[DeploymentStatus::PendingGates])?;

        let gates = self.store.list_quality_gates(deployment.prompt_id).await?;

        let mut gate_results = Vec::with_capacity(gates.len());
        for gate in &gates {
            let mut conditions = Vec::with_capacity(gate.conditions.len());
            for condition in &gate.conditions {
                match self.evaluate_condition(&deployment, condition).await {
                    Ok(result) => conditions.push(result),
                    Err(err) => {
                        deployment.status = DeploymentStatus::Failed;
                        deployment.status_message = Some(format!("gate evaluation failed: {err}"));
                        deployment.completed_at = Some(Utc::now());
                        return self.store.update(deployment).await;
                    }
                }
            }
            let passed = conditions.iter().all(|c| c.passed);
            gate_results.push(GateResult { gate_id: gate.id, gate_name: gate.name.clone(), required: gate.required, passed, conditions });
        }

        // No quality gates at all is vacuously a pass (spec §8 boundary
        // behavior: deployment with no quality gates → gates_passed=true).
        let gates_passed = gate_results.iter().filter(|g| g.required).all(|g| g.passed);

        deployment.gate_results = gate_results;
        deployment.gates_passed = gates_passed;
        deployment.status = if gates_passed { DeploymentStatus::InProgress } else { DeploymentStatus::GatesFailed };
        if gates_passed {
            deployment.started_at = Some(Utc::now());
        } else {
            deployment.completed_at = Some(Utc::now());
        }

        info!(deployment_id = %deployment.id, gates_passed, "gate evaluation complete");
        self.store.update(deployment).await
    }

    /// Advances a gradual/canary rollout by one tick if its interval has
    /// elapsed, rolling back automatically if `auto_rollback` is set and the
    /// observed quality score has fallen below `rollback_threshold`.
    pub async fn rollout_tick(&self, id: Uuid) -> Result<Deployment> {
        let deployment = self.get_or_not_found(id).await?;
        require_status(&deployment, &[DeploymentStatus::InProgress])?;

        let Some(mut rollout) = deployment.rollout.clone() else {
            return Ok(deployment);
        };

        let now = Utc::now();
        if now < rollout.next_increment_at {
            return Ok(deployment);
        }

        if deployment.strategy.auto_rollback {
            let observed = self.eval_scorer.score(None, None).await.unwrap_or(1.0);
            if observed < deployment.strategy.rollback_threshold {
                warn!(deployment_id = %deployment.id, observed, threshold = deployment.strategy.rollback_threshold, "auto rollback triggered");
                self.rollback(id, "automatic rollback: quality score below threshold".to_string()).await?;
                return self.get_or_not_found(id).await;
            }
        }

        rollout.current_percentage = (rollout.current_percentage + deployment.strategy.increment).min(100);
        rollout.last_increment_at = now;
        rollout.next_increment_at = now + chrono::Duration::seconds(deployment.strategy.interval_seconds as i64);

        let mut deployment = deployment;
        deployment.rollout = Some(rollout);
        self.store.update(deployment).await
    }

    pub async fn complete(&self, id: Uuid) -> Result<Deployment> {
        let mut deployment = self.get_or_not_found(id).await?;
        require_status(&deployment, &[DeploymentStatus::InProgress])?;

        if let Some(rollout) = &deployment.rollout {
            if rollout.current_percentage < 100 {
                return Err(PlatformError::failed_precondition(format!(
                    "deployment {} rollout is at {}%, not yet complete",
                    deployment.id, rollout.current_percentage
                )));
            }
        }

        deployment.status = DeploymentStatus::Completed;
        deployment.completed_at = Some(Utc::now());
        self.store.update(deployment).await
    }

    /// Marks the original deployment rolled back and synthesizes an
    /// immediate, pre-approved reverse deployment back to its `from_version`.
    pub async fn rollback(&self, id: Uuid, reason: String) -> Result<(Deployment, Deployment)> {
        let mut original = self.get_or_not_found(id).await?;
        require_status(&original, &[DeploymentStatus::InProgress, DeploymentStatus::Completed, DeploymentStatus::GatesFailed])?;

        original.status = DeploymentStatus::RolledBack;
        original.status_message = Some(reason);
        original.completed_at = Some(Utc::now());
        let original = self.store.update(original).await?;

        let reverse = self
            .create(DeploymentInput {
                prompt_id: original.prompt_id,
                to_version: original.from_version,
                environment: original.environment.clone(),
                strategy: Strategy::immediate(),
                skip_approval: true,
                created_by: original.created_by.clone(),
                metadata: std::collections::HashMap::new(),
            })
            .await?;

        Ok((original, reverse))
    }

    pub async fn cancel(&self, id: Uuid, reason: String) -> Result<Deployment> {
        let mut deployment = self.get_or_not_found(id).await?;
        require_status(&deployment, &[DeploymentStatus::PendingApproval, DeploymentStatus::PendingGates, DeploymentStatus::InProgress])?;

        deployment.status = DeploymentStatus::Cancelled;
        deployment.status_message = Some(reason);
        deployment.completed_at = Some(Utc::now());
        self.store.update(deployment).await
    }

    async fn get_or_not_found(&self, id: Uuid) -> Result<Deployment> {
        self.store.get(id).await?.ok_or_else(|| PlatformError::not_found(format!("deployment {id} not found")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deploy::collaborators::{AlwaysPassCustomGateChecker, FixedEvalScorer, InMemoryMetricsSampler};
    use crate::deploy::memory::InMemoryDeploymentStore;
    use crate::models::deployment::StrategyType;
    use crate::models::quality_gate::{GateCondition, Operator, QualityGate};

    fn controller_with_fixed_score(score: f64) -> DeploymentController {
        DeploymentController::new(
            Arc::new(InMemoryDeploymentStore::new()),
            Arc::new(FixedEvalScorer { score }),
            Arc::new(InMemoryMetricsSampler::new()),
            Arc::new(AlwaysPassCustomGateChecker),
        )
    }

    fn basic_input(prompt_id: Uuid) -> DeploymentInput {
        DeploymentInput {
            prompt_id,
            to_version: 2,
            environment: "prod".to_string(),
            strategy: Strategy::immediate(),
            skip_approval: false,
            created_by: Some("alice".to_string()),
            metadata: Default::default(),
        }
    }

    #[tokio::test]
    async fn create_starts_pending_approval_unless_skip_approval() {
        let controller = controller_with_fixed_score(1.0);
        let deployment = controller.create(basic_input(Uuid::new_v4())).await.unwrap();
        assert_eq!(deployment.status, DeploymentStatus::PendingApproval);

        let mut input = basic_input(Uuid::new_v4());
        input.skip_approval = true;
        let deployment = controller.create(input).await.unwrap();
        assert_eq!(deployment.status, DeploymentStatus::PendingGates);
    }

    #[tokio::test]
    async fn approve_requires_pending_approval_state() {
        let controller = controller_with_fixed_score(1.0);
        let mut input = basic_input(Uuid::new_v4());
        input.skip_approval = true;
        let deployment = controller.create(input).await.unwrap();

        let err = controller.approve(deployment.id, "bob".to_string(), None).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::FailedPrecondition);
    }

    #[tokio::test]
    async fn evaluate_gates_with_no_gates_passes_vacuously() {
        let controller = controller_with_fixed_score(1.0);
        let deployment = controller.create(basic_input(Uuid::new_v4())).await.unwrap();
        let deployment = controller.approve(deployment.id, "bob".to_string(), None).await.unwrap();

        let deployment = controller.evaluate_gates(deployment.id).await.unwrap();
        assert!(deployment.gates_passed);
        assert_eq!(deployment.status, DeploymentStatus::InProgress);
    }

    #[tokio::test]
    async fn evaluate_gates_fails_closed_when_a_required_condition_misses_threshold() {
        let store = Arc::new(InMemoryDeploymentStore::new());
        let controller = DeploymentController::new(
            store.clone(),
            Arc::new(FixedEvalScorer { score: 0.4 }),
            Arc::new(InMemoryMetricsSampler::new()),
            Arc::new(AlwaysPassCustomGateChecker),
        );

        let mut input = basic_input(Uuid::new_v4());
        input.skip_approval = true;
        let deployment = controller.create(input).await.unwrap();

        store
            .create_quality_gate(QualityGate {
                id: Uuid::new_v4(),
                name: "accuracy".to_string(),
                prompt_id: deployment.prompt_id,
                required: true,
                conditions: vec![GateCondition {
                    condition_type: ConditionType::EvalScore,
                    operator: Operator::Gte,
                    threshold: 0.8,
                    dataset_id: Some("ds1".to_string()),
                    eval_run_id: None,
                    custom_config: None,
                }],
            })
            .await
            .unwrap();

        let deployment = controller.evaluate_gates(deployment.id).await.unwrap();
        assert!(!deployment.gates_passed);
        assert_eq!(deployment.status, DeploymentStatus::GatesFailed);
    }

    #[tokio::test]
    async fn complete_requires_in_progress_and_full_rollout() {
        let controller = controller_with_fixed_score(1.0);
        let mut input = basic_input(Uuid::new_v4());
        input.skip_approval = true;
        input.strategy = Strategy {
            strategy_type: StrategyType::Gradual,
            initial_percentage: 25,
            increment: 25,
            interval_seconds: 0,
            auto_rollback: false,
            rollback_threshold: 0.0,
        };
        let deployment = controller.create(input).await.unwrap();
        let deployment = controller.evaluate_gates(deployment.id).await.unwrap();
        assert_eq!(deployment.status, DeploymentStatus::InProgress);

        let err = controller.complete(deployment.id).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::FailedPrecondition);
    }

    #[tokio::test]
    async fn rollback_synthesizes_a_reverse_deployment_to_the_prior_version() {
        let controller = controller_with_fixed_score(1.0);
        let mut input = basic_input(Uuid::new_v4());
        input.skip_approval = true;
        let deployment = controller.create(input).await.unwrap();
        let deployment = controller.evaluate_gates(deployment.id).await.unwrap();
        let deployment = controller.complete(deployment.id).await.unwrap();

        let (original, reverse) = controller.rollback(deployment.id, "bad metrics".to_string()).await.unwrap();
        assert_eq!(original.status, DeploymentStatus::RolledBack);
        assert_eq!(reverse.to_version, original.from_version);
        assert_eq!(reverse.status, DeploymentStatus::PendingGates);
    }

    #[tokio::test]
    async fn cancel_is_rejected_from_a_terminal_state() {
        let controller = controller_with_fixed_score(1.0);
        let mut input = basic_input(Uuid::new_v4());
        input.skip_approval = true;
        let deployment = controller.create(input).await.unwrap();
        let deployment = controller.evaluate_gates(deployment.id).await.unwrap();
        let deployment = controller.complete(deployment.id).await.unwrap();

        let err = controller.cancel(deployment.id, "too late".to_string()).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::FailedPrecondition);
    }
}
