//! Deployment Store (spec §4.9, component C8): mirrors the Prompt Store's
//! trait/duality shape for deployments and the quality gates they evaluate
//! against.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;
use crate::models::deployment::Deployment;
use crate::models::quality_gate::QualityGate;

#[async_trait]
pub trait DeploymentStore: Send + Sync {
    async fn create(&self, deployment: Deployment) -> Result<Deployment>;

    /// Whole-record replacement under exclusive access — there is no
    /// partial-field update on a deployment, only full-state transitions.
    async fn update(&self, deployment: Deployment) -> Result<Deployment>;

    async fn get(&self, id: Uuid) -> Result<Option<Deployment>>;

    async fn list(&self, prompt_id: Option<Uuid>) -> Result<Vec<Deployment>>;

    /// The deployment with status=completed for (prompt_id, environment)
    /// with the latest `completed_at` (spec §4.9).
    async fn get_current_deployment(&self, prompt_id: Uuid, environment: &str) -> Result<Option<Deployment>>;

    async fn create_quality_gate(&self, gate: QualityGate) -> Result<QualityGate>;

    async fn list_quality_gates(&self, prompt_id: Uuid) -> Result<Vec<QualityGate>>;
}
