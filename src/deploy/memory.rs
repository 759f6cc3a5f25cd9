//! In-memory [`DeploymentStore`] for tests and local development.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::{PlatformError, Result};
use crate::models::deployment::{Deployment, DeploymentStatus};
use crate::models::quality_gate::QualityGate;

use super::store::DeploymentStore;

#[derive(Default)]
pub struct InMemoryDeploymentStore {
    deployments: RwLock<HashMap<Uuid, Deployment>>,
    gates: RwLock<HashMap<Uuid, QualityGate>>,
}

impl InMemoryDeploymentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DeploymentStore for InMemoryDeploymentStore {
    async fn create(&self, deployment: Deployment) -> Result<Deployment> {
        self.deployments.write().unwrap().insert(deployment.id, deployment.clone());
        Ok(deployment)
    }

    async fn update(&self, deployment: Deployment) -> Result<Deployment> {
        let mut deployments = self.deployments.write().unwrap();
        if !deployments.contains_key(&deployment.id) {
            return Err(PlatformError::not_found(format!("deployment {} not found", deployment.id)));
        }
        deployments.insert(deployment.id, deployment.clone());
        Ok(deployment)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Deployment>> {
        Ok(self.deployments.read().unwrap().get(&id).cloned())
    }

    async fn list(&self, prompt_id: Option<Uuid>) -> Result<Vec<Deployment>> {
        let deployments = self.deployments.read().unwrap();
        Ok(deployments.values().filter(|d| prompt_id.map_or(true, |pid| d.prompt_id == pid)).cloned().collect())
    }

    async fn get_current_deployment(&self, prompt_id: Uuid, environment: &str) -> Result<Option<Deployment>> {
        let deployments = self.deployments.read().unwrap();
        Ok(deployments
            .values()
            .filter(|d| d.prompt_id == prompt_id && d.environment == environment && d.status == DeploymentStatus::Completed)
            .max_by_key(|d| d.completed_at)
            .cloned())
    }

    async fn create_quality_gate(&self, gate: QualityGate) -> Result<QualityGate> {
        self.gates.write().unwrap().insert(gate.id, gate.clone());
        Ok(gate)
    }

    async fn list_quality_gates(&self, prompt_id: Uuid) -> Result<Vec<QualityGate>> {
        let gates = self.gates.read().unwrap();
        Ok(gates.values().filter(|g| g.prompt_id == prompt_id).cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::deployment::Strategy;
    use chrono::Utc;
    use std::collections::HashMap as Map;

    fn new_deployment(prompt_id: Uuid, environment: &str, status: DeploymentStatus) -> Deployment {
        let now = Utc::now();
        Deployment {
            id: Uuid::new_v4(),
            prompt_id,
            from_version: 0,
            to_version: 1,
            environment: environment.to_string(),
            strategy: Strategy::immediate(),
            status,
            status_message: None,
            gate_results: vec![],
            gates_passed: false,
            rollout: None,
            created_at: now,
            started_at: None,
            completed_at: if status == DeploymentStatus::Completed { Some(now) } else { None },
            created_by: None,
            approved_by: None,
            metadata: Map::new(),
        }
    }

    #[tokio::test]
    async fn get_current_deployment_picks_latest_completed_for_the_key() {
        let store = InMemoryDeploymentStore::new();
        let prompt_id = Uuid::new_v4();

        let older = new_deployment(prompt_id, "prod", DeploymentStatus::Completed);
        store.create(older.clone()).await.unwrap();

        let mut newer = new_deployment(prompt_id, "prod", DeploymentStatus::Completed);
        newer.completed_at = Some(older.completed_at.unwrap() + chrono::Duration::seconds(60));
        store.create(newer.clone()).await.unwrap();

        let not_completed = new_deployment(prompt_id, "prod", DeploymentStatus::InProgress);
        store.create(not_completed).await.unwrap();

        let current = store.get_current_deployment(prompt_id, "prod").await.unwrap().unwrap();
        assert_eq!(current.id, newer.id);
    }

    #[tokio::test]
    async fn get_current_deployment_ignores_other_environments() {
        let store = InMemoryDeploymentStore::new();
        let prompt_id = Uuid::new_v4();
        store.create(new_deployment(prompt_id, "staging", DeploymentStatus::Completed)).await.unwrap();

        assert!(store.get_current_deployment(prompt_id, "prod").await.unwrap().is_none());
    }
}
