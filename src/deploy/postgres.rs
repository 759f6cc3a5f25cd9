//! Postgres-backed [`DeploymentStore`]. Deployment rows are stored as one
//! JSONB payload column rather than normalized across the
//! `deployment_strategies`/`deployment_rollouts`/`deployment_gate_results`
//! tables named in the persisted-state layout — those exist as the
//! migration/target contract for a relational schema; this implementation
//! satisfies the same trait behavior with a single source of truth per row,
//! matching the approach already taken in [`crate::prompt::postgres`].

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{PlatformError, Result};
use crate::models::deployment::{Deployment, DeploymentStatus};
use crate::models::quality_gate::QualityGate;

use super::store::DeploymentStore;

pub struct PostgresDeploymentStore {
    pool: PgPool,
}

impl PostgresDeploymentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn ensure_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS deployments (
                id UUID PRIMARY KEY,
                prompt_id UUID NOT NULL,
                environment TEXT NOT NULL,
                status TEXT NOT NULL,
                completed_at TIMESTAMPTZ,
                payload JSONB NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS quality_gates (
                id UUID PRIMARY KEY,
                prompt_id UUID NOT NULL,
                payload JSONB NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl DeploymentStore for PostgresDeploymentStore {
    async fn create(&self, deployment: Deployment) -> Result<Deployment> {
        let payload = serde_json::to_value(&deployment)?;
        sqlx::query("INSERT INTO deployments (id, prompt_id, environment, status, completed_at, payload) VALUES ($1, $2, $3, $4, $5, $6)")
            .bind(deployment.id)
            .bind(deployment.prompt_id)
            .bind(&deployment.environment)
            .bind(deployment.status.as_str())
            .bind(deployment.completed_at)
            .bind(&payload)
            .execute(&self.pool)
            .await?;
        Ok(deployment)
    }

    async fn update(&self, deployment: Deployment) -> Result<Deployment> {
        let payload = serde_json::to_value(&deployment)?;
        let result = sqlx::query("UPDATE deployments SET environment = $2, status = $3, completed_at = $4, payload = $5 WHERE id = $1")
            .bind(deployment.id)
            .bind(&deployment.environment)
            .bind(deployment.status.as_str())
            .bind(deployment.completed_at)
            .bind(&payload)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(PlatformError::not_found(format!("deployment {} not found", deployment.id)));
        }
        Ok(deployment)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Deployment>> {
        let row: Option<(serde_json::Value,)> = sqlx::query_as("SELECT payload FROM deployments WHERE id = $1").bind(id).fetch_optional(&self.pool).await?;
        row.map(|(payload,)| serde_json::from_value(payload).map_err(PlatformError::from)).transpose()
    }

    async fn list(&self, prompt_id: Option<Uuid>) -> Result<Vec<Deployment>> {
        let rows: Vec<(serde_json::Value,)> = match prompt_id {
            Some(id) => sqlx::query_as("SELECT payload FROM deployments WHERE prompt_id = $1").bind(id).fetch_all(&self.pool).await?,
            None => sqlx::query_as("SELECT payload FROM deployments").fetch_all(&self.pool).await?,
        };
        rows.into_iter().map(|(payload,)| serde_json::from_value(payload).map_err(PlatformError::from)).collect()
    }

    async fn get_current_deployment(&self, prompt_id: Uuid, environment: &str) -> Result<Option<Deployment>> {
        let row: Option<(serde_json::Value,)> = sqlx::query_as(
            "SELECT payload FROM deployments WHERE prompt_id = $1 AND environment = $2 AND status = $3 ORDER BY completed_at DESC LIMIT 1",
        )
        .bind(prompt_id)
        .bind(environment)
        .bind(DeploymentStatus::Completed.as_str())
        .fetch_optional(&self.pool)
        .await?;
        row.map(|(payload,)| serde_json::from_value(payload).map_err(PlatformError::from)).transpose()
    }

    async fn create_quality_gate(&self, gate: QualityGate) -> Result<QualityGate> {
        let payload = serde_json::to_value(&gate)?;
        sqlx::query("INSERT INTO quality_gates (id, prompt_id, payload) VALUES ($1, $2, $3)")
            .bind(gate.id)
            .bind(gate.prompt_id)
            .bind(&payload)
            .execute(&self.pool)
            .await?;
        Ok(gate)
    }

    async fn list_quality_gates(&self, prompt_id: Uuid) -> Result<Vec<QualityGate>> {
        let rows: Vec<(serde_json::Value,)> =
            sqlx::query_as("SELECT payload FROM quality_gates WHERE prompt_id = $1").bind(prompt_id).fetch_all(&self.pool).await?;
        rows.into_iter().map(|(payload,)| serde_json::from_value(payload).map_err(PlatformError::from)).collect()
    }
}
