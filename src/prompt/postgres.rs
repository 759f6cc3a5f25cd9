//! Postgres-backed [`PromptStore`] (spec §4.6, §6 persisted-state layout).
//!
//! `prompts` holds the current materialized view; `prompt_versions` is
//! append-only and never updated in place, which is what makes historical
//! `slug:vN` lookups immune to later edits. A `create`/`update` pair that
//! writes both tables runs inside one transaction so a crash between the
//! two writes can't leave a prompt without a version 1 record.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::error::{PlatformError, Result};
use crate::models::prompt::{Prompt, PromptVersionRecord};

use super::store::PromptStore;

pub struct PostgresPromptStore {
    pool: PgPool,
}

impl PostgresPromptStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Creates `prompts`/`prompt_versions` if they don't already exist.
    /// Called once at startup; the tables are otherwise managed by
    /// whatever migration tool fronts this deployment.
    pub async fn ensure_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS prompts (
                id UUID PRIMARY KEY,
                slug TEXT NOT NULL UNIQUE,
                version INT NOT NULL,
                payload JSONB NOT NULL,
                deleted_at TIMESTAMPTZ
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS prompt_versions (
                prompt_id UUID NOT NULL,
                version INT NOT NULL,
                payload JSONB NOT NULL,
                change_description TEXT NOT NULL,
                actor TEXT,
                created_at TIMESTAMPTZ NOT NULL,
                PRIMARY KEY (prompt_id, version)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl PromptStore for PostgresPromptStore {
    async fn create(&self, prompt: Prompt) -> Result<Prompt> {
        let mut tx = self.pool.begin().await?;

        let slug_taken: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM prompts WHERE slug = $1 AND deleted_at IS NULL")
            .bind(&prompt.slug)
            .fetch_optional(&mut *tx)
            .await?;
        if slug_taken.is_some() {
            return Err(PlatformError::already_exists(format!("prompt slug '{}' already exists", prompt.slug)));
        }

        let payload = serde_json::to_value(&prompt)?;

        sqlx::query("INSERT INTO prompts (id, slug, version, payload, deleted_at) VALUES ($1, $2, $3, $4, NULL)")
            .bind(prompt.id)
            .bind(&prompt.slug)
            .bind(prompt.version as i32)
            .bind(&payload)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            "INSERT INTO prompt_versions (prompt_id, version, payload, change_description, actor, created_at) VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(prompt.id)
        .bind(prompt.version as i32)
        .bind(&payload)
        .bind("created")
        .bind(&prompt.created_by)
        .bind(prompt.created_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(prompt)
    }

    async fn update(&self, mut prompt: Prompt, change_description: String, actor: Option<String>) -> Result<Prompt> {
        let mut tx = self.pool.begin().await?;

        let exists: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM prompts WHERE id = $1").bind(prompt.id).fetch_optional(&mut *tx).await?;
        if exists.is_none() {
            return Err(PlatformError::not_found(format!("prompt {} not found", prompt.id)));
        }

        prompt.updated_at = Utc::now();
        prompt.updated_by = actor.clone();
        let payload = serde_json::to_value(&prompt)?;

        sqlx::query("UPDATE prompts SET version = $2, payload = $3, deleted_at = $4 WHERE id = $1")
            .bind(prompt.id)
            .bind(prompt.version as i32)
            .bind(&payload)
            .bind(prompt.deleted_at)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            "INSERT INTO prompt_versions (prompt_id, version, payload, change_description, actor, created_at) VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(prompt.id)
        .bind(prompt.version as i32)
        .bind(&payload)
        .bind(&change_description)
        .bind(&actor)
        .bind(prompt.updated_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(prompt)
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Option<Prompt>> {
        let row: Option<(serde_json::Value,)> =
            sqlx::query_as("SELECT payload FROM prompts WHERE id = $1 AND deleted_at IS NULL").bind(id).fetch_optional(&self.pool).await?;
        row.map(|(payload,)| serde_json::from_value(payload).map_err(PlatformError::from)).transpose()
    }

    async fn get_by_slug(&self, slug: &str, version: Option<u32>) -> Result<Option<Prompt>> {
        match version {
            None => {
                let row: Option<(serde_json::Value,)> = sqlx::query_as("SELECT payload FROM prompts WHERE slug = $1 AND deleted_at IS NULL")
                    .bind(slug)
                    .fetch_optional(&self.pool)
                    .await?;
                row.map(|(payload,)| serde_json::from_value(payload).map_err(PlatformError::from)).transpose()
            }
            Some(v) => {
                // Soft-deleted prompts return nothing even for a pinned
                // historical version — the live row's deleted_at gates it.
                let id: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM prompts WHERE slug = $1 AND deleted_at IS NULL")
                    .bind(slug)
                    .fetch_optional(&self.pool)
                    .await?;
                let Some((id,)) = id else { return Ok(None) };
                let row: Option<(serde_json::Value,)> =
                    sqlx::query_as("SELECT payload FROM prompt_versions WHERE prompt_id = $1 AND version = $2")
                        .bind(id)
                        .bind(v as i32)
                        .fetch_optional(&self.pool)
                        .await?;
                row.map(|(payload,)| serde_json::from_value(payload).map_err(PlatformError::from)).transpose()
            }
        }
    }

    async fn list_versions(&self, prompt_id: Uuid) -> Result<Vec<PromptVersionRecord>> {
        let rows = sqlx::query("SELECT version, payload, change_description, actor, created_at FROM prompt_versions WHERE prompt_id = $1 ORDER BY version ASC")
            .bind(prompt_id)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter()
            .map(|row| {
                let payload: serde_json::Value = row.try_get("payload")?;
                Ok(PromptVersionRecord {
                    prompt_id,
                    version: row.try_get::<i32, _>("version")? as u32,
                    snapshot: serde_json::from_value(payload)?,
                    change_description: row.try_get("change_description")?,
                    actor: row.try_get("actor")?,
                    created_at: row.try_get("created_at")?,
                })
            })
            .collect()
    }

    async fn list(&self, include_deleted: bool) -> Result<Vec<Prompt>> {
        let query = if include_deleted {
            "SELECT payload FROM prompts"
        } else {
            "SELECT payload FROM prompts WHERE deleted_at IS NULL"
        };
        let rows: Vec<(serde_json::Value,)> = sqlx::query_as(query).fetch_all(&self.pool).await?;
        rows.into_iter().map(|(payload,)| serde_json::from_value(payload).map_err(PlatformError::from)).collect()
    }

    async fn delete(&self, id: Uuid, actor: Option<String>) -> Result<()> {
        let result = sqlx::query("UPDATE prompts SET deleted_at = $2 WHERE id = $1 AND deleted_at IS NULL")
            .bind(id)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        let _ = actor;
        if result.rows_affected() == 0 {
            return Err(PlatformError::not_found(format!("prompt {id} not found")));
        }
        Ok(())
    }
}
