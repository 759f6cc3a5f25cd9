//! Prompt persistence (spec §4.6, component C6): one trait, two
//! implementations — an in-memory store for tests/development and a
//! Postgres-backed store for production, mirroring the storage duality the
//! teacher's workflow engine uses for its own persistence layer.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;
use crate::models::prompt::{Prompt, PromptVersionRecord};

#[async_trait]
pub trait PromptStore: Send + Sync {
    /// Inserts a brand-new prompt at version 1 and records its first
    /// [`PromptVersionRecord`]. Fails with `already_exists` if the slug is
    /// already taken by a non-deleted prompt.
    async fn create(&self, prompt: Prompt) -> Result<Prompt>;

    /// Replaces the current materialized view with a new version, appending
    /// a [`PromptVersionRecord`] snapshot of what was just written. Never
    /// mutates a previously recorded version.
    async fn update(&self, prompt: Prompt, change_description: String, actor: Option<String>) -> Result<Prompt>;

    async fn get_by_id(&self, id: Uuid) -> Result<Option<Prompt>>;

    /// `version = None` returns the current materialized view; `Some(n)`
    /// returns the historical snapshot at that version (spec §4.7).
    async fn get_by_slug(&self, slug: &str, version: Option<u32>) -> Result<Option<Prompt>>;

    async fn list_versions(&self, prompt_id: Uuid) -> Result<Vec<PromptVersionRecord>>;

    async fn list(&self, include_deleted: bool) -> Result<Vec<Prompt>>;

    /// Soft delete (spec §4.6): the prompt remains resolvable by
    /// `slug:vN` for old deployments, but stops resolving by `slug:latest`.
    async fn delete(&self, id: Uuid, actor: Option<String>) -> Result<()>;
}
