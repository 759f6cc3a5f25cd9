//! In-memory [`PromptStore`] for tests and local development.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::error::{PlatformError, Result};
use crate::models::prompt::{Prompt, PromptVersionRecord};

use super::store::PromptStore;

#[derive(Default)]
pub struct InMemoryPromptStore {
    prompts: RwLock<HashMap<Uuid, Prompt>>,
    versions: RwLock<HashMap<Uuid, Vec<PromptVersionRecord>>>,
    slug_index: RwLock<HashMap<String, Uuid>>,
}

impl InMemoryPromptStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PromptStore for InMemoryPromptStore {
    async fn create(&self, prompt: Prompt) -> Result<Prompt> {
        {
            let slug_index = self.slug_index.read().unwrap();
            if let Some(existing_id) = slug_index.get(&prompt.slug) {
                let prompts = self.prompts.read().unwrap();
                if let Some(existing) = prompts.get(existing_id) {
                    if !existing.is_deleted() {
                        return Err(PlatformError::already_exists(format!("prompt slug '{}' already exists", prompt.slug)));
                    }
                }
            }
        }

        let record = PromptVersionRecord {
            prompt_id: prompt.id,
            version: prompt.version,
            snapshot: prompt.clone(),
            change_description: "created".to_string(),
            actor: prompt.created_by.clone(),
            created_at: prompt.created_at,
        };

        self.slug_index.write().unwrap().insert(prompt.slug.clone(), prompt.id);
        self.versions.write().unwrap().insert(prompt.id, vec![record]);
        self.prompts.write().unwrap().insert(prompt.id, prompt.clone());

        Ok(prompt)
    }

    async fn update(&self, mut prompt: Prompt, change_description: String, actor: Option<String>) -> Result<Prompt> {
        {
            let prompts = self.prompts.read().unwrap();
            if !prompts.contains_key(&prompt.id) {
                return Err(PlatformError::not_found(format!("prompt {} not found", prompt.id)));
            }
        }

        prompt.updated_at = Utc::now();
        prompt.updated_by = actor.clone();

        let record = PromptVersionRecord {
            prompt_id: prompt.id,
            version: prompt.version,
            snapshot: prompt.clone(),
            change_description,
            actor,
            created_at: prompt.updated_at,
        };

        self.versions.write().unwrap().entry(prompt.id).or_default().push(record);
        self.prompts.write().unwrap().insert(prompt.id, prompt.clone());

        Ok(prompt)
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Option<Prompt>> {
        Ok(self.prompts.read().unwrap().get(&id).filter(|p| !p.is_deleted()).cloned())
    }

    async fn get_by_slug(&self, slug: &str, version: Option<u32>) -> Result<Option<Prompt>> {
        let id = match self.slug_index.read().unwrap().get(slug).copied() {
            Some(id) => id,
            None => return Ok(None),
        };

        match version {
            None => Ok(self.prompts.read().unwrap().get(&id).filter(|p| !p.is_deleted()).cloned()),
            Some(v) => {
                let prompts = self.prompts.read().unwrap();
                if prompts.get(&id).map(|p| p.is_deleted()).unwrap_or(true) {
                    return Ok(None);
                }
                let versions = self.versions.read().unwrap();
                Ok(versions.get(&id).and_then(|records| records.iter().find(|r| r.version == v)).map(|r| r.snapshot.clone()))
            }
        }
    }

    async fn list_versions(&self, prompt_id: Uuid) -> Result<Vec<PromptVersionRecord>> {
        Ok(self.versions.read().unwrap().get(&prompt_id).cloned().unwrap_or_default())
    }

    async fn list(&self, include_deleted: bool) -> Result<Vec<Prompt>> {
        let prompts = self.prompts.read().unwrap();
        Ok(prompts.values().filter(|p| include_deleted || !p.is_deleted()).cloned().collect())
    }

    async fn delete(&self, id: Uuid, actor: Option<String>) -> Result<()> {
        let mut prompts = self.prompts.write().unwrap();
        let prompt = prompts.get_mut(&id).ok_or_else(|| PlatformError::not_found(format!("prompt {id} not found")))?;
        prompt.deleted_at = Some(Utc::now());
        prompt.updated_by = actor;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::prompt::{GenerationConfig, PromptStatus};
    use std::collections::HashMap as Map;

    fn new_prompt(slug: &str) -> Prompt {
        let now = Utc::now();
        Prompt {
            id: Uuid::new_v4(),
            name: slug.to_string(),
            slug: slug.to_string(),
            version: 1,
            description: String::new(),
            messages: vec![],
            variables: vec![],
            generation_config: GenerationConfig::default(),
            tags: vec![],
            metadata: Map::new(),
            status: PromptStatus::Draft,
            created_at: now,
            updated_at: now,
            created_by: None,
            updated_by: None,
            deleted_at: None,
        }
    }

    #[tokio::test]
    async fn create_then_get_by_slug_round_trips() {
        let store = InMemoryPromptStore::new();
        let prompt = new_prompt("greeting");
        store.create(prompt.clone()).await.unwrap();

        let fetched = store.get_by_slug("greeting", None).await.unwrap().unwrap();
        assert_eq!(fetched.id, prompt.id);
    }

    #[tokio::test]
    async fn create_rejects_duplicate_slug() {
        let store = InMemoryPromptStore::new();
        store.create(new_prompt("greeting")).await.unwrap();
        let err = store.create(new_prompt("greeting")).await.unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::AlreadyExists);
    }

    #[tokio::test]
    async fn update_appends_version_without_mutating_old_snapshot() {
        let store = InMemoryPromptStore::new();
        let mut prompt = new_prompt("greeting");
        store.create(prompt.clone()).await.unwrap();

        prompt.version = 2;
        prompt.description = "v2".to_string();
        store.update(prompt.clone(), "bumped description".to_string(), None).await.unwrap();

        let v1 = store.get_by_slug("greeting", Some(1)).await.unwrap().unwrap();
        assert_eq!(v1.description, "");

        let v2 = store.get_by_slug("greeting", Some(2)).await.unwrap().unwrap();
        assert_eq!(v2.description, "v2");

        let versions = store.list_versions(prompt.id).await.unwrap();
        assert_eq!(versions.len(), 2);
    }

    #[tokio::test]
    async fn deleted_prompt_is_excluded_from_default_listing() {
        let store = InMemoryPromptStore::new();
        let prompt = new_prompt("greeting");
        store.create(prompt.clone()).await.unwrap();
        store.delete(prompt.id, None).await.unwrap();

        assert!(store.list(false).await.unwrap().is_empty());
        assert_eq!(store.list(true).await.unwrap().len(), 1);
    }
}
