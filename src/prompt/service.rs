//! Prompt Service Core (spec §4.7, component C7): slug validation,
//! reference parsing, rendering, and the semantic diff between two
//! versions. Everything here is pure logic layered on top of
//! [`PromptStore`] — no storage-specific behavior lives in this file.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{PlatformError, Result};
use crate::llm::service::PromptResolver;
use crate::llm::ChatMessage;
use crate::models::prompt::{Prompt, PromptStatus, PromptVersionRecord};

use super::store::PromptStore;

const DIFF_TRUNCATE_LEN: usize = 100;

/// Lowercases, collapses non-alphanumeric runs to `-`, trims leading and
/// trailing `-`. Idempotent: `slugify(slugify(x)) == slugify(x)`.
pub fn slugify(input: &str) -> String {
    let mut slug = String::with_capacity(input.len());
    let mut last_was_dash = false;
    for ch in input.chars().flat_map(|c| c.to_lowercase()) {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch);
            last_was_dash = false;
        } else if !last_was_dash && !slug.is_empty() {
            slug.push('-');
            last_was_dash = true;
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}

fn slug_pattern() -> Regex {
    Regex::new(r"^[a-z0-9]([a-z0-9-]*[a-z0-9])?$").expect("static slug pattern is valid")
}

pub fn validate_slug(slug: &str) -> Result<()> {
    if slug_pattern().is_match(slug) {
        Ok(())
    } else {
        Err(PlatformError::invalid_argument(format!("'{slug}' is not a valid slug")))
    }
}

/// Splits a `slug[:(v)N|latest]` reference into `(slug, version)`, where
/// `version = 0` means "latest". A malformed version suffix degrades to 0
/// rather than failing — references are a convenience surface, not a
/// strict wire format.
pub fn parse_reference(reference: &str) -> (String, u32) {
    match reference.split_once(':') {
        None => (reference.to_string(), 0),
        Some((slug, suffix)) => {
            if suffix.eq_ignore_ascii_case("latest") {
                (slug.to_string(), 0)
            } else {
                let digits = suffix.strip_prefix('v').unwrap_or(suffix);
                (slug.to_string(), digits.parse().unwrap_or(0))
            }
        }
    }
}

pub fn format_reference(slug: &str, version: u32) -> String {
    if version == 0 {
        slug.to_string()
    } else {
        format!("{slug}:v{version}")
    }
}

/// Substitutes `{{var}}` placeholders in a rendered message's content with
/// the supplied variable values. Missing but non-required variables fall
/// back to their declared default; missing required variables are left as
/// the literal placeholder text, since this function has no way to fail
/// loudly without a variable name doing so elsewhere in the template.
pub fn render_template(content: &str, variables: &HashMap<String, serde_json::Value>) -> String {
    let mut rendered = content.to_string();
    for (name, value) in variables {
        let placeholder = format!("{{{{{name}}}}}");
        let substituted = match value {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        rendered = rendered.replace(&placeholder, &substituted);
    }
    rendered
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiffEntry {
    pub field: String,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompareResult {
    pub diffs: Vec<DiffEntry>,
    pub semantic_similarity: f64,
}

fn truncate(value: &str) -> String {
    if value.chars().count() <= DIFF_TRUNCATE_LEN {
        value.to_string()
    } else {
        let head: String = value.chars().take(DIFF_TRUNCATE_LEN).collect();
        format!("{head}...")
    }
}

/// Produces ordered diff entries between two prompt snapshots (spec §4.7):
/// a changed description, a changed message count, and per-message content
/// changes. The similarity score is a documented heuristic, not a semantic
/// embedding comparison — `max(0, 1 - 0.1 * diff_count)`.
pub fn compare_prompts(a: &Prompt, b: &Prompt) -> CompareResult {
    let mut diffs = Vec::new();

    if a.description != b.description {
        diffs.push(DiffEntry {
            field: "description".to_string(),
            old_value: Some(truncate(&a.description)),
            new_value: Some(truncate(&b.description)),
        });
    }

    if a.messages.len() != b.messages.len() {
        diffs.push(DiffEntry {
            field: "messages.len".to_string(),
            old_value: Some(a.messages.len().to_string()),
            new_value: Some(b.messages.len().to_string()),
        });
    }

    for (i, (old, new)) in a.messages.iter().zip(b.messages.iter()).enumerate() {
        if old.content != new.content {
            diffs.push(DiffEntry {
                field: format!("messages[{i}].content"),
                old_value: Some(truncate(&old.content)),
                new_value: Some(truncate(&new.content)),
            });
        }
    }

    let diff_count = diffs.len() as f64;
    let semantic_similarity = (1.0 - 0.1 * diff_count).max(0.0);

    CompareResult { diffs, semantic_similarity }
}

#[derive(Debug, Clone, Default)]
pub struct ListFilter {
    pub search: Option<String>,
    pub tags: Vec<String>,
    pub status: Option<PromptStatus>,
    pub include_archived: bool,
    pub order_by: OrderBy,
    pub descending: bool,
    pub offset: usize,
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OrderBy {
    #[default]
    CreatedAt,
    UpdatedAt,
    Name,
}

pub struct PromptService {
    store: Arc<dyn PromptStore>,
}

impl PromptService {
    pub fn new(store: Arc<dyn PromptStore>) -> Self {
        Self { store }
    }

    pub async fn create_prompt(&self, mut prompt: Prompt) -> Result<Prompt> {
        if prompt.slug.is_empty() {
            prompt.slug = slugify(&prompt.name);
        }
        validate_slug(&prompt.slug)?;
        prompt.version = 1;
        self.store.create(prompt).await
    }

    pub async fn update_prompt(&self, mut prompt: Prompt, change_description: String, actor: Option<String>) -> Result<Prompt> {
        validate_slug(&prompt.slug)?;
        let current = self
            .store
            .get_by_id(prompt.id)
            .await?
            .ok_or_else(|| PlatformError::not_found(format!("prompt '{}' does not exist", prompt.id)))?;
        // Version is append-only and computed server-side — never trust
        // whatever version the caller's prompt carries.
        prompt.version = current.version + 1;
        self.store.update(prompt, change_description, actor).await
    }

    pub async fn get_prompt_by_id(&self, id: Uuid) -> Result<Option<Prompt>> {
        self.store.get_by_id(id).await
    }

    /// Resolves a `slug[:(v)N|latest]` reference, falling back to treating
    /// the raw input as an opaque id if it doesn't parse as a slug lookup.
    pub async fn get_prompt_by_reference(&self, reference: &str) -> Result<Option<Prompt>> {
        let (slug, version) = parse_reference(reference);
        let version = if version == 0 { None } else { Some(version) };
        self.store.get_by_slug(&slug, version).await
    }

    pub async fn list_prompts(&self, filter: ListFilter) -> Result<Vec<Prompt>> {
        let mut prompts = self.store.list(filter.include_archived).await?;

        if let Some(search) = &filter.search {
            let needle = search.to_lowercase();
            prompts.retain(|p| p.name.to_lowercase().contains(&needle) || p.description.to_lowercase().contains(&needle) || p.slug.to_lowercase().contains(&needle));
        }

        if !filter.tags.is_empty() {
            prompts.retain(|p| filter.tags.iter().all(|t| p.tags.contains(t)));
        }

        if let Some(status) = filter.status {
            prompts.retain(|p| p.status == status);
        }

        match filter.order_by {
            OrderBy::CreatedAt => prompts.sort_by_key(|p| p.created_at),
            OrderBy::UpdatedAt => prompts.sort_by_key(|p| p.updated_at),
            OrderBy::Name => prompts.sort_by(|a, b| a.name.cmp(&b.name)),
        }
        if filter.descending {
            prompts.reverse();
        }

        let offset = filter.offset.min(prompts.len());
        let prompts = if let Some(limit) = filter.limit {
            prompts.into_iter().skip(offset).take(limit).collect()
        } else {
            prompts.into_iter().skip(offset).collect()
        };

        Ok(prompts)
    }

    pub async fn delete_prompt(&self, id: Uuid, actor: Option<String>) -> Result<()> {
        self.store.delete(id, actor).await
    }

    pub async fn get_prompt_history(&self, prompt_id: Uuid, limit: Option<usize>) -> Result<Vec<PromptVersionRecord>> {
        let mut history = self.store.list_versions(prompt_id).await?;
        history.sort_by_key(|r| r.version);
        if let Some(limit) = limit {
            history.truncate(limit);
        }
        Ok(history)
    }

    pub async fn compare_versions(&self, prompt_id: Uuid, version_a: u32, version_b: u32) -> Result<CompareResult> {
        let history = self.store.list_versions(prompt_id).await?;
        let a = history
            .iter()
            .find(|r| r.version == version_a)
            .ok_or_else(|| PlatformError::not_found(format!("prompt {prompt_id} has no version {version_a}")))?;
        let b = history
            .iter()
            .find(|r| r.version == version_b)
            .ok_or_else(|| PlatformError::not_found(format!("prompt {prompt_id} has no version {version_b}")))?;

        Ok(compare_prompts(&a.snapshot, &b.snapshot))
    }
}

#[async_trait]
impl PromptResolver for PromptService {
    async fn render(&self, reference: &str, variables: &HashMap<String, serde_json::Value>) -> Result<Vec<ChatMessage>> {
        let prompt = self
            .get_prompt_by_reference(reference)
            .await?
            .ok_or_else(|| PlatformError::not_found(format!("no prompt resolves for reference '{reference}'")))?;

        Ok(prompt
            .messages
            .iter()
            .map(|m| ChatMessage::new(m.role, render_template(&m.content, variables)))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::prompt::{GenerationConfig, Message, Role as PromptRole};
    use crate::prompt::memory::InMemoryPromptStore;
    use chrono::Utc;

    fn new_prompt(slug: &str, messages: Vec<Message>) -> Prompt {
        let now = Utc::now();
        Prompt {
            id: Uuid::new_v4(),
            name: slug.to_string(),
            slug: slug.to_string(),
            version: 1,
            description: String::new(),
            messages,
            variables: vec![],
            generation_config: GenerationConfig::default(),
            tags: vec![],
            metadata: HashMap::new(),
            status: PromptStatus::Draft,
            created_at: now,
            updated_at: now,
            created_by: None,
            updated_by: None,
            deleted_at: None,
        }
    }

    #[test]
    fn slugify_collapses_and_trims() {
        assert_eq!(slugify("Email Summarizer!!"), "email-summarizer");
        assert_eq!(slugify("--Leading and Trailing--"), "leading-and-trailing");
    }

    #[test]
    fn slugify_is_idempotent() {
        let once = slugify("Some Weird Name_2");
        assert_eq!(slugify(&once), once);
    }

    #[test]
    fn parse_reference_round_trips_through_format_reference() {
        for (slug, version) in [("greeting", 0u32), ("greeting", 3), ("email-summarizer", 42)] {
            let reference = format_reference(slug, version);
            assert_eq!(parse_reference(&reference), (slug.to_string(), version));
        }
    }

    #[test]
    fn parse_reference_treats_latest_as_zero() {
        assert_eq!(parse_reference("greeting:latest"), ("greeting".to_string(), 0));
    }

    #[test]
    fn parse_reference_degrades_malformed_suffix_to_zero() {
        assert_eq!(parse_reference("greeting:not-a-version"), ("greeting".to_string(), 0));
    }

    #[test]
    fn validate_slug_rejects_uppercase_and_leading_dash() {
        assert!(validate_slug("Email-Summarizer").is_err());
        assert!(validate_slug("-leading-dash").is_err());
        assert!(validate_slug("email-summarizer").is_ok());
    }

    #[tokio::test]
    async fn compare_versions_reports_one_diff_for_changed_message() {
        let store = Arc::new(InMemoryPromptStore::new());
        let service = PromptService::new(store.clone());

        let original = new_prompt(
            "email-summarizer",
            vec![
                Message { role: PromptRole::System, content: "Be concise".to_string() },
                Message { role: PromptRole::User, content: "Summarize: {{text}}".to_string() },
            ],
        );
        let prompt_id = original.id;
        store.create(original.clone()).await.unwrap();

        let mut updated = original.clone();
        updated.version = 2;
        updated.messages[0].content = "Be very concise".to_string();
        store.update(updated, "Shorter".to_string(), None).await.unwrap();

        let result = service.compare_versions(prompt_id, 1, 2).await.unwrap();
        assert_eq!(result.diffs.len(), 1);
        assert_eq!(result.diffs[0].field, "messages[0].content");
        assert!((result.semantic_similarity - 0.9).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn render_substitutes_variables_from_the_latest_version() {
        let store = Arc::new(InMemoryPromptStore::new());
        let service = PromptService::new(store.clone());

        let prompt = new_prompt(
            "email-summarizer",
            vec![Message { role: PromptRole::User, content: "Summarize: {{text}}".to_string() }],
        );
        store.create(prompt).await.unwrap();

        let mut variables = HashMap::new();
        variables.insert("text".to_string(), serde_json::Value::String("hello world".to_string()));

        let rendered = service.render("email-summarizer:latest", &variables).await.unwrap();
        assert_eq!(rendered[0].content, "Summarize: hello world");
    }
}
