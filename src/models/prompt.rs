//! The prompt domain model (spec §3, §4.6/§4.7).
//!
//! A [`Prompt`] is the current materialized view of a versioned template.
//! Every `update` replaces this view but never mutates a prior
//! [`PromptVersionRecord`] — older versions stay byte-identical to what was
//! written at the time, which is what lets `slug:v1` keep resolving to the
//! original content forever.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Roles a message in a prompt template can take (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One templated message, with `{{var}}`-style placeholders in `content`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

/// Variable types a prompt template can declare (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VariableType {
    String,
    Number,
    Boolean,
    Json,
}

/// A named placeholder a caller can fill in when rendering the prompt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variable {
    pub name: String,
    pub var_type: VariableType,
    pub required: bool,
    pub default: Option<serde_json::Value>,
}

/// Sampling/generation defaults bundled with a prompt version.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationConfig {
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub top_p: Option<f32>,
    pub stop: Vec<String>,
    pub output_schema: Option<serde_json::Value>,
}

/// Lifecycle status of a prompt (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PromptStatus {
    Draft,
    Active,
    Deprecated,
    Archived,
}

/// The current materialized view of a prompt at its latest (or a pinned)
/// version.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prompt {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub version: u32,
    pub description: String,
    pub messages: Vec<Message>,
    pub variables: Vec<Variable>,
    pub generation_config: GenerationConfig,
    pub tags: Vec<String>,
    pub metadata: HashMap<String, serde_json::Value>,
    pub status: PromptStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub created_by: Option<String>,
    pub updated_by: Option<String>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Prompt {
    /// True once a prompt has been soft-deleted (spec §4.6 `delete`).
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some() || self.status == PromptStatus::Archived
    }
}

/// An append-only history entry recorded on every `create`/`update`
/// (spec §3 `PromptVersion`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptVersionRecord {
    pub prompt_id: Uuid,
    pub version: u32,
    /// The full prompt payload as it existed at this version — this is what
    /// makes `get_by_slug(slug, N)` return byte-identical content forever.
    pub snapshot: Prompt,
    pub change_description: String,
    pub actor: Option<String>,
    pub created_at: DateTime<Utc>,
}
