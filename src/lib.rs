//! # LLM Ops Core
//!
//! Library root for the LLM operations platform core: a Runtime Gateway that
//! fans requests out across heterogeneous LLM providers, a Prompt Store with
//! immutable versioning, and a Deployment Controller that promotes prompt
//! versions through environments behind quality gates.
//!
//! ## Core Components
//!
//! - [`llm`]: the Runtime Gateway — provider adapters, routing/fallback, and
//!   the [`llm::service::RuntimeService`] entry point.
//! - [`prompt`]: the Prompt Store — versioned prompts, slug/reference
//!   resolution, templating, and diffing.
//! - [`deploy`]: the Deployment Controller — the approval/quality-gate/
//!   rollout state machine and its storage and evaluation collaborators.
//! - [`models`]: language-agnostic domain types shared across the above.
//! - [`rpc`]: the external RPC surface, one JSON-over-HTTP router per
//!   service.
//! - [`config`]: typed, layered runtime configuration.
//! - [`error`]: the platform-wide error type and request interceptor chain.

pub mod config;
pub mod deploy;
pub mod error;
pub mod llm;
pub mod models;
pub mod prompt;
pub mod rpc;

pub use config::Settings;
pub use error::{ErrorKind, PlatformError, Result};
