//! Core domain models for the platform (spec §3).
//!
//! These are the language-agnostic data structures shared by the prompt
//! store, the deployment controller, and the external RPC surface. Provider
//! wire-format types live under [`crate::llm`] instead, since they are
//! vendor-specific rather than platform domain concepts.

pub mod deployment;
pub mod prompt;
pub mod quality_gate;

pub use deployment::{
    Deployment, DeploymentStatus, GateResult, RolloutProgress, Strategy, StrategyType,
};
pub use prompt::{
    GenerationConfig, Message, Prompt, PromptStatus, PromptVersionRecord, Role, Variable,
    VariableType,
};
pub use quality_gate::{ConditionType, GateCondition, Operator, QualityGate};
