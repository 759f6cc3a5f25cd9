//! Deployment domain model and the rollout strategy it carries
//! (spec §3, §4.8/§4.9). The actual state-machine transition logic lives in
//! [`crate::deploy::controller`]; this module only defines the shape.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use super::quality_gate::{ConditionType, Operator};

/// Rollout strategy types (spec §3 `Strategy`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyType {
    Immediate,
    Gradual,
    Canary,
    BlueGreen,
}

/// Full rollout strategy configuration attached to a deployment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Strategy {
    pub strategy_type: StrategyType,
    pub initial_percentage: u8,
    pub increment: u8,
    pub interval_seconds: u64,
    pub auto_rollback: bool,
    pub rollback_threshold: f64,
}

impl Strategy {
    pub fn immediate() -> Self {
        Self {
            strategy_type: StrategyType::Immediate,
            initial_percentage: 100,
            increment: 100,
            interval_seconds: 0,
            auto_rollback: false,
            rollback_threshold: 0.0,
        }
    }

    /// Rollout progress exists iff the strategy is gradual or canary
    /// (spec §3 `Deployment` invariants).
    pub fn has_rollout_progress(&self) -> bool {
        matches!(self.strategy_type, StrategyType::Gradual | StrategyType::Canary)
    }
}

/// Deployment lifecycle status (spec §4.8 state machine).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeploymentStatus {
    PendingApproval,
    PendingGates,
    InProgress,
    Completed,
    GatesFailed,
    RolledBack,
    Cancelled,
    Failed,
}

impl DeploymentStatus {
    /// Terminal states are sinks (spec §8): no transition leaves them.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            DeploymentStatus::Completed
                | DeploymentStatus::RolledBack
                | DeploymentStatus::Cancelled
                | DeploymentStatus::Failed
                | DeploymentStatus::GatesFailed
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DeploymentStatus::PendingApproval => "pending_approval",
            DeploymentStatus::PendingGates => "pending_gates",
            DeploymentStatus::InProgress => "in_progress",
            DeploymentStatus::Completed => "completed",
            DeploymentStatus::GatesFailed => "gates_failed",
            DeploymentStatus::RolledBack => "rolled_back",
            DeploymentStatus::Cancelled => "cancelled",
            DeploymentStatus::Failed => "failed",
        }
    }
}

/// Incremental rollout tracking, present only for gradual/canary strategies.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RolloutProgress {
    pub current_percentage: u8,
    pub last_increment_at: DateTime<Utc>,
    pub next_increment_at: DateTime<Utc>,
}

/// Result of evaluating one [`super::quality_gate::GateCondition`] against
/// live observations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConditionResult {
    pub condition_type: ConditionType,
    pub operator: Operator,
    pub threshold: f64,
    pub observed: f64,
    pub passed: bool,
}

/// Result of evaluating one [`super::quality_gate::QualityGate`] as a whole.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateResult {
    pub gate_id: Uuid,
    pub gate_name: String,
    pub required: bool,
    pub passed: bool,
    pub conditions: Vec<ConditionResult>,
}

/// A deployment: one attempt to move a prompt's active version forward (or
/// back) in an environment (spec §3 `Deployment`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Deployment {
    pub id: Uuid,
    pub prompt_id: Uuid,
    pub from_version: u32,
    pub to_version: u32,
    pub environment: String,
    pub strategy: Strategy,
    pub status: DeploymentStatus,
    pub status_message: Option<String>,
    pub gate_results: Vec<GateResult>,
    pub gates_passed: bool,
    pub rollout: Option<RolloutProgress>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_by: Option<String>,
    pub approved_by: Option<String>,
    pub metadata: HashMap<String, serde_json::Value>,
}

impl Deployment {
    /// `completed_at` is set iff the deployment reached a terminal status
    /// (spec §3 invariant).
    pub fn invariant_completed_at_matches_status(&self) -> bool {
        self.completed_at.is_some() == self.status.is_terminal()
    }
}
