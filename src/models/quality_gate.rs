//! Quality gates (spec §3, §4.8): named bundles of conditions a deployment
//! must satisfy before it is allowed to progress past `pending_gates`.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What a [`GateCondition`] measures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionType {
    EvalScore,
    Latency,
    Cost,
    Custom,
}

/// Comparison applied between the observed value and `threshold`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    Gte,
    Lte,
    Eq,
}

impl Operator {
    pub fn evaluate(&self, observed: f64, threshold: f64) -> bool {
        match self {
            Operator::Gte => observed >= threshold,
            // Equality on floating-point measurements is checked with a
            // small epsilon so exact-match gates aren't flaky.
            Operator::Eq => (observed - threshold).abs() < 1e-9,
            Operator::Lte => observed <= threshold,
        }
    }
}

/// A single measurable condition within a [`QualityGate`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateCondition {
    pub condition_type: ConditionType,
    pub operator: Operator,
    pub threshold: f64,
    pub dataset_id: Option<String>,
    pub eval_run_id: Option<String>,
    /// Free-form configuration interpreted by the `custom` collaborator
    /// contract (§4.14); unused for the other condition types.
    pub custom_config: Option<serde_json::Value>,
}

/// A named, ordered set of conditions evaluated together; all conditions
/// must pass for the gate to pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityGate {
    pub id: Uuid,
    pub name: String,
    pub prompt_id: Uuid,
    pub required: bool,
    pub conditions: Vec<GateCondition>,
}
