//! Deployment Controller domain (spec §4.8/§4.9, components C8/C9).

pub mod collaborators;
pub mod controller;
pub mod memory;
pub mod postgres;
pub mod store;

pub use collaborators::{AlwaysPassCustomGateChecker, CustomGateChecker, EvalScorer, FixedEvalScorer, InMemoryMetricsSampler, MetricsSampler};
pub use controller::{DeploymentController, DeploymentInput};
pub use memory::InMemoryDeploymentStore;
pub use postgres::PostgresDeploymentStore;
pub use store::DeploymentStore;
