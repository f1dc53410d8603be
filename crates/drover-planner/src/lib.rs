//! Drover planner
//!
//! Turns a task group and an optional list of target task names into an
//! execution plan: the minimal closure of tasks needed for the targets,
//! arranged into topological levels over `depends_on` edges.
//!
//! `next_if_fail` edges never influence ordering; they are evaluated by the
//! orchestrator at gating time.

mod error;
mod plan;

pub use error::PlanError;
pub use plan::{plan, ExecutionPlan};
