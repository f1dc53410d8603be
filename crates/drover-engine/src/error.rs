use std::time::Duration;

use drover_planner::PlanError;
use drover_workdir::WorkspaceError;

/// Why a task terminated without success.
///
/// Carried in [`crate::TaskResult::error`]: a `Failed` result holds the
/// final attempt's failure, a `Skipped` result holds the reason it did not
/// run.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TaskError {
  #[error("pre-exec hook failed: {message}")]
  PreExec { message: String },

  #[error("post-exec hook failed: {message}")]
  PostExec { message: String },

  #[error("command failed: {message}")]
  Command { message: String },

  #[error("condition check failed: {message}")]
  Condition { message: String },

  #[error("attempt timed out after {timeout:?}")]
  Timeout { timeout: Duration },

  #[error("artifact error: {message}")]
  Artifact { message: String },

  #[error("agent error: {message}")]
  Agent { message: String },

  #[error("dependency '{name}' failed")]
  DependencyFailed { name: String },

  #[error("dependency '{name}' did not run")]
  DependencyNotRun { name: String },

  #[error("tasks in next_if_fail did not all fail")]
  FallbackNotMet,

  #[error("run_if condition not met")]
  ConditionNotMet,

  #[error("aborted by condition")]
  Aborted,

  #[error("cancelled")]
  Cancelled,

  #[error("dry run")]
  DryRun,
}

/// Configuration and setup errors reported before any task runs.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
  #[error(transparent)]
  Plan(#[from] PlanError),

  #[error("failed to prepare workspace: {0}")]
  Workspace(#[from] WorkspaceError),

  #[error("task '{name}' targets agent '{agent}' but has no shell command to ship")]
  AgentCommand { name: String, agent: String },

  #[error("task '{name}' targets agent '{agent}' but no agent transport is configured")]
  NoTransport { name: String, agent: String },
}
