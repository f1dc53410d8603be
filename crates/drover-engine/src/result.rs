use std::time::Duration;

use drover_task::TaskStatus;

use crate::error::TaskError;

/// Terminal outcome of one task's attempt chain within a group run.
#[derive(Debug, Clone)]
pub struct TaskResult {
  pub name: String,
  pub status: TaskStatus,
  /// Wall time across all attempts, including inter-attempt delays. Zero
  /// for skipped tasks.
  pub duration: Duration,
  /// Failure of the final attempt, or the reason a skipped task did not
  /// run.
  pub error: Option<TaskError>,
  /// Captured command message (stdout/stderr for shell commands, the
  /// script function's message otherwise).
  pub message: String,
  /// Structured value propagated to dependents. Null unless the task
  /// succeeded.
  pub output: serde_json::Value,
}

impl TaskResult {
  pub(crate) fn skipped(name: &str, reason: TaskError) -> Self {
    Self {
      name: name.to_string(),
      status: TaskStatus::Skipped,
      duration: Duration::ZERO,
      error: Some(reason),
      message: String::new(),
      output: serde_json::Value::Null,
    }
  }

  pub(crate) fn failed(name: &str, error: TaskError, duration: Duration) -> Self {
    Self {
      name: name.to_string(),
      status: TaskStatus::Failed,
      duration,
      error: Some(error),
      message: String::new(),
      output: serde_json::Value::Null,
    }
  }
}

/// Outcome of a whole group run.
#[derive(Debug, Clone)]
pub struct GroupRunResult {
  pub run_id: String,
  pub group: String,
  /// True when no task failed. Skipped tasks do not count against success.
  pub success: bool,
  /// One entry per selected task, in the order results were recorded.
  pub results: Vec<TaskResult>,
}

impl GroupRunResult {
  /// Look up one task's result by name.
  pub fn task(&self, name: &str) -> Option<&TaskResult> {
    self.results.iter().find(|r| r.name == name)
  }
}
