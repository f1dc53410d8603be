use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle status of a task within one group run.
///
/// `Skipped` is distinct from `Failed`: it means "did not run by design"
/// (gated off, a dependency failed, dry run, or the run was aborted or
/// cancelled before the task started).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
  Pending,
  Running,
  Success,
  Failed,
  Skipped,
}

impl TaskStatus {
  /// Whether the task has reached a terminal state.
  pub fn is_terminal(&self) -> bool {
    matches!(self, Self::Success | Self::Failed | Self::Skipped)
  }
}

impl fmt::Display for TaskStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let s = match self {
      Self::Pending => "Pending",
      Self::Running => "Running",
      Self::Success => "Success",
      Self::Failed => "Failed",
      Self::Skipped => "Skipped",
    };
    f.write_str(s)
  }
}
