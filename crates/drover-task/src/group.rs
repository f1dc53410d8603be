use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::script::ScriptRef;
use crate::task::Task;

/// A named collection of tasks executed as a single pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskGroup {
  pub name: String,
  pub description: String,
  /// Task names are unique within the group.
  pub tasks: Vec<Task>,
  /// Used verbatim when present. When absent the engine allocates a
  /// directory under the system temp dir: a deterministic per-group path if
  /// `create_workdir_before_run` is set, a unique per-run path otherwise.
  pub workdir: Option<PathBuf>,
  pub create_workdir_before_run: bool,
  /// Hook receiving the group's terminal result; its boolean return
  /// overrides the default always-clean workdir policy.
  pub clean_workdir_after_run: Option<ScriptRef>,
}

impl TaskGroup {
  pub fn new(name: impl Into<String>, tasks: Vec<Task>) -> Self {
    Self {
      name: name.into(),
      description: String::new(),
      tasks,
      workdir: None,
      create_workdir_before_run: false,
      clean_workdir_after_run: None,
    }
  }

  /// Look up a task by name.
  pub fn task(&self, name: &str) -> Option<&Task> {
    self.tasks.iter().find(|t| t.name == name)
  }
}
