use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use drover_task::{Command, Predicate, Task, TaskGroup};

use crate::error::ConfigError;

/// File form of a task group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupDef {
  #[serde(default)]
  pub description: String,
  pub tasks: Vec<TaskDef>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub workdir: Option<PathBuf>,
  #[serde(default)]
  pub create_workdir_before_run: bool,
}

/// File form of a task. Only shell commands and shell predicates are
/// expressible here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskDef {
  pub name: String,
  #[serde(default)]
  pub description: String,
  /// Shell command line; empty is a configuration error.
  #[serde(default)]
  pub command: String,
  #[serde(default)]
  pub params: HashMap<String, String>,
  #[serde(default)]
  pub depends_on: Vec<String>,
  #[serde(default)]
  pub next_if_fail: Vec<String>,
  #[serde(default)]
  pub retries: u32,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub timeout_ms: Option<u64>,
  #[serde(default, rename = "async")]
  pub run_async: bool,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub run_if: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub abort_if: Option<String>,
  #[serde(default)]
  pub artifacts: Vec<String>,
  #[serde(default)]
  pub consumes: Vec<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub agent: Option<String>,
}

impl GroupDef {
  /// Convert into the model form under the given group name.
  pub fn into_group(self, name: &str) -> Result<TaskGroup, ConfigError> {
    let mut tasks = Vec::with_capacity(self.tasks.len());
    for def in self.tasks {
      tasks.push(def.into_task()?);
    }
    Ok(TaskGroup {
      name: name.to_string(),
      description: self.description,
      tasks,
      workdir: self.workdir,
      create_workdir_before_run: self.create_workdir_before_run,
      clean_workdir_after_run: None,
    })
  }
}

impl TaskDef {
  fn into_task(self) -> Result<Task, ConfigError> {
    if self.command.trim().is_empty() {
      return Err(ConfigError::MissingCommand { task: self.name });
    }
    Ok(Task {
      name: self.name,
      description: self.description,
      command: Command::Shell(self.command),
      params: self.params,
      depends_on: self.depends_on,
      next_if_fail: self.next_if_fail,
      retries: self.retries,
      timeout: self.timeout_ms.map(Duration::from_millis),
      run_async: self.run_async,
      pre_exec: None,
      post_exec: None,
      run_if: self.run_if.map(Predicate::Shell),
      abort_if: self.abort_if.map(Predicate::Shell),
      artifacts: self.artifacts,
      consumes: self.consumes,
      agent: self.agent,
    })
  }
}
