use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::script::ScriptRef;

/// What a task runs: a shell command line or a script function handle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Command {
  /// A command line executed through the system shell.
  Shell(String),
  /// A function evaluated by the script host, returning
  /// `(success, message, output)`.
  Script(ScriptRef),
}

/// A boolean check gating a task: a shell command (exit 0 = true) or a
/// script function (truthy return = true).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Predicate {
  Shell(String),
  Script(ScriptRef),
}

/// A single unit of work in a pipeline.
///
/// Names are unique within a group. `depends_on` and `next_if_fail` refer
/// to tasks of the same group; cycles over `depends_on` are rejected by the
/// planner before anything runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
  pub name: String,
  pub description: String,
  pub command: Command,
  /// String parameters passed to the command and to hooks.
  pub params: HashMap<String, String>,
  pub depends_on: Vec<String>,
  /// Fallback gate: this task runs only if *all* listed tasks failed.
  pub next_if_fail: Vec<String>,
  /// Additional attempts after the first; total attempts = retries + 1.
  pub retries: u32,
  /// Bounds one whole attempt (pre_exec + command + post_exec).
  pub timeout: Option<Duration>,
  /// Advisory: the orchestrator may overlap this task with independent
  /// tasks of the same dependency level.
  pub run_async: bool,
  pub pre_exec: Option<ScriptRef>,
  pub post_exec: Option<ScriptRef>,
  /// If present and false, the task is recorded as skipped.
  pub run_if: Option<Predicate>,
  /// If present and true, the whole group run aborts.
  pub abort_if: Option<Predicate>,
  /// Glob patterns, relative to the workdir, naming files this task
  /// publishes for dependents.
  pub artifacts: Vec<String>,
  /// File names this task expects staged into its workdir before it runs.
  pub consumes: Vec<String>,
  /// Name of a remote worker; absent means local execution.
  pub agent: Option<String>,
}

impl Task {
  /// A minimal task with the given name and command; every optional field
  /// starts empty. Callers fill in what they need.
  pub fn new(name: impl Into<String>, command: Command) -> Self {
    Self {
      name: name.into(),
      description: String::new(),
      command,
      params: HashMap::new(),
      depends_on: Vec::new(),
      next_if_fail: Vec::new(),
      retries: 0,
      timeout: None,
      run_async: false,
      pre_exec: None,
      post_exec: None,
      run_if: None,
      abort_if: None,
      artifacts: Vec::new(),
      consumes: Vec::new(),
      agent: None,
    }
  }
}
