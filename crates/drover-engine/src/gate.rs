//! Conditional gating: `abort_if` and `run_if` predicates.

use drover_task::{Predicate, Task};

use crate::error::TaskError;
use crate::invoker::Invoker;
use crate::shell;

/// What the condition gate decided for a task.
pub(crate) enum GateDecision {
  Run,
  Skip(TaskError),
  /// The whole group run aborts; remaining tasks are skipped.
  Abort,
}

/// Evaluate a task's predicates. `abort_if` is checked before `run_if`;
/// neither carries its own timeout. Dependency outputs reach script
/// predicates only — shell predicates see just the workdir and
/// environment.
pub(crate) async fn evaluate(
  invoker: &Invoker,
  task: &Task,
  dep_outputs: &serde_json::Value,
) -> Result<GateDecision, TaskError> {
  if let Some(predicate) = &task.abort_if {
    let triggered = eval_predicate(invoker, task, predicate, dep_outputs)
      .await
      .map_err(|message| TaskError::Condition {
        message: format!("abort_if: {message}"),
      })?;
    if triggered {
      return Ok(GateDecision::Abort);
    }
  }

  if let Some(predicate) = &task.run_if {
    let should_run = eval_predicate(invoker, task, predicate, dep_outputs)
      .await
      .map_err(|message| TaskError::Condition {
        message: format!("run_if: {message}"),
      })?;
    if !should_run {
      return Ok(GateDecision::Skip(TaskError::ConditionNotMet));
    }
  }

  Ok(GateDecision::Run)
}

async fn eval_predicate(
  invoker: &Invoker,
  task: &Task,
  predicate: &Predicate,
  dep_outputs: &serde_json::Value,
) -> Result<bool, String> {
  match predicate {
    Predicate::Shell(line) => shell::run_status(line, &invoker.session.workdir)
      .await
      .map_err(|e| e.to_string()),
    Predicate::Script(func) => {
      let params = invoker.effective_params(task);
      let ctx = invoker.call_context(task);
      let outcome = invoker
        .host
        .call(*func, &params, dep_outputs, &ctx)
        .await
        .map_err(|e| e.to_string())?;
      Ok(outcome.success)
    }
  }
}
