//! The pipeline orchestrator: drives a group's tasks through gating,
//! retries, artifact passing, and cleanup.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::json;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use drover_host::{AgentTransport, CallContext, ScriptHost};
use drover_task::{Command, Session, Task, TaskGroup, TaskStatus};
use drover_workdir::GroupWorkspace;

use crate::error::{EngineError, TaskError};
use crate::events::{NoopNotifier, ProgressNotifier, RunEvent};
use crate::gate::{self, GateDecision};
use crate::invoker::Invoker;
use crate::result::{GroupRunResult, TaskResult};
use crate::retry;

/// Per-run knobs.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
  /// Task names to run; their `depends_on` closure is included. Empty
  /// selects the whole group.
  pub targets: Vec<String>,
  /// Plan and gate, but record every runnable task as skipped instead of
  /// executing it.
  pub dry_run: bool,
}

/// The execution engine.
///
/// Generic over `N: ProgressNotifier` to allow different event sinks; use
/// [`Engine::new`] for a default engine that discards events.
pub struct Engine<N: ProgressNotifier = NoopNotifier> {
  host: Arc<dyn ScriptHost>,
  transport: Option<Arc<dyn AgentTransport>>,
  notifier: Arc<N>,
}

impl Engine<NoopNotifier> {
  /// An engine that discards progress events.
  pub fn new(host: Arc<dyn ScriptHost>) -> Self {
    Self::with_notifier(host, NoopNotifier)
  }
}

impl<N: ProgressNotifier + 'static> Engine<N> {
  pub fn with_notifier(host: Arc<dyn ScriptHost>, notifier: N) -> Self {
    Self {
      host,
      transport: None,
      notifier: Arc::new(notifier),
    }
  }

  /// Attach a transport for tasks that name a remote agent.
  pub fn with_transport(mut self, transport: Arc<dyn AgentTransport>) -> Self {
    self.transport = Some(transport);
    self
  }

  /// Execute one group run.
  ///
  /// Configuration defects (unknown target, cycle, agent misuse) are
  /// reported as `Err` before any task runs and before the workdir is
  /// created. Task failures are not errors at this level: they are
  /// recorded in the returned results and reflected in `success`.
  #[instrument(name = "group_run", skip_all, fields(group = %group.name))]
  pub async fn run(
    &self,
    group: &TaskGroup,
    opts: RunOptions,
    cancel: CancellationToken,
  ) -> Result<GroupRunResult, EngineError> {
    let run_id = Uuid::new_v4().to_string();

    let plan = drover_planner::plan(group, &opts.targets)?;
    self.preflight(group, plan.ordered())?;

    let workspace = GroupWorkspace::create(
      &group.name,
      &run_id,
      group.workdir.as_deref(),
      group.create_workdir_before_run,
    )
    .await?;

    info!(run_id = %run_id, tasks = plan.len(), "group run started");
    self.notifier.notify(RunEvent::group_started(&run_id, &group.name));

    let invoker = Invoker {
      host: self.host.clone(),
      transport: self.transport.clone(),
      run_id: run_id.clone(),
      group: group.name.clone(),
      session: Session::new(workspace.workdir()),
      cancel: cancel.clone(),
    };

    let (results, aborted) = self
      .run_levels(group, &plan, &opts, &invoker, &workspace, &cancel)
      .await;

    // An aborted run is overall-failed even when no task itself failed.
    let success = !aborted && results.iter().all(|r| r.status != TaskStatus::Failed);

    let clean_workdir = self.cleanup_decision(group, &invoker, success, &results).await;
    if let Err(e) = workspace.cleanup(clean_workdir).await {
      warn!(run_id = %run_id, error = %e, "workspace cleanup failed");
    }

    info!(run_id = %run_id, success, "group run finished");
    self
      .notifier
      .notify(RunEvent::group_finished(&run_id, &group.name, success));

    Ok(GroupRunResult {
      run_id,
      group: group.name.clone(),
      success,
      results,
    })
  }

  /// Walk the plan level by level. Within a level, `async`-flagged tasks
  /// overlap via spawned attempt chains while the rest run inline in name
  /// order; every result is recorded as soon as its attempt chain
  /// terminates, so a later task in the same level gates against fresh
  /// statuses (the `next_if_fail` fallback idiom relies on this).
  async fn run_levels(
    &self,
    group: &TaskGroup,
    plan: &drover_planner::ExecutionPlan,
    opts: &RunOptions,
    invoker: &Invoker,
    workspace: &GroupWorkspace,
    cancel: &CancellationToken,
  ) -> (Vec<TaskResult>, bool) {
    let tasks: HashMap<&str, &Task> = group.tasks.iter().map(|t| (t.name.as_str(), t)).collect();

    let mut state = RunState {
      statuses: plan
        .ordered()
        .map(|n| (n.to_string(), TaskStatus::Pending))
        .collect(),
      outputs: HashMap::new(),
      results: Vec::with_capacity(plan.len()),
    };
    let mut aborted = false;

    for level in plan.levels() {
      let mut spawned: Vec<(String, JoinHandle<TaskResult>)> = Vec::new();

      for name in level {
        let task = tasks[name.as_str()];

        if cancel.is_cancelled() {
          self
            .record(&mut state, workspace, invoker, task, TaskResult::skipped(name, TaskError::Cancelled))
            .await;
          continue;
        }
        if aborted {
          self
            .record(&mut state, workspace, invoker, task, TaskResult::skipped(name, TaskError::Aborted))
            .await;
          continue;
        }

        if let Some(reason) = dependency_gate(task, &state.statuses) {
          self
            .record(&mut state, workspace, invoker, task, TaskResult::skipped(name, reason))
            .await;
          continue;
        }

        let dep_outputs = collect_dep_outputs(task, &state.outputs);

        if opts.dry_run {
          self
            .record(&mut state, workspace, invoker, task, TaskResult::skipped(name, TaskError::DryRun))
            .await;
          continue;
        }

        match gate::evaluate(invoker, task, &dep_outputs).await {
          Ok(GateDecision::Run) => {}
          Ok(GateDecision::Skip(reason)) => {
            info!(task = %name, "skipping task, run_if condition not met");
            self
              .record(&mut state, workspace, invoker, task, TaskResult::skipped(name, reason))
              .await;
            continue;
          }
          Ok(GateDecision::Abort) => {
            warn!(task = %name, "group run aborted by condition");
            aborted = true;
            self
              .record(&mut state, workspace, invoker, task, TaskResult::skipped(name, TaskError::Aborted))
              .await;
            continue;
          }
          Err(error) => {
            let result = TaskResult::failed(name, error, std::time::Duration::ZERO);
            self.record(&mut state, workspace, invoker, task, result).await;
            continue;
          }
        }

        match workspace.stage_consumed(&task.consumes).await {
          Ok(staged) => {
            for file in staged {
              self
                .notifier
                .notify(RunEvent::artifact_consumed(&invoker.run_id, name, &file));
            }
          }
          Err(e) => {
            let result = TaskResult::failed(
              name,
              TaskError::Artifact {
                message: e.to_string(),
              },
              std::time::Duration::ZERO,
            );
            self.record(&mut state, workspace, invoker, task, result).await;
            continue;
          }
        }

        state.statuses.insert(name.clone(), TaskStatus::Running);
        if task.run_async {
          let invoker = invoker.clone();
          let notifier = self.notifier.clone();
          let task = (*task).clone();
          let dep_outputs = dep_outputs.clone();
          spawned.push((
            name.clone(),
            tokio::spawn(async move {
              retry::run_with_retries(&invoker, &notifier, &task, &dep_outputs).await
            }),
          ));
        } else {
          let result = retry::run_with_retries(invoker, &self.notifier, task, &dep_outputs).await;
          self.record(&mut state, workspace, invoker, task, result).await;
        }
      }

      // Started tasks run to completion even under a mid-level abort.
      for (name, handle) in spawned {
        let result = match handle.await {
          Ok(result) => result,
          Err(e) => TaskResult::failed(
            &name,
            TaskError::Command {
              message: format!("task panicked: {e}"),
            },
            std::time::Duration::ZERO,
          ),
        };
        let task = tasks[name.as_str()];
        self.record(&mut state, workspace, invoker, task, result).await;
      }
    }

    (state.results, aborted)
  }

  /// Record a terminal result: publish artifacts on success, update the
  /// status and output maps, emit the terminal event, and append to the
  /// result list.
  async fn record(
    &self,
    state: &mut RunState,
    workspace: &GroupWorkspace,
    invoker: &Invoker,
    task: &Task,
    result: TaskResult,
  ) {
    if result.status == TaskStatus::Success {
      state.outputs.insert(task.name.clone(), result.output.clone());
      if !task.artifacts.is_empty() {
        for file in workspace.publish_artifacts(&task.artifacts).await {
          self
            .notifier
            .notify(RunEvent::artifact_produced(&invoker.run_id, &task.name, &file));
        }
      }
    }
    state.statuses.insert(task.name.clone(), result.status);
    self
      .notifier
      .notify(RunEvent::task_finished(&invoker.run_id, &result));
    state.results.push(result);
  }

  /// Run a set of fully-formed tasks concurrently, outside group gating.
  ///
  /// Every task receives `input` as its dependency-outputs value and goes
  /// through the same retry/invoker pipeline as group tasks; the caller's
  /// session and cancellation are shared. Results come back in input
  /// order once all sub-tasks have terminated.
  #[instrument(name = "parallel_fanout", skip_all, fields(tasks = tasks.len()))]
  pub async fn run_parallel(
    &self,
    tasks: Vec<Task>,
    input: serde_json::Value,
    ctx: &CallContext,
  ) -> Vec<TaskResult> {
    let invoker = Invoker {
      host: self.host.clone(),
      transport: self.transport.clone(),
      run_id: ctx.run_id.clone(),
      group: ctx.group.clone(),
      session: ctx.session.clone(),
      cancel: ctx.cancel.clone(),
    };

    let names: Vec<String> = tasks.iter().map(|t| t.name.clone()).collect();
    let handles: Vec<JoinHandle<TaskResult>> = tasks
      .into_iter()
      .map(|task| {
        let invoker = invoker.clone();
        let notifier = self.notifier.clone();
        let input = input.clone();
        tokio::spawn(async move {
          retry::run_with_retries(&invoker, &notifier, &task, &input).await
        })
      })
      .collect();

    let joined = futures::future::join_all(handles).await;
    names
      .into_iter()
      .zip(joined)
      .map(|(name, outcome)| match outcome {
        Ok(result) => result,
        Err(e) => TaskResult::failed(
          &name,
          TaskError::Command {
            message: format!("task panicked: {e}"),
          },
          std::time::Duration::ZERO,
        ),
      })
      .collect()
  }

  /// Reject configurations the invoker could only fail on later.
  fn preflight<'a>(
    &self,
    group: &TaskGroup,
    planned: impl Iterator<Item = &'a str>,
  ) -> Result<(), EngineError> {
    for name in planned {
      let task = group.task(name).expect("planned tasks exist in the group");
      if let Some(agent) = &task.agent {
        if !matches!(task.command, Command::Shell(_)) {
          return Err(EngineError::AgentCommand {
            name: task.name.clone(),
            agent: agent.clone(),
          });
        }
        if self.transport.is_none() {
          return Err(EngineError::NoTransport {
            name: task.name.clone(),
            agent: agent.clone(),
          });
        }
      }
    }
    Ok(())
  }

  /// Whether to remove the workdir, per the group's cleanup hook. The
  /// default with no hook is to always clean.
  async fn cleanup_decision(
    &self,
    group: &TaskGroup,
    invoker: &Invoker,
    success: bool,
    results: &[TaskResult],
  ) -> bool {
    let Some(hook) = group.clean_workdir_after_run else {
      return true;
    };

    let error = results
      .iter()
      .find(|r| r.status == TaskStatus::Failed)
      .and_then(|r| r.error.as_ref())
      .map(|e| e.to_string());
    let output: serde_json::Map<String, serde_json::Value> = results
      .iter()
      .filter(|r| r.status == TaskStatus::Success)
      .map(|r| (r.name.clone(), r.output.clone()))
      .collect();
    let group_result = json!({
      "success": success,
      "error": error,
      "output": output,
    });

    let ctx = invoker.group_context();
    match self
      .host
      .call(hook, &HashMap::new(), &group_result, &ctx)
      .await
    {
      Ok(outcome) => outcome.success,
      Err(e) => {
        warn!(error = %e, "clean_workdir_after_run hook failed, cleaning by default");
        true
      }
    }
  }
}

/// Mutable bookkeeping for one group run: the authoritative status map,
/// the outputs of successful tasks, and the result list.
struct RunState {
  statuses: HashMap<String, TaskStatus>,
  outputs: HashMap<String, serde_json::Value>,
  results: Vec<TaskResult>,
}

/// Check a task's `depends_on` and `next_if_fail` gates against the status
/// map. `Success` and `Skipped` dependencies are non-blocking; a `Failed`
/// or never-terminated dependency skips the task. A non-empty
/// `next_if_fail` requires every listed task to have failed.
fn dependency_gate(task: &Task, statuses: &HashMap<String, TaskStatus>) -> Option<TaskError> {
  for dep in &task.depends_on {
    match statuses.get(dep) {
      Some(TaskStatus::Failed) => {
        return Some(TaskError::DependencyFailed { name: dep.clone() });
      }
      Some(TaskStatus::Success) | Some(TaskStatus::Skipped) => {}
      _ => {
        return Some(TaskError::DependencyNotRun { name: dep.clone() });
      }
    }
  }

  if !task.next_if_fail.is_empty() {
    let all_failed = task
      .next_if_fail
      .iter()
      .all(|name| statuses.get(name) == Some(&TaskStatus::Failed));
    if !all_failed {
      return Some(TaskError::FallbackNotMet);
    }
  }

  None
}

/// Outputs of the task's dependencies, keyed by dependency name. Only
/// successful dependencies have outputs; a failed task's output is never
/// observable downstream.
fn collect_dep_outputs(
  task: &Task,
  outputs: &HashMap<String, serde_json::Value>,
) -> serde_json::Value {
  let map: serde_json::Map<String, serde_json::Value> = task
    .depends_on
    .iter()
    .filter_map(|dep| outputs.get(dep).map(|v| (dep.clone(), v.clone())))
    .collect();
  serde_json::Value::Object(map)
}
