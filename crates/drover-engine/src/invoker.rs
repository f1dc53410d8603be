//! Single-attempt task invocation.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::json;
use tokio_util::sync::CancellationToken;

use drover_host::{AgentTransport, CallContext, ScriptHost};
use drover_task::{Command, Session, Task};

use crate::error::TaskError;
use crate::shell;

/// What a successful attempt produced.
pub(crate) struct AttemptOutput {
  pub message: String,
  pub output: serde_json::Value,
}

/// Executes exactly one attempt of one task: pre_exec, then the command
/// (shell, script function, or remote agent), then post_exec, all bounded
/// by the task's timeout.
///
/// Cheap to clone; shared by the orchestrator's level walk and by parallel
/// fan-out.
#[derive(Clone)]
pub(crate) struct Invoker {
  pub host: Arc<dyn ScriptHost>,
  pub transport: Option<Arc<dyn AgentTransport>>,
  pub run_id: String,
  pub group: String,
  pub session: Session,
  pub cancel: CancellationToken,
}

impl Invoker {
  /// Run one attempt. The timeout, when set, covers the whole attempt;
  /// expiry is classified [`TaskError::Timeout`]. Cancellation of the
  /// group run aborts the attempt with [`TaskError::Cancelled`].
  pub async fn attempt(
    &self,
    task: &Task,
    dep_outputs: &serde_json::Value,
  ) -> Result<AttemptOutput, TaskError> {
    let body = self.attempt_body(task, dep_outputs);
    match task.timeout {
      Some(limit) => tokio::select! {
        _ = self.cancel.cancelled() => Err(TaskError::Cancelled),
        outcome = tokio::time::timeout(limit, body) => match outcome {
          Ok(result) => result,
          Err(_) => Err(TaskError::Timeout { timeout: limit }),
        },
      },
      None => tokio::select! {
        _ = self.cancel.cancelled() => Err(TaskError::Cancelled),
        result = body => result,
      },
    }
  }

  async fn attempt_body(
    &self,
    task: &Task,
    dep_outputs: &serde_json::Value,
  ) -> Result<AttemptOutput, TaskError> {
    let params = self.effective_params(task);
    let ctx = self.call_context(task);

    if let Some(hook) = task.pre_exec {
      let outcome = self
        .host
        .call(hook, &params, dep_outputs, &ctx)
        .await
        .map_err(|e| TaskError::PreExec {
          message: e.to_string(),
        })?;
      if !outcome.success {
        return Err(TaskError::PreExec {
          message: outcome.message,
        });
      }
    }

    let (message, output) = self.run_command(task, &params, dep_outputs, &ctx).await?;

    // Post-exec sees the command output, and only ever a successful one.
    if let Some(hook) = task.post_exec {
      let outcome = self
        .host
        .call(hook, &params, &output, &ctx)
        .await
        .map_err(|e| TaskError::PostExec {
          message: e.to_string(),
        })?;
      if !outcome.success {
        return Err(TaskError::PostExec {
          message: outcome.message,
        });
      }
    }

    Ok(AttemptOutput { message, output })
  }

  async fn run_command(
    &self,
    task: &Task,
    params: &HashMap<String, String>,
    dep_outputs: &serde_json::Value,
    ctx: &CallContext,
  ) -> Result<(String, serde_json::Value), TaskError> {
    if let Some(agent) = &task.agent {
      return self.run_remote(task, agent, ctx).await;
    }

    match &task.command {
      Command::Script(func) => {
        let outcome = self
          .host
          .call(*func, params, dep_outputs, ctx)
          .await
          .map_err(|e| TaskError::Command {
            message: e.to_string(),
          })?;
        if !outcome.success {
          return Err(TaskError::Command {
            message: outcome.message,
          });
        }
        Ok((outcome.message, outcome.output))
      }
      Command::Shell(line) => {
        let (ok, text) = shell::run_captured(line, &self.session.workdir)
          .await
          .map_err(|e| TaskError::Command {
            message: format!("failed to spawn shell: {e}"),
          })?;
        if !ok {
          return Err(TaskError::Command {
            message: format!("command '{}' failed: {}", line, text.trim()),
          });
        }
        Ok((text, json!({})))
      }
    }
  }

  async fn run_remote(
    &self,
    task: &Task,
    agent: &str,
    ctx: &CallContext,
  ) -> Result<(String, serde_json::Value), TaskError> {
    let Command::Shell(line) = &task.command else {
      return Err(TaskError::Agent {
        message: "agent tasks require a shell command".to_string(),
      });
    };
    let transport = self.transport.as_ref().ok_or_else(|| TaskError::Agent {
      message: "no agent transport configured".to_string(),
    })?;

    let exit = transport
      .execute(agent, line, ctx)
      .await
      .map_err(|e| TaskError::Agent {
        message: e.to_string(),
      })?;

    let output = json!({
      "stdout": exit.stdout,
      "stderr": exit.stderr,
      "exit_code": exit.exit_code,
    });
    if exit.exit_code != 0 {
      return Err(TaskError::Command {
        message: format!(
          "remote command on '{}' exited with status {}: {}",
          agent,
          exit.exit_code,
          exit.stderr.trim()
        ),
      });
    }
    Ok((exit.stdout, output))
  }

  /// The task's parameters plus the synthetic `task_name`, `group_name`,
  /// and `workdir` entries. Never written back to the task.
  pub(crate) fn effective_params(&self, task: &Task) -> HashMap<String, String> {
    let mut params = task.params.clone();
    params.insert("task_name".to_string(), task.name.clone());
    params.insert("group_name".to_string(), self.group.clone());
    params.insert(
      "workdir".to_string(),
      self.session.workdir.display().to_string(),
    );
    params
  }

  pub(crate) fn call_context(&self, task: &Task) -> CallContext {
    CallContext {
      run_id: self.run_id.clone(),
      group: self.group.clone(),
      task_id: task.name.clone(),
      session: self.session.clone(),
      deadline: task.timeout,
      cancel: self.cancel.child_token(),
    }
  }

  /// A context for group-scoped host calls (cleanup hook).
  pub(crate) fn group_context(&self) -> CallContext {
    CallContext {
      run_id: self.run_id.clone(),
      group: self.group.clone(),
      task_id: self.group.clone(),
      session: self.session.clone(),
      deadline: None,
      cancel: self.cancel.child_token(),
    }
  }
}
