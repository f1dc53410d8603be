//! Progress events and notifiers.
//!
//! The engine emits structured events as a run progresses; consumers
//! persist them, stream them to UIs, or drop them. Notifier
//! implementations must be safe for concurrent emission: overlapping tasks
//! report attempts without coordination.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use drover_task::TaskStatus;

use crate::result::TaskResult;

/// Events emitted during a group run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RunEvent {
  GroupStarted {
    run_id: String,
    group: String,
    at: DateTime<Utc>,
  },

  /// Emitted before each attempt of a task.
  TaskAttemptStarted {
    run_id: String,
    task_id: String,
    attempt: u32,
    total_attempts: u32,
    at: DateTime<Utc>,
  },

  /// Emitted once per task when its attempt chain terminates (or when it
  /// is recorded as skipped).
  TaskFinished {
    run_id: String,
    task_id: String,
    status: TaskStatus,
    duration: Duration,
    message: String,
    error: Option<String>,
    at: DateTime<Utc>,
  },

  ArtifactProduced {
    run_id: String,
    task_id: String,
    file: String,
    at: DateTime<Utc>,
  },

  ArtifactConsumed {
    run_id: String,
    task_id: String,
    file: String,
    at: DateTime<Utc>,
  },

  GroupFinished {
    run_id: String,
    group: String,
    success: bool,
    at: DateTime<Utc>,
  },
}

impl RunEvent {
  pub(crate) fn group_started(run_id: &str, group: &str) -> Self {
    Self::GroupStarted {
      run_id: run_id.to_string(),
      group: group.to_string(),
      at: Utc::now(),
    }
  }

  pub(crate) fn task_attempt_started(
    run_id: &str,
    task_id: &str,
    attempt: u32,
    total_attempts: u32,
  ) -> Self {
    Self::TaskAttemptStarted {
      run_id: run_id.to_string(),
      task_id: task_id.to_string(),
      attempt,
      total_attempts,
      at: Utc::now(),
    }
  }

  pub(crate) fn task_finished(run_id: &str, result: &TaskResult) -> Self {
    Self::TaskFinished {
      run_id: run_id.to_string(),
      task_id: result.name.clone(),
      status: result.status,
      duration: result.duration,
      message: result.message.clone(),
      error: result.error.as_ref().map(|e| e.to_string()),
      at: Utc::now(),
    }
  }

  pub(crate) fn artifact_produced(run_id: &str, task_id: &str, file: &str) -> Self {
    Self::ArtifactProduced {
      run_id: run_id.to_string(),
      task_id: task_id.to_string(),
      file: file.to_string(),
      at: Utc::now(),
    }
  }

  pub(crate) fn artifact_consumed(run_id: &str, task_id: &str, file: &str) -> Self {
    Self::ArtifactConsumed {
      run_id: run_id.to_string(),
      task_id: task_id.to_string(),
      file: file.to_string(),
      at: Utc::now(),
    }
  }

  pub(crate) fn group_finished(run_id: &str, group: &str, success: bool) -> Self {
    Self::GroupFinished {
      run_id: run_id.to_string(),
      group: group.to_string(),
      success,
      at: Utc::now(),
    }
  }
}

/// Trait for receiving run events.
///
/// The engine calls `notify` for each event; implementations decide what
/// to do with them (persist, broadcast, log, ignore).
pub trait ProgressNotifier: Send + Sync {
  fn notify(&self, event: RunEvent);
}

/// A notifier that discards all events.
#[derive(Debug, Clone, Default)]
pub struct NoopNotifier;

impl ProgressNotifier for NoopNotifier {
  fn notify(&self, _event: RunEvent) {}
}

/// A notifier that forwards events to an unbounded channel.
///
/// Unbounded so a slow consumer never stalls the engine; event volume is
/// a handful per task, so memory growth is not a practical concern.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
  sender: mpsc::UnboundedSender<RunEvent>,
}

impl ChannelNotifier {
  pub fn new(sender: mpsc::UnboundedSender<RunEvent>) -> Self {
    Self { sender }
  }
}

impl ProgressNotifier for ChannelNotifier {
  fn notify(&self, event: RunEvent) {
    // The receiver may have been dropped; that is the consumer's choice.
    let _ = self.sender.send(event);
  }
}
