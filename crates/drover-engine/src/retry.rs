//! The attempt loop around the invoker.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::warn;

use drover_task::{Task, TaskStatus};

use crate::error::TaskError;
use crate::events::{ProgressNotifier, RunEvent};
use crate::invoker::Invoker;
use crate::result::TaskResult;

/// Fixed delay between attempts. No backoff: pipeline retries are meant to
/// ride out transient flakes, not rate limits.
pub(crate) const RETRY_DELAY: Duration = Duration::from_secs(1);

/// Run a task's full attempt chain: up to `retries + 1` invocations with a
/// fixed delay in between. Returns the first success or the last failure;
/// only the final attempt's error is kept.
///
/// Cancellation aborts the loop immediately. An attempt already cut short
/// by cancellation is not retried.
pub(crate) async fn run_with_retries<N: ProgressNotifier>(
  invoker: &Invoker,
  notifier: &Arc<N>,
  task: &Task,
  dep_outputs: &serde_json::Value,
) -> TaskResult {
  let total_attempts = task.retries + 1;
  let start = Instant::now();
  let mut last_error: Option<TaskError> = None;

  for attempt in 1..=total_attempts {
    if attempt > 1 {
      warn!(
        task = %task.name,
        attempt,
        total_attempts,
        "task failed, retrying in {}s",
        RETRY_DELAY.as_secs()
      );
      tokio::select! {
        _ = invoker.cancel.cancelled() => {
          last_error = Some(TaskError::Cancelled);
          break;
        }
        _ = tokio::time::sleep(RETRY_DELAY) => {}
      }
    }

    notifier.notify(RunEvent::task_attempt_started(
      &invoker.run_id,
      &task.name,
      attempt,
      total_attempts,
    ));

    match invoker.attempt(task, dep_outputs).await {
      Ok(output) => {
        return TaskResult {
          name: task.name.clone(),
          status: TaskStatus::Success,
          duration: start.elapsed(),
          error: None,
          message: output.message,
          output: output.output,
        };
      }
      Err(TaskError::Cancelled) => {
        last_error = Some(TaskError::Cancelled);
        break;
      }
      Err(error) => {
        last_error = Some(error);
      }
    }
  }

  TaskResult::failed(
    &task.name,
    last_error.unwrap_or(TaskError::Cancelled),
    start.elapsed(),
  )
}
