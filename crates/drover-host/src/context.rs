use std::time::Duration;

use tokio_util::sync::CancellationToken;

use drover_task::Session;

/// Execution context handed to every host call.
///
/// Carries the identifiers a host needs for correlation, the shared
/// session (workdir) of the current group run, the attempt deadline, and
/// the cancellation token covering the call.
#[derive(Debug, Clone)]
pub struct CallContext {
  pub run_id: String,
  pub group: String,
  pub task_id: String,
  pub session: Session,
  /// Remaining budget for the enclosing attempt; `None` means unbounded.
  /// The engine also enforces this externally, so hosts may treat it as
  /// advisory.
  pub deadline: Option<Duration>,
  pub cancel: CancellationToken,
}
