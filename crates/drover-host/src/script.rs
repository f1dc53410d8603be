use std::collections::HashMap;

use async_trait::async_trait;

use drover_task::ScriptRef;

use crate::context::CallContext;
use crate::error::HostError;

/// What a script function evaluation produced.
///
/// Commands return all three fields; hooks and predicates are read through
/// `success` (and `message` on failure), with `output` ignored.
#[derive(Debug, Clone)]
pub struct CallOutcome {
  pub success: bool,
  pub message: String,
  /// Structured value propagated to dependents, as a JSON-like tree.
  pub output: serde_json::Value,
}

impl CallOutcome {
  pub fn success(output: serde_json::Value) -> Self {
    Self {
      success: true,
      message: String::new(),
      output,
    }
  }

  pub fn failure(message: impl Into<String>) -> Self {
    Self {
      success: false,
      message: message.into(),
      output: serde_json::Value::Null,
    }
  }
}

/// The embedded evaluator behind every `ScriptRef`.
///
/// Implementations must run each call in a fresh evaluator instance (or
/// otherwise isolate global state): calls may come from concurrently
/// running tasks. Raised script errors are surfaced either as
/// `Err(HostError::Script { .. })` or as a `CallOutcome` with
/// `success == false`; the engine treats both as the same failure.
#[async_trait]
pub trait ScriptHost: Send + Sync {
  /// Evaluate a function handle with the task's string parameters and a
  /// structured input value (dependency outputs for commands and
  /// predicates, the command output for post-exec hooks).
  async fn call(
    &self,
    func: ScriptRef,
    params: &HashMap<String, String>,
    input: &serde_json::Value,
    ctx: &CallContext,
  ) -> Result<CallOutcome, HostError>;

  /// Release any per-handle resources. Called when the owning group is
  /// dropped; the default does nothing.
  fn close(&self, _func: ScriptRef) {}
}

/// A host for deployments without an embedded evaluator.
///
/// Groups loaded from plain files carry no script handles, so this host is
/// never called on such runs; any call is a configuration mistake and
/// fails loudly.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullScriptHost;

#[async_trait]
impl ScriptHost for NullScriptHost {
  async fn call(
    &self,
    _func: ScriptRef,
    _params: &HashMap<String, String>,
    _input: &serde_json::Value,
    _ctx: &CallContext,
  ) -> Result<CallOutcome, HostError> {
    Err(HostError::NoScriptHost)
  }
}
