use serde::{Deserialize, Serialize};

/// An opaque handle to a function living inside an embedded script
/// evaluator.
///
/// The engine never introspects the referenced function; it only passes the
/// handle back to the `ScriptHost` that minted it. Handles are plain
/// integers so that task definitions stay `Send + Sync` regardless of the
/// evaluator behind them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScriptRef(u64);

impl ScriptRef {
  /// Wrap a host-assigned handle id.
  pub fn new(id: u64) -> Self {
    Self(id)
  }

  /// The raw handle id, as assigned by the host.
  pub fn id(&self) -> u64 {
    self.0
  }
}
