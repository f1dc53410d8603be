/// Errors surfaced by host implementations.
#[derive(Debug, thiserror::Error)]
pub enum HostError {
  /// The script evaluator raised an error while running a function.
  #[error("script error: {message}")]
  Script { message: String },

  /// No script evaluator is configured for this engine instance.
  #[error("no script host configured")]
  NoScriptHost,

  /// The named agent is not registered.
  #[error("unknown agent '{name}'")]
  UnknownAgent { name: String },

  /// The RPC to a remote worker failed before returning an exit status.
  #[error("agent transport error: {message}")]
  Transport { message: String },
}

impl HostError {
  pub fn script(message: impl Into<String>) -> Self {
    Self::Script {
      message: message.into(),
    }
  }

  pub fn transport(message: impl Into<String>) -> Self {
    Self::Transport {
      message: message.into(),
    }
  }
}
