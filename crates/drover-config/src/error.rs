use std::path::PathBuf;

/// Errors raised while loading or converting group definition files.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
  #[error("failed to read '{path}': {source}")]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to parse group file: {message}")]
  Parse { message: String },

  #[error("unsupported group file extension: '{path}' (expected .json, .yaml, or .yml)")]
  UnsupportedFormat { path: PathBuf },

  #[error("task '{task}' has no command defined")]
  MissingCommand { task: String },
}
