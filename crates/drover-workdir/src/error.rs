use std::path::PathBuf;

/// Workspace and artifact failures.
#[derive(Debug, thiserror::Error)]
pub enum WorkspaceError {
  #[error("io error: {0}")]
  Io(#[from] std::io::Error),

  /// A `consumes` entry has no counterpart in the staging area. This fails
  /// the consuming task before its command runs.
  #[error("consumed artifact '{name}' not found in staging")]
  MissingArtifact { name: String, path: PathBuf },
}
