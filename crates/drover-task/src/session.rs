use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Per-group-run state shared with every task invocation.
///
/// Command code writes its files into `workdir`; the engine owns the
/// directory's lifecycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
  pub workdir: PathBuf,
}

impl Session {
  pub fn new(workdir: impl Into<PathBuf>) -> Self {
    Self {
      workdir: workdir.into(),
    }
  }
}
