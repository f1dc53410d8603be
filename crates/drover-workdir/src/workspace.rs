use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::{debug, warn};

use crate::error::WorkspaceError;

/// The directories backing one group run: a shared workdir and an artifact
/// staging area.
///
/// The workdir is visible to task commands (they run inside it); the
/// staging area never is. Staging is always torn down at group end; the
/// workdir teardown is decided by the caller's cleanup policy.
#[derive(Debug, Clone)]
pub struct GroupWorkspace {
  workdir: PathBuf,
  staging: PathBuf,
}

impl GroupWorkspace {
  /// Create both directories for a group run.
  ///
  /// The workdir is, in order of preference: `workdir` verbatim when given;
  /// a deterministic per-group path under the system temp dir (recreated
  /// empty) when `create_before_run` is set; otherwise a unique per-run
  /// path. The staging area always lives under the system temp dir, keyed
  /// by the run id.
  pub async fn create(
    group: &str,
    run_id: &str,
    workdir: Option<&Path>,
    create_before_run: bool,
  ) -> Result<Self, WorkspaceError> {
    let workdir = match workdir {
      Some(path) => {
        fs::create_dir_all(path).await?;
        path.to_path_buf()
      }
      None if create_before_run => {
        let path = std::env::temp_dir().join(format!("drover-{group}"));
        remove_dir_if_present(&path).await?;
        fs::create_dir_all(&path).await?;
        path
      }
      None => {
        let path = std::env::temp_dir().join(format!("drover-{group}-{run_id}"));
        fs::create_dir_all(&path).await?;
        path
      }
    };

    let staging = std::env::temp_dir().join(format!("drover-{group}-staging-{run_id}"));
    remove_dir_if_present(&staging).await?;
    fs::create_dir_all(&staging).await?;

    debug!(workdir = %workdir.display(), staging = %staging.display(), "workspace created");
    Ok(Self { workdir, staging })
  }

  pub fn workdir(&self) -> &Path {
    &self.workdir
  }

  pub fn staging(&self) -> &Path {
    &self.staging
  }

  /// Copy each named artifact from the staging area into the workdir,
  /// returning the staged names. A missing source is a hard error: the
  /// consuming task must not run without its inputs.
  pub async fn stage_consumed(&self, names: &[String]) -> Result<Vec<String>, WorkspaceError> {
    let mut staged = Vec::with_capacity(names.len());
    for name in names {
      let src = self.staging.join(name);
      if !src.is_file() {
        return Err(WorkspaceError::MissingArtifact {
          name: name.clone(),
          path: src,
        });
      }
      fs::copy(&src, self.workdir.join(name)).await?;
      staged.push(name.clone());
    }
    Ok(staged)
  }

  /// Expand each glob pattern against the workdir and copy every matching
  /// file into the staging area, keyed by basename. Returns the published
  /// basenames.
  ///
  /// Individual copy failures and bad patterns are logged and skipped; a
  /// producer that already succeeded is not re-statused over a publication
  /// hiccup.
  pub async fn publish_artifacts(&self, patterns: &[String]) -> Vec<String> {
    let mut published = Vec::new();
    for pattern in patterns {
      let full = self.workdir.join(pattern);
      let matches = match glob::glob(&full.to_string_lossy()) {
        Ok(matches) => matches,
        Err(e) => {
          warn!(pattern = %pattern, error = %e, "invalid artifact pattern, skipping");
          continue;
        }
      };

      for entry in matches {
        let path = match entry {
          Ok(path) => path,
          Err(e) => {
            warn!(pattern = %pattern, error = %e, "unreadable artifact match, skipping");
            continue;
          }
        };
        if !path.is_file() {
          continue;
        }
        let Some(basename) = path.file_name().map(|n| n.to_string_lossy().into_owned()) else {
          continue;
        };
        match fs::copy(&path, self.staging.join(&basename)).await {
          Ok(_) => published.push(basename),
          Err(e) => {
            warn!(file = %path.display(), error = %e, "failed to publish artifact");
          }
        }
      }
    }
    published
  }

  /// Tear down the workspace. The staging area is removed unconditionally;
  /// the workdir only when `clean_workdir` is set.
  pub async fn cleanup(self, clean_workdir: bool) -> Result<(), WorkspaceError> {
    remove_dir_if_present(&self.staging).await?;
    if clean_workdir {
      remove_dir_if_present(&self.workdir).await?;
    }
    Ok(())
  }
}

async fn remove_dir_if_present(path: &Path) -> Result<(), std::io::Error> {
  match fs::remove_dir_all(path).await {
    Ok(()) => Ok(()),
    Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
    Err(e) => Err(e),
  }
}
