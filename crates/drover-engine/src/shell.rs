//! Shell command execution for commands and predicates.

use std::path::Path;
use std::process::Stdio;

use tokio::process::Command;

/// Run a command line through the system shell in `workdir`, capturing
/// stdout and stderr interleaved. Returns the success flag and the
/// captured text.
pub(crate) async fn run_captured(
  command: &str,
  workdir: &Path,
) -> Result<(bool, String), std::io::Error> {
  let output = Command::new("bash")
    .arg("-c")
    .arg(command)
    .current_dir(workdir)
    .stdin(Stdio::null())
    .kill_on_drop(true)
    .output()
    .await?;

  let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
  text.push_str(&String::from_utf8_lossy(&output.stderr));
  Ok((output.status.success(), text))
}

/// Run a predicate command line with no output capture; exit 0 means true.
pub(crate) async fn run_status(command: &str, workdir: &Path) -> Result<bool, std::io::Error> {
  let status = Command::new("bash")
    .arg("-c")
    .arg(command)
    .current_dir(workdir)
    .stdin(Stdio::null())
    .stdout(Stdio::null())
    .stderr(Stdio::null())
    .kill_on_drop(true)
    .status()
    .await?;
  Ok(status.success())
}
