use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;

use drover_config::load_groups;
use drover_engine::{render_summary, Engine, RunOptions};
use drover_host::NullScriptHost;
use drover_task::TaskGroup;

/// Drover - a task-pipeline runner
#[derive(Parser)]
#[command(name = "drover")]
#[command(version, about, long_about = None)]
struct Cli {
  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Run task groups from a definition file
  Run {
    /// Path to the group file (JSON or YAML)
    file: PathBuf,

    /// Group to run (default: every group in the file)
    #[arg(long)]
    group: Option<String>,

    /// Target task names; their dependency closure is included
    #[arg(long = "target")]
    targets: Vec<String>,

    /// Plan and gate, but record every task as skipped
    #[arg(long)]
    dry_run: bool,
  },

  /// List the groups and tasks in a definition file
  List {
    /// Path to the group file (JSON or YAML)
    file: PathBuf,
  },
}

#[tokio::main]
async fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
    .init();

  match Cli::parse().command {
    Commands::Run {
      file,
      group,
      targets,
      dry_run,
    } => run(file, group, targets, dry_run).await,
    Commands::List { file } => list(file),
  }
}

async fn run(
  file: PathBuf,
  group: Option<String>,
  targets: Vec<String>,
  dry_run: bool,
) -> Result<()> {
  let groups = load_groups(&file)?;

  let selected: Vec<&TaskGroup> = match &group {
    Some(name) => {
      let group = groups
        .get(name)
        .with_context(|| format!("task group '{name}' not found"))?;
      vec![group]
    }
    None => {
      if !targets.is_empty() {
        bail!("--target requires --group");
      }
      let mut all: Vec<&TaskGroup> = groups.values().collect();
      all.sort_by(|a, b| a.name.cmp(&b.name));
      all
    }
  };

  let engine = Engine::new(Arc::new(NullScriptHost));

  let cancel = CancellationToken::new();
  let ctrl_c = cancel.clone();
  tokio::spawn(async move {
    if tokio::signal::ctrl_c().await.is_ok() {
      tracing::warn!("interrupt received, cancelling run");
      ctrl_c.cancel();
    }
  });

  let mut failed: Vec<String> = Vec::new();
  for group in selected {
    let opts = RunOptions {
      targets: targets.clone(),
      dry_run,
    };
    let result = engine.run(group, opts, cancel.clone()).await?;

    println!("\nGroup: {}", group.name);
    print!("{}", render_summary(&result));
    if !result.success {
      failed.push(group.name.clone());
    }
  }

  if !failed.is_empty() {
    bail!("one or more task groups failed: {}", failed.join(", "));
  }
  Ok(())
}

fn list(file: PathBuf) -> Result<()> {
  let groups = load_groups(&file)?;

  let mut names: Vec<&String> = groups.keys().collect();
  names.sort();

  for name in names {
    let group = &groups[name];
    println!("{name}: {}", group.description);
    for task in &group.tasks {
      if task.depends_on.is_empty() {
        println!("  {}", task.name);
      } else {
        println!("  {} (after {})", task.name, task.depends_on.join(", "));
      }
    }
  }
  Ok(())
}
