//! Drover engine
//!
//! Given a task group, the engine plans a dependency order, gates each task
//! on its dependencies and conditions, executes it with retries and a
//! per-attempt timeout, moves artifacts between producers and consumers
//! through a staging area, and tears the group workdir down according to
//! the group's cleanup policy.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                        Engine                            │
//! │  - run(group, opts, cancel) → GroupRunResult             │
//! │  - walks topological levels from the planner             │
//! │  - gating: depends_on, next_if_fail, run_if, abort_if    │
//! │  - run_parallel(tasks, input, ctx) for fan-out           │
//! └──────────────────────────────────────────────────────────┘
//!                             │
//!                             ▼
//! ┌──────────────────────────────────────────────────────────┐
//! │                     retry / invoker                      │
//! │  - retries + 1 attempts, fixed 1s delay                  │
//! │  - per attempt: pre_exec → command → post_exec           │
//! │  - shell, script-host, or remote-agent command           │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! Progress is reported through a [`ProgressNotifier`]; persistence and
//! rendering are the notifier's concern.

mod error;
mod events;
mod gate;
mod invoker;
mod orchestrator;
mod result;
mod retry;
mod shell;
mod summary;

pub use error::{EngineError, TaskError};
pub use events::{ChannelNotifier, NoopNotifier, ProgressNotifier, RunEvent};
pub use orchestrator::{Engine, RunOptions};
pub use result::{GroupRunResult, TaskResult};
pub use summary::render_summary;
