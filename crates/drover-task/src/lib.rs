//! Drover task model
//!
//! The data model shared by the planner, the execution engine, and the
//! host contracts: tasks, task groups, script handles, statuses, and the
//! per-run session record handed to every task invocation.
//!
//! Tasks are constructed (by the config layer or an embedded script host)
//! before orchestration begins and are immutable afterwards; execution
//! bookkeeping lives in the engine, not here.

mod group;
mod script;
mod session;
mod status;
mod task;

pub use group::TaskGroup;
pub use script::ScriptRef;
pub use session::Session;
pub use status::TaskStatus;
pub use task::{Command, Predicate, Task};
