//! Drover workdir
//!
//! Lifecycle of the two directories backing a group run: the workdir every
//! task of the group shares, and the staging area artifacts pass through
//! between producer and consumer tasks.
//!
//! The staging area is separate from the workdir so publication is atomic
//! with respect to task-local mutation: a consumer only ever sees the copy
//! taken after its producer succeeded, never a half-written file.

mod error;
mod workspace;

pub use error::WorkspaceError;
pub use workspace::GroupWorkspace;
