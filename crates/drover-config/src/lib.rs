//! Drover config
//!
//! Serde definition types for task groups authored as JSON or YAML files,
//! and their conversion into the model types of `drover-task`.
//!
//! Script-valued fields (function commands, hooks, script predicates) are
//! handles into an embedded evaluator and cannot be expressed in a plain
//! file; file-loaded groups therefore carry shell commands and shell
//! predicates only. An embedded script host builds model tasks directly.

mod def;
mod error;
mod load;

pub use def::{GroupDef, TaskDef};
pub use error::ConfigError;
pub use load::{load_groups, parse_groups, FileFormat};
