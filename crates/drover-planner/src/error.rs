/// Planning failures. All of these are configuration errors surfaced
/// before any task runs.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlanError {
  #[error("task '{name}' not found in group '{group}'")]
  UnknownTask { group: String, name: String },

  #[error("duplicate task name '{name}' in group '{group}'")]
  DuplicateTask { group: String, name: String },

  #[error("circular dependency detected involving task '{name}' in group '{group}'")]
  CircularDependency { group: String, name: String },
}
