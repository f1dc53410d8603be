use std::collections::{HashMap, HashSet, VecDeque};

use drover_task::TaskGroup;

use crate::error::PlanError;

/// A valid execution order for a selected subset of a group.
///
/// Tasks are arranged into levels: every task's `depends_on` referents live
/// in strictly earlier levels. Within a level, names are sorted ascending
/// so the flattened order is deterministic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionPlan {
  levels: Vec<Vec<String>>,
}

impl ExecutionPlan {
  pub fn levels(&self) -> &[Vec<String>] {
    &self.levels
  }

  /// All selected task names in topological order.
  pub fn ordered(&self) -> impl Iterator<Item = &str> {
    self.levels.iter().flatten().map(String::as_str)
  }

  /// Number of selected tasks.
  pub fn len(&self) -> usize {
    self.levels.iter().map(Vec::len).sum()
  }

  pub fn is_empty(&self) -> bool {
    self.levels.is_empty()
  }

  pub fn contains(&self, name: &str) -> bool {
    self.levels.iter().flatten().any(|n| n == name)
  }
}

/// Compute the execution plan for `group`, restricted to `targets` when
/// non-empty.
///
/// Target selection walks `depends_on` edges breadth-first to collect the
/// minimal closure; an unknown target or dependency name encountered during
/// that walk is a configuration error. With no targets the whole group is
/// selected, and dependency names absent from the group are ignored for
/// ordering (the orchestrator treats them as never-terminated).
pub fn plan(group: &TaskGroup, targets: &[String]) -> Result<ExecutionPlan, PlanError> {
  let mut deps_by_name: HashMap<&str, &[String]> = HashMap::with_capacity(group.tasks.len());
  for task in &group.tasks {
    if deps_by_name
      .insert(task.name.as_str(), task.depends_on.as_slice())
      .is_some()
    {
      return Err(PlanError::DuplicateTask {
        group: group.name.clone(),
        name: task.name.clone(),
      });
    }
  }

  let selected = if targets.is_empty() {
    deps_by_name.keys().copied().collect::<HashSet<&str>>()
  } else {
    resolve_closure(group, &deps_by_name, targets)?
  };

  sort_levels(group, &deps_by_name, &selected)
}

/// Breadth-first closure over `depends_on`, starting from the targets.
fn resolve_closure<'a>(
  group: &TaskGroup,
  deps_by_name: &HashMap<&'a str, &'a [String]>,
  targets: &'a [String],
) -> Result<HashSet<&'a str>, PlanError> {
  let mut selected = HashSet::new();
  let mut queue: VecDeque<&str> = VecDeque::new();

  for name in targets {
    if selected.insert(name.as_str()) {
      queue.push_back(name);
    }
  }

  while let Some(name) = queue.pop_front() {
    let deps = deps_by_name
      .get(name)
      .ok_or_else(|| PlanError::UnknownTask {
        group: group.name.clone(),
        name: name.to_string(),
      })?;
    for dep in deps.iter() {
      if selected.insert(dep.as_str()) {
        queue.push_back(dep);
      }
    }
  }

  Ok(selected)
}

/// Kahn's algorithm over the selected subset, emitting one level per round
/// of zero-indegree tasks. Leftover tasks mean a cycle.
fn sort_levels(
  group: &TaskGroup,
  deps_by_name: &HashMap<&str, &[String]>,
  selected: &HashSet<&str>,
) -> Result<ExecutionPlan, PlanError> {
  let mut indegree: HashMap<&str, usize> = HashMap::with_capacity(selected.len());
  let mut dependents: HashMap<&str, Vec<&str>> = HashMap::with_capacity(selected.len());

  for &name in selected {
    let deps = deps_by_name[name];
    let mut count = 0;
    for dep in deps.iter() {
      // Edges pointing outside the selected subset (or to names the group
      // does not define at all) do not constrain ordering.
      if selected.contains(dep.as_str()) {
        count += 1;
        dependents.entry(dep.as_str()).or_default().push(name);
      }
    }
    indegree.insert(name, count);
  }

  let mut levels = Vec::new();
  let mut done = 0usize;

  let mut ready: Vec<&str> = indegree
    .iter()
    .filter(|(_, &d)| d == 0)
    .map(|(&n, _)| n)
    .collect();

  while !ready.is_empty() {
    ready.sort_unstable();
    let mut next = Vec::new();
    for &name in &ready {
      done += 1;
      for &dependent in dependents.get(name).map(Vec::as_slice).unwrap_or(&[]) {
        let d = indegree.get_mut(dependent).expect("dependent is selected");
        *d -= 1;
        if *d == 0 {
          next.push(dependent);
        }
      }
    }
    levels.push(ready.iter().map(|n| n.to_string()).collect());
    ready = next;
  }

  if done != selected.len() {
    // Name the lexicographically smallest unplaced task for a stable error.
    let name = indegree
      .iter()
      .filter(|(_, &d)| d > 0)
      .map(|(&n, _)| n)
      .min()
      .expect("at least one task remains in the cycle");
    return Err(PlanError::CircularDependency {
      group: group.name.clone(),
      name: name.to_string(),
    });
  }

  Ok(ExecutionPlan { levels })
}

#[cfg(test)]
mod tests {
  use super::*;
  use drover_task::{Command, Task};

  fn shell_task(name: &str, deps: &[&str]) -> Task {
    let mut task = Task::new(name, Command::Shell("true".to_string()));
    task.depends_on = deps.iter().map(|d| d.to_string()).collect();
    task
  }

  fn group(tasks: Vec<Task>) -> TaskGroup {
    TaskGroup::new("g", tasks)
  }

  #[test]
  fn linear_chain_is_one_task_per_level() {
    let g = group(vec![
      shell_task("c", &["b"]),
      shell_task("a", &[]),
      shell_task("b", &["a"]),
    ]);

    let plan = plan(&g, &[]).unwrap();
    assert_eq!(plan.levels(), &[vec!["a"], vec!["b"], vec!["c"]]);
  }

  #[test]
  fn independent_tasks_sort_by_name_within_a_level() {
    let g = group(vec![
      shell_task("zeta", &[]),
      shell_task("alpha", &[]),
      shell_task("mid", &[]),
    ]);

    let plan = plan(&g, &[]).unwrap();
    assert_eq!(plan.levels(), &[vec!["alpha", "mid", "zeta"]]);
  }

  #[test]
  fn diamond_orders_join_after_branches() {
    let g = group(vec![
      shell_task("fetch", &[]),
      shell_task("lint", &["fetch"]),
      shell_task("build", &["fetch"]),
      shell_task("package", &["build", "lint"]),
    ]);

    let plan = plan(&g, &[]).unwrap();
    assert_eq!(
      plan.levels(),
      &[vec!["fetch"], vec!["build", "lint"], vec!["package"]]
    );
  }

  #[test]
  fn targets_select_minimal_closure() {
    let g = group(vec![
      shell_task("a", &[]),
      shell_task("b", &["a"]),
      shell_task("c", &["b"]),
      shell_task("unrelated", &[]),
    ]);

    let plan = plan(&g, &["b".to_string()]).unwrap();
    assert_eq!(plan.len(), 2);
    assert!(plan.contains("a"));
    assert!(plan.contains("b"));
    assert!(!plan.contains("c"));
    assert!(!plan.contains("unrelated"));
  }

  #[test]
  fn unknown_target_is_an_error() {
    let g = group(vec![shell_task("a", &[])]);
    let err = plan(&g, &["ghost".to_string()]).unwrap_err();
    assert_eq!(
      err,
      PlanError::UnknownTask {
        group: "g".to_string(),
        name: "ghost".to_string(),
      }
    );
  }

  #[test]
  fn unknown_dependency_of_a_target_is_an_error() {
    let g = group(vec![shell_task("a", &["missing"])]);
    let err = plan(&g, &["a".to_string()]).unwrap_err();
    assert!(matches!(err, PlanError::UnknownTask { name, .. } if name == "missing"));
  }

  #[test]
  fn unknown_dependency_is_ignored_for_whole_group_selection() {
    let g = group(vec![shell_task("a", &["missing"])]);
    let plan = plan(&g, &[]).unwrap();
    assert_eq!(plan.levels(), &[vec!["a"]]);
  }

  #[test]
  fn cycle_is_rejected_naming_a_participant() {
    let g = group(vec![
      shell_task("a", &["b"]),
      shell_task("b", &["a"]),
      shell_task("solo", &[]),
    ]);

    let err = plan(&g, &[]).unwrap_err();
    match err {
      PlanError::CircularDependency { name, .. } => {
        assert!(name == "a" || name == "b");
      }
      other => panic!("expected circular dependency, got {other:?}"),
    }
  }

  #[test]
  fn duplicate_task_names_are_rejected() {
    let g = group(vec![shell_task("a", &[]), shell_task("a", &[])]);
    let err = plan(&g, &[]).unwrap_err();
    assert!(matches!(err, PlanError::DuplicateTask { name, .. } if name == "a"));
  }
}
