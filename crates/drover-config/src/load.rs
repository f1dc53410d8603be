use std::collections::HashMap;
use std::path::Path;

use drover_task::TaskGroup;

use crate::def::GroupDef;
use crate::error::ConfigError;

/// On-disk encodings a group file may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
  Json,
  Yaml,
}

impl FileFormat {
  fn from_path(path: &Path) -> Result<Self, ConfigError> {
    match path.extension().and_then(|e| e.to_str()) {
      Some("json") => Ok(Self::Json),
      Some("yaml") | Some("yml") => Ok(Self::Yaml),
      _ => Err(ConfigError::UnsupportedFormat {
        path: path.to_path_buf(),
      }),
    }
  }
}

/// Load every group defined in a JSON or YAML file, keyed by group name.
pub fn load_groups(path: &Path) -> Result<HashMap<String, TaskGroup>, ConfigError> {
  let format = FileFormat::from_path(path)?;
  let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
    path: path.to_path_buf(),
    source,
  })?;
  parse_groups(&content, format)
}

/// Parse group definitions from a string in the given format.
pub fn parse_groups(
  content: &str,
  format: FileFormat,
) -> Result<HashMap<String, TaskGroup>, ConfigError> {
  let defs: HashMap<String, GroupDef> = match format {
    FileFormat::Json => serde_json::from_str(content).map_err(|e| ConfigError::Parse {
      message: e.to_string(),
    })?,
    FileFormat::Yaml => serde_yaml::from_str(content).map_err(|e| ConfigError::Parse {
      message: e.to_string(),
    })?,
  };

  let mut groups = HashMap::with_capacity(defs.len());
  for (name, def) in defs {
    let group = def.into_group(&name)?;
    groups.insert(name, group);
  }
  Ok(groups)
}

#[cfg(test)]
mod tests {
  use super::*;
  use drover_task::{Command, Predicate};

  const YAML_GROUPS: &str = r#"
deploy:
  description: ship it
  create_workdir_before_run: true
  tasks:
    - name: scan
      command: "scan --strict"
      artifacts: ["report.json"]
    - name: push
      command: "push-release"
      depends_on: [scan]
      consumes: ["report.json"]
      abort_if: "test -f /tmp/hold-deploys"
      retries: 2
"#;

  #[test]
  fn parses_yaml_groups() {
    let groups = parse_groups(YAML_GROUPS, FileFormat::Yaml).unwrap();
    let deploy = &groups["deploy"];
    assert_eq!(deploy.tasks.len(), 2);

    let push = deploy.task("push").unwrap();
    assert_eq!(push.retries, 2);
    assert_eq!(push.consumes, vec!["report.json".to_string()]);
    assert_eq!(
      push.abort_if,
      Some(Predicate::Shell("test -f /tmp/hold-deploys".to_string()))
    );
  }

  #[test]
  fn parses_json_groups() {
    let json = r#"{
      "ci": {
        "tasks": [
          { "name": "unit", "command": "cargo test", "async": true }
        ]
      }
    }"#;

    let groups = parse_groups(json, FileFormat::Json).unwrap();
    let unit = groups["ci"].task("unit").unwrap();
    assert!(unit.run_async);
    assert_eq!(unit.command, Command::Shell("cargo test".to_string()));
  }

  #[test]
  fn rejects_unknown_extension() {
    let err = load_groups(Path::new("pipelines.toml")).unwrap_err();
    assert!(matches!(err, ConfigError::UnsupportedFormat { .. }));
  }
}
