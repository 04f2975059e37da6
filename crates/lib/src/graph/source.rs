//! Reading the component definition tree.
//!
//! A definition tree is a playbook (`platform.yaml`) listing plays, plus role
//! directories laid out as `<namespace>/<collection>/roles/<role>`. The
//! collection directory name selects the component kind.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{trace, warn};
use walkdir::WalkDir;

use super::GraphError;
use crate::component::ComponentKind;
use crate::consts::PLAYBOOK_FILE;
use crate::util::hash::{ContentHash, hash_directory};

/// Directory names skipped when hashing a definition tree.
const HASH_EXCLUDES: &[&str] = &[".git"];

/// A play: a group path and the roles registered under it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Play {
  pub name: String,
  pub roles: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RawPlay {
  name: String,
  #[serde(default)]
  roles: Vec<RoleRef>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RoleRef {
  Name(String),
  Table {
    #[serde(alias = "name")]
    role: String,
  },
}

impl RoleRef {
  fn into_name(self) -> String {
    match self {
      RoleRef::Name(name) | RoleRef::Table { role: name } => name,
    }
  }
}

#[derive(Debug, Default, Deserialize)]
struct RoleMeta {
  #[serde(default)]
  dependencies: Vec<RoleRef>,
}

#[derive(Debug, Default, Deserialize)]
struct MetadataFile {
  #[serde(default)]
  plasma: Option<Metadata>,
}

/// Descriptive metadata of a role, from `meta/plasma.yaml`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Metadata {
  #[serde(default)]
  pub author: Option<String>,
  #[serde(default)]
  pub description: Option<String>,
  #[serde(default)]
  pub labels: Option<serde_yaml::Value>,
  #[serde(default)]
  pub version: Option<serde_yaml::Value>,
  #[serde(default)]
  pub scope: Option<String>,
  #[serde(default)]
  pub tags: Option<Vec<String>>,
  #[serde(default)]
  pub stage: Option<String>,
}

impl Metadata {
  /// The declared version rendered as a string; numeric versions are accepted.
  pub fn version(&self) -> Option<String> {
    match self.version.as_ref()? {
      serde_yaml::Value::String(s) => Some(s.clone()),
      serde_yaml::Value::Number(n) => Some(n.to_string()),
      serde_yaml::Value::Bool(b) => Some(b.to_string()),
      _ => None,
    }
  }

  pub fn labels_json(&self) -> Option<serde_json::Value> {
    self.labels.as_ref().and_then(|labels| serde_json::to_value(labels).ok())
  }
}

/// Flow wiring variables declared in `tasks/main.yaml`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlowVars {
  pub input: Option<String>,
  pub trigger: Option<String>,
  pub output: String,
}

#[derive(Debug, Deserialize)]
struct Task {
  #[serde(default)]
  vars: Option<TaskVars>,
}

#[derive(Debug, Deserialize)]
struct TaskVars {
  #[serde(default)]
  flow_input: Option<String>,
  #[serde(default)]
  flow_trigger: Option<String>,
  #[serde(default)]
  flow_output: Option<String>,
}

/// A component definition tree on disk.
#[derive(Debug, Clone)]
pub struct DefinitionTree {
  root: PathBuf,
  playbook: PathBuf,
}

impl DefinitionTree {
  pub fn new(root: impl Into<PathBuf>) -> Self {
    Self {
      root: root.into(),
      playbook: PathBuf::from(PLAYBOOK_FILE),
    }
  }

  /// Use a playbook other than `platform.yaml`, relative to the root.
  pub fn with_playbook(mut self, playbook: impl Into<PathBuf>) -> Self {
    self.playbook = playbook.into();
    self
  }

  pub fn root(&self) -> &Path {
    &self.root
  }

  /// Playbook path relative to the root.
  pub fn playbook(&self) -> &Path {
    &self.playbook
  }

  pub fn playbook_path(&self) -> PathBuf {
    self.root.join(&self.playbook)
  }

  /// Hash of every file under the root, used as the graph cache key.
  pub fn content_hash(&self) -> Result<ContentHash, GraphError> {
    Ok(hash_directory(&self.root, HASH_EXCLUDES)?)
  }

  pub fn load_plays(&self) -> Result<Vec<Play>, GraphError> {
    let path = self.playbook_path();
    let raw: Vec<RawPlay> = read_yaml(&path)?;
    Ok(
      raw
        .into_iter()
        .map(|play| Play {
          name: play.name,
          roles: play.roles.into_iter().map(RoleRef::into_name).collect(),
        })
        .collect(),
    )
  }

  /// Resolve `namespace.collection.role` to its role directory.
  pub fn resolve_role(&self, name: &str) -> Result<RoleDef, GraphError> {
    let parts: Vec<&str> = name.split('.').collect();
    let [namespace, collection, role] = parts.as_slice() else {
      return Err(GraphError::InvalidRoleName { name: name.to_string() });
    };
    if [namespace, collection, role].iter().any(|part| part.is_empty()) {
      return Err(GraphError::InvalidRoleName { name: name.to_string() });
    }

    let relpath = PathBuf::from(namespace).join(collection).join("roles").join(role);
    let path = self.root.join(&relpath);
    if !path.is_dir() {
      return Err(GraphError::RoleNotFound {
        name: name.to_string(),
        path: path.display().to_string(),
      });
    }

    Ok(RoleDef {
      name: name.to_string(),
      path,
      relpath,
    })
  }
}

/// A resolved role directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleDef {
  pub name: String,
  pub path: PathBuf,
  pub relpath: PathBuf,
}

impl RoleDef {
  /// Kind selected by the collection directory, the third-from-last path component.
  pub fn kind(&self) -> Result<ComponentKind, GraphError> {
    let segment = self
      .path
      .components()
      .rev()
      .nth(2)
      .and_then(|c| c.as_os_str().to_str())
      .unwrap_or_default();
    ComponentKind::from_plural(segment).ok_or_else(|| GraphError::UnmappedKind {
      role: self.name.clone(),
      segment: segment.to_string(),
    })
  }

  /// Metadata from `meta/plasma.yaml`; a missing file yields empty metadata.
  pub fn metadata(&self) -> Result<Metadata, GraphError> {
    let Some(path) = find_yaml(&self.path.join("meta"), "plasma") else {
      warn!(role = %self.name, "no metadata file, using defaults");
      return Ok(Metadata::default());
    };
    let file: Option<MetadataFile> = read_yaml(&path)?;
    match file.and_then(|f| f.plasma) {
      Some(metadata) => Ok(metadata),
      None => {
        warn!(role = %self.name, path = %path.display(), "metadata file has no plasma section");
        Ok(Metadata::default())
      }
    }
  }

  /// Dependencies declared in `meta/main.yaml`.
  pub fn direct_dependencies(&self) -> Result<Vec<String>, GraphError> {
    let Some(path) = find_yaml(&self.path.join("meta"), "main") else {
      return Ok(Vec::new());
    };
    let meta: Option<RoleMeta> = read_yaml(&path)?;
    Ok(
      meta
        .unwrap_or_default()
        .dependencies
        .into_iter()
        .map(RoleRef::into_name)
        .collect(),
    )
  }

  /// Roles pulled in through `include_role` in any YAML file of the role.
  pub fn included_roles(&self) -> Result<Vec<String>, GraphError> {
    let mut includes = Vec::new();
    for entry in WalkDir::new(&self.path).sort_by_file_name() {
      let entry = entry.map_err(|e| GraphError::ReadFile {
        path: self.path.display().to_string(),
        message: e.to_string(),
      })?;
      if !entry.file_type().is_file() || !is_yaml(entry.path()) {
        continue;
      }
      let content = read_to_string(entry.path())?;
      for name in scan_includes(&content) {
        if !includes.contains(&name) {
          trace!(role = %self.name, include = %name, "found include");
          includes.push(name);
        }
      }
    }
    Ok(includes)
  }

  /// Flow wiring from the first task in `tasks/main.yaml` declaring `flow_output`.
  pub fn flow_vars(&self) -> Result<Option<FlowVars>, GraphError> {
    let Some(path) = find_yaml(&self.path.join("tasks"), "main") else {
      return Ok(None);
    };
    let tasks: Option<Vec<Task>> = read_yaml(&path)?;
    let vars = tasks
      .unwrap_or_default()
      .into_iter()
      .filter_map(|task| task.vars)
      .find(|vars| vars.flow_output.is_some());
    Ok(vars.map(|vars| FlowVars {
      input: vars.flow_input,
      trigger: vars.flow_trigger,
      output: vars.flow_output.unwrap_or_default(),
    }))
  }

  /// Language of a function, from the extension of its first file.
  pub fn function_language(&self) -> String {
    let files = self.path.join("files");
    let first = WalkDir::new(&files)
      .min_depth(1)
      .max_depth(1)
      .sort_by_file_name()
      .into_iter()
      .filter_map(Result::ok)
      .find(|entry| entry.file_type().is_file());
    let extension = first
      .as_ref()
      .and_then(|entry| entry.path().extension())
      .and_then(|ext| ext.to_str());
    match extension {
      Some("go") => "golang".to_string(),
      Some("scala") => "scala".to_string(),
      _ => String::new(),
    }
  }
}

/// Role names from a `name:` line directly after each `include_role:` line.
fn scan_includes(content: &str) -> Vec<String> {
  let mut names = Vec::new();
  let mut pending = false;
  for line in content.lines() {
    if pending {
      pending = false;
      let name = line
        .trim()
        .strip_prefix("name:")
        .map(|rest| rest.trim().trim_matches(['"', '\'']))
        .unwrap_or_default();
      if !name.is_empty() && !names.iter().any(|n| n == name) {
        names.push(name.to_string());
      }
    }
    if line.trim_start().starts_with("include_role:") {
      pending = true;
    }
  }
  names
}

fn is_yaml(path: &Path) -> bool {
  matches!(path.extension().and_then(|e| e.to_str()), Some("yaml" | "yml"))
}

fn find_yaml(dir: &Path, stem: &str) -> Option<PathBuf> {
  ["yaml", "yml"]
    .iter()
    .map(|ext| dir.join(format!("{stem}.{ext}")))
    .find(|path| path.is_file())
}

fn read_to_string(path: &Path) -> Result<String, GraphError> {
  fs::read_to_string(path).map_err(|e| GraphError::ReadFile {
    path: path.display().to_string(),
    message: e.to_string(),
  })
}

fn read_yaml<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, GraphError> {
  let content = read_to_string(path)?;
  serde_yaml::from_str(&content).map_err(|e| GraphError::ParseYaml {
    path: path.display().to_string(),
    message: e.to_string(),
  })
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::util::testutil::TreeFixture;

  mod includes {
    use super::*;

    #[test]
    fn name_on_following_line_is_collected() {
      let content = "- name: run\n  include_role:\n    name: core.helpers.common\n";
      assert_eq!(scan_includes(content), vec!["core.helpers.common"]);
    }

    #[test]
    fn duplicates_are_collapsed() {
      let content = "- name: one\n  include_role:\n    name: a.b.c\n- name: two\n  include_role:\n    name: 'a.b.c'\n";
      assert_eq!(scan_includes(content), vec!["a.b.c"]);
    }

    #[test]
    fn other_include_options_are_not_roles() {
      let content = "- name: setup\n  include_role:\n    tasks_from: setup.yaml\n    name: a.b.c\n";
      assert!(scan_includes(content).is_empty());
    }

    #[test]
    fn include_role_must_start_the_line() {
      let content = "# see include_role: docs\n  name: a.b.c\n";
      assert!(scan_includes(content).is_empty());
    }

    #[test]
    fn included_roles_walks_all_yaml_files() {
      let fixture = TreeFixture::new();
      fixture.role("core.services.api").file(
        "tasks/main.yaml",
        "- name: log\n  include_role:\n    name: core.helpers.log\n",
      );
      fixture.role("core.services.api").file(
        "tasks/extra.yml",
        "- name: user\n  include_role:\n    name: core.entities.user\n",
      );
      fixture.role("core.services.api").file("files/notes.txt", "include_role:\nname: x.y.z\n");

      let role = fixture.tree().resolve_role("core.services.api").unwrap();
      assert_eq!(
        role.included_roles().unwrap(),
        vec!["core.entities.user", "core.helpers.log"]
      );
    }
  }

  mod roles {
    use super::*;

    #[test]
    fn resolve_requires_three_segments() {
      let fixture = TreeFixture::new();
      let err = fixture.tree().resolve_role("core.services").unwrap_err();
      assert!(matches!(err, GraphError::InvalidRoleName { .. }));
    }

    #[test]
    fn resolve_missing_directory_fails() {
      let fixture = TreeFixture::new();
      let err = fixture.tree().resolve_role("core.services.nope").unwrap_err();
      assert!(matches!(err, GraphError::RoleNotFound { .. }));
    }

    #[test]
    fn kind_comes_from_collection() {
      let fixture = TreeFixture::new();
      fixture.role("core.entities.user");
      fixture.role("core.widgets.thing");

      let tree = fixture.tree();
      assert_eq!(tree.resolve_role("core.entities.user").unwrap().kind().unwrap(), ComponentKind::Entity);
      let err = tree.resolve_role("core.widgets.thing").unwrap().kind().unwrap_err();
      assert!(matches!(err, GraphError::UnmappedKind { ref segment, .. } if segment == "widgets"));
    }

    #[test]
    fn missing_metadata_is_empty() {
      let fixture = TreeFixture::new();
      fixture.role("core.entities.user");
      let role = fixture.tree().resolve_role("core.entities.user").unwrap();
      assert_eq!(role.metadata().unwrap(), Metadata::default());
    }

    #[test]
    fn numeric_version_is_stringified() {
      let fixture = TreeFixture::new();
      fixture
        .role("core.entities.user")
        .file("meta/plasma.yaml", "plasma:\n  version: 7\n  author: ops\n");
      let metadata = fixture.tree().resolve_role("core.entities.user").unwrap().metadata().unwrap();
      assert_eq!(metadata.version().as_deref(), Some("7"));
      assert_eq!(metadata.author.as_deref(), Some("ops"));
    }

    #[test]
    fn dependencies_accept_strings_and_tables() {
      let fixture = TreeFixture::new();
      fixture.role("core.services.api").file(
        "meta/main.yml",
        "dependencies:\n  - core.entities.user\n  - role: core.helpers.log\n  - name: core.libraries.base\n",
      );
      let role = fixture.tree().resolve_role("core.services.api").unwrap();
      assert_eq!(
        role.direct_dependencies().unwrap(),
        vec!["core.entities.user", "core.helpers.log", "core.libraries.base"]
      );
    }

    #[test]
    fn malformed_meta_is_an_error() {
      let fixture = TreeFixture::new();
      fixture.role("core.services.api").file("meta/main.yaml", "dependencies: [unclosed\n");
      let role = fixture.tree().resolve_role("core.services.api").unwrap();
      assert!(matches!(role.direct_dependencies(), Err(GraphError::ParseYaml { .. })));
    }

    #[test]
    fn function_language_from_first_file() {
      let fixture = TreeFixture::new();
      fixture.role("core.functions.resize").file("files/main.go", "package main");
      fixture.role("core.functions.other").file("files/job.py", "");
      let tree = fixture.tree();
      assert_eq!(tree.resolve_role("core.functions.resize").unwrap().function_language(), "golang");
      assert_eq!(tree.resolve_role("core.functions.other").unwrap().function_language(), "");
    }

    #[test]
    fn flow_vars_from_first_task_with_output() {
      let fixture = TreeFixture::new();
      fixture.role("core.flows.ingest").file(
        "tasks/main.yaml",
        "- name: noop\n  debug: {}\n- name: wire\n  vars:\n    flow_input: in\n    flow_trigger: tick\n    flow_output: out\n",
      );
      let vars = fixture.tree().resolve_role("core.flows.ingest").unwrap().flow_vars().unwrap();
      assert_eq!(
        vars,
        Some(FlowVars {
          input: Some("in".to_string()),
          trigger: Some("tick".to_string()),
          output: "out".to_string(),
        })
      );
    }
  }

  #[test]
  fn plays_accept_role_tables() {
    let fixture = TreeFixture::new();
    fixture.playbook("- name: edge\n  roles:\n    - core.services.api\n    - role: core.flows.ingest\n");
    let plays = fixture.tree().load_plays().unwrap();
    assert_eq!(
      plays,
      vec![Play {
        name: "edge".to_string(),
        roles: vec!["core.services.api".to_string(), "core.flows.ingest".to_string()],
      }]
    );
  }
}
