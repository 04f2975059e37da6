//! Component records and their per-kind payloads.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::consts::DEFAULT_CHANNEL;

pub const DEFAULT_VERSION: &str = "unknown";
pub const DEFAULT_SCOPE: &str = "global";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown component kind: {0}")]
pub struct UnknownKind(pub String);

/// The category of a component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentKind {
  Application,
  Service,
  Flow,
  Executor,
  Skill,
  Entity,
  Software,
  Function,
  Helper,
  Builder,
  Library,
  Infrastructure,
}

impl ComponentKind {
  pub const ALL: [ComponentKind; 12] = [
    ComponentKind::Application,
    ComponentKind::Service,
    ComponentKind::Flow,
    ComponentKind::Executor,
    ComponentKind::Skill,
    ComponentKind::Entity,
    ComponentKind::Software,
    ComponentKind::Function,
    ComponentKind::Helper,
    ComponentKind::Builder,
    ComponentKind::Library,
    ComponentKind::Infrastructure,
  ];

  pub fn as_str(self) -> &'static str {
    match self {
      ComponentKind::Application => "application",
      ComponentKind::Service => "service",
      ComponentKind::Flow => "flow",
      ComponentKind::Executor => "executor",
      ComponentKind::Skill => "skill",
      ComponentKind::Entity => "entity",
      ComponentKind::Software => "software",
      ComponentKind::Function => "function",
      ComponentKind::Helper => "helper",
      ComponentKind::Builder => "builder",
      ComponentKind::Library => "library",
      ComponentKind::Infrastructure => "infrastructure",
    }
  }

  /// Collection directory name and dependency grouping key for this kind.
  pub fn plural(self) -> &'static str {
    match self {
      ComponentKind::Application => "applications",
      ComponentKind::Service => "services",
      ComponentKind::Flow => "flows",
      ComponentKind::Executor => "executors",
      ComponentKind::Skill => "skills",
      ComponentKind::Entity => "entities",
      ComponentKind::Software => "softwares",
      ComponentKind::Function => "functions",
      ComponentKind::Helper => "helpers",
      ComponentKind::Builder => "builders",
      ComponentKind::Library => "libraries",
      ComponentKind::Infrastructure => "infrastructure",
    }
  }

  pub fn from_plural(plural: &str) -> Option<Self> {
    Self::ALL.into_iter().find(|kind| kind.plural() == plural)
  }

  /// Locator scheme used in `mrl`.
  pub fn scheme(self) -> &'static str {
    match self {
      ComponentKind::Application => "app",
      ComponentKind::Service => "svc",
      ComponentKind::Flow => "flow",
      ComponentKind::Executor => "executor",
      ComponentKind::Skill => "skill",
      ComponentKind::Entity => "ent",
      ComponentKind::Software => "soft",
      ComponentKind::Function => "function",
      ComponentKind::Helper => "hp",
      ComponentKind::Builder => "build",
      ComponentKind::Library => "lib",
      ComponentKind::Infrastructure => "infra",
    }
  }

  /// Whether components of this kind are shipped as container images.
  pub fn produces_image(self) -> bool {
    matches!(
      self,
      ComponentKind::Entity
        | ComponentKind::Flow
        | ComponentKind::Function
        | ComponentKind::Library
        | ComponentKind::Service
        | ComponentKind::Skill
        | ComponentKind::Software
        | ComponentKind::Executor
    )
  }
}

impl fmt::Display for ComponentKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for ComponentKind {
  type Err = UnknownKind;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    Self::ALL
      .into_iter()
      .find(|kind| kind.as_str() == s)
      .ok_or_else(|| UnknownKind(s.to_string()))
  }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationSpec {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub public_uri: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceSpec {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub public_uri: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub schema: Option<serde_json::Value>,
  #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
  pub nodeselector: BTreeMap<String, String>,
}

/// The skill a flow runs, with the stage that skill executes in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowSkill {
  pub name: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub stage: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowSpec {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub input: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub trigger: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub output: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub skill: Option<FlowSkill>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutorSpec {
  #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
  pub nodeselector: BTreeMap<String, String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub stage: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SkillSpec {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub stage: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub schema: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntitySpec {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub schema: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SoftwareSpec {
  #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
  pub nodeselector: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionSpec {
  #[serde(default)]
  pub language: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LibrarySpec {
  #[serde(default)]
  pub languages: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmptySpec {}

/// Kind-specific payload, tagged on the wire by `mrk`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mrk", rename_all = "snake_case")]
pub enum KindSpec {
  Application(ApplicationSpec),
  Service(ServiceSpec),
  Flow(FlowSpec),
  Executor(ExecutorSpec),
  Skill(SkillSpec),
  Entity(EntitySpec),
  Software(SoftwareSpec),
  Function(FunctionSpec),
  Helper(EmptySpec),
  Builder(EmptySpec),
  Library(LibrarySpec),
  Infrastructure(EmptySpec),
}

impl KindSpec {
  /// An empty payload for `kind`.
  pub fn empty(kind: ComponentKind) -> Self {
    match kind {
      ComponentKind::Application => KindSpec::Application(ApplicationSpec::default()),
      ComponentKind::Service => KindSpec::Service(ServiceSpec::default()),
      ComponentKind::Flow => KindSpec::Flow(FlowSpec::default()),
      ComponentKind::Executor => KindSpec::Executor(ExecutorSpec::default()),
      ComponentKind::Skill => KindSpec::Skill(SkillSpec::default()),
      ComponentKind::Entity => KindSpec::Entity(EntitySpec::default()),
      ComponentKind::Software => KindSpec::Software(SoftwareSpec::default()),
      ComponentKind::Function => KindSpec::Function(FunctionSpec::default()),
      ComponentKind::Helper => KindSpec::Helper(EmptySpec::default()),
      ComponentKind::Builder => KindSpec::Builder(EmptySpec::default()),
      ComponentKind::Library => KindSpec::Library(LibrarySpec::default()),
      ComponentKind::Infrastructure => KindSpec::Infrastructure(EmptySpec::default()),
    }
  }

  pub fn kind(&self) -> ComponentKind {
    match self {
      KindSpec::Application(_) => ComponentKind::Application,
      KindSpec::Service(_) => ComponentKind::Service,
      KindSpec::Flow(_) => ComponentKind::Flow,
      KindSpec::Executor(_) => ComponentKind::Executor,
      KindSpec::Skill(_) => ComponentKind::Skill,
      KindSpec::Entity(_) => ComponentKind::Entity,
      KindSpec::Software(_) => ComponentKind::Software,
      KindSpec::Function(_) => ComponentKind::Function,
      KindSpec::Helper(_) => ComponentKind::Helper,
      KindSpec::Builder(_) => ComponentKind::Builder,
      KindSpec::Library(_) => ComponentKind::Library,
      KindSpec::Infrastructure(_) => ComponentKind::Infrastructure,
    }
  }

  /// Execution stage for kinds that carry one.
  pub fn stage(&self) -> Option<&str> {
    match self {
      KindSpec::Executor(spec) => spec.stage.as_deref(),
      KindSpec::Skill(spec) => spec.stage.as_deref(),
      _ => None,
    }
  }
}

/// The version currently marked active on a channel.
///
/// A single observed id is reported as-is; several unmarked ids are reported
/// as a list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CurrentVersion {
  One(String),
  Many(Vec<String>),
}

/// Observed state of one component on one channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateRecord {
  /// Observed build ids.
  pub mrv: Vec<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub mrv_cur: Option<CurrentVersion>,
  pub exists: bool,
  pub fresh: bool,
  pub build: bool,
}

fn default_scope() -> String {
  DEFAULT_SCOPE.to_string()
}

/// One deployable unit of the platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Component {
  pub mrn: String,
  pub mrsn: String,
  pub mrns: String,
  pub mrv: String,
  pub mrt: Vec<String>,
  pub mrl: String,
  pub mrc: String,
  #[serde(default = "default_scope")]
  pub mrs: String,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub author: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub labels: Option<serde_json::Value>,

  #[serde(default)]
  pub path: PathBuf,
  #[serde(default)]
  pub relpath: PathBuf,

  #[serde(default)]
  pub requires: Vec<String>,
  #[serde(default)]
  pub requiredby: Vec<String>,

  /// Direct dependencies grouped by kind, keyed by plural kind name.
  #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
  pub groups: BTreeMap<String, Vec<String>>,
  /// First dependency of each kind, keyed by singular kind name.
  #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
  pub primary: BTreeMap<String, String>,

  #[serde(default)]
  pub mri: BTreeMap<String, String>,
  #[serde(default)]
  pub state: BTreeMap<String, StateRecord>,

  #[serde(flatten)]
  spec: KindSpec,
}

impl Component {
  /// A component with default identifiers and version, carrying `spec`.
  pub fn new(mrn: impl Into<String>, spec: KindSpec) -> Self {
    Self {
      mrn: mrn.into(),
      mrsn: String::new(),
      mrns: String::new(),
      mrv: DEFAULT_VERSION.to_string(),
      mrt: vec![DEFAULT_CHANNEL.to_string()],
      mrl: String::new(),
      mrc: String::new(),
      mrs: default_scope(),
      author: None,
      description: None,
      labels: None,
      path: PathBuf::new(),
      relpath: PathBuf::new(),
      requires: Vec::new(),
      requiredby: Vec::new(),
      groups: BTreeMap::new(),
      primary: BTreeMap::new(),
      mri: BTreeMap::new(),
      state: BTreeMap::new(),
      spec,
    }
  }

  pub fn kind(&self) -> ComponentKind {
    self.spec.kind()
  }

  pub fn spec(&self) -> &KindSpec {
    &self.spec
  }
}
