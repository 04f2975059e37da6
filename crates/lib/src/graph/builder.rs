//! Graph construction from a definition tree.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use tracing::{debug, info, trace};

use super::source::{DefinitionTree, FlowVars, RoleDef};
use super::{ComponentGraph, GraphError};
use crate::component::{
  Component, ComponentKind, DEFAULT_VERSION, FlowSkill, KindSpec, normalize_name, schema,
};
use crate::consts::DEFAULT_CHANNEL;
use crate::util::hash::Hashable;

/// Settings that influence derived component fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildOptions {
  /// Domain appended to short names to form `public_uri`.
  pub domain: Option<String>,
  /// Prefix of image references, e.g. `registry.example.org`.
  pub image_registry: String,
}

impl Hashable for BuildOptions {}

/// Builds a [`ComponentGraph`] by walking plays depth-first.
///
/// Dependencies are registered before their dependents and memoized by
/// `mrn`. A reference to a component that is still being constructed is a
/// cycle and aborts the build.
pub struct GraphBuilder<'a> {
  tree: &'a DefinitionTree,
  options: &'a BuildOptions,
  components: BTreeMap<String, Component>,
  order: Vec<String>,
  namespaces: Vec<String>,
  in_progress: Vec<String>,
}

impl<'a> GraphBuilder<'a> {
  pub fn new(tree: &'a DefinitionTree, options: &'a BuildOptions) -> Self {
    Self {
      tree,
      options,
      components: BTreeMap::new(),
      order: Vec::new(),
      namespaces: Vec::new(),
      in_progress: Vec::new(),
    }
  }

  pub fn build(mut self) -> Result<ComponentGraph, GraphError> {
    let plays = self.tree.load_plays()?;
    for play in &plays {
      debug!(play = %play.name, roles = play.roles.len(), "registering play");
      for role in &play.roles {
        self.add_component(role, &play.name)?;
      }
    }

    let mut graph = ComponentGraph::from_parts(self.components, self.order, self.namespaces);
    graph.link_requiredby()?;
    info!(
      components = graph.len(),
      namespaces = graph.namespaces().len(),
      "built component graph"
    );
    Ok(graph)
  }

  fn add_component(&mut self, name: &str, group_path: &str) -> Result<String, GraphError> {
    let mrn = normalize_name(name);
    if self.components.contains_key(&mrn) {
      return Ok(mrn);
    }
    if let Some(start) = self.in_progress.iter().position(|m| *m == mrn) {
      let mut chain = self.in_progress[start..].to_vec();
      chain.push(mrn);
      return Err(GraphError::Cycle {
        chain: chain.join(" -> "),
      });
    }

    self.in_progress.push(mrn.clone());
    let result = self.construct(name, &mrn, group_path);
    self.in_progress.pop();
    let component = result?;

    trace!(mrn = %mrn, kind = %component.kind(), "registered component");
    self.order.push(mrn.clone());
    self.components.insert(mrn.clone(), component);
    Ok(mrn)
  }

  fn construct(&mut self, name: &str, mrn: &str, group_path: &str) -> Result<Component, GraphError> {
    let role = self.tree.resolve_role(name)?;
    let metadata = role.metadata()?;
    let kind = role.kind()?;

    let mrsn = name.rsplit('.').next().unwrap_or(name).replace('_', "-");
    let mrns = name.split('.').next().unwrap_or(name).to_string();
    if !self.namespaces.contains(&mrns) {
      self.namespaces.push(mrns.clone());
    }

    let child_group = if kind == ComponentKind::Executor {
      group_path.to_string()
    } else {
      format!("{group_path}/{mrsn}")
    };
    let mut dependencies = role.direct_dependencies()?;
    for include in role.included_roles()? {
      if !dependencies.contains(&include) {
        dependencies.push(include);
      }
    }
    let mut requires: Vec<String> = Vec::new();
    for dependency in &dependencies {
      let dependency_mrn = self.add_component(dependency, &child_group)?;
      if !requires.contains(&dependency_mrn) {
        requires.push(dependency_mrn);
      }
    }

    let mrc = format!("{}.{}", group_path.replace('/', "."), mrsn);
    let mrl = format!("{}://{}/{}", kind.scheme(), group_path, mrsn);
    let mrv = metadata.version().unwrap_or_else(|| DEFAULT_VERSION.to_string());
    let mrt = metadata
      .tags
      .clone()
      .unwrap_or_else(|| vec![DEFAULT_CHANNEL.to_string()]);

    let mut groups: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for dependency in &requires {
      if let Some(found) = self.components.get(dependency) {
        groups
          .entry(found.kind().plural().to_string())
          .or_default()
          .push(dependency.clone());
      }
    }
    groups.retain(|plural, _| schema::allows(kind, plural));
    let primary: BTreeMap<String, String> = groups
      .iter()
      .filter_map(|(plural, members)| {
        let singular = ComponentKind::from_plural(plural)?.as_str();
        Some((singular.to_string(), members.first()?.clone()))
      })
      .collect();

    let mut fields = Map::new();
    if let Some(domain) = &self.options.domain {
      fields.insert("public_uri".into(), json!(format!("{mrsn}.{domain}")));
    }
    let schema_file = role.path.join("files").join(format!("{}.proto", mrsn.replace('-', "_")));
    fields.insert("schema".into(), json!(schema_file.display().to_string()));
    if let Some(label) = group_path.split('/').next().filter(|l| !l.is_empty()) {
      fields.insert("nodeselector".into(), json!(BTreeMap::from([(label, "true")])));
    }
    if let Some(stage) = &metadata.stage {
      fields.insert("stage".into(), json!(stage));
    }
    match kind {
      ComponentKind::Library => {
        fields.insert("languages".into(), json!(mrt));
      }
      ComponentKind::Function => {
        fields.insert("language".into(), json!(role.function_language()));
      }
      ComponentKind::Flow => {
        if let Some(vars) = role.flow_vars()? {
          insert_flow_vars(&mut fields, vars, mrn, &role, &mrc);
        }
        if let Some(skill) = primary.get(ComponentKind::Skill.as_str()) {
          let stage = self
            .components
            .get(skill)
            .and_then(|c| c.spec().stage())
            .map(str::to_string);
          let flow_skill = FlowSkill {
            name: skill.clone(),
            stage,
          };
          fields.insert("skill".into(), serde_json::to_value(flow_skill)?);
        }
      }
      _ => {}
    }

    let mut payload = schema::project(kind, fields);
    payload.insert("mrk".into(), json!(kind.as_str()));
    let spec: KindSpec = serde_json::from_value(Value::Object(payload)).map_err(|e| GraphError::Payload {
      component: mrn.to_string(),
      message: e.to_string(),
    })?;

    let mut component = Component::new(mrn, spec);
    component.mrsn = mrsn;
    component.mrns = mrns;
    component.mrv = mrv;
    component.mrt = mrt;
    component.mrl = mrl;
    component.mrc = mrc;
    if let Some(scope) = metadata.scope.clone() {
      component.mrs = scope;
    }
    component.author = metadata.author.clone();
    component.description = metadata.description.clone();
    component.labels = metadata.labels_json();
    component.path = role.path.clone();
    component.relpath = role.relpath.clone();
    component.requires = requires;
    component.groups = groups;
    component.primary = primary;
    if kind.produces_image() {
      component.mri = image_refs(&self.options.image_registry, &component);
    }
    Ok(component)
  }
}

fn insert_flow_vars(fields: &mut Map<String, Value>, vars: FlowVars, mrn: &str, role: &RoleDef, mrc: &str) {
  if let Some(input) = vars.input {
    let placeholder = format!("{{{{ {mrn}.path }}}}");
    let input = input.replace(&placeholder, &role.path.display().to_string());
    fields.insert("input".into(), json!(input));
  }
  if let Some(trigger) = vars.trigger {
    fields.insert("trigger".into(), json!(resolve_mrc_ref(&trigger, mrn, mrc)));
  }
  fields.insert("output".into(), json!(resolve_mrc_ref(&vars.output, mrn, mrc)));
}

/// Replace a templated `<mrn>.mrc` reference with the concrete `mrc`.
fn resolve_mrc_ref(value: &str, mrn: &str, mrc: &str) -> String {
  let reference = format!("{mrn}.mrc");
  if !value.contains(&reference) {
    return value.to_string();
  }
  value
    .replace("{{", "")
    .replace("}}", "")
    .replace(&reference, mrc)
    .replace(' ', "")
}

/// Image reference per channel: `<registry>/<repository>:<mrv>_<channel>`.
fn image_refs(registry: &str, component: &Component) -> BTreeMap<String, String> {
  let repository = component.mrn.replace("__", "/").replace('_', "-");
  let base = if registry.is_empty() {
    repository
  } else {
    format!("{}/{}", registry.trim_end_matches('/'), repository)
  };
  component
    .mrt
    .iter()
    .map(|channel| (channel.clone(), format!("{base}:{}_{channel}", component.mrv)))
    .collect()
}
