//! Component dependency graph.
//!
//! This module handles:
//! - Reading the definition tree ([`source`])
//! - Building components and their edges ([`builder`])
//! - Caching built graphs by tree content ([`cache`])
//! - Queries over the built graph (kind lookups, closures, topological order)

pub mod builder;
pub mod cache;
pub mod source;

use std::collections::{BTreeMap, HashMap, HashSet};

use petgraph::algo::{kosaraju_scc, toposort};
use petgraph::graph::{DiGraph, NodeIndex};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::component::{Component, ComponentKind};
use crate::util::hash::DirHashError;

pub use builder::{BuildOptions, GraphBuilder};
pub use cache::GraphCache;
pub use source::DefinitionTree;

/// Errors raised while reading definitions or building the graph.
#[derive(Debug, Error)]
pub enum GraphError {
  #[error("failed to read {path}: {message}")]
  ReadFile { path: String, message: String },

  #[error("invalid definition {path}: {message}")]
  ParseYaml { path: String, message: String },

  #[error("invalid role name '{name}': expected namespace.collection.role")]
  InvalidRoleName { name: String },

  #[error("role '{name}' not found at {path}")]
  RoleNotFound { name: String, path: String },

  #[error("role '{role}' is in unmapped collection '{segment}'")]
  UnmappedKind { role: String, segment: String },

  #[error("dependency cycle detected: {chain}")]
  Cycle { chain: String },

  #[error("component '{component}' requires unknown component '{dependency}'")]
  MissingDependency { component: String, dependency: String },

  #[error("failed to build payload for '{component}': {message}")]
  Payload { component: String, message: String },

  #[error("failed to hash definition tree: {0}")]
  Hash(#[from] DirHashError),

  #[error("failed to serialize graph: {0}")]
  Serialize(#[from] serde_json::Error),
}

/// The full set of components with resolved edges.
///
/// Components are keyed by `mrn`; registration order (dependencies before
/// dependents) is kept alongside.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComponentGraph {
  components: BTreeMap<String, Component>,
  order: Vec<String>,
  namespaces: Vec<String>,
}

impl ComponentGraph {
  /// Assemble a graph from components in registration order and link
  /// `requiredby` edges.
  pub fn from_components(components: Vec<Component>) -> Result<Self, GraphError> {
    let mut graph = Self::default();
    for component in components {
      if !graph.namespaces.contains(&component.mrns) {
        graph.namespaces.push(component.mrns.clone());
      }
      graph.order.push(component.mrn.clone());
      graph.components.insert(component.mrn.clone(), component);
    }
    graph.link_requiredby()?;
    Ok(graph)
  }

  pub(crate) fn from_parts(
    components: BTreeMap<String, Component>,
    order: Vec<String>,
    namespaces: Vec<String>,
  ) -> Self {
    Self {
      components,
      order,
      namespaces,
    }
  }

  pub fn get(&self, mrn: &str) -> Option<&Component> {
    self.components.get(mrn)
  }

  pub fn contains(&self, mrn: &str) -> bool {
    self.components.contains_key(mrn)
  }

  pub fn len(&self) -> usize {
    self.components.len()
  }

  pub fn is_empty(&self) -> bool {
    self.components.is_empty()
  }

  /// Components in registration order.
  pub fn components(&self) -> impl Iterator<Item = &Component> {
    self.order.iter().filter_map(|mrn| self.components.get(mrn))
  }

  /// Distinct namespaces in first-seen order.
  pub fn namespaces(&self) -> &[String] {
    &self.namespaces
  }

  /// Append each component to the `requiredby` list of its dependencies.
  pub(crate) fn link_requiredby(&mut self) -> Result<(), GraphError> {
    for component in self.components.values_mut() {
      component.requiredby.clear();
    }
    let mut edges = Vec::new();
    for mrn in &self.order {
      let Some(component) = self.components.get(mrn) else {
        continue;
      };
      for dependency in &component.requires {
        if !self.components.contains_key(dependency) {
          return Err(GraphError::MissingDependency {
            component: mrn.clone(),
            dependency: dependency.clone(),
          });
        }
        edges.push((dependency.clone(), mrn.clone()));
      }
    }
    for (dependency, dependent) in edges {
      if let Some(target) = self.components.get_mut(&dependency)
        && !target.requiredby.contains(&dependent)
      {
        target.requiredby.push(dependent);
      }
    }
    Ok(())
  }

  /// Direct dependencies of `mrn` that are of `kind`.
  pub fn requires_of_kind(&self, mrn: &str, kind: ComponentKind) -> Vec<&Component> {
    self.neighbours_of_kind(mrn, kind, |c| &c.requires)
  }

  /// Direct dependents of `mrn` that are of `kind`.
  pub fn requiredby_of_kind(&self, mrn: &str, kind: ComponentKind) -> Vec<&Component> {
    self.neighbours_of_kind(mrn, kind, |c| &c.requiredby)
  }

  fn neighbours_of_kind<'a>(
    &'a self,
    mrn: &str,
    kind: ComponentKind,
    edges: impl Fn(&'a Component) -> &'a Vec<String>,
  ) -> Vec<&'a Component> {
    let Some(component) = self.components.get(mrn) else {
      return Vec::new();
    };
    edges(component)
      .iter()
      .filter_map(|m| self.components.get(m))
      .filter(|c| c.kind() == kind)
      .collect()
  }

  /// Transitive dependencies of `mrn`, grouped by kind.
  ///
  /// Each component appears once, in depth-first discovery order. The root
  /// itself is never included, even when the edges loop back to it.
  pub fn deep_requires(&self, mrn: &str) -> BTreeMap<ComponentKind, Vec<&Component>> {
    let mut grouped: BTreeMap<ComponentKind, Vec<&Component>> = BTreeMap::new();
    let mut visited: HashSet<&str> = HashSet::new();
    visited.insert(mrn);

    let Some(root) = self.components.get(mrn) else {
      return grouped;
    };
    let mut stack: Vec<&str> = root.requires.iter().rev().map(String::as_str).collect();

    while let Some(current) = stack.pop() {
      if !visited.insert(current) {
        continue;
      }
      let Some(component) = self.components.get(current) else {
        continue;
      };
      grouped.entry(component.kind()).or_default().push(component);
      stack.extend(component.requires.iter().rev().map(String::as_str));
    }

    grouped
  }

  /// Components ordered so that every dependency precedes its dependents.
  ///
  /// A cycle is reported with every component on it, in registration order.
  pub fn dependency_order(&self) -> Result<Vec<&Component>, GraphError> {
    let mut dag: DiGraph<&str, ()> = DiGraph::new();
    let mut indices: HashMap<&str, NodeIndex> = HashMap::new();

    for mrn in &self.order {
      indices.insert(mrn.as_str(), dag.add_node(mrn.as_str()));
    }
    for component in self.components() {
      let Some(&to) = indices.get(component.mrn.as_str()) else {
        continue;
      };
      for dependency in &component.requires {
        if let Some(&from) = indices.get(dependency.as_str()) {
          dag.add_edge(from, to, ());
        }
      }
    }

    let sorted = toposort(&dag, None).map_err(|cycle| {
      let members = kosaraju_scc(&dag)
        .into_iter()
        .find(|scc| scc.contains(&cycle.node_id()))
        .unwrap_or_else(|| vec![cycle.node_id()]);
      let mut chain: Vec<&str> = self
        .order
        .iter()
        .map(String::as_str)
        .filter(|mrn| indices.get(mrn).is_some_and(|idx| members.contains(idx)))
        .collect();
      if let Some(&first) = chain.first() {
        chain.push(first);
      }
      GraphError::Cycle {
        chain: chain.join(" -> "),
      }
    })?;

    Ok(sorted.into_iter().filter_map(|idx| self.components.get(dag[idx])).collect())
  }

  /// Components as raw JSON records keyed by `mrn`.
  pub fn to_records(&self) -> Result<BTreeMap<String, serde_json::Value>, GraphError> {
    self
      .components
      .iter()
      .map(|(mrn, component)| -> Result<_, GraphError> {
        Ok((mrn.clone(), serde_json::to_value(component)?))
      })
      .collect()
  }
}
