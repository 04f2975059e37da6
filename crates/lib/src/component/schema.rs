//! Per-kind field allow-lists.
//!
//! Each kind accepts a fixed set of payload fields plus the dependency
//! groupings it may carry. Candidate field maps are projected onto this list
//! before a payload is constructed, so a kind never picks up fields that
//! belong to another kind.

use serde_json::{Map, Value};

use super::types::ComponentKind;

use ComponentKind::*;

/// Payload fields accepted by `kind`.
pub fn payload_fields(kind: ComponentKind) -> &'static [&'static str] {
  match kind {
    Application => &["public_uri"],
    Service => &["public_uri", "schema", "nodeselector"],
    Flow => &["input", "trigger", "output", "skill"],
    Executor => &["nodeselector", "stage"],
    Skill => &["stage", "schema"],
    Entity => &["schema"],
    Software => &["nodeselector"],
    Function => &["language"],
    Library => &["languages"],
    Helper | Builder | Infrastructure => &[],
  }
}

/// Dependency kinds `kind` keeps as groupings.
pub fn grouping_kinds(kind: ComponentKind) -> &'static [ComponentKind] {
  match kind {
    Application => &[
      Service, Flow, Skill, Entity, Function, Software, Library, Executor, Helper,
    ],
    Service => &[Service, Entity, Library, Software, Function, Helper, Builder],
    Flow => &[Skill, Entity, Service, Function, Executor],
    Executor => &[Flow, Skill, Service, Software, Helper],
    Skill => &[Entity, Function, Library, Service, Software, Helper, Builder],
    Entity => &[Entity, Library, Helper],
    Software => &[Software, Library, Helper, Builder],
    Function => &[Library, Entity, Helper, Builder],
    Library => &[Library, Helper, Builder],
    Helper | Builder => &[Helper],
    Infrastructure => &[Infrastructure, Software, Service, Helper],
  }
}

/// Whether `field` is a payload field or grouping name of `kind`.
pub fn allows(kind: ComponentKind, field: &str) -> bool {
  payload_fields(kind).contains(&field)
    || grouping_kinds(kind)
      .iter()
      .any(|dep| dep.plural() == field || dep.as_str() == field)
}

/// Filter `fields` down to the allow-list of `kind`.
pub fn project(kind: ComponentKind, fields: Map<String, Value>) -> Map<String, Value> {
  fields.into_iter().filter(|(name, _)| allows(kind, name)).collect()
}
