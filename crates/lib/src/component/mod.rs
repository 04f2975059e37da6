//! Component model.
//!
//! A [`Component`] is one deployable unit of the platform, identified by its
//! `mrn`. Kind-specific fields live in a [`KindSpec`] payload whose allowed
//! fields are defined in [`schema`].

pub mod schema;
mod types;

pub use types::*;

/// Derive a component key from a dotted role name.
///
/// `-` becomes `_` and `.` becomes `__`, so `core.services.svc-a` maps to
/// `core__services__svc_a`.
pub fn normalize_name(name: &str) -> String {
  name.replace('-', "_").replace('.', "__")
}

/// Derive a registry repository key: `/` becomes `__` and `-` becomes `_`.
pub fn repository_key(repository: &str) -> String {
  repository.replace('/', "__").replace('-', "_")
}
