//! Test utilities for platstate-lib.
//!
//! Helpers for laying out definition trees and stand-in executables in
//! temporary directories.

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::graph::DefinitionTree;

/// A definition tree rooted in a temporary directory.
pub struct TreeFixture {
  dir: TempDir,
}

impl TreeFixture {
  pub fn new() -> Self {
    Self {
      dir: TempDir::new().unwrap(),
    }
  }

  pub fn root(&self) -> &Path {
    self.dir.path()
  }

  pub fn tree(&self) -> DefinitionTree {
    DefinitionTree::new(self.root())
  }

  pub fn playbook(&self, content: &str) {
    fs::write(self.root().join("platform.yaml"), content).unwrap();
  }

  /// Create (or reopen) the directory of role `ns.collection.role`.
  pub fn role(&self, name: &str) -> RoleFixture {
    let parts: Vec<&str> = name.split('.').collect();
    let path = self
      .root()
      .join(parts[0])
      .join(parts[1])
      .join("roles")
      .join(parts[2]);
    fs::create_dir_all(&path).unwrap();
    RoleFixture { path }
  }
}

pub struct RoleFixture {
  path: PathBuf,
}

impl RoleFixture {
  pub fn file(&self, rel: &str, content: &str) -> &Self {
    let path = self.path.join(rel);
    if let Some(parent) = path.parent() {
      fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
    self
  }
}

/// Write an executable shell script and return its path.
#[cfg(unix)]
pub fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
  use std::os::unix::fs::PermissionsExt;

  let path = dir.join(name);
  fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
  fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
  path
}
