//! Shared test helpers for CLI integration tests.

use std::path::PathBuf;

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use tempfile::TempDir;

/// Playbook with one service depending on one entity.
pub const PLAYBOOK: &str = "- name: edge\n  roles:\n    - core.services.svc-a\n";

/// Isolated test environment.
///
/// Each test gets its own definition tree plus isolated config, data and
/// cache directories.
pub struct TestEnv {
  pub temp: TempDir,
}

impl TestEnv {
  /// A definition tree with `core.services.svc-a` (version 7) requiring
  /// `core.entities.user` (version 1.2).
  pub fn new() -> Self {
    let env = Self::empty();
    env.write_file("defs/platform.yaml", PLAYBOOK);
    env.write_file(
      "defs/core/services/roles/svc-a/meta/main.yaml",
      "dependencies:\n  - core.entities.user\n",
    );
    env.write_file(
      "defs/core/services/roles/svc-a/meta/plasma.yaml",
      "plasma:\n  author: platform-team\n  version: 7\n",
    );
    env.write_file(
      "defs/core/entities/roles/user/meta/plasma.yaml",
      "plasma:\n  version: '1.2'\n",
    );
    env
  }

  /// An environment without a definition tree.
  pub fn empty() -> Self {
    Self {
      temp: TempDir::new().unwrap(),
    }
  }

  /// Write a file relative to the temp directory.
  pub fn write_file(&self, relative_path: &str, content: &str) {
    let path = self.temp.path().join(relative_path);
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, content).unwrap();
  }

  pub fn definitions_path(&self) -> PathBuf {
    self.temp.path().join("defs")
  }

  /// Write the default config file with host versions taken from
  /// `host_vars` (`NAME=value` lines) and an unreachable `kubectl`.
  pub fn write_config(&self, host_vars: &[&str], extra: &str) {
    let echo = if host_vars.is_empty() {
      "true".to_string()
    } else {
      host_vars.iter().map(|v| format!("echo {v}")).collect::<Vec<_>>().join("; ")
    };
    let content = format!(
      "definitions: {}\nhost_env:\n  type: shell\n  command: \"{}\"\nkubectl: /nonexistent/kubectl\nimage_lister: null\n{}",
      self.definitions_path().display(),
      echo,
      extra
    );
    self.write_file("config/platstate/config.yaml", &content);
  }

  /// Data path for snapshots.
  pub fn data_path(&self) -> PathBuf {
    let p = self.temp.path().join("data");
    std::fs::create_dir_all(&p).unwrap();
    dunce::canonicalize(&p).unwrap_or(p)
  }

  pub fn snapshot_path(&self) -> PathBuf {
    self.data_path().join("platstate").join("state.json")
  }

  pub fn history_path(&self) -> PathBuf {
    self.data_path().join("platstate").join("history")
  }

  /// Cache path for serialized graphs.
  pub fn cache_path(&self) -> PathBuf {
    let p = self.temp.path().join("cache");
    std::fs::create_dir_all(&p).unwrap();
    dunce::canonicalize(&p).unwrap_or(p)
  }

  pub fn config_path(&self) -> PathBuf {
    let p = self.temp.path().join("config");
    std::fs::create_dir_all(&p).unwrap();
    dunce::canonicalize(&p).unwrap_or(p)
  }

  /// Get a pre-configured Command for the platstate binary.
  ///
  /// Points the XDG directories into the temp directory and clears the
  /// `PLATSTATE_*` overrides.
  pub fn platstate_cmd(&self) -> Command {
    let mut cmd: Command = cargo_bin_cmd!("platstate");
    cmd.env("XDG_CONFIG_HOME", self.config_path());
    cmd.env("XDG_DATA_HOME", self.data_path());
    cmd.env("XDG_CACHE_HOME", self.cache_path());
    cmd.env_remove("PLATSTATE_REGISTRY");
    cmd.env_remove("PLATSTATE_REGISTRY_AUTH");
    cmd.env_remove("PLATSTATE_CHANNEL");
    cmd.env_remove("RUST_LOG");
    cmd
  }

  /// Run `platstate sync -o json` and return the parsed table.
  pub fn sync_json(&self, args: &[&str]) -> serde_json::Value {
    let output = self.platstate_cmd().arg("sync").args(args).args(["-o", "json"]).output().unwrap();
    assert!(
      output.status.success(),
      "sync failed: {}",
      String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).unwrap()
  }
}
