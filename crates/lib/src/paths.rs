//! XDG-style directory resolution.

use std::path::PathBuf;

use crate::consts::{APP_NAME, CURRENT_SNAPSHOT_FILE};

/// Returns the user's home directory, or the filesystem root when `HOME` is unset.
pub fn home_dir() -> PathBuf {
  std::env::var_os("HOME").map(PathBuf::from).unwrap_or_else(|| PathBuf::from("/"))
}

/// Resolves an XDG base directory, falling back to `fallback` under `$HOME`
/// when the variable is unset or empty.
fn xdg_base(var: &str, fallback: &[&str]) -> PathBuf {
  match std::env::var_os(var) {
    Some(dir) if !dir.is_empty() => PathBuf::from(dir),
    _ => fallback.iter().fold(home_dir(), |path, part| path.join(part)),
  }
}

/// Per-user configuration, `$XDG_CONFIG_HOME/platstate`.
pub fn config_dir() -> PathBuf {
  xdg_base("XDG_CONFIG_HOME", &[".config"]).join(APP_NAME)
}

/// Per-user state, `$XDG_DATA_HOME/platstate`.
pub fn data_dir() -> PathBuf {
  xdg_base("XDG_DATA_HOME", &[".local", "share"]).join(APP_NAME)
}

pub fn cache_dir() -> PathBuf {
  xdg_base("XDG_CACHE_HOME", &[".cache"]).join(APP_NAME)
}

/// Default location of the current state snapshot.
pub fn current_snapshot_path() -> PathBuf {
  data_dir().join(CURRENT_SNAPSHOT_FILE)
}

/// Default directory for rotated snapshots and diagnostics.
pub fn history_dir() -> PathBuf {
  data_dir().join("history")
}

/// Default directory for serialized component graphs.
pub fn graph_cache_dir() -> PathBuf {
  cache_dir().join("graphs")
}
