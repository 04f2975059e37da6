//! Snapshot storage on disk.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, Local};
use serde::Serialize;
use tempfile::NamedTempFile;
use tracing::{debug, info};

use super::{Diagnostics, HistoryEntry, SnapshotError};
use crate::consts::{CLUSTER_DATA_FILE, DEFAULT_RETENTION, HOST_DATA_FILE, MERGED_DATA_FILE, REGISTRY_DATA_FILE};
use crate::paths;
use crate::state::StateTable;

const HISTORY_PREFIX: &str = "state_";
const HISTORY_SUFFIX: &str = ".json";
const HISTORY_TIME_FORMAT: &str = "%Y%m%d_%H%M%S_%6f";

/// Manages the current snapshot and its bounded history.
///
/// All files are written atomically (temporary file in the same directory,
/// then rename). Callers must not run two passes against the same store
/// concurrently.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
  current_path: PathBuf,
  history_dir: PathBuf,
  retention: usize,
}

impl SnapshotStore {
  pub fn new(current_path: impl Into<PathBuf>, history_dir: impl Into<PathBuf>) -> Self {
    Self {
      current_path: current_path.into(),
      history_dir: history_dir.into(),
      retention: DEFAULT_RETENTION,
    }
  }

  /// A store at the XDG data directory.
  pub fn default_store() -> Self {
    Self::new(paths::current_snapshot_path(), paths::history_dir())
  }

  /// Number of rotated snapshots to keep.
  pub fn with_retention(mut self, retention: usize) -> Self {
    self.retention = retention;
    self
  }

  pub fn current_path(&self) -> &Path {
    &self.current_path
  }

  pub fn history_dir(&self) -> &Path {
    &self.history_dir
  }

  /// Rotate the existing current snapshot into history, then write `table`.
  pub fn persist(&self, table: &StateTable) -> Result<(), SnapshotError> {
    if let Some(rotated) = self.rotate()? {
      debug!(path = %rotated.display(), "rotated previous snapshot");
      self.enforce_retention()?;
    }
    write_json(&self.current_path, table)?;
    info!(path = %self.current_path.display(), components = table.len(), "wrote snapshot");
    Ok(())
  }

  /// Write the per-source diagnostic files next to the history.
  pub fn write_diagnostics(&self, diagnostics: &Diagnostics) -> Result<(), SnapshotError> {
    write_json(&self.history_dir.join(HOST_DATA_FILE), &diagnostics.host)?;
    write_json(&self.history_dir.join(CLUSTER_DATA_FILE), &diagnostics.cluster)?;
    write_json(&self.history_dir.join(REGISTRY_DATA_FILE), &diagnostics.registry)?;
    write_json(&self.history_dir.join(MERGED_DATA_FILE), &diagnostics.merged)?;
    Ok(())
  }

  /// Load the current snapshot; `None` before the first pass.
  pub fn load_current(&self) -> Result<Option<StateTable>, SnapshotError> {
    match read_json(&self.current_path) {
      Ok(table) => Ok(Some(table)),
      Err(SnapshotError::NotFound(_)) => Ok(None),
      Err(e) => Err(e),
    }
  }

  /// Rotated snapshots, oldest first.
  pub fn history(&self) -> Result<Vec<HistoryEntry>, SnapshotError> {
    let entries = match fs::read_dir(&self.history_dir) {
      Ok(entries) => entries,
      Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
      Err(e) => {
        return Err(SnapshotError::Read {
          path: self.history_dir.display().to_string(),
          source: e,
        });
      }
    };

    let mut history = Vec::new();
    for entry in entries {
      let entry = entry.map_err(|e| SnapshotError::Read {
        path: self.history_dir.display().to_string(),
        source: e,
      })?;
      let name = entry.file_name().to_string_lossy().into_owned();
      if !is_history_name(&name) {
        continue;
      }
      let path = entry.path();
      let created = file_created(&path)?;
      history.push(HistoryEntry {
        name,
        path,
        created: DateTime::<Local>::from(created),
      });
    }

    history.sort_by(|a, b| {
      a.created
        .cmp(&b.created)
        .then_with(|| collision_index(&a.name).cmp(&collision_index(&b.name)))
        .then_with(|| a.name.cmp(&b.name))
    });
    Ok(history)
  }

  /// Load a rotated snapshot by file name.
  pub fn load_history(&self, name: &str) -> Result<StateTable, SnapshotError> {
    if !is_history_name(name) {
      return Err(SnapshotError::NotFound(name.to_string()));
    }
    read_json(&self.history_dir.join(name))
  }

  /// Move the current snapshot into history, named after its creation time.
  fn rotate(&self) -> Result<Option<PathBuf>, SnapshotError> {
    if !self.current_path.exists() {
      return Ok(None);
    }
    fs::create_dir_all(&self.history_dir).map_err(|e| SnapshotError::CreateDir {
      path: self.history_dir.display().to_string(),
      source: e,
    })?;

    let created = DateTime::<Local>::from(file_created(&self.current_path)?);
    let stem = format!("{HISTORY_PREFIX}{}", created.format(HISTORY_TIME_FORMAT));
    let target = self.free_history_path(&stem);

    fs::rename(&self.current_path, &target).map_err(|e| SnapshotError::Rotate {
      from: self.current_path.display().to_string(),
      to: target.display().to_string(),
      source: e,
    })?;
    Ok(Some(target))
  }

  /// `<stem>.json`, or `<stem>_<n>.json` numbered past every existing
  /// snapshot sharing the stem so that name order follows rotation order.
  fn free_history_path(&self, stem: &str) -> PathBuf {
    let base = self.history_dir.join(format!("{stem}{HISTORY_SUFFIX}"));
    let taken = fs::read_dir(&self.history_dir)
      .into_iter()
      .flatten()
      .filter_map(Result::ok)
      .map(|entry| entry.file_name().to_string_lossy().into_owned())
      .filter(|name| name.starts_with(stem) && is_history_name(name))
      .map(|name| collision_index(&name))
      .max();
    match taken {
      None if !base.exists() => base,
      _ => {
        let n = taken.unwrap_or(0) + 1;
        self.history_dir.join(format!("{stem}_{n}{HISTORY_SUFFIX}"))
      }
    }
  }

  /// Delete the oldest rotated snapshots beyond the retention cap.
  fn enforce_retention(&self) -> Result<(), SnapshotError> {
    let history = self.history()?;
    let excess = history.len().saturating_sub(self.retention);
    for entry in history.into_iter().take(excess) {
      fs::remove_file(&entry.path).map_err(|e| SnapshotError::Write {
        path: entry.path.display().to_string(),
        source: e,
      })?;
      debug!(name = %entry.name, "removed old snapshot");
    }
    Ok(())
  }
}

fn is_history_name(name: &str) -> bool {
  name.starts_with(HISTORY_PREFIX) && name.ends_with(HISTORY_SUFFIX) && !name.contains('/')
}

/// Collision counter of a history name: `state_<time>_<n>.json` -> n, else 0.
fn collision_index(name: &str) -> u32 {
  let stem = name
    .trim_start_matches(HISTORY_PREFIX)
    .trim_end_matches(HISTORY_SUFFIX);
  // <date>_<time>_<micros>[_<n>]
  let parts: Vec<&str> = stem.split('_').collect();
  if parts.len() == 4 {
    parts[3].parse().unwrap_or(0)
  } else {
    0
  }
}

fn file_created(path: &Path) -> Result<SystemTime, SnapshotError> {
  let metadata = fs::metadata(path).map_err(|e| SnapshotError::Read {
    path: path.display().to_string(),
    source: e,
  })?;
  metadata
    .created()
    .or_else(|_| metadata.modified())
    .map_err(|e| SnapshotError::Read {
      path: path.display().to_string(),
      source: e,
    })
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), SnapshotError> {
  let dir = path.parent().unwrap_or_else(|| Path::new("."));
  fs::create_dir_all(dir).map_err(|e| SnapshotError::CreateDir {
    path: dir.display().to_string(),
    source: e,
  })?;

  let content = serde_json::to_string_pretty(value)?;
  let write_err = |e: io::Error| SnapshotError::Write {
    path: path.display().to_string(),
    source: e,
  };
  let mut temp = NamedTempFile::new_in(dir).map_err(write_err)?;
  temp.write_all(content.as_bytes()).map_err(write_err)?;
  temp.persist(path).map_err(|e| write_err(e.error))?;
  Ok(())
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, SnapshotError> {
  let content = fs::read_to_string(path).map_err(|e| {
    if e.kind() == io::ErrorKind::NotFound {
      SnapshotError::NotFound(path.display().to_string())
    } else {
      SnapshotError::Read {
        path: path.display().to_string(),
        source: e,
      }
    }
  })?;
  serde_json::from_str(&content).map_err(|e| SnapshotError::Parse {
    path: path.display().to_string(),
    source: e,
  })
}
