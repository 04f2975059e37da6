//! Snapshot persistence.
//!
//! Each pass writes its state table to the current-snapshot file. The
//! previous current snapshot is rotated into a history directory first, and
//! only the most recent rotated snapshots are kept.
//!
//! # Storage Layout
//!
//! ```text
//! {data_dir}/
//! ├── state.json                              # current state table
//! └── history/
//!     ├── state_20250101_120000_000123.json   # rotated snapshots (bounded)
//!     ├── host_data.json                      # last pass, per source
//!     ├── cluster_data.json
//!     ├── registry_data.json
//!     └── merged_data.json
//! ```

mod storage;

use std::io;
use std::path::PathBuf;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::fetch::ObservationMap;

pub use storage::SnapshotStore;

#[derive(Debug, Error)]
pub enum SnapshotError {
  #[error("failed to create directory {path}: {source}")]
  CreateDir { path: String, source: io::Error },

  #[error("failed to read {path}: {source}")]
  Read { path: String, source: io::Error },

  #[error("failed to parse {path}: {source}")]
  Parse { path: String, source: serde_json::Error },

  #[error("failed to write {path}: {source}")]
  Write { path: String, source: io::Error },

  #[error("failed to serialize snapshot: {0}")]
  Serialize(#[from] serde_json::Error),

  #[error("failed to rotate {from} to {to}: {source}")]
  Rotate { from: String, to: String, source: io::Error },

  #[error("snapshot not found: {0}")]
  NotFound(String),
}

/// Per-source observations of one pass, kept for troubleshooting.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostics {
  pub host: ObservationMap,
  pub cluster: ObservationMap,
  pub registry: ObservationMap,
  pub merged: ObservationMap,
}

/// A rotated snapshot in the history directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
  pub name: String,
  pub path: PathBuf,
  pub created: DateTime<Local>,
}
