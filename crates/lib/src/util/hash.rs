//! Hashing for definition trees and cache keys.
//!
//! - `ObjectHash`: a truncated hash of a serialized value, used in cache file names
//! - `ContentHash`: a full SHA-256 over a directory tree
//! - `hash_directory()`: deterministic tree hashing

use std::fs;
use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use walkdir::WalkDir;

use crate::consts::OBJ_HASH_PREFIX_LEN;

pub type HashError = serde_json::Error;

/// A truncated SHA-256 of a JSON-serialized value.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ObjectHash(pub String);

impl std::fmt::Display for ObjectHash {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.0)
  }
}

pub trait Hashable: Serialize {
  fn compute_hash(&self) -> Result<ObjectHash, HashError> {
    let serialized = serde_json::to_string(self)?;
    let full = hash_bytes(serialized.as_bytes());
    Ok(ObjectHash(full.0[..OBJ_HASH_PREFIX_LEN].to_string()))
  }
}

/// A full 64-character SHA-256 hash.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentHash(pub String);

impl std::fmt::Display for ContentHash {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.0)
  }
}

#[derive(Debug, thiserror::Error)]
pub enum DirHashError {
  #[error("failed to walk directory: {message}")]
  WalkDir { message: String },

  #[error("failed to read file {path}: {message}")]
  ReadFile { path: String, message: String },

  #[error("failed to read symlink {path}: {message}")]
  ReadSymlink { path: String, message: String },
}

/// Compute a deterministic hash of a directory's contents.
///
/// Covers relative paths, file contents and symlink targets. Timestamps and
/// permissions are ignored, so touching a definition file without editing it
/// keeps the hash stable. Entries whose file name appears in `exclude` are
/// skipped along with everything beneath them.
pub fn hash_directory(root: &Path, exclude: &[&str]) -> Result<ContentHash, DirHashError> {
  let mut tree = Sha256::new();

  let walker = WalkDir::new(root)
    .min_depth(1)
    .sort_by_file_name()
    .into_iter()
    .filter_entry(|e| e.file_name().to_str().is_none_or(|name| !exclude.contains(&name)));

  for entry in walker {
    let entry = entry.map_err(|e| DirHashError::WalkDir { message: e.to_string() })?;
    let rel = entry.path().strip_prefix(root).unwrap_or(entry.path()).to_string_lossy();

    let record = match entry.file_type() {
      t if t.is_dir() => format!("D:{rel}"),
      t if t.is_file() => format!("F:{rel}:{}", hash_file(entry.path())?),
      t if t.is_symlink() => {
        let target = fs::read_link(entry.path()).map_err(|e| DirHashError::ReadSymlink {
          path: entry.path().display().to_string(),
          message: e.to_string(),
        })?;
        format!("L:{rel}:{}", hash_bytes(target.to_string_lossy().as_bytes()))
      }
      _ => continue,
    };
    tree.update(record.as_bytes());
    tree.update(b"\n");
  }

  Ok(ContentHash(format!("{:x}", tree.finalize())))
}

fn hash_file(path: &Path) -> Result<ContentHash, DirHashError> {
  let read_err = |e: io::Error| DirHashError::ReadFile {
    path: path.display().to_string(),
    message: e.to_string(),
  };
  let mut file = fs::File::open(path).map_err(read_err)?;
  let mut hasher = Sha256::new();
  io::copy(&mut file, &mut hasher).map_err(read_err)?;
  Ok(ContentHash(format!("{:x}", hasher.finalize())))
}

pub fn hash_bytes(data: &[u8]) -> ContentHash {
  let mut hasher = Sha256::new();
  hasher.update(data);
  ContentHash(format!("{:x}", hasher.finalize()))
}
