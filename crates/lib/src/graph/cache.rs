//! Content-addressed graph cache.
//!
//! A [`GraphCache`] holds the last graph it built together with the key it
//! was built for. The key combines the definition tree's content hash with a
//! hash of where the tree lives, which playbook it starts from and the
//! [`BuildOptions`]. Built graphs carry absolute paths, so two checkouts with
//! identical content never share an entry. An optional directory persists
//! graphs as `<key>.json` across processes.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, warn};

use super::builder::{BuildOptions, GraphBuilder};
use super::source::DefinitionTree;
use super::{ComponentGraph, GraphError};
use crate::util::hash::Hashable;

#[derive(Debug, Default)]
pub struct GraphCache {
  dir: Option<PathBuf>,
  entry: Option<(String, Arc<ComponentGraph>)>,
}

impl GraphCache {
  /// A cache that only lives as long as this value.
  pub fn in_memory() -> Self {
    Self::default()
  }

  /// A cache that also persists graphs under `dir`.
  pub fn on_disk(dir: impl Into<PathBuf>) -> Self {
    Self {
      dir: Some(dir.into()),
      entry: None,
    }
  }

  /// Return the graph for `tree`, rebuilding only when its content changed.
  pub fn get_or_build(
    &mut self,
    tree: &DefinitionTree,
    options: &BuildOptions,
  ) -> Result<Arc<ComponentGraph>, GraphError> {
    let key = cache_key(tree, options)?;

    if let Some((cached_key, graph)) = &self.entry
      && *cached_key == key
    {
      debug!(key = %key, "graph cache hit");
      return Ok(Arc::clone(graph));
    }

    if let Some(dir) = &self.dir
      && let Some(graph) = load(&dir.join(format!("{key}.json")))
    {
      debug!(key = %key, "loaded graph from disk cache");
      let graph = Arc::new(graph);
      self.entry = Some((key, Arc::clone(&graph)));
      return Ok(graph);
    }

    debug!(key = %key, "graph cache miss, building");
    let graph = GraphBuilder::new(tree, options).build()?;
    if let Some(dir) = &self.dir
      && let Err(e) = store(dir, &key, &graph)
    {
      warn!(dir = %dir.display(), error = %e, "failed to persist graph cache");
    }

    let graph = Arc::new(graph);
    self.entry = Some((key, Arc::clone(&graph)));
    Ok(graph)
  }

  /// Drop the in-memory entry; the next call rebuilds or reloads.
  pub fn invalidate(&mut self) {
    self.entry = None;
  }
}

/// Everything besides file content that shapes a built graph.
#[derive(Serialize)]
struct BuildScope<'a> {
  root: PathBuf,
  playbook: &'a Path,
  options: &'a BuildOptions,
}

impl Hashable for BuildScope<'_> {}

fn cache_key(tree: &DefinitionTree, options: &BuildOptions) -> Result<String, GraphError> {
  let content = tree.content_hash()?;
  let scope = BuildScope {
    root: dunce::canonicalize(tree.root()).unwrap_or_else(|_| tree.root().to_path_buf()),
    playbook: tree.playbook(),
    options,
  }
  .compute_hash()?;
  Ok(format!("{}-{}", &content.0[..scope.0.len()], scope))
}

fn load(path: &Path) -> Option<ComponentGraph> {
  let content = fs::read_to_string(path).ok()?;
  match serde_json::from_str(&content) {
    Ok(graph) => Some(graph),
    Err(e) => {
      warn!(path = %path.display(), error = %e, "ignoring corrupt graph cache entry");
      None
    }
  }
}

fn store(dir: &Path, key: &str, graph: &ComponentGraph) -> std::io::Result<()> {
  fs::create_dir_all(dir)?;
  let content = serde_json::to_string(graph)?;
  let temp_path = dir.join(format!(".{key}.json.tmp"));
  fs::write(&temp_path, content)?;
  fs::rename(&temp_path, dir.join(format!("{key}.json")))
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::util::testutil::TreeFixture;
  use tempfile::TempDir;

  fn fixture() -> TreeFixture {
    let fixture = TreeFixture::new();
    fixture.playbook("- name: edge\n  roles:\n    - core.services.api\n");
    fixture
      .role("core.services.api")
      .file("meta/plasma.yaml", "plasma:\n  version: '1'\n");
    fixture
  }

  #[test]
  fn unchanged_tree_returns_same_graph() {
    let fixture = fixture();
    let tree = fixture.tree();
    let options = BuildOptions::default();
    let mut cache = GraphCache::in_memory();

    let first = cache.get_or_build(&tree, &options).unwrap();
    let second = cache.get_or_build(&tree, &options).unwrap();
    assert!(Arc::ptr_eq(&first, &second));
  }

  #[test]
  fn edited_tree_is_rebuilt() {
    let fixture = fixture();
    let tree = fixture.tree();
    let options = BuildOptions::default();
    let mut cache = GraphCache::in_memory();

    let first = cache.get_or_build(&tree, &options).unwrap();
    fixture
      .role("core.services.api")
      .file("meta/plasma.yaml", "plasma:\n  version: '2'\n");
    let second = cache.get_or_build(&tree, &options).unwrap();

    assert!(!Arc::ptr_eq(&first, &second));
    assert_eq!(second.get("core__services__api").unwrap().mrv, "2");
  }

  #[test]
  fn changed_options_are_rebuilt() {
    let fixture = fixture();
    let tree = fixture.tree();
    let mut cache = GraphCache::in_memory();

    let first = cache.get_or_build(&tree, &BuildOptions::default()).unwrap();
    let options = BuildOptions {
      domain: None,
      image_registry: "registry.local".to_string(),
    };
    let second = cache.get_or_build(&tree, &options).unwrap();
    assert!(!Arc::ptr_eq(&first, &second));
  }

  #[test]
  fn other_playbook_is_rebuilt() {
    let fixture = fixture();
    fs::write(
      fixture.root().join("other.yaml"),
      "- name: data\n  roles:\n    - core.entities.user\n",
    )
    .unwrap();
    fixture
      .role("core.entities.user")
      .file("meta/plasma.yaml", "plasma:\n  version: '3'\n");
    let options = BuildOptions::default();
    let mut cache = GraphCache::in_memory();

    let main = cache.get_or_build(&fixture.tree(), &options).unwrap();
    let other = cache
      .get_or_build(&fixture.tree().with_playbook("other.yaml"), &options)
      .unwrap();

    assert!(main.contains("core__services__api"));
    assert!(!other.contains("core__services__api"));
    assert_eq!(other.get("core__entities__user").unwrap().mrv, "3");
  }

  #[test]
  fn identical_checkouts_keep_their_own_paths() {
    let a = fixture();
    let b = fixture();
    let options = BuildOptions::default();
    let dir = TempDir::new().unwrap();

    GraphCache::on_disk(dir.path()).get_or_build(&a.tree(), &options).unwrap();
    let graph = GraphCache::on_disk(dir.path()).get_or_build(&b.tree(), &options).unwrap();

    let api = graph.get("core__services__api").unwrap();
    assert!(api.path.starts_with(b.tree().root()));
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 2);
  }

  #[test]
  fn disk_cache_survives_new_instance() {
    let fixture = fixture();
    let tree = fixture.tree();
    let options = BuildOptions::default();
    let dir = TempDir::new().unwrap();

    let first = GraphCache::on_disk(dir.path()).get_or_build(&tree, &options).unwrap();
    let entries: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
    assert_eq!(entries.len(), 1);

    let second = GraphCache::on_disk(dir.path()).get_or_build(&tree, &options).unwrap();
    assert_eq!(*first, *second);
  }
}
