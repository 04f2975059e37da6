//! Runtime configuration.
//!
//! Settings come from, in increasing precedence: built-in defaults, a YAML
//! file (`--config` or `<config dir>/config.yaml`), `PLATSTATE_*`
//! environment variables, and finally command-line flags applied by the
//! caller.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::consts::{
  CLUSTER_CATEGORIES, DEFAULT_CATALOG_PAGE_SIZE, DEFAULT_CHANNEL, DEFAULT_IMAGE_LISTER, DEFAULT_KUBECTL,
  DEFAULT_RETENTION, LOCAL_LISTER_TIMEOUT, MAX_REGISTRY_WORKERS, PLAYBOOK_FILE, REGISTRY_TIMEOUT,
};
use crate::fetch::{
  ClusterFetcher, EnvSource, HostFetcher, LocalImageLister, RegistryEndpoint, RegistryError, RegistryFetcher,
};
use crate::graph::{BuildOptions, DefinitionTree, GraphCache};
use crate::paths;
use crate::snapshot::SnapshotStore;

pub const ENV_REGISTRY: &str = "PLATSTATE_REGISTRY";
pub const ENV_REGISTRY_AUTH: &str = "PLATSTATE_REGISTRY_AUTH";
pub const ENV_CHANNEL: &str = "PLATSTATE_CHANNEL";

const CONFIG_FILE: &str = "config.yaml";

#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("failed to read config {path}: {source}")]
  Read { path: String, source: io::Error },

  #[error("invalid config {path}: {message}")]
  Parse { path: String, message: String },

  #[error("invalid registry settings: {0}")]
  Registry(#[from] RegistryError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
  /// Root of the component definition tree.
  pub definitions: PathBuf,
  /// Playbook file, relative to `definitions`.
  pub playbook: PathBuf,
  /// Channel assigned to host and cluster observations.
  pub channel: String,
  pub domain: Option<String>,
  /// Prefix of image references; defaults to the registry host.
  pub image_registry: Option<String>,
  /// Registry endpoint, `host[:port]` or a full URL.
  pub registry: Option<String>,
  /// Pre-encoded Basic credential.
  pub registry_auth: Option<String>,
  pub registry_timeout_secs: u64,
  pub registry_concurrency: usize,
  pub catalog_page_size: usize,
  pub kubectl: String,
  pub cluster_categories: Vec<String>,
  pub host_env: EnvSource,
  /// Command listing the node's image cache; `None` disables it.
  pub image_lister: Option<String>,
  pub image_lister_timeout_secs: u64,
  pub snapshot_path: PathBuf,
  pub history_dir: PathBuf,
  pub retention: usize,
  /// Directory for persisted graphs; `None` keeps them in memory only.
  pub graph_cache_dir: Option<PathBuf>,
}

impl Default for Config {
  fn default() -> Self {
    Self {
      definitions: PathBuf::from("."),
      playbook: PathBuf::from(PLAYBOOK_FILE),
      channel: DEFAULT_CHANNEL.to_string(),
      domain: None,
      image_registry: None,
      registry: None,
      registry_auth: None,
      registry_timeout_secs: REGISTRY_TIMEOUT.as_secs(),
      registry_concurrency: MAX_REGISTRY_WORKERS,
      catalog_page_size: DEFAULT_CATALOG_PAGE_SIZE,
      kubectl: DEFAULT_KUBECTL.to_string(),
      cluster_categories: CLUSTER_CATEGORIES.iter().map(|c| c.to_string()).collect(),
      host_env: EnvSource::default(),
      image_lister: Some(DEFAULT_IMAGE_LISTER.to_string()),
      image_lister_timeout_secs: LOCAL_LISTER_TIMEOUT.as_secs(),
      snapshot_path: paths::current_snapshot_path(),
      history_dir: paths::history_dir(),
      retention: DEFAULT_RETENTION,
      graph_cache_dir: Some(paths::graph_cache_dir()),
    }
  }
}

impl Config {
  /// Load `path`, or `<config dir>/config.yaml` when present, then apply
  /// environment overrides.
  ///
  /// An explicit path must exist; the default location is optional.
  pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
    let mut config = match path {
      Some(path) => Self::from_file(path)?,
      None => {
        let default_path = paths::config_dir().join(CONFIG_FILE);
        if default_path.is_file() {
          Self::from_file(&default_path)?
        } else {
          debug!(path = %default_path.display(), "no config file, using defaults");
          Self::default()
        }
      }
    };
    config.apply_env();
    Ok(config)
  }

  pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
    let content = fs::read_to_string(path).map_err(|e| ConfigError::Read {
      path: path.display().to_string(),
      source: e,
    })?;
    Self::from_yaml(&content).map_err(|message| ConfigError::Parse {
      path: path.display().to_string(),
      message,
    })
  }

  fn from_yaml(content: &str) -> Result<Self, String> {
    if content.trim().is_empty() {
      return Ok(Self::default());
    }
    serde_yaml::from_str(content).map_err(|e| e.to_string())
  }

  /// Apply `PLATSTATE_REGISTRY`, `PLATSTATE_REGISTRY_AUTH` and `PLATSTATE_CHANNEL`.
  pub fn apply_env(&mut self) {
    if let Ok(registry) = std::env::var(ENV_REGISTRY)
      && !registry.is_empty()
    {
      self.registry = Some(registry);
    }
    if let Ok(auth) = std::env::var(ENV_REGISTRY_AUTH)
      && !auth.is_empty()
    {
      self.registry_auth = Some(auth);
    }
    if let Ok(channel) = std::env::var(ENV_CHANNEL)
      && !channel.is_empty()
    {
      self.channel = channel;
    }
  }

  pub fn definition_tree(&self) -> DefinitionTree {
    DefinitionTree::new(&self.definitions).with_playbook(&self.playbook)
  }

  pub fn build_options(&self) -> BuildOptions {
    let image_registry = self
      .image_registry
      .clone()
      .or_else(|| {
        self
          .registry
          .as_deref()
          .and_then(|r| RegistryEndpoint::parse(r).ok())
          .map(|e| e.host().to_string())
      })
      .unwrap_or_default();
    BuildOptions {
      domain: self.domain.clone(),
      image_registry,
    }
  }

  pub fn graph_cache(&self) -> GraphCache {
    match &self.graph_cache_dir {
      Some(dir) => GraphCache::on_disk(dir),
      None => GraphCache::in_memory(),
    }
  }

  pub fn snapshot_store(&self) -> SnapshotStore {
    SnapshotStore::new(&self.snapshot_path, &self.history_dir).with_retention(self.retention)
  }

  pub fn host_fetcher(&self) -> HostFetcher {
    HostFetcher::new(self.host_env.clone(), &self.channel)
  }

  pub fn cluster_fetcher(&self) -> ClusterFetcher {
    ClusterFetcher::new(&self.kubectl, self.cluster_categories.clone(), &self.channel)
  }

  /// The registry fetcher, or `None` when no registry is configured.
  pub fn registry_fetcher(&self) -> Result<Option<RegistryFetcher>, ConfigError> {
    let Some(registry) = &self.registry else {
      return Ok(None);
    };
    let endpoint = RegistryEndpoint::parse(registry)?;
    let mut fetcher = RegistryFetcher::with_timeout(
      endpoint,
      self.registry_auth.clone(),
      Duration::from_secs(self.registry_timeout_secs),
    )?
    .page_size(self.catalog_page_size)
    .concurrency(self.registry_concurrency);
    if let Some(lister) = &self.image_lister {
      fetcher = fetcher.with_local(LocalImageLister::new(
        lister,
        Duration::from_secs(self.image_lister_timeout_secs),
      ));
    }
    Ok(Some(fetcher))
  }
}
