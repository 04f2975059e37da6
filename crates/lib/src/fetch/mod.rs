//! Live version fetchers.
//!
//! Each fetcher reads one live source and reports what it sees as an
//! [`ObservationMap`]: component key, then channel, then the observed build
//! ids. Fetchers share no state and can run concurrently.

pub mod cluster;
pub mod command;
pub mod host;
pub mod local;
pub mod registry;
pub mod tags;

use std::collections::BTreeMap;
use std::collections::btree_map;
use std::future::Future;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use cluster::ClusterFetcher;
pub use host::{EnvSource, HostFetcher};
pub use local::LocalImageLister;
pub use registry::{RegistryEndpoint, RegistryError, RegistryFetcher};

/// Errors raised by a fetcher.
#[derive(Debug, Error)]
pub enum FetchError {
  #[error("failed to spawn '{cmd}': {message}")]
  Spawn { cmd: String, message: String },

  #[error("'{cmd}' exited with code {code:?}: {stderr}")]
  CmdFailed {
    cmd: String,
    code: Option<i32>,
    stderr: String,
  },

  #[error("'{cmd}' timed out after {seconds}s")]
  Timeout { cmd: String, seconds: u64 },

  #[error("failed to parse {what}: {message}")]
  Parse { what: String, message: String },

  #[error(transparent)]
  Registry(#[from] RegistryError),
}

/// Build ids seen on one channel, and the one marked active.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Observation {
  pub ids: Vec<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub current: Option<String>,
}

impl Observation {
  pub fn single(id: impl Into<String>) -> Self {
    Self {
      ids: vec![id.into()],
      current: None,
    }
  }
}

pub type ChannelObservations = BTreeMap<String, Observation>;

/// `component key -> channel -> observation`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObservationMap(BTreeMap<String, ChannelObservations>);

impl ObservationMap {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn get(&self, key: &str) -> Option<&ChannelObservations> {
    self.0.get(key)
  }

  pub fn channel(&self, key: &str, channel: &str) -> Option<&Observation> {
    self.0.get(key)?.get(channel)
  }

  /// Replace the whole entry of `key`.
  pub fn insert(&mut self, key: impl Into<String>, channels: ChannelObservations) {
    self.0.insert(key.into(), channels);
  }

  pub fn len(&self) -> usize {
    self.0.len()
  }

  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }

  pub fn iter(&self) -> btree_map::Iter<'_, String, ChannelObservations> {
    self.0.iter()
  }

  /// Shallow merge: every component in `other` replaces this map's entry
  /// for that component wholesale, channels included.
  pub fn overlay(&mut self, other: ObservationMap) {
    self.0.extend(other.0);
  }

  /// Channel-level merge: channels in `other` replace matching channels of
  /// an existing entry; other channels of that entry are kept.
  pub fn overlay_channels(&mut self, other: ObservationMap) {
    for (key, channels) in other.0 {
      self.0.entry(key).or_default().extend(channels);
    }
  }
}

impl FromIterator<(String, ChannelObservations)> for ObservationMap {
  fn from_iter<I: IntoIterator<Item = (String, ChannelObservations)>>(iter: I) -> Self {
    Self(iter.into_iter().collect())
  }
}

impl IntoIterator for ObservationMap {
  type Item = (String, ChannelObservations);
  type IntoIter = btree_map::IntoIter<String, ChannelObservations>;

  fn into_iter(self) -> Self::IntoIter {
    self.0.into_iter()
  }
}

/// A live version source.
pub trait VersionFetcher {
  /// Short source name used in logs and diagnostics.
  fn name(&self) -> &'static str;

  fn fetch(&self) -> impl Future<Output = Result<ObservationMap, FetchError>> + Send;
}
