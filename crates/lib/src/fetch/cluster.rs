//! Cluster state fetcher.
//!
//! Deployed workloads carry `mrn` and `mrv` annotations. The fetcher lists
//! each resource category across all namespaces and reports the annotated
//! version per component.

use std::collections::BTreeMap;

use serde::Deserialize;
use tracing::{debug, warn};

use super::command::run;
use super::{ChannelObservations, FetchError, Observation, ObservationMap, VersionFetcher};

#[derive(Debug, Deserialize)]
struct Listing {
  #[serde(default)]
  items: Vec<Item>,
}

#[derive(Debug, Deserialize)]
struct Item {
  #[serde(default)]
  metadata: ItemMetadata,
}

#[derive(Debug, Default, Deserialize)]
struct ItemMetadata {
  #[serde(default)]
  annotations: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Clone)]
pub struct ClusterFetcher {
  kubectl: String,
  categories: Vec<String>,
  channel: String,
}

impl ClusterFetcher {
  pub fn new(kubectl: impl Into<String>, categories: Vec<String>, channel: impl Into<String>) -> Self {
    Self {
      kubectl: kubectl.into(),
      categories,
      channel: channel.into(),
    }
  }

  /// Versions from one `get <category> -A -o json` listing.
  ///
  /// Items lacking either annotation are skipped. Later items replace
  /// earlier ones with the same key.
  pub fn parse_listing(&self, json: &str) -> Result<ObservationMap, FetchError> {
    let listing: Listing = serde_json::from_str(json).map_err(|e| FetchError::Parse {
      what: "cluster listing".to_string(),
      message: e.to_string(),
    })?;

    let mut map = ObservationMap::new();
    for item in listing.items {
      let annotations = item.metadata.annotations.unwrap_or_default();
      let (Some(mrn), Some(mrv)) = (annotations.get("mrn"), annotations.get("mrv")) else {
        continue;
      };
      let mut channels = ChannelObservations::new();
      channels.insert(self.channel.clone(), Observation::single(mrv.clone()));
      map.insert(mrn.replace('-', "_"), channels);
    }
    Ok(map)
  }

  async fn fetch_category(&self, category: &str) -> Result<ObservationMap, FetchError> {
    let output = run(&self.kubectl, &["get", category, "-A", "-o", "json"], None).await?;
    self.parse_listing(&output.stdout)
  }
}

impl VersionFetcher for ClusterFetcher {
  fn name(&self) -> &'static str {
    "cluster"
  }

  async fn fetch(&self) -> Result<ObservationMap, FetchError> {
    let mut map = ObservationMap::new();
    for category in &self.categories {
      match self.fetch_category(category).await {
        Ok(found) => {
          debug!(category = %category, components = found.len(), "listed cluster resources");
          map.overlay(found);
        }
        Err(e) => warn!(category = %category, error = %e, "skipping cluster category"),
      }
    }
    Ok(map)
  }
}
