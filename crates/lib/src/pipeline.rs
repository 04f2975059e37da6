//! One reconciliation pass, end to end.
//!
//! A pass gathers observations from every source concurrently, merges them,
//! reconciles them against the desired component records and persists the
//! resulting state table together with per-source diagnostics.
//!
//! Host and cluster failures degrade to an empty source with a warning. A
//! registry failure is fatal, but the sources gathered so far are still
//! reconciled and written before the error is returned.

use std::collections::BTreeMap;
use std::fmt;

use serde_json::Value;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::{Config, ConfigError};
use crate::fetch::{FetchError, ObservationMap, RegistryFetcher, VersionFetcher};
use crate::graph::{GraphCache, GraphError};
use crate::snapshot::{Diagnostics, SnapshotError, SnapshotStore};
use crate::state::{StateTable, merge, reconcile};

/// The stage of a pass an error came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
  Graph,
  Fetch,
  Reconcile,
  Persist,
}

impl Stage {
  pub fn as_str(&self) -> &'static str {
    match self {
      Stage::Graph => "graph construction",
      Stage::Fetch => "fetch",
      Stage::Reconcile => "reconcile",
      Stage::Persist => "persist",
    }
  }
}

impl fmt::Display for Stage {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

#[derive(Debug, Error)]
pub enum PipelineError {
  #[error("graph construction failed: {0}")]
  Graph(#[source] GraphError),

  #[error("fetch setup failed: {0}")]
  FetchSetup(#[source] ConfigError),

  /// A fatal fetch error; a partial snapshot has already been written.
  #[error("fetch failed ({source_name}): {source}")]
  Fetch {
    source_name: &'static str,
    #[source]
    source: FetchError,
  },

  #[error("reconcile failed: {0}")]
  Reconcile(#[source] GraphError),

  #[error("persist failed: {0}")]
  Persist(#[source] SnapshotError),
}

impl PipelineError {
  pub fn stage(&self) -> Stage {
    match self {
      PipelineError::Graph(_) => Stage::Graph,
      PipelineError::FetchSetup(_) | PipelineError::Fetch { .. } => Stage::Fetch,
      PipelineError::Reconcile(_) => Stage::Reconcile,
      PipelineError::Persist(_) => Stage::Persist,
    }
  }
}

/// Result of a successful pass.
#[derive(Debug)]
pub struct PassReport {
  /// Reconciled components, as persisted to the current snapshot.
  pub table: StateTable,

  /// What each source reported, and the merged view.
  pub diagnostics: Diagnostics,

  /// Sources that failed and were treated as empty.
  pub degraded: Vec<&'static str>,
}

impl PassReport {
  /// `(component, channel)` pairs whose desired version is not live.
  pub fn pending_builds(&self) -> Vec<(&str, &str)> {
    self
      .table
      .iter()
      .flat_map(|(key, component)| {
        component
          .state
          .iter()
          .filter(|(_, state)| state.build)
          .map(move |(channel, _)| (key.as_str(), channel.as_str()))
      })
      .collect()
  }
}

/// Run one pass over `records` and persist the result into `store`.
///
/// Without a registry fetcher the registry source is empty.
pub async fn run_pass<H, C, R>(
  records: &BTreeMap<String, Value>,
  host: &H,
  cluster: &C,
  registry: Option<&R>,
  store: &SnapshotStore,
) -> Result<PassReport, PipelineError>
where
  H: VersionFetcher,
  C: VersionFetcher,
  R: VersionFetcher,
{
  info!(components = records.len(), "starting pass");

  let (host_result, cluster_result, registry_result) = tokio::join!(host.fetch(), cluster.fetch(), async {
    match registry {
      Some(registry) => Some((registry.name(), registry.fetch().await)),
      None => None,
    }
  });

  let mut degraded = Vec::new();
  let host_map = degrade(host.name(), host_result, &mut degraded);
  let cluster_map = degrade(cluster.name(), cluster_result, &mut degraded);

  let mut fatal = None;
  let registry_map = match registry_result {
    Some((_, Ok(map))) => map,
    Some((name, Err(e))) => {
      warn!(source = name, error = %e, "registry fetch failed, writing partial snapshot");
      fatal = Some((name, e));
      ObservationMap::new()
    }
    None => {
      warn!("no registry configured");
      ObservationMap::new()
    }
  };

  let merged = merge(host_map.clone(), cluster_map.clone(), registry_map.clone());
  let table = reconcile(records, &merged);

  let diagnostics = Diagnostics {
    host: host_map,
    cluster: cluster_map,
    registry: registry_map,
    merged,
  };
  store.write_diagnostics(&diagnostics).map_err(PipelineError::Persist)?;
  store.persist(&table).map_err(PipelineError::Persist)?;

  if let Some((source_name, source)) = fatal {
    return Err(PipelineError::Fetch { source_name, source });
  }

  info!(
    components = table.len(),
    degraded = degraded.len(),
    path = %store.current_path().display(),
    "pass complete"
  );
  Ok(PassReport {
    table,
    diagnostics,
    degraded,
  })
}

fn degrade(
  name: &'static str,
  result: Result<ObservationMap, FetchError>,
  degraded: &mut Vec<&'static str>,
) -> ObservationMap {
  match result {
    Ok(map) => map,
    Err(e) => {
      warn!(source = name, error = %e, "source unavailable, treating as empty");
      degraded.push(name);
      ObservationMap::new()
    }
  }
}

/// Run a pass using `config`.
///
/// When `records` is `None` the component graph is built (or reused from
/// `cache`) from the configured definition tree.
pub async fn sync(
  config: &Config,
  cache: &mut GraphCache,
  records: Option<BTreeMap<String, Value>>,
) -> Result<PassReport, PipelineError> {
  let records = match records {
    Some(records) => records,
    None => {
      let graph = cache
        .get_or_build(&config.definition_tree(), &config.build_options())
        .map_err(PipelineError::Graph)?;
      info!(components = graph.len(), "component graph ready");
      graph.to_records().map_err(PipelineError::Reconcile)?
    }
  };

  let registry: Option<RegistryFetcher> = config.registry_fetcher().map_err(PipelineError::FetchSetup)?;
  run_pass(
    &records,
    &config.host_fetcher(),
    &config.cluster_fetcher(),
    registry.as_ref(),
    &config.snapshot_store(),
  )
  .await
}
