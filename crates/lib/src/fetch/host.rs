//! Host environment fetcher.
//!
//! Components installed directly on a host export their version as an
//! environment variable named `<KEY>_MRV`. The fetcher reads either the
//! current process environment or the output of a login-shell `env`.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::command::run_shell;
use super::{ChannelObservations, FetchError, Observation, ObservationMap, VersionFetcher};
use crate::consts::{DEFAULT_HOST_ENV_COMMAND, HOST_VERSION_SUFFIX};

/// Where host variables are read from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type", content = "command")]
pub enum EnvSource {
  /// The environment of this process.
  Process,
  /// The output of a shell command printing `NAME=value` lines.
  Shell(String),
}

impl Default for EnvSource {
  fn default() -> Self {
    EnvSource::Shell(DEFAULT_HOST_ENV_COMMAND.to_string())
  }
}

#[derive(Debug, Clone)]
pub struct HostFetcher {
  source: EnvSource,
  channel: String,
}

impl HostFetcher {
  pub fn new(source: EnvSource, channel: impl Into<String>) -> Self {
    Self {
      source,
      channel: channel.into(),
    }
  }

  /// Select version variables from `(name, value)` pairs.
  pub fn collect<I, K, V>(&self, vars: I) -> ObservationMap
  where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: Into<String>,
  {
    let mut map = ObservationMap::new();
    for (name, value) in vars {
      let Some(key) = name.as_ref().strip_suffix(HOST_VERSION_SUFFIX) else {
        continue;
      };
      if key.is_empty() {
        continue;
      }
      let mut channels = ChannelObservations::new();
      channels.insert(self.channel.clone(), Observation::single(value));
      map.insert(key.to_lowercase(), channels);
    }
    map
  }
}

impl VersionFetcher for HostFetcher {
  fn name(&self) -> &'static str {
    "host"
  }

  async fn fetch(&self) -> Result<ObservationMap, FetchError> {
    let map = match &self.source {
      EnvSource::Process => self.collect(std::env::vars()),
      EnvSource::Shell(cmd) => {
        let output = run_shell(cmd, None).await?;
        self.collect(output.stdout.lines().filter_map(|line| line.split_once('=')))
      }
    };
    debug!(components = map.len(), "read host versions");
    Ok(map)
  }
}
