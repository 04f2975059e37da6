//! Local image cache lister.
//!
//! Lists the images already pulled onto this node (`crictl images` by
//! default). Failures here never abort a pass: the lister logs and reports
//! an empty map.

use std::collections::BTreeMap;
use std::time::Duration;

use tracing::{debug, error, warn};

use super::ObservationMap;
use super::command::run_shell;
use super::tags::parse_tags;
use crate::component::repository_key;
use crate::consts::{DEFAULT_IMAGE_LISTER, LOCAL_LISTER_TIMEOUT};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalImageLister {
  command: String,
  timeout: Duration,
}

impl Default for LocalImageLister {
  fn default() -> Self {
    Self::new(DEFAULT_IMAGE_LISTER, LOCAL_LISTER_TIMEOUT)
  }
}

impl LocalImageLister {
  pub fn new(command: impl Into<String>, timeout: Duration) -> Self {
    Self {
      command: command.into(),
      timeout,
    }
  }

  /// Parse `IMAGE TAG ...` rows, keeping images under `registry_host`.
  pub fn parse(&self, output: &str, registry_host: &str) -> ObservationMap {
    let prefix = format!("{}/", registry_host.trim_end_matches('/'));
    let mut tags_by_image: BTreeMap<String, Vec<String>> = BTreeMap::new();

    for line in output.lines() {
      let mut columns = line.split_whitespace();
      let (Some(image), Some(tag)) = (columns.next(), columns.next()) else {
        continue;
      };
      if image == "IMAGE" {
        continue;
      }
      let Some(repository) = image.strip_prefix(&prefix) else {
        continue;
      };
      tags_by_image
        .entry(repository_key(repository))
        .or_default()
        .push(tag.to_string());
    }

    tags_by_image
      .into_iter()
      .map(|(key, tags)| (key, parse_tags(tags)))
      .collect()
  }

  /// List cached images; any failure yields an empty map.
  pub async fn list(&self, registry_host: &str) -> ObservationMap {
    let output = match run_shell(&self.command, Some(self.timeout)).await {
      Ok(output) => output,
      Err(e) => {
        error!(cmd = %self.command, error = %e, "failed to list local images");
        return ObservationMap::new();
      }
    };
    if !output.stderr.trim().is_empty() {
      warn!(cmd = %self.command, stderr = %output.stderr.trim(), "image lister wrote to stderr");
    }
    let map = self.parse(&output.stdout, registry_host);
    debug!(components = map.len(), "read local image cache");
    map
  }
}
