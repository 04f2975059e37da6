mod components;
mod history;
mod status;
mod sync;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use platstate_lib::config::Config;

pub use components::cmd_components;
pub use history::{HistoryCommand, cmd_history};
pub use status::cmd_status;
pub use sync::cmd_sync;

/// Config location plus the flags that override it.
#[derive(Debug, Default)]
pub struct ConfigArgs<'a> {
  pub path: Option<&'a Path>,
  pub definitions: Option<PathBuf>,
  pub registry: Option<String>,
  pub channel: Option<String>,
}

impl ConfigArgs<'_> {
  /// Load the config file and environment, then apply command-line flags.
  pub fn resolve(self) -> Result<Config> {
    let mut config = Config::load(self.path).context("Failed to load configuration")?;
    if let Some(definitions) = self.definitions {
      config.definitions = definitions;
    }
    if let Some(registry) = self.registry {
      config.registry = Some(registry);
    }
    if let Some(channel) = self.channel {
      config.channel = channel;
    }
    Ok(config)
  }
}
