//! Implementation of the `platstate sync` command.
//!
//! Runs one pass: gathers live versions, reconciles them against the
//! component graph (or records read from a JSON file) and saves the
//! snapshot.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde_json::Value;
use tracing::info;

use platstate_lib::pipeline;

use crate::cmd::ConfigArgs;
use crate::output::{OutputFormat, print_json, print_stat, print_success, print_table, print_warning};

pub fn cmd_sync(args: ConfigArgs<'_>, components: Option<&Path>, verbose: bool, output: OutputFormat) -> Result<()> {
  let config = args.resolve()?;
  let records = components.map(read_records).transpose()?;

  let mut cache = config.graph_cache();
  let rt = tokio::runtime::Runtime::new().context("Failed to create async runtime")?;
  let report = rt
    .block_on(pipeline::sync(&config, &mut cache, records))
    .map_err(|e| {
      let stage = e.stage();
      anyhow::Error::new(e).context(format!("{stage} stage failed"))
    })?;

  info!(path = %config.snapshot_path.display(), "snapshot saved");

  if output.is_json() {
    return print_json(&report.table);
  }

  for source in &report.degraded {
    print_warning(&format!("{source} versions unavailable, treated as empty"));
  }
  print_table(&report.table, verbose);
  print_stat("Snapshot", &config.snapshot_path.display().to_string());
  println!();
  print_success("Sync complete");
  Ok(())
}

fn read_records(path: &Path) -> Result<BTreeMap<String, Value>> {
  let content =
    fs::read_to_string(path).with_context(|| format!("Failed to read components from {}", path.display()))?;
  serde_json::from_str(&content).with_context(|| format!("Invalid component records in {}", path.display()))
}
