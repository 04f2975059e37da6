//! Components command implementation.
//!
//! Builds the component graph from the definition tree and prints it in
//! dependency order.

use anyhow::{Context, Result};

use crate::cmd::ConfigArgs;
use crate::output::{OutputFormat, print_info, print_json, print_stat, symbols};

pub fn cmd_components(args: ConfigArgs<'_>, verbose: bool, output: OutputFormat) -> Result<()> {
  let config = args.resolve()?;
  let mut cache = config.graph_cache();
  let graph = cache
    .get_or_build(&config.definition_tree(), &config.build_options())
    .context("graph construction failed")?;

  if output.is_json() {
    return print_json(&graph.to_records()?);
  }

  if graph.is_empty() {
    print_info("No components defined");
    return Ok(());
  }

  for component in graph.dependency_order()? {
    println!(
      "  {} {} ({}) {}",
      symbols::INFO,
      component.mrn,
      component.kind(),
      component.mrv
    );
    if verbose {
      print_stat("location", &component.mrl);
      print_stat("channels", &component.mrt.join(", "));
      if !component.requires.is_empty() {
        print_stat("requires", &component.requires.join(", "));
      }
      for (channel, image) in &component.mri {
        print_stat(&format!("image[{channel}]"), image);
      }
    }
  }

  println!();
  print_stat("Components", &graph.len().to_string());
  print_stat("Namespaces", &graph.namespaces().join(", "));
  Ok(())
}
