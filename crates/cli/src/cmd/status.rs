//! Status command implementation.
//!
//! Displays the per-channel flags of the current snapshot.

use anyhow::Result;

use crate::cmd::ConfigArgs;
use crate::output::{OutputFormat, print_error, print_info, print_json, print_table};

pub fn cmd_status(args: ConfigArgs<'_>, verbose: bool, output: OutputFormat) -> Result<()> {
  let store = args.resolve()?.snapshot_store();

  let table = match store.load_current() {
    Ok(Some(table)) => table,
    Ok(None) => {
      print_info("No snapshot found. Run 'platstate sync' to create one.");
      return Ok(());
    }
    Err(e) => {
      print_error(&format!("Error loading snapshot: {}", e));
      return Err(e.into());
    }
  };

  if output.is_json() {
    print_json(&table)?;
  } else {
    print_table(&table, verbose);
  }
  Ok(())
}
