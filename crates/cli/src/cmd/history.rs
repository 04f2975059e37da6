use anyhow::Result;
use clap::Subcommand;
use serde::Serialize;

use crate::cmd::ConfigArgs;
use crate::output::{OutputFormat, print_info, print_json, print_stat, print_table};

#[derive(Subcommand, Debug)]
pub enum HistoryCommand {
  /// List rotated snapshots, oldest first
  List {
    /// Output format
    #[arg(short = 'o', long, value_enum, default_value = "text")]
    output: OutputFormat,
  },

  /// Show a rotated snapshot
  Show {
    /// Snapshot file name, as printed by `history list`
    name: String,

    /// Output format
    #[arg(short = 'o', long, value_enum, default_value = "text")]
    output: OutputFormat,
  },
}

pub fn cmd_history(args: ConfigArgs<'_>, command: HistoryCommand, verbose: bool) -> Result<()> {
  let store = args.resolve()?.snapshot_store();

  match command {
    HistoryCommand::List { output } => {
      let entries = store.history()?;

      if output.is_json() {
        #[derive(Serialize)]
        struct HistoryItem {
          name: String,
          created: String,
        }

        let items: Vec<HistoryItem> = entries
          .iter()
          .map(|e| HistoryItem {
            name: e.name.clone(),
            created: e.created.to_rfc3339(),
          })
          .collect();
        return print_json(&items);
      }

      if entries.is_empty() {
        print_info("No rotated snapshots");
        return Ok(());
      }
      for entry in &entries {
        println!("{} - {}", entry.name, entry.created.format("%Y-%m-%d %H:%M:%S"));
      }
      print_info(&format!("{} snapshot(s) retained", entries.len()));
    }
    HistoryCommand::Show { name, output } => {
      let table = store.load_history(&name)?;
      if output.is_json() {
        return print_json(&table);
      }
      print_stat("Snapshot", &name);
      println!();
      print_table(&table, verbose);
    }
  }

  Ok(())
}
