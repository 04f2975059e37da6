mod cmd;
mod output;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use cmd::{ConfigArgs, HistoryCommand};
use output::OutputFormat;

/// platstate - decide which platform components need a rebuild
#[derive(Parser)]
#[command(name = "platstate")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Enable verbose output
  #[arg(short, long, global = true)]
  verbose: bool,

  /// Path to the configuration file (default: <config dir>/config.yaml)
  #[arg(short, long, global = true)]
  config: Option<PathBuf>,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Build the component graph and print it
  Components {
    /// Root of the definition tree
    #[arg(short, long)]
    definitions: Option<PathBuf>,

    /// Output format
    #[arg(short = 'o', long, value_enum, default_value = "text")]
    output: OutputFormat,
  },

  /// Run one pass and persist the state table
  Sync {
    /// Root of the definition tree
    #[arg(short, long)]
    definitions: Option<PathBuf>,

    /// Read component records from a JSON file instead of the definition tree
    #[arg(long)]
    components: Option<PathBuf>,

    /// Registry endpoint (host[:port] or URL)
    #[arg(long)]
    registry: Option<String>,

    /// Channel for host and cluster observations
    #[arg(long)]
    channel: Option<String>,

    /// Output format
    #[arg(short = 'o', long, value_enum, default_value = "text")]
    output: OutputFormat,
  },

  /// Show the current snapshot
  Status {
    /// Output format
    #[arg(short = 'o', long, value_enum, default_value = "text")]
    output: OutputFormat,
  },

  /// Inspect rotated snapshots
  #[command(subcommand)]
  History(HistoryCommand),
}

fn main() -> Result<()> {
  let cli = Cli::parse();

  let default_level = if cli.verbose { "info" } else { "warn" };
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
    .with_writer(std::io::stderr)
    .without_time()
    .init();

  let config = cli.config.as_deref();
  match cli.command {
    Commands::Components { definitions, output } => cmd::cmd_components(
      ConfigArgs {
        path: config,
        definitions,
        ..Default::default()
      },
      cli.verbose,
      output,
    ),
    Commands::Sync {
      definitions,
      components,
      registry,
      channel,
      output,
    } => cmd::cmd_sync(
      ConfigArgs {
        path: config,
        definitions,
        registry,
        channel,
      },
      components.as_deref(),
      cli.verbose,
      output,
    ),
    Commands::Status { output } => cmd::cmd_status(
      ConfigArgs {
        path: config,
        ..Default::default()
      },
      cli.verbose,
      output,
    ),
    Commands::History(command) => cmd::cmd_history(
      ConfigArgs {
        path: config,
        ..Default::default()
      },
      command,
      cli.verbose,
    ),
  }
}
