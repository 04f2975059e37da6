//! CLI output formatting utilities.
//!
//! Colored status messages and the shared rendering of state tables.

use anyhow::Context;
use clap::ValueEnum;
use owo_colors::{OwoColorize, Stream};

use platstate_lib::component::{CurrentVersion, StateRecord};
use platstate_lib::state::StateTable;

#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
  #[default]
  Text,
  Json,
}

impl OutputFormat {
  pub fn is_json(self) -> bool {
    matches!(self, OutputFormat::Json)
  }
}

pub mod symbols {
  pub const SUCCESS: &str = "✓";
  pub const ERROR: &str = "✗";
  pub const WARNING: &str = "⚠";
  pub const INFO: &str = "•";
  pub const ARROW: &str = "→";
  pub const BUILD: &str = "~";
  pub const MISSING: &str = "+";
}

pub fn print_success(message: &str) {
  println!(
    "{} {}",
    symbols::SUCCESS.if_supports_color(Stream::Stdout, |s| s.green()),
    message
  );
}

pub fn print_error(message: &str) {
  eprintln!(
    "{} {}",
    symbols::ERROR.if_supports_color(Stream::Stderr, |s| s.red()),
    message.if_supports_color(Stream::Stderr, |s| s.red())
  );
}

pub fn print_warning(message: &str) {
  eprintln!(
    "{} {}",
    symbols::WARNING.if_supports_color(Stream::Stderr, |s| s.yellow()),
    message.if_supports_color(Stream::Stderr, |s| s.yellow())
  );
}

pub fn print_info(message: &str) {
  println!(
    "{} {}",
    symbols::INFO.if_supports_color(Stream::Stdout, |s| s.blue()),
    message
  );
}

pub fn print_stat(label: &str, value: &str) {
  println!(
    "  {}: {}",
    label.if_supports_color(Stream::Stdout, |s| s.dimmed()),
    value
  );
}

pub fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
  let json = serde_json::to_string_pretty(value).context("Failed to serialize to JSON")?;
  println!("{}", json);
  Ok(())
}

/// Live version(s) of a channel, or `-` when nothing was observed.
pub fn format_current(state: &StateRecord) -> String {
  match &state.mrv_cur {
    Some(CurrentVersion::One(id)) => id.clone(),
    Some(CurrentVersion::Many(ids)) => ids.join(","),
    None => "-".to_string(),
  }
}

/// One line per component channel; fresh channels only when `verbose`.
pub fn print_table(table: &StateTable, verbose: bool) {
  let mut pending = 0;
  let mut channels = 0;

  for (key, component) in table {
    for (channel, state) in &component.state {
      channels += 1;
      if state.build {
        pending += 1;
      } else if !verbose {
        continue;
      }

      let symbol = match (state.fresh, state.exists) {
        (true, _) => symbols::SUCCESS.if_supports_color(Stream::Stdout, |s| s.green()).to_string(),
        (false, true) => symbols::BUILD.if_supports_color(Stream::Stdout, |s| s.yellow()).to_string(),
        (false, false) => symbols::MISSING.if_supports_color(Stream::Stdout, |s| s.red()).to_string(),
      };
      println!(
        "  {} {} [{}] {} {} {}",
        symbol,
        key,
        channel,
        format_current(state),
        symbols::ARROW,
        component.mrv
      );
    }
  }

  println!();
  print_stat("Components", &table.len().to_string());
  print_stat("Channels", &channels.to_string());
  print_stat("Needs build", &pending.to_string());
}
