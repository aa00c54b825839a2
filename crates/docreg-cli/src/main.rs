//! `docreg` — command-line client for a document registry file.
//!
//! # Usage
//!
//! ```text
//! docreg --as 0xf39f…2266 store 1 QmTestCID123456789 "$(docreg hash report.pdf)"
//! docreg get 1
//! docreg --as 0xf39f…2266 pause
//! ```
//!
//! The store file is created on first use, with the caller as administrator.

mod commands;
mod config;

use std::{path::PathBuf, process::ExitCode};

use anyhow::{Context as _, Result};
use clap::Parser;
use commands::{Command, Printer};
use config::CliConfig;
use docreg_core::identity::Identity;
use docreg_store_sqlite::SqliteRegistry;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

// ─── CLI args ─────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "docreg", version, about = "Document registry client")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "docreg.toml")]
  config: PathBuf,

  /// Registry database file (overrides `store_path`).
  #[arg(long, value_name = "PATH")]
  store: Option<PathBuf>,

  /// Identity to act as (overrides `caller`).
  #[arg(long = "as", value_name = "IDENTITY")]
  caller: Option<Identity>,

  /// Print results as JSON.
  #[arg(long)]
  json: bool,

  #[command(subcommand)]
  command: Command,
}

// ─── Entry point ──────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> ExitCode {
  tracing_subscriber::fmt()
    .with_writer(std::io::stderr)
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::WARN.into())
        .from_env_lossy(),
    )
    .init();

  match run(Cli::parse()).await {
    Ok(output) => {
      println!("{output}");
      ExitCode::SUCCESS
    }
    Err(err) => {
      eprintln!("{}", commands::render_error(&err));
      ExitCode::FAILURE
    }
  }
}

async fn run(cli: Cli) -> Result<String> {
  let out = Printer { json: cli.json };
  if cli.command.is_offline() {
    return commands::run_offline(cli.command, &out);
  }

  let cfg = CliConfig::load(&cli.config)?;
  let (caller, store_path) = cfg.resolve(cli.caller, cli.store)?;

  // A fresh file needs a non-null creator; an existing one ignores it.
  let registry = SqliteRegistry::open(&store_path, caller.unwrap_or(Identity::NULL))
    .await
    .with_context(|| format!("failed to open registry at {store_path:?}"))?;

  commands::run(cli.command, &registry, caller, &out).await
}
