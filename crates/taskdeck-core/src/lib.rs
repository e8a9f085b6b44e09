pub mod auth;
pub mod backend;
pub mod cache;
pub mod cli;
pub mod config;
pub mod datetime;
pub mod error;
pub mod filter;
pub mod filter_state;
pub mod render;
pub mod shell;
pub mod validation;

use std::ffi::OsString;

use anyhow::Context;
use clap::Parser;
use tracing::{
  debug,
  info
};

pub use error::{
  TaskError,
  TaskResult
};

#[tracing::instrument(skip_all)]
pub fn run(
  raw_args: Vec<OsString>
) -> anyhow::Result<()> {
  let cli =
    cli::GlobalCli::parse_from(raw_args);

  cli::init_tracing(
    cli.verbose,
    cli.quiet
  )?;

  info!(
    verbose = cli.verbose,
    quiet = cli.quiet,
    "starting taskdeck"
  );

  let mut cfg = config::AppConfig::load(
    cli.config.as_deref()
  )?;
  cfg.apply_overrides(|key| {
    std::env::var(key).ok()
  });
  if cli.demo {
    cfg.demo_mode = true;
  }
  if let Some(url) = cli.api_url {
    cfg.api_base_url = url;
  }
  debug!(
    demo_mode = cfg.demo_mode,
    api_base_url = %cfg.api_base_url,
    "effective config"
  );

  let runtime =
    tokio::runtime::Builder::new_current_thread()
      .enable_io()
      .enable_time()
      .build()
      .context(
        "failed to start async runtime"
      )?;

  runtime.block_on(shell::run_session(
    cfg, cli.rest
  ))
}
