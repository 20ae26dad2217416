mod api;
mod cli;
mod commands;
mod config;
mod controller;
mod credentials;
mod error;
mod events;
mod logging;
mod render;
mod runtime;
mod state;
#[cfg(test)]
mod test_utils;

use anyhow::Context;
use clap::Parser;

use crate::cli::Args;
use crate::config::{expand_tilde, load_dashboard_config};
use crate::logging::init_tracing;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let _log_guard = init_tracing(args.log_dir.as_deref(), args.verbose)?;
    let config_path = expand_tilde(&args.config);
    let config = load_dashboard_config(&config_path)
        .with_context(|| format!("failed to load {}", config_path.display()))?
        .resolve(args.base_url.clone())?;
    commands::run(args, config).await
}
