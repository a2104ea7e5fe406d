#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Command-line adapter that replays a pipe network scenario.

mod manifest;
mod scenario;

use std::{path::PathBuf, time::Duration};

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::{manifest::Settings, scenario::Runner};

const DEFAULT_LOG_FILTER: &str = "pipeflow=info";

/// Command-line arguments for the scenario runner.
#[derive(Debug, Parser)]
#[command(name = "pipeflow", about = "Replays pipe network scenarios")]
struct CliArgs {
    /// TOML manifest holding the network configuration.
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,
    /// TOML scenario listing the steps to replay.
    #[arg(long, value_name = "FILE")]
    scenario: PathBuf,
    /// Length of one simulation tick in milliseconds.
    #[arg(long, value_name = "MILLIS", default_value_t = 50)]
    tick_ms: u64,
}

/// Entry point for the pipeflow command-line interface.
fn main() -> Result<()> {
    init_tracing();
    let args = CliArgs::parse();

    let settings = match &args.config {
        Some(path) => manifest::load(path)?,
        None => Settings::default(),
    };
    let scenario = scenario::load(&args.scenario)?;
    info!(
        steps = scenario.steps.len(),
        tick_ms = args.tick_ms,
        "replaying scenario"
    );

    let mut runner = Runner::new(settings, Duration::from_millis(args.tick_ms.max(1)));
    runner
        .run(&scenario)
        .with_context(|| format!("scenario {} failed", args.scenario.display()))?;
    print!("{}", runner.summary());
    Ok(())
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .init();
}
