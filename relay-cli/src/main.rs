mod cli;
mod config;
mod error;

use crate::cli::Args;
use crate::config::FileConfig;
use chat_aggregator::Supervisor;
use clap::Parser;
use std::process;
use tokio_util::sync::CancellationToken;
use tracing::{Level, error, info};
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

#[tokio::main]
async fn main() {
    let args = Args::parse();

    if let Err(e) = run(args).await {
        error!("Application error: {}", e);
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    init_logging(args.verbose, args.quiet);

    let file = FileConfig::load(args.config.as_deref())?;
    let config = config::build(args, file)?;
    info!(
        notify_topic = %config.notify_topic,
        control_topic = %config.control_topic,
        youtube = config.youtube.is_some(),
        facebook = config.facebook.is_some(),
        kick = config.kick.is_some(),
        "starting chat relay"
    );

    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown signal received");
            signal_token.cancel();
        }
    });

    Supervisor::new(config).run(shutdown).await;
    Ok(())
}

fn init_logging(verbose: bool, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env().add_directive(Level::INFO.into())
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .init();
}
