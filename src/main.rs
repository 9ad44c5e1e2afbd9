mod cli;
mod config;
mod data;
mod error;
mod orchestrator;
mod poll;
mod retry;
mod screening;
mod server;
mod snapshot;
mod telemetry;
mod ui;
mod workflow;

use std::net::SocketAddr;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::error;

use cli::{Cli, Command};
use config::FactoryConfig;
use orchestrator::ApplicationRunner;
use telemetry::LogHub;
use ui::RunProgress;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {e:#}");
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    let mut config = FactoryConfig::load(cli.config.as_deref()).context("loading configuration")?;
    if cli.verbose {
        config.telemetry.log_level = "debug".to_string();
    }

    match cli.command {
        Command::Config => {
            print!("{}", toml::to_string_pretty(&config)?);
            Ok(())
        }
        Command::Run {
            magic_link,
            co_applicants,
            guarantors,
            base_url,
        } => {
            if let Some(count) = co_applicants {
                config.actors.co_applicants = count;
            }
            if let Some(count) = guarantors {
                config.actors.guarantors = count;
            }
            if base_url.is_some() {
                config.api.base_url = base_url;
            }
            let cleanup = telemetry::clear_log_files(&config.paths.logs_dir);
            telemetry::init(&config.telemetry, &config.paths.logs_dir, &LogHub::default())?;
            cleanup.report();
            run_once(config, &magic_link).await
        }
        Command::Serve { host, port } => {
            let hub = LogHub::default();
            telemetry::init(&config.telemetry, &config.paths.logs_dir, &hub)?;
            let addr: SocketAddr = format!("{host}:{port}")
                .parse()
                .with_context(|| format!("invalid listen address {host}:{port}"))?;
            server::serve(addr, server::ServerState::new(config, hub)).await?;
            Ok(())
        }
    }
}

async fn run_once(config: FactoryConfig, magic_link: &str) -> Result<()> {
    let progress = RunProgress::start(magic_link);
    let bar = progress.bar();

    let result = ApplicationRunner::new(config)
        .on_stage(move |stage| RunProgress::update_stage(&bar, stage))
        .run(magic_link)
        .await;

    match result {
        Ok(outcome) => {
            progress.succeed(&outcome.record);
            progress.print_record(&outcome.record);
            Ok(())
        }
        Err(e) => {
            progress.fail(&e);
            Err(e.into())
        }
    }
}
