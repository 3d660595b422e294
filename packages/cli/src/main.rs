//! `queuectl`: enqueue shell commands and run them with a pool of workers.

mod cli;
mod commands;
mod logging;
mod settings;

use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;

use cli::{Cli, Command, ConfigCommand, DlqCommand, WorkerCommand};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = settings::load(&cli.config);
    let level = config.as_ref().map(|c| c.log_level.as_str()).unwrap_or("info");
    logging::init(level);

    // `config set` must work even when the current file fails to load.
    let result = if let Command::Config(ConfigCommand::Set { key, value }) = &cli.command {
        commands::config::set(&cli.config, key, value)
    } else {
        match config {
            Ok(config) => run(cli, config).await,
            Err(e) => Err(e),
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::debug!("Command failed: {:?}", e);
            eprintln!("error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli, config: queue_core::Config) -> Result<()> {
    match cli.command {
        Command::Enqueue(args) => commands::enqueue::run(&config, args).await,
        Command::Worker(WorkerCommand::Start { count, log_file }) => {
            commands::worker::start(&config, &cli.config, count, log_file.as_deref()).await
        }
        Command::Worker(WorkerCommand::Stop) => commands::worker::stop(&config, &cli.config).await,
        Command::Worker(WorkerCommand::Status { json }) => {
            commands::worker::status(&config, &cli.config, json).await
        }
        Command::Worker(WorkerCommand::Run) => commands::worker::run(&config).await,
        Command::Status { json } => commands::status::run(&config, &cli.config, json).await,
        Command::List { state, limit, json } => {
            commands::jobs::list(&config, state, limit, json).await
        }
        Command::Dlq(DlqCommand::List { limit, json }) => {
            commands::jobs::dlq_list(&config, limit, json).await
        }
        Command::Dlq(DlqCommand::Retry { job_id }) => {
            commands::jobs::dlq_retry(&config, &job_id).await
        }
        Command::Config(ConfigCommand::Show) => commands::config::show(&config),
        Command::Config(ConfigCommand::Set { key, value }) => {
            commands::config::set(&cli.config, &key, &value)
        }
    }
}
