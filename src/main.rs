//! kube-invariants CLI entry point.

use clap::Parser;

use kube_invariants::cli::commands::{apply, report, run, scenarios};
use kube_invariants::cli::{handle_error, load_config, Cli, Commands};
use kube_invariants::infrastructure::logging::{LogChannel, LoggerImpl};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let json = cli.json;

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(err) => handle_error(err, json),
    };

    let channel = matches!(cli.command, Commands::Run(_)).then(LogChannel::open);
    let _logger = match LoggerImpl::init(&config.logging, channel.clone()) {
        Ok(logger) => logger,
        Err(err) => handle_error(err, json),
    };

    let result = match cli.command {
        Commands::Run(args) => {
            let channel = channel.unwrap_or_else(LogChannel::open);
            run::execute(args, config, channel, json).await
        }
        Commands::Report(args) => report::execute(args, &config, json).await,
        Commands::Apply(args) => apply::execute(args, &config, json).await,
        Commands::Scenarios => scenarios::execute(&config, json),
    };

    if let Err(err) = result {
        handle_error(err, json);
    }
}
