mod config;
mod logging;
mod statsd;

use clap::{Args, Parser};
use config::{Config, ConfigError};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
enum CliCommand {
    /// Serve the similar-products gateway.
    Run(ConfigArgs),
    /// Load and validate a config file, then exit.
    Validate(ConfigArgs),
}

#[derive(Args)]
struct ConfigArgs {
    #[arg(long)]
    config_file_path: PathBuf,
}

#[derive(thiserror::Error, Debug)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("invalid config: {0}")]
    Validation(#[from] aggregator::config::ValidationError),
    #[error(transparent)]
    Metrics(#[from] statsd::MetricsError),
    #[error("could not start runtime: {0}")]
    Runtime(#[from] std::io::Error),
    #[error(transparent)]
    Gateway(#[from] aggregator::errors::AggregatorError),
}

fn main() -> ExitCode {
    let result = match CliCommand::parse() {
        CliCommand::Run(args) => run(&args),
        CliCommand::Validate(args) => validate(&args),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %err, "gateway exited with error");
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &ConfigArgs) -> Result<(), CliError> {
    let config = Config::from_file(&args.config_file_path)?;
    let _sentry = logging::init(config.common.logging.as_ref());

    if let Some(metrics_config) = &config.common.metrics {
        statsd::init(metrics_config)?;
    }

    tracing::info!(
        host = %config.gateway.listener.host,
        port = config.gateway.listener.port,
        upstream = %config.gateway.catalog.base_url,
        "starting similar-products gateway"
    );

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(aggregator::run(config.gateway))?;
    Ok(())
}

fn validate(args: &ConfigArgs) -> Result<(), CliError> {
    let config = Config::from_file(&args.config_file_path)?;
    config.gateway.validate()?;
    println!("{}: ok", args.config_file_path.display());
    Ok(())
}
