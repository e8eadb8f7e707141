//! repld - replication monitor and automatic failover daemon.

use std::path::PathBuf;
use std::process::ExitCode as ProcessExitCode;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use repld::config::DaemonConfig;
use repld::orchestrator;

/// repld - replication monitor and automatic failover daemon
#[derive(Parser)]
#[command(name = "repld")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short = 'f', long = "config", default_value = "repld.toml")]
    config: PathBuf,

    /// Raise logging verbosity by one level
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> ProcessExitCode {
    let cli = Cli::parse();

    let config = match DaemonConfig::from_file(&cli.config) {
        Ok(c) => c,
        Err(e) => {
            init_logging("info", cli.verbose);
            tracing::error!(path = ?cli.config, error = %e, "failed to load configuration");
            return exit_code(repld::error::ExitCode::BadConfig);
        }
    };

    init_logging(&config.loglevel, cli.verbose);
    tracing::info!(node = config.node, cluster = %config.cluster_name, "starting");

    let code = orchestrator::run(config).await;
    exit_code(code)
}

fn init_logging(level: &str, verbose: bool) {
    let directive = if verbose { bump_level(level) } else { level.to_string() };
    let env_filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| directive.into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn bump_level(level: &str) -> String {
    match level {
        "error" => "warn",
        "warn" => "info",
        "info" => "debug",
        _ => "trace",
    }
    .to_string()
}

fn exit_code(code: repld::error::ExitCode) -> ProcessExitCode {
    ProcessExitCode::from(code.code() as u8)
}
