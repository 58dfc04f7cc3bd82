mod cli;
mod commands;
mod error;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Command};
use crate::error::CliError;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_tracing(cli.global.verbose, cli.global.log_json);

    if let Err(err) = run(cli).await {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}

fn init_tracing(verbosity: u8, json: bool) {
    let filter = match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let config_path = cli
        .global
        .config
        .clone()
        .unwrap_or_else(swmon_config::config_path);
    let config = swmon_config::load_config(Some(&config_path))
        .map_err(|e| CliError::config(config_path.display().to_string(), e))?;

    tracing::debug!(command = ?cli.command, path = %config_path.display(), "dispatching command");
    match cli.command {
        Command::Run(args) => commands::run::handle(&config, &config_path, &args).await,
        Command::Check(args) => commands::check::handle(&config, &config_path, &args, &cli.global).await,
    }
}
