use anyhow::Context;
use clap::error::ErrorKind;
use clap::Parser;
use tracing::{error, info, warn};

use gosr::{
    cli::{run, Cli},
    config::{Config, ProjectDir},
    logging::{init_logging, open_log_file},
};

#[tokio::main]
async fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            let code = match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => 0,
                _ => 1,
            };
            std::process::exit(code);
        }
    };

    // Load configuration
    let config = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    let command = cli.command;
    let log_path = ProjectDir::new(command.project()).log_file(command.name());
    let (log_file, log_error) = match open_log_file(&log_path) {
        Ok(file) => (Some(file), None),
        Err(e) => (None, Some(e)),
    };

    if let Err(e) = init_logging(&config.logging, log_file) {
        eprintln!("{}", e);
        std::process::exit(1);
    }
    if let Some(e) = log_error {
        warn!(error = %e, "Logging to stderr only");
    }

    info!(
        version = env!("CARGO_PKG_VERSION"),
        command = command.name(),
        project = %command.project().display(),
        "gosr starting"
    );

    let result = run(&command, &config)
        .await
        .with_context(|| format!("{} failed for {}", command.name(), command.project().display()));
    if let Err(e) = result {
        error!("Command failed: {:#}", e);
        std::process::exit(1);
    }
}
