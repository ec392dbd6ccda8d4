mod commands;
mod config;
mod main_lib;
mod scheduler;

use std::process::ExitCode;

use commands::{Command, USAGE};
use config::Config;
use main_lib::{build_state, init_tracing};
use metricsdeck_core::metrics::ProviderCredentials;

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let command = match Command::parse(std::env::args().skip(1)) {
        Ok(command) => command,
        Err(message) => {
            eprintln!("{}\n\n{}", message, USAGE);
            return Ok(ExitCode::from(2));
        }
    };

    let config = Config::from_env();
    init_tracing(&config.log_format);
    let state = build_state(&config, ProviderCredentials::from_env()).await?;

    if command == Command::Loop {
        scheduler::run_stale_loop(&state, config.poll_interval).await?;
        return Ok(ExitCode::SUCCESS);
    }

    if commands::run(&state, &command).await? {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}
