//! One-shot commands and their argument parsing.

use chrono::Utc;
use serde::Serialize;

use metricsdeck_core::metrics::{DashboardMetrics, DashboardStats};

use crate::main_lib::AppState;

pub const USAGE: &str = "\
usage: metricsdeck-fetcher [COMMAND]

commands:
  all              fetch every configured provider
  stale            fetch providers whose data is older than their interval
  provider <id>    fetch one provider
  validate <id>    check one provider's configuration
  status           print dashboard metrics and store statistics
  loop             fetch stale providers on a fixed tick (default)";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    All,
    Stale,
    Provider(String),
    Validate(String),
    Status,
    Loop,
}

impl Command {
    /// Parses the arguments that follow the program name.
    pub fn parse<I, S>(args: I) -> Result<Self, String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let args: Vec<String> = args.into_iter().map(|a| a.as_ref().to_string()).collect();
        let rest = args.get(1..).unwrap_or_default();

        let command = match args.first().map(String::as_str) {
            None | Some("loop") => Command::Loop,
            Some("all") => Command::All,
            Some("stale") => Command::Stale,
            Some("status") => Command::Status,
            Some("provider") => Command::Provider(single_id("provider", rest)?),
            Some("validate") => Command::Validate(single_id("validate", rest)?),
            Some(other) => return Err(format!("unknown command '{}'", other)),
        };

        if matches!(command, Command::Loop | Command::All | Command::Stale | Command::Status)
            && !rest.is_empty()
        {
            return Err(format!("unexpected argument '{}'", rest[0]));
        }
        Ok(command)
    }
}

fn single_id(command: &str, rest: &[String]) -> Result<String, String> {
    match rest {
        [id] if !id.trim().is_empty() => Ok(id.trim().to_string()),
        _ => Err(format!("'{}' takes exactly one provider id", command)),
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StatusReport {
    stats: DashboardStats,
    dashboard: DashboardMetrics,
}

/// Runs a one-shot command, prints its JSON result and reports whether it
/// succeeded.
pub async fn run(state: &AppState, command: &Command) -> anyhow::Result<bool> {
    let (json, ok) = match command {
        Command::All => {
            let response = state.actions.fetch_all().await;
            (serde_json::to_string_pretty(&response)?, response.success)
        }
        Command::Stale => {
            let response = state.actions.fetch_stale().await;
            (serde_json::to_string_pretty(&response)?, response.success)
        }
        Command::Provider(id) => {
            let response = state.actions.fetch_provider(id).await;
            (serde_json::to_string_pretty(&response)?, response.success)
        }
        Command::Validate(id) => {
            let response = state.actions.validate_provider(id).await;
            (serde_json::to_string_pretty(&response)?, response.valid)
        }
        Command::Status => {
            let report = StatusReport {
                stats: state.queries.dashboard_stats()?,
                dashboard: state.queries.latest_metrics(Utc::now())?,
            };
            (serde_json::to_string_pretty(&report)?, true)
        }
        Command::Loop => anyhow::bail!("loop is not a one-shot command"),
    };

    println!("{}", json);
    Ok(ok)
}
