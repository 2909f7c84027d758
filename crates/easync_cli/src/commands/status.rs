//! Status command implementation.

use super::Format;
use easync_protocol::{classify, Command, MoveOutcome, PingStatus, StatusClass};
use serde::Serialize;

/// How a status code is handled.
#[derive(Debug, Serialize)]
pub struct StatusReport {
    /// Command name.
    pub command: &'static str,
    /// Status code.
    pub code: i32,
    /// Handling class.
    pub class: StatusClass,
    /// Ping status, for Ping.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ping: Option<String>,
    /// Per-item outcome, for MoveItems.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub move_outcome: Option<MoveOutcome>,
}

/// Classifies `code` for the named command.
pub fn report(command: &str, code: i32) -> Result<StatusReport, Box<dyn std::error::Error>> {
    let command =
        Command::from_name(command).ok_or_else(|| format!("unknown command {command:?}"))?;
    Ok(StatusReport {
        command: command.as_str(),
        code,
        class: classify(command, code),
        ping: (command == Command::Ping).then(|| format!("{:?}", PingStatus::from_code(code))),
        move_outcome: (command == Command::MoveItems).then(|| MoveOutcome::from_status(code)),
    })
}

/// Runs the status command.
pub fn run(command: &str, code: i32, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let format = Format::parse(format)?;
    let report = report(command, code)?;
    match format {
        Format::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        Format::Text => {
            print!("{} {}: {}", report.command, report.code, report.class.as_str());
            if let Some(ping) = &report.ping {
                print!(" ({ping})");
            }
            if let Some(outcome) = report.move_outcome {
                print!(" ({outcome:?})");
            }
            println!();
        }
    }
    Ok(())
}
