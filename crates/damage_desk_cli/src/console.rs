//! Line commands for the interactive review loop.

use std::time::Duration;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConsoleCommand {
    List,
    Accept(usize),
    Cancel,
    Reject(usize),
    Refresh,
    Help,
    Quit,
    Empty,
    Invalid(String),
}

/// Whole seconds as `5s`, anything else as `1500ms`.
pub fn format_delay(delay: Duration) -> String {
    if delay.subsec_millis() == 0 {
        format!("{}s", delay.as_secs())
    } else {
        format!("{}ms", delay.as_millis())
    }
}

pub fn help_text(accept_delay: Duration) -> String {
    format!(
        "\
commands:
  list          show the report table
  accept <row>  accept a report ({} to cancel)
  cancel        cancel the pending accept
  reject <row>  reject a report
  refresh       reload reports from the backend
  help          show this help
  quit          leave (a pending accept is cancelled)",
        format_delay(accept_delay)
    )
}

pub fn parse_command(line: &str) -> ConsoleCommand {
    let mut parts = line.split_whitespace();
    let Some(verb) = parts.next() else {
        return ConsoleCommand::Empty;
    };
    let arg = parts.next();
    let row = || -> Result<usize, ConsoleCommand> {
        let raw = arg.ok_or_else(|| ConsoleCommand::Invalid(format!("{} needs a row number", verb)))?;
        raw.parse::<usize>()
            .map_err(|_| ConsoleCommand::Invalid(format!("not a row number: {}", raw)))
    };
    let parsed = match verb.to_ascii_lowercase().as_str() {
        "list" | "ls" => Ok(ConsoleCommand::List),
        "accept" | "a" => row().map(ConsoleCommand::Accept),
        "cancel" | "c" => Ok(ConsoleCommand::Cancel),
        "reject" | "r" => row().map(ConsoleCommand::Reject),
        "refresh" => Ok(ConsoleCommand::Refresh),
        "help" | "?" => Ok(ConsoleCommand::Help),
        "quit" | "exit" | "q" => Ok(ConsoleCommand::Quit),
        other => Err(ConsoleCommand::Invalid(format!("unknown command: {}", other))),
    };
    parsed.unwrap_or_else(|invalid| invalid)
}
