//! Console UI adapter: maps typed commands to events and renders published states.

use std::time::Duration;

use anyhow::Result;
use client_core::ClientHandle;
use shared::{Event, RequestKind, State};
use tokio::task::JoinHandle;
use tokio_stream::{wrappers::BroadcastStream, StreamExt};
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Send(Event),
    ShowState,
    Quit,
    Empty,
    Unknown(String),
}

/// Unknown input maps to [`Command::Unknown`], which [`execute`] only logs.
/// Folding anything, even [`Event::None`], republishes the state and would
/// cancel a request still in flight.
pub fn parse_command(line: &str) -> Command {
    let line = line.trim();
    match line.to_ascii_lowercase().as_str() {
        "" => Command::Empty,
        "clear" => Command::Send(Event::Clear),
        "state" => Command::ShowState,
        "quit" | "exit" => Command::Quit,
        other => match other.parse::<RequestKind>() {
            Ok(kind) => Command::Send(Event::Request(kind)),
            Err(_) => Command::Unknown(line.to_string()),
        },
    }
}

/// Splits a `--script` value such as `"1,clear,2"`.
pub fn parse_script(script: &str) -> Vec<Command> {
    script
        .split(',')
        .map(parse_command)
        .filter(|command| *command != Command::Empty)
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Labels,
    Json,
}

pub fn render(state: &State, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Labels => Ok(RequestKind::ALL
            .iter()
            .map(|kind| format!("{kind}: {}", state.response(*kind).unwrap_or("-")))
            .collect::<Vec<_>>()
            .join(" | ")),
        OutputFormat::Json => Ok(serde_json::to_string(state)?),
    }
}

/// Prints every published state whose rendering differs from the previous one.
pub fn spawn_renderer(client: &dyn ClientHandle, format: OutputFormat) -> JoinHandle<()> {
    let mut states = BroadcastStream::new(client.subscribe_states());
    let mut last = render(&client.state(), format).ok();
    if let Some(line) = &last {
        println!("{line}");
    }

    tokio::spawn(async move {
        while let Some(next) = states.next().await {
            let state = match next {
                Ok(state) => state,
                Err(err) => {
                    warn!(error = %err, "renderer fell behind; skipping states");
                    continue;
                }
            };
            match render(&state, format) {
                Ok(line) if last.as_deref() != Some(line.as_str()) => {
                    println!("{line}");
                    last = Some(line);
                }
                Ok(_) => {}
                Err(err) => warn!(error = %err, "failed to render state"),
            }
        }
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Stop,
}

pub async fn execute(
    client: &dyn ClientHandle,
    command: Command,
    format: OutputFormat,
) -> Result<Flow> {
    match command {
        Command::Send(event) => {
            info!(event = event.name(), "sending event");
            client.send_event(event)?;
        }
        Command::ShowState => {
            println!("{}", render(&client.state(), format)?);
            println!("in flight: {}", client.in_flight());
        }
        Command::Quit => return Ok(Flow::Stop),
        Command::Empty => {}
        Command::Unknown(input) => {
            warn!(%input, "unrecognized command; expected 1, 2, clear, state or quit");
        }
    }
    Ok(Flow::Continue)
}

/// Runs a scripted command list, then waits for outstanding responses.
pub async fn run_script(
    client: &dyn ClientHandle,
    commands: Vec<Command>,
    format: OutputFormat,
    settle_limit: Duration,
) -> Result<bool> {
    for command in commands {
        if execute(client, command, format).await? == Flow::Stop {
            return Ok(true);
        }
    }
    let settled = client.settle(settle_limit).await;
    if !settled {
        warn!(
            in_flight = client.in_flight(),
            "script finished with responses still outstanding"
        );
    }
    Ok(settled)
}

#[cfg(test)]
#[path = "tests/adapter_tests.rs"]
mod tests;
