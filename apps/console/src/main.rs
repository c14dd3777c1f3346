use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::Result;
use clap::Parser;
use client_core::{CannedResponses, ClientOptions, RequestClient};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod adapter;
mod config;

use adapter::{execute, parse_command, parse_script, run_script, spawn_renderer, Flow, OutputFormat};
use config::load_settings;

#[derive(Parser, Debug)]
struct Args {
    /// Config file; defaults to ./console.toml when present.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Overrides the simulated response delay.
    #[arg(long)]
    delay_ms: Option<u64>,
    /// Print one JSON object per state instead of labels.
    #[arg(long)]
    json: bool,
    /// Comma separated commands to run instead of reading stdin, e.g. "1,clear,2".
    #[arg(long)]
    script: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let mut settings = load_settings(args.config.as_deref())?;
    if let Some(delay_ms) = args.delay_ms {
        settings.response_delay_ms = delay_ms;
    }

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&settings.log_filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let source = settings
        .fail_kinds
        .iter()
        .fold(CannedResponses::new(settings.response_delay()), |source, kind| {
            source.with_failure(*kind)
        });
    let client = RequestClient::start(
        Arc::new(source),
        ClientOptions {
            response_timeout: settings.response_timeout(),
            ..ClientOptions::default()
        },
    );
    let format = if args.json {
        OutputFormat::Json
    } else {
        OutputFormat::Labels
    };
    let renderer = spawn_renderer(&client, format);

    match args.script {
        Some(script) => {
            // Leave room for the slowest response to arrive or time out.
            let limit = settings.response_delay().max(settings.response_timeout())
                + Duration::from_secs(1);
            run_script(&client, parse_script(&script), format, limit).await?;
        }
        None => {
            info!("commands: 1 | 2 | clear | state | quit");
            let mut lines = BufReader::new(tokio::io::stdin()).lines();
            while let Some(line) = lines.next_line().await? {
                if execute(&client, parse_command(&line), format).await? == Flow::Stop {
                    break;
                }
            }
        }
    }

    // Give the renderer a moment to print the last folded state.
    tokio::time::sleep(Duration::from_millis(50)).await;
    client.shutdown().await?;
    let _ = renderer.await;
    Ok(())
}
