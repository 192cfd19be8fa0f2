//! mictl - interactive shell over a debugger's machine interface
//!
//! Launches the configured debugger, prints everything it reports and sends
//! each line read from stdin as a command, printing its result.

use std::io::Write;
use std::sync::Arc;

use anyhow::{Context, Result};
use mictl_engine::{AppConfig, ConfigLoader, DebuggerSession, MiControl};
use mictl_utils::{init_logging_with_config, LogConfig};
use tokio::io::{AsyncBufReadExt, BufReader};

mod cli;
mod commands;
mod output;

use cli::Args;
use commands::{parse_input, Input};
use output::{format_raw, format_result, EventPrinter};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse_args();

    let mut config = load_config(&args)?;
    args.apply(&mut config);
    ConfigLoader::validate(&config)?;

    let logging = if args.verbose {
        LogConfig::development()
    } else {
        config.logging.clone()
    };
    init_logging_with_config(logging.with_env_override())?;
    tracing::info!("mictl starting");
    tracing::debug!("CLI args: {:?}", args);

    let session = DebuggerSession::launch(&config)
        .with_context(|| format!("Failed to launch {}", config.backend.program))?;
    session
        .control()
        .add_event_listener(Arc::new(EventPrinter::new(args.json)));

    let result = run_shell(session.control(), args.json).await;

    let status = session.terminate().await;
    tracing::info!(status = ?status, "mictl exiting");
    result
}

fn load_config(args: &Args) -> Result<AppConfig> {
    let config = match &args.config {
        Some(path) => ConfigLoader::load_from_path(path)?,
        None => ConfigLoader::load()?,
    };
    Ok(config)
}

/// Read commands until `quit`, end of input or the debugger going away
async fn run_shell(control: &MiControl, json: bool) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while control.is_active() {
        let Some(line) = lines.next_line().await.context("Failed to read stdin")? else {
            break;
        };

        let text = match parse_input(&line) {
            Input::Empty => continue,
            Input::Quit => break,
            Input::Mi(command) => format_result(&control.execute(command).await, json),
            Input::Console(command) => format_result(&control.execute(command).await, json),
            Input::Raw(command) => format_raw(&control.execute(command).await, json),
        };

        let mut stdout = std::io::stdout().lock();
        stdout.write_all(text.as_bytes())?;
        stdout.flush()?;
    }

    Ok(())
}
