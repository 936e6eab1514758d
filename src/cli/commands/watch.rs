//! `watch` command: track a research run end to end.
//!
//! Wires the full session together: event source (spawned runner process
//! or stdin), progress engine, cancellation controller, and the stdout
//! record stream. The first Ctrl+C requests cancellation of the in-flight
//! run; the second quits.

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::task::JoinHandle;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::WatchStream;
use tracing::{debug, info};

use crate::cli::args::WatchArgs;
use crate::config::{Config, load_config};
use crate::error::{BriefwatchError, RunnerError};
use crate::observability::metrics::init_metrics;
use crate::observability::runlog::RunLog;
use crate::progress::{CancelController, ProgressEngine};
use crate::runner::{EventChannel, NullRunner, ProcessRunner, ResearchRunner};

/// Runs the `watch` subcommand.
///
/// # Errors
///
/// Returns an error for configuration problems, runner spawn failures, or
/// stdout serialization failures. Runner misbehavior after startup is not
/// an error — it terminates the run through the record instead.
pub async fn run(args: &WatchArgs) -> Result<(), BriefwatchError> {
    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => Config::default(),
    };

    if args.metrics_port.is_some() {
        init_metrics(args.metrics_port)?;
    }

    let runlog = match args.events_file.as_ref().or(config.events_file.as_ref()) {
        Some(path) => Arc::new(RunLog::from_file(path)?),
        None => Arc::new(RunLog::noop()),
    };

    let (event_tx, event_rx) = tokio::sync::mpsc::unbounded_channel();
    let channel = EventChannel::new(event_tx);

    let command_line = args.runner.clone().or_else(|| config.runner.command.clone());
    let (runner, stream_done): (Arc<dyn ResearchRunner>, JoinHandle<()>) = match command_line {
        Some(command_line) => {
            let (program, program_args) = split_command(&command_line)?;
            info!(command = %command_line, "spawning runner");
            let (runner, reader) = ProcessRunner::spawn(
                &program,
                &program_args,
                channel.clone(),
                config.runner.status_timeout,
            )?;
            (Arc::new(runner), reader)
        }
        None => {
            info!("no runner command; reading events from stdin");
            (Arc::new(NullRunner), spawn_stdin_reader(channel.clone()))
        }
    };

    let controller = CancelController::new(Arc::clone(&runner), config.runner.cancel_cooldown);
    let handle = ProgressEngine::spawn_with_inbox(runner, config.watchdog, runlog, channel, event_rx);

    let mut records = WatchStream::from_changes(handle.subscribe());
    let mut stream_done = stream_done;
    let mut interrupted = false;

    loop {
        tokio::select! {
            maybe = records.next() => {
                let Some(record) = maybe else { break };
                println!("{}", serde_json::to_string(&record)?);
            }
            _ = tokio::signal::ctrl_c() => {
                if interrupted {
                    info!("second interrupt; quitting");
                    break;
                }
                interrupted = true;
                eprintln!("cancelling run... (press Ctrl+C again to quit)");
                controller.cancel_research().await;
            }
            _ = &mut stream_done => {
                debug!("event stream ended");
                break;
            }
        }
    }

    // Drain record changes still in flight (events already queued when
    // the stream ended are processed asynchronously by the engine).
    while let Ok(Some(record)) =
        tokio::time::timeout(Duration::from_millis(250), records.next()).await
    {
        println!("{}", serde_json::to_string(&record)?);
    }

    handle.shutdown();
    handle.join().await;
    Ok(())
}

/// Splits a shell-style command line into program and arguments.
fn split_command(command_line: &str) -> Result<(String, Vec<String>), RunnerError> {
    let mut parts = shlex::split(command_line)
        .ok_or_else(|| RunnerError::Detached(format!("unparseable runner command: {command_line}")))?
        .into_iter();
    let program = parts
        .next()
        .ok_or_else(|| RunnerError::Detached("empty runner command".to_string()))?;
    Ok((program, parts.collect()))
}

/// Forwards JSONL event lines from our stdin into the channel adapter.
fn spawn_stdin_reader(channel: EventChannel) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            channel.dispatch_line(&line);
        }
        debug!("stdin closed");
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_command_simple() {
        let (program, args) = split_command("python3 agent.py --stream").unwrap();
        assert_eq!(program, "python3");
        assert_eq!(args, vec!["agent.py".to_string(), "--stream".to_string()]);
    }

    #[test]
    fn test_split_command_quoted() {
        let (program, args) = split_command(r#"runner --topic "rust 2024""#).unwrap();
        assert_eq!(program, "runner");
        assert_eq!(args, vec!["--topic".to_string(), "rust 2024".to_string()]);
    }

    #[test]
    fn test_split_command_empty() {
        assert!(split_command("").is_err());
        assert!(split_command("   ").is_err());
    }

    #[test]
    fn test_split_command_unbalanced_quote() {
        assert!(split_command(r#"runner "unterminated"#).is_err());
    }
}
