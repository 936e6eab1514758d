//! Child-process runner.
//!
//! Spawns the external job runner as a child process, reads its stdout as
//! the JSONL event stream, and delivers commands as JSON lines on its
//! stdin. Reply lines (`"<command>_reply"`) are routed back to the waiting
//! caller; everything else goes to the [`EventChannel`].
//!
//! The child is killed when the runner handle is dropped.

use std::collections::HashMap;
use std::process::Stdio;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::{Mutex, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::channel::EventChannel;
use super::{CancelOutcome, ResearchRunner, RunnerStatus};
use crate::error::RunnerError;

type PendingReplies = Arc<StdMutex<HashMap<String, oneshot::Sender<Value>>>>;

/// Command lines written to the runner's stdin.
#[derive(Debug, Serialize)]
#[serde(tag = "command", rename_all = "snake_case")]
enum RunnerCommand {
    Cancel,
    Reset,
    Status,
}

/// A spawned runner child process.
///
/// Commands are serialized as single JSON lines. Cancellation is advisory:
/// when the runner does not acknowledge within the reply timeout, the
/// request is still treated as delivered — the authoritative outcome
/// arrives later as a `cancelled` event on the stream.
pub struct ProcessRunner {
    stdin: Mutex<ChildStdin>,
    pending: PendingReplies,
    reply_timeout: Duration,
    // Held so kill-on-drop fires when the runner handle is dropped.
    _child: StdMutex<Child>,
}

impl std::fmt::Debug for ProcessRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessRunner")
            .field("reply_timeout", &self.reply_timeout)
            .finish_non_exhaustive()
    }
}

impl ProcessRunner {
    /// Spawns the runner and starts the stdout reader task.
    ///
    /// Events from the child's stdout flow into `channel`; the returned
    /// task handle completes when the stream ends.
    ///
    /// # Errors
    ///
    /// Returns `RunnerError::Io` if the process cannot be spawned, or
    /// `RunnerError::ChannelClosed` if its stdio was not captured.
    pub fn spawn(
        program: &str,
        args: &[String],
        channel: EventChannel,
        reply_timeout: Duration,
    ) -> Result<(Self, JoinHandle<()>), RunnerError> {
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| RunnerError::ChannelClosed("runner stdin not captured".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| RunnerError::ChannelClosed("runner stdout not captured".to_string()))?;

        let pending: PendingReplies = Arc::new(StdMutex::new(HashMap::new()));
        let reader_pending = Arc::clone(&pending);

        let reader = tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => route_line(&line, &channel, &reader_pending),
                    Ok(None) => {
                        info!("runner stream ended");
                        break;
                    }
                    Err(e) => {
                        warn!(error = %e, "runner stream read failed");
                        break;
                    }
                }
            }
        });

        Ok((
            Self {
                stdin: Mutex::new(stdin),
                pending,
                reply_timeout,
                _child: StdMutex::new(child),
            },
            reader,
        ))
    }

    /// Writes one command line to the runner's stdin.
    async fn send_command(&self, command: &RunnerCommand) -> Result<(), RunnerError> {
        let mut line = serde_json::to_string(command)
            .map_err(|e| RunnerError::Protocol(e.to_string()))?;
        line.push('\n');

        let mut stdin = self.stdin.lock().await;
        stdin
            .write_all(line.as_bytes())
            .await
            .map_err(|e| RunnerError::ChannelClosed(e.to_string()))?;
        stdin
            .flush()
            .await
            .map_err(|e| RunnerError::ChannelClosed(e.to_string()))
    }

    /// Registers interest in the next `<key>_reply` line.
    fn register_reply(&self, key: &str) -> oneshot::Receiver<Value> {
        let (tx, rx) = oneshot::channel();
        if let Ok(mut pending) = self.pending.lock() {
            // A stale sender for the same command is dropped, failing its
            // receiver immediately.
            pending.insert(key.to_string(), tx);
        }
        rx
    }

    /// Drops a registered reply slot after a timeout.
    fn forget_reply(&self, key: &str) {
        if let Ok(mut pending) = self.pending.lock() {
            pending.remove(key);
        }
    }
}

#[async_trait]
impl ResearchRunner for ProcessRunner {
    async fn request_cancel(&self) -> Result<CancelOutcome, RunnerError> {
        let rx = self.register_reply("cancel");
        self.send_command(&RunnerCommand::Cancel).await?;

        match tokio::time::timeout(self.reply_timeout, rx).await {
            Ok(Ok(reply)) => {
                if reply.get("status").and_then(Value::as_str) == Some("already_idle") {
                    Ok(CancelOutcome::AlreadyIdle)
                } else {
                    Ok(CancelOutcome::Requested)
                }
            }
            Ok(Err(_)) | Err(_) => {
                self.forget_reply("cancel");
                debug!("no cancel acknowledgment; treating request as delivered");
                Ok(CancelOutcome::Requested)
            }
        }
    }

    async fn request_reset(&self) -> Result<(), RunnerError> {
        self.send_command(&RunnerCommand::Reset).await
    }

    async fn query_status(&self) -> Result<RunnerStatus, RunnerError> {
        let rx = self.register_reply("status");
        self.send_command(&RunnerCommand::Status).await?;

        match tokio::time::timeout(self.reply_timeout, rx).await {
            Ok(Ok(reply)) => serde_json::from_value(reply)
                .map_err(|e| RunnerError::Protocol(format!("bad status reply: {e}"))),
            Ok(Err(_)) => Err(RunnerError::ChannelClosed(
                "status reply channel dropped".to_string(),
            )),
            Err(_) => {
                self.forget_reply("status");
                Err(RunnerError::StatusTimeout(
                    humantime::format_duration(self.reply_timeout).to_string(),
                ))
            }
        }
    }
}

/// Routes one stdout line: command replies to their waiting caller,
/// everything else to the event channel.
fn route_line(line: &str, channel: &EventChannel, pending: &PendingReplies) {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return;
    }

    let Ok(value) = serde_json::from_str::<Value>(trimmed) else {
        // Let the channel adapter log it as malformed.
        channel.dispatch_line(trimmed);
        return;
    };

    let reply_key = value
        .get("type")
        .and_then(Value::as_str)
        .and_then(|t| t.strip_suffix("_reply"))
        .map(str::to_string);

    if let Some(key) = reply_key {
        let sender = pending.lock().ok().and_then(|mut p| p.remove(&key));
        match sender {
            Some(tx) => {
                let _ = tx.send(value);
            }
            None => debug!(reply = %key, "unsolicited runner reply dropped"),
        }
        return;
    }

    channel.dispatch_line(trimmed);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::event::RunnerEvent;
    use tokio::sync::mpsc;

    fn channel() -> (
        EventChannel,
        mpsc::UnboundedReceiver<crate::runner::EventEnvelope>,
    ) {
        let (tx, rx) = mpsc::unbounded_channel();
        (EventChannel::new(tx), rx)
    }

    #[tokio::test]
    async fn test_spawn_streams_events() {
        let (ch, mut rx) = channel();
        let script = r#"printf '{"type":"started","total_topics":1}\n{"type":"heartbeat","message":"hi"}\n'"#;
        let (_runner, reader) = ProcessRunner::spawn(
            "sh",
            &["-c".to_string(), script.to_string()],
            ch,
            Duration::from_secs(1),
        )
        .unwrap();

        reader.await.unwrap();

        assert_eq!(
            rx.recv().await.unwrap().event,
            RunnerEvent::Started { total_topics: 1 }
        );
        assert_eq!(
            rx.recv().await.unwrap().event,
            RunnerEvent::Heartbeat {
                message: "hi".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_status_round_trip() {
        let (ch, _rx) = channel();
        // Echo a status reply for the first command line received.
        let script = concat!(
            "read -r _cmd; ",
            r#"printf '{"type":"status_reply","is_running":true,"current_phase":"researching","is_cancelled":false}\n'"#
        );
        let (runner, _reader) = ProcessRunner::spawn(
            "sh",
            &["-c".to_string(), script.to_string()],
            ch,
            Duration::from_secs(5),
        )
        .unwrap();

        let status = runner.query_status().await.unwrap();
        assert!(status.is_running);
        assert_eq!(status.current_phase, "researching");
    }

    #[tokio::test]
    async fn test_cancel_without_ack_is_still_delivered() {
        let (ch, _rx) = channel();
        let (runner, _reader) = ProcessRunner::spawn(
            "sh",
            &["-c".to_string(), "sleep 5".to_string()],
            ch,
            Duration::from_millis(100),
        )
        .unwrap();

        let outcome = runner.request_cancel().await.unwrap();
        assert_eq!(outcome, CancelOutcome::Requested);
    }

    #[tokio::test]
    async fn test_cancel_already_idle_reply() {
        let (ch, _rx) = channel();
        let script = concat!(
            "read -r _cmd; ",
            r#"printf '{"type":"cancel_reply","status":"already_idle"}\n'"#
        );
        let (runner, _reader) = ProcessRunner::spawn(
            "sh",
            &["-c".to_string(), script.to_string()],
            ch,
            Duration::from_secs(5),
        )
        .unwrap();

        let outcome = runner.request_cancel().await.unwrap();
        assert_eq!(outcome, CancelOutcome::AlreadyIdle);
    }

    #[tokio::test]
    async fn test_spawn_missing_program_fails() {
        let (ch, _rx) = channel();
        let result = ProcessRunner::spawn(
            "/nonexistent/runner-binary",
            &[],
            ch,
            Duration::from_secs(1),
        );
        assert!(matches!(result, Err(RunnerError::Io(_))));
    }
}
