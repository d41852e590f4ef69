//! Transcoder process runner.
//!
//! Spawns ffmpeg with its stdout wired to an in-memory channel backing the
//! HTTP response body, and supervises it until exit. The two cancellation
//! signals are the peer closing the response (the channel's receiver is
//! dropped, so a send fails) and the session being torn down (the
//! cancellation token fires). Both kill the child immediately; the runner
//! never returns while the child is still running.

use std::path::PathBuf;
use std::process::Stdio;

use bytes::Bytes;
use tokio::io::AsyncReadExt;
use tokio::process::{ChildStderr, Command};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};

/// Read granularity for forwarding child stdout.
const CHUNK_SIZE: usize = 64 * 1024;

/// Stderr signatures of the peer hanging up mid-write; these exits are
/// expected, not transcoder failures.
const BENIGN_DISCONNECT_MARKERS: &[&str] = &["Broken pipe", "Connection reset by peer"];

/// How a transcoding run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranscodeStatus {
    /// The child drained its output and exited successfully.
    Completed,
    /// The peer stopped reading; the child was killed.
    ClientDisconnected,
    /// The session was torn down; the child was killed.
    Cancelled,
    /// The child exited with an unexpected error.
    Failed {
        /// Exit code, when the child was not killed by a signal.
        code: Option<i32>,
    },
}

enum ReadOutcome {
    Drained,
    Disconnected,
    Cancelled,
}

/// Run the transcoder, forwarding its stdout to `sink` chunk by chunk.
///
/// Returns once the child has been reaped. Stderr is collected on a side
/// task and only surfaces in logs. A failed send on `sink` means the HTTP
/// peer went away and is treated as a benign disconnect.
pub async fn run_transcoder(
    program: PathBuf,
    args: Vec<String>,
    sink: mpsc::Sender<std::io::Result<Bytes>>,
    cancel: CancellationToken,
) -> Result<TranscodeStatus> {
    let tool = program
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| program.to_string_lossy().to_string());

    tracing::debug!(tool = %tool, ?args, "spawning transcoder");

    let mut child = Command::new(&program)
        .args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| Error::Tool {
            tool: tool.clone(),
            message: format!("failed to spawn: {e}"),
        })?;

    let mut stdout = child
        .stdout
        .take()
        .ok_or_else(|| Error::Internal("transcoder stdout was not piped".to_string()))?;
    let stderr_task = child.stderr.take().map(drain_stderr);

    let mut buf = vec![0u8; CHUNK_SIZE];
    let outcome = loop {
        tokio::select! {
            _ = cancel.cancelled() => break ReadOutcome::Cancelled,
            read = stdout.read(&mut buf) => match read {
                Ok(0) => break ReadOutcome::Drained,
                Ok(n) => {
                    if sink.send(Ok(Bytes::copy_from_slice(&buf[..n]))).await.is_err() {
                        break ReadOutcome::Disconnected;
                    }
                }
                Err(e) => {
                    tracing::debug!(tool = %tool, "transcoder stdout read failed: {e}");
                    break ReadOutcome::Drained;
                }
            },
        }
    };

    match outcome {
        ReadOutcome::Disconnected => {
            tracing::debug!(tool = %tool, "peer disconnected, killing transcoder");
            reap(&mut child, stderr_task).await;
            Ok(TranscodeStatus::ClientDisconnected)
        }
        ReadOutcome::Cancelled => {
            tracing::debug!(tool = %tool, "session cancelled, killing transcoder");
            reap(&mut child, stderr_task).await;
            Ok(TranscodeStatus::Cancelled)
        }
        ReadOutcome::Drained => {
            let status = child.wait().await?;
            let stderr_text = match stderr_task {
                Some(task) => task.await.unwrap_or_default(),
                None => String::new(),
            };

            if status.success() {
                tracing::debug!(tool = %tool, "transcoder completed");
                Ok(TranscodeStatus::Completed)
            } else if is_benign_disconnect(&stderr_text) {
                tracing::debug!(tool = %tool, "transcoder exited after peer disconnect");
                Ok(TranscodeStatus::ClientDisconnected)
            } else {
                tracing::error!(
                    tool = %tool,
                    code = ?status.code(),
                    stderr = %stderr_text.trim(),
                    "transcoder failed"
                );
                Ok(TranscodeStatus::Failed {
                    code: status.code(),
                })
            }
        }
    }
}

/// Kill the child and wait for it; the process is guaranteed dead on return.
async fn reap(child: &mut tokio::process::Child, stderr_task: Option<JoinHandle<String>>) {
    if let Err(e) = child.kill().await {
        tracing::warn!("failed to kill transcoder: {e}");
    }
    if let Some(task) = stderr_task {
        task.abort();
    }
}

fn drain_stderr(mut stderr: ChildStderr) -> JoinHandle<String> {
    tokio::spawn(async move {
        let mut text = String::new();
        let _ = stderr.read_to_string(&mut text).await;
        text
    })
}

fn is_benign_disconnect(stderr: &str) -> bool {
    BENIGN_DISCONNECT_MARKERS
        .iter()
        .any(|marker| stderr.contains(marker))
}
