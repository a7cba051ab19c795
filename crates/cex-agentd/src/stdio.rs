//! Line-delimited JSON driver over the process's stdin and stdout.
//!
//! Commands arrive one per line as serialized [`DriverCommand`]s. Each status is
//! written as one `{"task": .., "status": ..}` object followed by a newline.
//! Stdout carries nothing else: logs and container output go to stderr.
use async_trait::async_trait;
use cex_core::{DriverCommand, DriverError, OrchestratorDriver};
use cex_model::{TaskId, TaskStatus};
use serde::Serialize;
use tokio::{
    io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt},
    sync::{Mutex, mpsc},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

#[derive(Serialize)]
struct StatusLine<'a> {
    task: &'a TaskId,
    status: TaskStatus,
}

pub struct StdioDriver<W> {
    out: Mutex<W>,
    stopped: CancellationToken,
}

impl<W> StdioDriver<W>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
            stopped: CancellationToken::new(),
        }
    }

    #[cfg(test)]
    async fn into_inner(self) -> W {
        self.out.into_inner()
    }
}

#[async_trait]
impl<W> OrchestratorDriver for StdioDriver<W>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    async fn send_status(&self, task: &TaskId, status: TaskStatus) -> Result<(), DriverError> {
        if self.stopped.is_cancelled() {
            return Err(DriverError::Closed);
        }
        let mut line = serde_json::to_vec(&StatusLine { task, status })
            .map_err(|e| DriverError::Send(e.to_string()))?;
        line.push(b'\n');

        let mut out = self.out.lock().await;
        out.write_all(&line)
            .await
            .map_err(|e| DriverError::Send(e.to_string()))?;
        out.flush().await.map_err(|e| DriverError::Send(e.to_string()))
    }

    async fn stop(&self) {
        debug!("stdio driver stopped");
        self.stopped.cancel();
    }
}

/// Forward parsed commands from `input` into `tx` until EOF, a send failure, or `cancel`.
///
/// Blank lines are skipped; malformed lines are logged and skipped.
pub async fn read_commands<R>(input: R, tx: mpsc::Sender<DriverCommand>, cancel: CancellationToken)
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = input.lines();
    loop {
        let line = tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            line = lines.next_line() => line,
        };

        let line = match line {
            Ok(Some(line)) => line,
            Ok(None) => {
                debug!("driver input closed");
                return;
            }
            Err(e) => {
                warn!(error = %e, "failed to read driver input");
                return;
            }
        };

        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<DriverCommand>(line) {
            Ok(cmd) => {
                if tx.send(cmd).await.is_err() {
                    return;
                }
            }
            Err(e) => warn!(error = %e, "ignoring malformed driver command"),
        }
    }
}
