//! Orchestrator-facing seams.
//!
//! [`OrchestratorDriver`] is where statuses go; [`ExecutorHandler`] is the fixed
//! capability set the driver calls into; [`DriverAdapter`] binds a stream of
//! [`DriverCommand`]s to a handler.
use std::sync::Arc;

use async_trait::async_trait;
use cex_model::{TaskId, TaskSpec, TaskStatus};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum DriverError {
    #[error("driver channel closed")]
    Closed,

    #[error("failed to send status: {0}")]
    Send(String),
}

/// Sink for task statuses and the handle that ends the executor.
#[async_trait]
pub trait OrchestratorDriver: Send + Sync + 'static {
    async fn send_status(&self, task: &TaskId, status: TaskStatus) -> Result<(), DriverError>;

    /// Stop the driver after the final status has been delivered.
    async fn stop(&self);
}

/// Entry points the orchestrator driver invokes.
///
/// Both are fire-and-forget: outcomes are only visible through reported statuses.
#[async_trait]
pub trait ExecutorHandler: Send + Sync + 'static {
    async fn on_launch(&self, task: TaskSpec);

    async fn on_kill(&self, task_id: TaskId);
}

/// Command delivered by the orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DriverCommand {
    Launch(TaskSpec),
    Kill(TaskId),
    Shutdown,
}

/// Dispatches driver commands to an [`ExecutorHandler`], one at a time.
///
/// Commands are handled in arrival order; a launch is fully processed before
/// the next command is looked at.
pub struct DriverAdapter<H: ExecutorHandler> {
    handler: Arc<H>,
    commands: mpsc::Receiver<DriverCommand>,
}

impl<H: ExecutorHandler> DriverAdapter<H> {
    pub fn new(handler: Arc<H>, commands: mpsc::Receiver<DriverCommand>) -> Self {
        Self { handler, commands }
    }

    /// Run until a `Shutdown` command, channel close, or `cancel`.
    pub async fn run(mut self, cancel: CancellationToken) {
        loop {
            let cmd = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!("driver adapter cancelled");
                    return;
                }
                cmd = self.commands.recv() => cmd,
            };

            match cmd {
                Some(DriverCommand::Launch(task)) => self.handler.on_launch(task).await,
                Some(DriverCommand::Kill(id)) => self.handler.on_kill(id).await,
                Some(DriverCommand::Shutdown) => {
                    info!("driver requested shutdown");
                    return;
                }
                None => {
                    debug!("driver command channel closed");
                    return;
                }
            }
        }
    }
}
