//! Status delivery with at-most-once terminal semantics.
use std::sync::{Arc, Mutex};

use cex_model::{TaskId, TaskStatus};
use tracing::{debug, info, warn};

use crate::driver::OrchestratorDriver;

#[derive(Debug, Default)]
struct Delivered {
    running: bool,
    terminal: Option<TaskStatus>,
}

/// Wraps the orchestrator driver and enforces the status contract for one task:
/// - `Running` is sent at most once and never after a terminal status;
/// - exactly one terminal status gets through, later ones are dropped.
///
/// The decision is taken under a lock before the send, so two racing callers
/// can never both transmit a terminal status.
pub struct StatusReporter {
    driver: Arc<dyn OrchestratorDriver>,
    delivered: Mutex<Delivered>,
}

impl StatusReporter {
    pub fn new(driver: Arc<dyn OrchestratorDriver>) -> Self {
        Self {
            driver,
            delivered: Mutex::new(Delivered::default()),
        }
    }

    /// Transmit `status` if the contract allows it.
    ///
    /// Returns `true` if this call transmitted the status. Driver send errors are
    /// logged; the status still counts as delivered since it is never retried.
    pub async fn report(&self, task: &TaskId, status: TaskStatus) -> bool {
        if !self.admit(task, status) {
            return false;
        }

        info!(task = %task, status = %status, "reporting task status");
        if let Err(e) = self.driver.send_status(task, status).await {
            warn!(task = %task, status = %status, error = %e, "failed to deliver task status");
        }
        true
    }

    /// Terminal status already admitted, if any.
    pub fn terminal(&self) -> Option<TaskStatus> {
        self.delivered.lock().ok().and_then(|d| d.terminal)
    }

    fn admit(&self, task: &TaskId, status: TaskStatus) -> bool {
        let Ok(mut d) = self.delivered.lock() else {
            warn!(task = %task, status = %status, "status gate poisoned; dropping status");
            return false;
        };

        if let Some(sent) = d.terminal {
            warn!(task = %task, status = %status, sent = %sent, "terminal status already sent; dropping");
            return false;
        }
        if status.is_terminal() {
            d.terminal = Some(status);
            return true;
        }
        if status == TaskStatus::Running {
            if d.running {
                debug!(task = %task, "running already acknowledged; dropping");
                return false;
            }
            d.running = true;
        }
        true
    }
}
