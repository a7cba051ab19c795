//! Container liveness watch.
//!
//! A [`WatchSession`] polls the runtime on a fixed interval, first poll immediate,
//! and ends in exactly one [`WatchOutcome`]:
//! - `Exited`    — the container was observed stopped;
//! - `Cancelled` — cancellation was requested (kill path);
//! - `Failed`    — a poll returned an error.
//!
//! Cancellation wins over a poll result that arrives after it was requested.
use std::{sync::Arc, time::Duration};

use cex_model::{ContainerId, ContainerState};
use tokio::{
    task::JoinHandle,
    time::{self, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::runtime::{ContainerRuntime, RuntimeError};

/// Terminal state of a watch session.
#[derive(Debug)]
pub enum WatchOutcome {
    Exited(ContainerState),
    Cancelled,
    Failed(RuntimeError),
}

/// One background run of the watch loop, bound to a single container.
pub struct WatchSession {
    cancel: CancellationToken,
    handle: JoinHandle<WatchOutcome>,
}

impl WatchSession {
    /// Spawn the watch loop on the current tokio runtime.
    pub fn spawn(
        runtime: Arc<dyn ContainerRuntime>,
        container: ContainerId,
        interval: Duration,
    ) -> Self {
        let cancel = CancellationToken::new();
        let interval = interval.max(Duration::from_millis(1));
        let handle = tokio::spawn(watch_loop(runtime, container, interval, cancel.clone()));
        Self { cancel, handle }
    }

    /// Token that cancels this session. Cancelling is non-blocking and idempotent.
    pub fn canceller(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Wait for the session's outcome.
    pub async fn wait(self) -> WatchOutcome {
        match self.handle.await {
            Ok(outcome) => outcome,
            Err(e) if e.is_cancelled() => WatchOutcome::Cancelled,
            Err(e) => WatchOutcome::Failed(RuntimeError::command("watch", e.to_string())),
        }
    }
}

async fn watch_loop(
    runtime: Arc<dyn ContainerRuntime>,
    container: ContainerId,
    interval: Duration,
    cancel: CancellationToken,
) -> WatchOutcome {
    let mut ticker = time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    debug!(container = %container, interval_ms = interval.as_millis() as u64, "watch started");

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let polled = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            res = runtime.inspect_container(&container) => res,
        };
        if cancel.is_cancelled() {
            break;
        }

        match polled {
            Ok(state) if state.running => {
                trace!(container = %container, "container still running");
            }
            Ok(state) => {
                debug!(container = %container, exit_code = state.exit_code, "container exited");
                return WatchOutcome::Exited(state);
            }
            Err(e) => {
                warn!(container = %container, error = %e, "lost track of container");
                return WatchOutcome::Failed(e);
            }
        }
    }

    debug!(container = %container, "watch cancelled");
    WatchOutcome::Cancelled
}
