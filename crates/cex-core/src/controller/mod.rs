//! Task lifecycle controller.
//!
//! One [`Controller`] owns one task. Launch and kill are entry points called by
//! the driver; the watch monitor runs in the background. Every path that can end
//! the task goes through `finish`, and the status gate lets exactly one terminal
//! status reach the driver.
//!
//! Kill and monitor are mutually exclusive per container: kill cancels the watch
//! before anything else, then both paths race to claim the task context and only
//! the winner stops, inspects and reports.
mod build;

use std::{
    sync::{
        Arc, Mutex, MutexGuard, PoisonError,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use cex_model::{ContainerId, Env, Labels, RegistryAuth, TaskId, TaskSpec, TaskStatus};
use tokio::{task::JoinHandle, time};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::{
    config::{ConfigError, ExecutorConfig},
    discovery::{SeedDiscovery, discover_seeds},
    driver::{ExecutorHandler, OrchestratorDriver},
    error::CoreError,
    relay::{FanoutSink, JsonLinesSink, RelaySession, RelaySink, TracingSink, capture_logs},
    runtime::ContainerRuntime,
    secrets::{PlainResolver, SecretResolver},
    status::StatusReporter,
    watch::{WatchOutcome, WatchSession},
};

/// How long `finish` waits for the log relay to close its sink.
const RELAY_DRAIN: Duration = Duration::from_secs(2);

/// Builder for [`Controller`].
pub struct ControllerBuilder {
    config: ExecutorConfig,
    runtime: Arc<dyn ContainerRuntime>,
    driver: Arc<dyn OrchestratorDriver>,
    secrets: Arc<dyn SecretResolver>,
    discovery: Option<Arc<dyn SeedDiscovery>>,
    auth: Option<RegistryAuth>,
    relay_sink: Arc<dyn RelaySink>,
    console: Arc<dyn RelaySink>,
}

impl ControllerBuilder {
    pub fn new(
        config: ExecutorConfig,
        runtime: Arc<dyn ContainerRuntime>,
        driver: Arc<dyn OrchestratorDriver>,
    ) -> Self {
        Self {
            config,
            runtime,
            driver,
            secrets: Arc::new(PlainResolver),
            discovery: None,
            auth: None,
            relay_sink: Arc::new(TracingSink::default()),
            console: Arc::new(JsonLinesSink::new(std::io::stderr())),
        }
    }

    pub fn secrets(mut self, resolver: Arc<dyn SecretResolver>) -> Self {
        self.secrets = resolver;
        self
    }

    /// Seed discovery is only consulted when `seed_discovery` is enabled in the config.
    pub fn discovery(mut self, discovery: Arc<dyn SeedDiscovery>) -> Self {
        self.discovery = Some(discovery);
        self
    }

    pub fn registry_auth(mut self, auth: RegistryAuth) -> Self {
        self.auth = Some(auth);
        self
    }

    /// Sink for relayed container output. Defaults to [`TracingSink`].
    pub fn relay_sink(mut self, sink: Arc<dyn RelaySink>) -> Self {
        self.relay_sink = sink;
        self
    }

    /// Where container output lands on the executor's own console: the capture
    /// after a kill or a lost container, and the relay mirror when
    /// `container_logs_stdout` is on. Defaults to JSON lines on stderr.
    ///
    /// Stdout is never used so a driver can own it.
    pub fn console_sink(mut self, sink: Arc<dyn RelaySink>) -> Self {
        self.console = sink;
        self
    }

    pub fn build(self) -> Result<Controller, ConfigError> {
        self.config.validate()?;
        let reporter = StatusReporter::new(Arc::clone(&self.driver));

        Ok(Controller {
            inner: Arc::new(Inner {
                config: self.config,
                runtime: self.runtime,
                driver: self.driver,
                secrets: self.secrets,
                discovery: self.discovery,
                auth: self.auth,
                relay_sink: self.relay_sink,
                console: self.console,
                reporter,
                slot: Mutex::new(Slot::Empty),
                monitor: Mutex::new(None),
                stopped: CancellationToken::new(),
            }),
        })
    }
}

/// Lifecycle controller for a single task.
///
/// Cheap to clone; clones share the same task.
#[derive(Clone)]
pub struct Controller {
    inner: Arc<Inner>,
}

struct Inner {
    config: ExecutorConfig,
    runtime: Arc<dyn ContainerRuntime>,
    driver: Arc<dyn OrchestratorDriver>,
    secrets: Arc<dyn SecretResolver>,
    discovery: Option<Arc<dyn SeedDiscovery>>,
    auth: Option<RegistryAuth>,
    relay_sink: Arc<dyn RelaySink>,
    console: Arc<dyn RelaySink>,
    reporter: StatusReporter,
    slot: Mutex<Slot>,
    monitor: Mutex<Option<JoinHandle<()>>>,
    stopped: CancellationToken,
}

enum Slot {
    Empty,
    Launching { id: TaskId, killed: bool },
    Active(Arc<TaskContext>),
    Finished(TaskId),
}

impl Slot {
    fn task_id(&self) -> Option<&TaskId> {
        match self {
            Slot::Empty => None,
            Slot::Launching { id, .. } | Slot::Finished(id) => Some(id),
            Slot::Active(ctx) => Some(&ctx.task_id),
        }
    }
}

/// State of a started task, shared by the kill path and the monitor.
struct TaskContext {
    task_id: TaskId,
    container: ContainerId,
    /// Labels attached to relayed and captured output.
    labels: Labels,
    watch_cancel: CancellationToken,
    relay: Mutex<Option<RelaySession>>,
    claimed: AtomicBool,
}

impl TaskContext {
    /// Returns `true` for the single caller allowed to settle the task.
    fn claim(&self) -> bool {
        !self.claimed.swap(true, Ordering::SeqCst)
    }
}

enum KillAction {
    Terminate(Arc<TaskContext>),
    Deferred,
    NotLaunched,
    AlreadyFinished,
    Mismatch(Option<TaskId>),
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Controller {
    /// Launch `task` and return once the container is started or the launch failed.
    ///
    /// Only the first launch per controller is honored.
    #[instrument(level = "debug", skip(self, task), fields(task = %task.id))]
    pub async fn launch(&self, task: TaskSpec) {
        {
            let mut slot = lock(&self.inner.slot);
            if let Some(current) = slot.task_id() {
                warn!(task = %task.id, current = %current, "controller already owns a task; launch ignored");
                return;
            }
            *slot = Slot::Launching {
                id: task.id.clone(),
                killed: false,
            };
        }

        info!(task = %task.id, name = %task.name, image = %task.image, "launching task");
        self.inner.reporter.report(&task.id, TaskStatus::Running).await;

        match self.start(&task).await {
            Ok(Some(container)) => self.activate(&task, container).await,
            Ok(None) => {
                info!(task = %task.id, "kill requested during launch; container not created");
                self.finish(&task.id, TaskStatus::Killed, None).await;
            }
            Err(e) => {
                error!(task = %task.id, error = %e, "launch failed");
                self.finish(&task.id, TaskStatus::Failed, None).await;
            }
        }
    }

    /// Kill the task with id `task_id`.
    ///
    /// Kills for another task are ignored. A kill before anything was launched
    /// reports `Killed` right away.
    #[instrument(level = "debug", skip(self, task_id), fields(task = %task_id))]
    pub async fn kill(&self, task_id: &TaskId) {
        let action = {
            let mut slot = lock(&self.inner.slot);
            match &mut *slot {
                Slot::Active(ctx) if ctx.task_id == *task_id => KillAction::Terminate(Arc::clone(ctx)),
                Slot::Launching { id, killed } if id == task_id => {
                    *killed = true;
                    KillAction::Deferred
                }
                Slot::Finished(id) if id == task_id => KillAction::AlreadyFinished,
                Slot::Empty => KillAction::NotLaunched,
                other => KillAction::Mismatch(other.task_id().cloned()),
            }
        };

        match action {
            KillAction::Terminate(ctx) => self.terminate(&ctx).await,
            KillAction::Deferred => info!(task = %task_id, "kill recorded; applied once launch settles"),
            KillAction::NotLaunched => {
                info!(task = %task_id, "kill for a task that was never launched");
                self.finish(task_id, TaskStatus::Killed, None).await;
            }
            KillAction::AlreadyFinished => debug!(task = %task_id, "task already finished; kill ignored"),
            KillAction::Mismatch(current) => {
                warn!(task = %task_id, current = ?current, "kill for unknown task ignored")
            }
        }
    }

    /// Resolves once the driver has been stopped after the terminal status.
    pub async fn stopped(&self) {
        self.inner.stopped.cancelled().await
    }

    pub fn is_stopped(&self) -> bool {
        self.inner.stopped.is_cancelled()
    }

    /// Id of the task this controller owns, if any.
    pub fn current_task(&self) -> Option<TaskId> {
        lock(&self.inner.slot).task_id().cloned()
    }

    pub fn terminal_status(&self) -> Option<TaskStatus> {
        self.inner.reporter.terminal()
    }

    /// Wait for the background monitor to return.
    pub async fn join_monitor(&self) {
        let handle = lock(&self.inner.monitor).take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!(error = %e, "monitor task failed");
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn watch_canceller(&self) -> Option<CancellationToken> {
        match &*lock(&self.inner.slot) {
            Slot::Active(ctx) => Some(ctx.watch_cancel.clone()),
            _ => None,
        }
    }

    /// Image, environment, create, start. `Ok(None)` when a kill arrived before create.
    async fn start(&self, task: &TaskSpec) -> Result<Option<ContainerId>, CoreError> {
        let inner = &self.inner;
        task.validate()?;
        self.ensure_image(task).await?;

        let mut extra = Env::new();
        if inner.config.seed_discovery && task.labels.discovery_enabled() {
            if let Some(discovery) = &inner.discovery {
                if let Some(seeds) = discover_seeds(discovery.as_ref()).await {
                    extra.push(seeds.key(), seeds.value());
                }
            }
        }
        let env = task.env.merged(&extra);
        info!(
            task = %task.id,
            labels = ?task.labels,
            env_keys = ?env.keys(),
            "container configuration"
        );

        let env = inner.secrets.resolve(env).await?;
        let config = build::container_config(task, env, &inner.config);

        if self.kill_requested(&task.id) {
            return Ok(None);
        }

        let container = inner
            .runtime
            .create_container(&config)
            .await
            .map_err(CoreError::Create)?;
        debug!(task = %task.id, container = %container, name = %config.name, "container created");

        if let Err(source) = inner.runtime.start_container(&container).await {
            self.stop_container(&container).await;
            return Err(CoreError::Start { container, source });
        }
        Ok(Some(container))
    }

    async fn ensure_image(&self, task: &TaskSpec) -> Result<(), CoreError> {
        let runtime = &self.inner.runtime;
        let present = if task.force_pull.is_enabled() {
            false
        } else {
            match runtime.image_present(&task.image).await {
                Ok(present) => present,
                Err(e) => {
                    warn!(image = %task.image, error = %e, "image check failed; pulling");
                    false
                }
            }
        };
        if present {
            debug!(image = %task.image, "image present locally");
            return Ok(());
        }

        info!(image = %task.image, force = task.force_pull.is_enabled(), runtime = runtime.name(), "pulling image");
        runtime
            .pull_image(&task.image, self.inner.auth.as_ref())
            .await
            .map_err(|source| CoreError::ImagePull {
                image: task.image.clone(),
                source,
            })
    }

    fn kill_requested(&self, task_id: &TaskId) -> bool {
        matches!(&*lock(&self.inner.slot), Slot::Launching { id, killed: true } if id == task_id)
    }

    /// Start the watch, the relay and the monitor for a started container.
    async fn activate(&self, task: &TaskSpec, container: ContainerId) {
        let inner = &self.inner;
        let watch = WatchSession::spawn(
            Arc::clone(&inner.runtime),
            container.clone(),
            inner.config.poll_interval,
        );
        let labels = task.labels.select(&inner.config.relay_labels);
        let relay = inner.config.relay_logs.then(|| {
            let sink: Arc<dyn RelaySink> = if inner.config.container_logs_stdout {
                Arc::new(FanoutSink::new(vec![
                    Arc::clone(&inner.relay_sink),
                    Arc::clone(&inner.console),
                ]))
            } else {
                Arc::clone(&inner.relay_sink)
            };
            RelaySession::spawn(
                Arc::clone(&inner.runtime),
                container.clone(),
                labels.clone(),
                sink,
            )
        });
        let ctx = Arc::new(TaskContext {
            task_id: task.id.clone(),
            container,
            labels,
            watch_cancel: watch.canceller(),
            relay: Mutex::new(relay),
            claimed: AtomicBool::new(false),
        });

        let kill_pending = {
            let mut slot = lock(&inner.slot);
            let pending = matches!(*slot, Slot::Launching { killed: true, .. });
            *slot = Slot::Active(Arc::clone(&ctx));
            pending
        };

        let this = self.clone();
        let monitored = Arc::clone(&ctx);
        let handle = tokio::spawn(async move {
            let outcome = watch.wait().await;
            this.on_watch_outcome(&monitored, outcome).await;
        });
        *lock(&inner.monitor) = Some(handle);
        info!(task = %ctx.task_id, container = %ctx.container, "task running");

        if kill_pending {
            self.terminate(&ctx).await;
        }
    }

    async fn on_watch_outcome(&self, ctx: &TaskContext, outcome: WatchOutcome) {
        match outcome {
            WatchOutcome::Cancelled => {
                debug!(task = %ctx.task_id, "watch cancelled; status left to the kill path");
            }
            WatchOutcome::Exited(state) => {
                if !ctx.claim() {
                    debug!(task = %ctx.task_id, "task already settling; exit ignored");
                    return;
                }
                if state.exit_code == 0 {
                    info!(task = %ctx.task_id, container = %ctx.container, "container exited");
                } else {
                    warn!(
                        task = %ctx.task_id,
                        container = %ctx.container,
                        exit_code = state.exit_code,
                        "container exited with non-zero code"
                    );
                }
                self.finish(&ctx.task_id, TaskStatus::Finished, Some(ctx)).await;
            }
            WatchOutcome::Failed(e) => {
                if !ctx.claim() {
                    debug!(task = %ctx.task_id, "task already settling; watch error ignored");
                    return;
                }
                error!(task = %ctx.task_id, container = %ctx.container, error = %e, "lost track of container");
                self.stop_container(&ctx.container).await;
                self.capture(ctx).await;
                self.finish(&ctx.task_id, TaskStatus::Failed, Some(ctx)).await;
            }
        }
    }

    /// Kill path: cancel the watch, stop, inspect, capture, report.
    async fn terminate(&self, ctx: &TaskContext) {
        ctx.watch_cancel.cancel();
        if !ctx.claim() {
            debug!(task = %ctx.task_id, "task already settling; kill ignored");
            return;
        }

        info!(task = %ctx.task_id, container = %ctx.container, "killing task");
        self.stop_container(&ctx.container).await;
        let status = self.kill_decision(&ctx.container).await;
        self.capture(ctx).await;
        self.finish(&ctx.task_id, status, Some(ctx)).await;
    }

    /// A clean exit is the only evidence that turns a kill into `Finished`.
    async fn kill_decision(&self, container: &ContainerId) -> TaskStatus {
        let deadline = self.inner.config.stop_deadline();
        match time::timeout(deadline, self.inner.runtime.inspect_container(container)).await {
            Ok(Ok(state)) if state.exited_cleanly() => TaskStatus::Finished,
            Ok(Ok(state)) => {
                debug!(
                    container = %container,
                    running = state.running,
                    exit_code = state.exit_code,
                    "container did not exit cleanly"
                );
                TaskStatus::Killed
            }
            Ok(Err(e)) => {
                warn!(container = %container, error = %e, "inspect after stop failed; assuming killed");
                TaskStatus::Killed
            }
            Err(_) => {
                warn!(container = %container, after = ?deadline, "inspect after stop timed out; assuming killed");
                TaskStatus::Killed
            }
        }
    }

    /// Bounded best-effort stop.
    async fn stop_container(&self, container: &ContainerId) {
        let cfg = &self.inner.config;
        let deadline = cfg.stop_deadline();
        let stop = self.inner.runtime.stop_container(container, cfg.kill_timeout);

        match time::timeout(deadline, stop).await {
            Ok(Ok(())) => debug!(container = %container, "container stopped"),
            Ok(Err(e)) => warn!(container = %container, error = %e, "failed to stop container"),
            Err(_) => warn!(container = %container, after = ?deadline, "stop timed out; continuing"),
        }
    }

    /// Copy recent container output to the console sink unless the relay already mirrors it there.
    async fn capture(&self, ctx: &TaskContext) {
        let cfg = &self.inner.config;
        let container = &ctx.container;
        if cfg.container_logs_stdout {
            return;
        }

        let copy = capture_logs(
            self.inner.runtime.as_ref(),
            container,
            cfg.logs_since,
            &ctx.labels,
            self.inner.console.as_ref(),
        );
        match time::timeout(cfg.stop_deadline(), copy).await {
            Ok(Ok(n)) => debug!(container = %container, records = n, "container logs captured"),
            Ok(Err(e)) => warn!(container = %container, error = %e, "failed to capture container logs"),
            Err(_) => warn!(container = %container, "container log capture timed out"),
        }
    }

    /// Converge point of every path that ends the task.
    async fn finish(&self, task_id: &TaskId, status: TaskStatus, ctx: Option<&TaskContext>) {
        if let Some(ctx) = ctx {
            let relay = lock(&ctx.relay).take();
            if let Some(relay) = relay {
                relay.stop(RELAY_DRAIN).await;
            }
        }
        *lock(&self.inner.slot) = Slot::Finished(task_id.clone());

        if !self.inner.reporter.report(task_id, status).await {
            return;
        }

        time::sleep(self.inner.config.status_grace).await;
        info!(task = %task_id, status = %status, "stopping driver");
        self.inner.driver.stop().await;
        self.inner.stopped.cancel();
    }
}

#[async_trait]
impl ExecutorHandler for Controller {
    async fn on_launch(&self, task: TaskSpec) {
        self.launch(task).await;
    }

    async fn on_kill(&self, task_id: TaskId) {
        self.kill(&task_id).await;
    }
}
