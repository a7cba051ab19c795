//! In-memory collaborators for unit tests.
use std::{
    io::Cursor,
    sync::{
        Mutex,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use cex_model::{ContainerConfig, ContainerId, ContainerState, Env, RegistryAuth, TaskId, TaskStatus};
use tokio_util::sync::CancellationToken;

use crate::{
    discovery::{DiscoveryError, SeedDiscovery},
    driver::{DriverError, OrchestratorDriver},
    relay::{RelayRecord, RelaySink},
    runtime::{ContainerRuntime, LogStreams, RuntimeError},
    secrets::{SecretError, SecretResolver},
};

pub const CONTAINER_ID: &str = "deadbeef123123123";

#[derive(Debug)]
struct RuntimeState {
    calls: Vec<String>,
    image_present: bool,
    fail_pull: bool,
    fail_create: bool,
    fail_start: bool,
    hang_stop: bool,
    stop_exit: i64,
    stopped: bool,
    state: ContainerState,
    exit_after: Option<(usize, i64)>,
    inspects: usize,
    fail_inspect: bool,
    fail_inspect_after_stop: bool,
    inspect_delay: Duration,
    logs: (String, String),
    created: Option<ContainerConfig>,
    watch: Option<CancellationToken>,
}

/// Scriptable runtime that records every call.
///
/// The container runs until scripted otherwise; a stop makes it exit with
/// `stop_exit` (137 unless changed).
pub struct MockRuntime {
    state: Mutex<RuntimeState>,
}

impl MockRuntime {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(RuntimeState {
                calls: Vec::new(),
                image_present: true,
                fail_pull: false,
                fail_create: false,
                fail_start: false,
                hang_stop: false,
                stop_exit: 137,
                stopped: false,
                state: ContainerState::running(),
                exit_after: None,
                inspects: 0,
                fail_inspect: false,
                fail_inspect_after_stop: false,
                inspect_delay: Duration::ZERO,
                logs: (String::new(), String::new()),
                created: None,
                watch: None,
            }),
        }
    }

    fn with<R>(&self, f: impl FnOnce(&mut RuntimeState) -> R) -> R {
        f(&mut self.state.lock().unwrap())
    }

    pub fn set_image_present(&self, present: bool) {
        self.with(|s| s.image_present = present);
    }

    pub fn fail_pull(&self) {
        self.with(|s| s.fail_pull = true);
    }

    pub fn fail_create(&self) {
        self.with(|s| s.fail_create = true);
    }

    pub fn fail_start(&self) {
        self.with(|s| s.fail_start = true);
    }

    /// Stop calls never return.
    pub fn hang_stop(&self) {
        self.with(|s| s.hang_stop = true);
    }

    pub fn set_stop_exit(&self, code: i64) {
        self.with(|s| s.stop_exit = code);
    }

    pub fn set_state(&self, state: ContainerState) {
        self.with(|s| s.state = state);
    }

    /// Report running for `polls - 1` inspects, then exited with `code`.
    pub fn exit_after_polls(&self, polls: usize, code: i64) {
        self.with(|s| s.exit_after = Some((polls, code)));
    }

    pub fn fail_inspect(&self) {
        self.with(|s| s.fail_inspect = true);
    }

    pub fn fail_inspect_after_stop(&self) {
        self.with(|s| s.fail_inspect_after_stop = true);
    }

    pub fn set_inspect_delay(&self, delay: Duration) {
        self.with(|s| s.inspect_delay = delay);
    }

    pub fn set_logs(&self, stdout: &str, stderr: &str) {
        self.with(|s| s.logs = (stdout.to_string(), stderr.to_string()));
    }

    /// Record whether `token` was already cancelled at each stop call.
    pub fn observe_cancel(&self, token: CancellationToken) {
        self.with(|s| s.watch = Some(token));
    }

    pub fn inspect_count(&self) -> usize {
        self.with(|s| s.inspects)
    }

    pub fn calls(&self) -> Vec<String> {
        self.with(|s| s.calls.clone())
    }

    /// Calls without the periodic inspects.
    pub fn actions(&self) -> Vec<String> {
        self.calls().into_iter().filter(|c| c != "inspect").collect()
    }

    pub fn called(&self, prefix: &str) -> bool {
        self.calls().iter().any(|c| c.starts_with(prefix))
    }

    pub fn created(&self) -> Option<ContainerConfig> {
        self.with(|s| s.created.clone())
    }
}

#[async_trait]
impl ContainerRuntime for MockRuntime {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn image_present(&self, image: &str) -> Result<bool, RuntimeError> {
        Ok(self.with(|s| {
            s.calls.push(format!("image_present({image})"));
            s.image_present
        }))
    }

    async fn pull_image(&self, image: &str, auth: Option<&RegistryAuth>) -> Result<(), RuntimeError> {
        self.with(|s| {
            s.calls.push(format!("pull({image}, auth={})", auth.is_some()));
            if s.fail_pull {
                return Err(RuntimeError::command("pull", "manifest unknown"));
            }
            s.image_present = true;
            Ok(())
        })
    }

    async fn create_container(&self, config: &ContainerConfig) -> Result<ContainerId, RuntimeError> {
        self.with(|s| {
            s.calls.push(format!("create({})", config.name));
            if s.fail_create {
                return Err(RuntimeError::command("create", "name already in use"));
            }
            s.created = Some(config.clone());
            Ok(ContainerId::new(CONTAINER_ID))
        })
    }

    async fn start_container(&self, _id: &ContainerId) -> Result<(), RuntimeError> {
        self.with(|s| {
            s.calls.push("start".into());
            if s.fail_start {
                return Err(RuntimeError::command("start", "oci runtime error"));
            }
            Ok(())
        })
    }

    async fn stop_container(&self, _id: &ContainerId, _timeout: Duration) -> Result<(), RuntimeError> {
        let hang = self.with(|s| {
            let entry = match &s.watch {
                Some(token) => format!("stop(watch_cancelled={})", token.is_cancelled()),
                None => "stop".to_string(),
            };
            s.calls.push(entry);
            if !s.hang_stop {
                s.stopped = true;
                s.exit_after = None;
                s.state = ContainerState::exited(s.stop_exit);
            }
            s.hang_stop
        });
        if hang {
            std::future::pending::<()>().await;
        }
        Ok(())
    }

    async fn inspect_container(&self, id: &ContainerId) -> Result<ContainerState, RuntimeError> {
        let delay = self.with(|s| s.inspect_delay);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        self.with(|s| {
            s.calls.push("inspect".into());
            s.inspects += 1;
            if s.fail_inspect || (s.fail_inspect_after_stop && s.stopped) {
                return Err(RuntimeError::NotFound(id.as_str().to_string()));
            }
            if let Some((polls, code)) = s.exit_after {
                if s.inspects >= polls {
                    s.state = ContainerState::exited(code);
                    s.exit_after = None;
                }
            }
            Ok(s.state.clone())
        })
    }

    async fn logs(
        &self,
        _id: &ContainerId,
        _since_epoch: Option<i64>,
        follow: bool,
    ) -> Result<LogStreams, RuntimeError> {
        let (out, err) = self.with(|s| {
            s.calls.push(format!("logs(follow={follow})"));
            s.logs.clone()
        });
        Ok(LogStreams {
            stdout: Box::new(Cursor::new(out.into_bytes())),
            stderr: Box::new(Cursor::new(err.into_bytes())),
        })
    }
}

/// Driver that records statuses and stop calls.
#[derive(Default)]
pub struct MockDriver {
    statuses: Mutex<Vec<TaskStatus>>,
    stops: AtomicUsize,
    fail: bool,
}

impl MockDriver {
    /// Records each status, then reports a send error.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn statuses(&self) -> Vec<TaskStatus> {
        self.statuses.lock().unwrap().clone()
    }

    pub fn terminal_count(&self) -> usize {
        self.statuses().iter().filter(|s| s.is_terminal()).count()
    }

    pub fn stop_count(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OrchestratorDriver for MockDriver {
    async fn send_status(&self, _task: &TaskId, status: TaskStatus) -> Result<(), DriverError> {
        self.statuses.lock().unwrap().push(status);
        if self.fail {
            return Err(DriverError::Send("connection reset".into()));
        }
        Ok(())
    }

    async fn stop(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
    }
}

pub struct MockDiscovery {
    master: Option<String>,
    workers: Option<Vec<String>>,
    master_calls: AtomicUsize,
    worker_calls: Mutex<Vec<String>>,
}

impl MockDiscovery {
    fn build(master: Option<&str>, workers: Option<&[&str]>) -> Self {
        Self {
            master: master.map(str::to_string),
            workers: workers.map(|w| w.iter().map(|s| s.to_string()).collect()),
            master_calls: AtomicUsize::new(0),
            worker_calls: Mutex::new(Vec::new()),
        }
    }

    pub fn ok(master: &str, workers: &[&str]) -> Self {
        Self::build(Some(master), Some(workers))
    }

    pub fn master_fails() -> Self {
        Self::build(None, None)
    }

    pub fn workers_fail(master: &str) -> Self {
        Self::build(Some(master), None)
    }

    pub fn master_calls(&self) -> usize {
        self.master_calls.load(Ordering::SeqCst)
    }

    pub fn worker_calls(&self) -> Vec<String> {
        self.worker_calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl SeedDiscovery for MockDiscovery {
    async fn master_hostname(&self) -> Result<String, DiscoveryError> {
        self.master_calls.fetch_add(1, Ordering::SeqCst);
        self.master.clone().ok_or_else(|| DiscoveryError::Request {
            url: "http://agent/state".into(),
            reason: "connection refused".into(),
        })
    }

    async fn worker_hostnames(&self, master: &str) -> Result<Vec<String>, DiscoveryError> {
        self.worker_calls.lock().unwrap().push(master.to_string());
        self.workers.clone().ok_or_else(|| DiscoveryError::Parse {
            url: format!("http://{master}:5050/slaves"),
            reason: "missing slaves".into(),
        })
    }
}

/// Strips an `enc:` prefix from values, or fails every resolution.
#[derive(Default)]
pub struct MockResolver {
    fail: bool,
}

impl MockResolver {
    pub fn failing() -> Self {
        Self { fail: true }
    }
}

#[async_trait]
impl SecretResolver for MockResolver {
    async fn resolve(&self, env: Env) -> Result<Env, SecretError> {
        if self.fail {
            return Err(SecretError::Backend("vault sealed".into()));
        }
        env.try_map_values(|_, v| Ok(v.strip_prefix("enc:").map(str::to_string).unwrap_or(v)))
    }
}

/// Sink that keeps `stream:line` strings in memory.
#[derive(Default)]
pub struct MemorySink {
    lines: Mutex<Vec<String>>,
    closed: AtomicBool,
}

impl MemorySink {
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().unwrap().clone()
    }

    pub fn closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl RelaySink for MemorySink {
    fn emit(&self, record: &RelayRecord) {
        self.lines
            .lock()
            .unwrap()
            .push(format!("{}:{}", record.stream, record.line));
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}
