mod settings;
mod stdio;

use std::{sync::Arc, time::Duration};

use cex_core::{
    ControllerBuilder, DriverAdapter, ExecutorConfig, OrchestratorDriver, config::ENV_PREFIX,
};
use cex_discover::{DiscoverConfig, HttpSeedDiscovery};
use cex_observe::{LoggerConfig, LoggerTimeZone, init_local_offset, init_logger};
use cex_runtime::{
    FileSecretResolver,
    docker::{DockerCli, DockerConfig},
};
use tokio::{io::BufReader, sync::mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::{settings::AgentSettings, stdio::StdioDriver};

/// Upper bound on waiting for the controller to settle after the driver went away.
const SHUTDOWN_WAIT: Duration = Duration::from_secs(30);

fn main() -> anyhow::Result<()> {
    let log_cfg = LoggerConfig::from_env(ENV_PREFIX)?;
    // The local offset can only be read while the process is single-threaded.
    if log_cfg.tz == LoggerTimeZone::Local {
        init_local_offset();
    }

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let res = rt.block_on(run(log_cfg));
    // stdin is read on a blocking thread that never returns on its own.
    rt.shutdown_timeout(Duration::from_secs(1));
    res
}

async fn run(log_cfg: LoggerConfig) -> anyhow::Result<()> {
    // 1) logger
    init_logger(&log_cfg)?;

    // 2) configuration
    let config = ExecutorConfig::from_env()?;
    let settings = AgentSettings::from_env();
    info!(?config, secrets_dir = ?settings.secrets_dir, "executor starting");

    // 3) runtime + driver; stdout belongs to the driver alone
    let runtime = Arc::new(DockerCli::new(DockerConfig::from_env())?);
    let driver = Arc::new(StdioDriver::new(tokio::io::stdout()));

    // 4) controller
    let seed_discovery = config.seed_discovery;
    let mut builder = ControllerBuilder::new(config, runtime, driver.clone());
    if let Some(dir) = settings.secrets_dir {
        builder = builder.secrets(Arc::new(FileSecretResolver::new(dir)));
    }
    if let Some(auth) = settings.registry_auth {
        builder = builder.registry_auth(auth);
    }
    if seed_discovery {
        builder = builder.discovery(Arc::new(HttpSeedDiscovery::new(DiscoverConfig::from_env())?));
    }
    let controller = Arc::new(builder.build()?);

    // 5) command pump
    let cancel = CancellationToken::new();
    let (tx, rx) = mpsc::channel(16);
    tokio::spawn(stdio::read_commands(
        BufReader::new(tokio::io::stdin()),
        tx,
        cancel.clone(),
    ));
    let mut adapter = tokio::spawn(DriverAdapter::new(Arc::clone(&controller), rx).run(cancel.clone()));

    let settle = tokio::select! {
        _ = controller.stopped() => {
            info!(status = ?controller.terminal_status(), "task settled");
            false
        }
        _ = &mut adapter => {
            info!("driver went away");
            true
        }
        res = tokio::signal::ctrl_c() => {
            if let Err(e) = res {
                warn!(error = %e, "failed to listen for ctrl-c");
            }
            info!("interrupted");
            true
        }
    };
    cancel.cancel();

    if settle && controller.terminal_status().is_none() {
        if let Some(task) = controller.current_task() {
            info!(task = %task, "killing task before exit");
            let kill = async {
                controller.kill(&task).await;
                controller.stopped().await;
            };
            if tokio::time::timeout(SHUTDOWN_WAIT, kill).await.is_err() {
                warn!(task = %task, "task did not settle before exit");
            }
        }
    }

    driver.stop().await;
    Ok(())
}
