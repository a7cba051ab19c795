use cex_model::{ContainerConfig, Env, TaskSpec};

use crate::config::ExecutorConfig;

/// Runtime configuration for `task` with an already resolved environment.
///
/// A resource becomes a hard limit when the task asks for it or the executor forces it.
pub(crate) fn container_config(task: &TaskSpec, env: Env, cfg: &ExecutorConfig) -> ContainerConfig {
    let res = &task.resources;
    let cpus = res
        .cpus
        .filter(|_| res.limit_cpu.is_enabled() || cfg.force_cpu_limit);
    let memory_mb = res
        .memory_mb
        .filter(|_| res.limit_memory.is_enabled() || cfg.force_memory_limit);

    ContainerConfig {
        name: task.container_name(),
        image: task.image.clone(),
        command: task.command.clone(),
        env,
        labels: task.labels.clone(),
        cpus,
        memory_mb,
    }
}
