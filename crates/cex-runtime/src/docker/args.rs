//! Argument lists for each `docker` subcommand.
use std::time::Duration;

use cex_model::{ContainerConfig, ContainerId, RegistryAuth};

fn owned(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|s| s.to_string()).collect()
}

pub(crate) fn image_inspect(image: &str) -> Vec<String> {
    owned(&["image", "inspect", "--format", "{{.Id}}", image])
}

/// The password goes through stdin.
pub(crate) fn login(auth: &RegistryAuth) -> Vec<String> {
    owned(&[
        "login",
        "--username",
        &auth.username,
        "--password-stdin",
        &auth.server,
    ])
}

pub(crate) fn pull(image: &str) -> Vec<String> {
    owned(&["pull", "--quiet", image])
}

/// Environment values are passed inline; callers must not log these arguments.
pub(crate) fn create(cfg: &ContainerConfig) -> Vec<String> {
    let mut args = owned(&["create", "--name", &cfg.name]);

    for (k, v) in cfg.labels.iter() {
        args.push("--label".into());
        args.push(format!("{k}={v}"));
    }
    for kv in cfg.env.iter() {
        args.push("--env".into());
        args.push(kv.to_string());
    }
    if let Some(cpus) = cfg.cpus {
        args.push("--cpus".into());
        args.push(cpus.to_string());
    }
    if let Some(mb) = cfg.memory_mb {
        args.push("--memory".into());
        args.push(format!("{mb}m"));
    }

    args.push(cfg.image.clone());
    args.extend(cfg.command.iter().cloned());
    args
}

pub(crate) fn start(id: &ContainerId) -> Vec<String> {
    owned(&["start", id.as_str()])
}

pub(crate) fn stop(id: &ContainerId, timeout: Duration) -> Vec<String> {
    owned(&["stop", "--time", &timeout.as_secs().to_string(), id.as_str()])
}

pub(crate) fn inspect(id: &ContainerId) -> Vec<String> {
    owned(&["inspect", "--type", "container", "--format", "{{json .State}}", id.as_str()])
}

pub(crate) fn logs(id: &ContainerId, since_epoch: Option<i64>, follow: bool) -> Vec<String> {
    let mut args = owned(&["logs"]);
    if follow {
        args.push("--follow".into());
    }
    if let Some(since) = since_epoch {
        args.push("--since".into());
        args.push(since.to_string());
    }
    args.push(id.as_str().to_string());
    args
}

#[cfg(test)]
mod tests {
    use cex_model::{Env, Labels};

    use super::*;

    fn config() -> ContainerConfig {
        let mut env = Env::new();
        env.push("PORT", "8080");
        env.push("DISCOVERY_SEEDS", "a,b");
        let labels: Labels = [("ServiceName", "web")].into_iter().collect();

        ContainerConfig {
            name: "task-t1".into(),
            image: "nginx:1.27".into(),
            command: vec!["nginx".into(), "-g".into(), "daemon off;".into()],
            env,
            labels,
            cpus: Some(0.5),
            memory_mb: Some(256),
        }
    }

    #[test]
    fn create_places_image_after_options() {
        let args = create(&config());
        assert_eq!(
            args,
            vec![
                "create", "--name", "task-t1",
                "--label", "ServiceName=web",
                "--env", "PORT=8080",
                "--env", "DISCOVERY_SEEDS=a,b",
                "--cpus", "0.5",
                "--memory", "256m",
                "nginx:1.27", "nginx", "-g", "daemon off;",
            ]
        );
    }

    #[test]
    fn create_without_limits_omits_flags() {
        let mut cfg = config();
        cfg.cpus = None;
        cfg.memory_mb = None;
        let args = create(&cfg);
        assert!(!args.iter().any(|a| a == "--cpus" || a == "--memory"));
    }

    #[test]
    fn logs_flags() {
        let id = ContainerId::new("abc");
        assert_eq!(logs(&id, None, false), vec!["logs", "abc"]);
        assert_eq!(
            logs(&id, Some(1_700_000_000), true),
            vec!["logs", "--follow", "--since", "1700000000", "abc"]
        );
    }

    #[test]
    fn login_keeps_password_off_the_command_line() {
        let auth = RegistryAuth {
            server: "registry.example.com".into(),
            username: "bot".into(),
            password: "hunter2".into(),
        };
        let args = login(&auth);
        assert!(args.contains(&"--password-stdin".to_string()));
        assert!(!args.iter().any(|a| a.contains("hunter2")));
    }

    #[test]
    fn stop_uses_whole_seconds() {
        let args = stop(&ContainerId::new("abc"), Duration::from_millis(5_900));
        assert_eq!(args, vec!["stop", "--time", "5", "abc"]);
    }
}
