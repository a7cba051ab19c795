use cex_core::RuntimeError;
use cex_model::ContainerState;
use serde::Deserialize;

/// Subset of `docker inspect --format '{{json .State}}'`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InspectState {
    #[serde(default)]
    status: String,
    running: bool,
    exit_code: i64,
}

pub(crate) fn parse_state(raw: &str) -> Result<ContainerState, RuntimeError> {
    let st: InspectState =
        serde_json::from_str(raw.trim()).map_err(|e| RuntimeError::Parse(format!("{e}: {raw}")))?;
    Ok(ContainerState {
        running: st.running,
        exit_code: st.exit_code,
        status: st.status,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_exited_state() {
        let raw = r#"{"Status":"exited","Running":false,"Paused":false,"Restarting":false,
            "OOMKilled":false,"Dead":false,"Pid":0,"ExitCode":137,"Error":"",
            "StartedAt":"2024-05-01T10:00:00Z","FinishedAt":"2024-05-01T10:05:00Z"}"#;
        let state = parse_state(raw).unwrap();

        assert!(!state.running);
        assert_eq!(state.exit_code, 137);
        assert_eq!(state.status, "exited");
    }

    #[test]
    fn parses_running_state_with_newline() {
        let state = parse_state("{\"Status\":\"running\",\"Running\":true,\"ExitCode\":0}\n").unwrap();
        assert!(state.running);
        assert!(!state.exited_cleanly());
    }

    #[test]
    fn garbage_is_a_parse_error() {
        assert!(matches!(parse_state("<no value>"), Err(RuntimeError::Parse(_))));
    }
}
