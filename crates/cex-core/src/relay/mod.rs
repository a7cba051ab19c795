//! Container output relay.
//!
//! Stdout and stderr are read by two independent readers feeding the same
//! [`RelaySink`]. Nothing here influences task status; failures are logged.
//! Container output never reaches the process's stdout directly: it always goes
//! through a sink.
mod sink;
pub use sink::{FanoutSink, JsonLinesSink, RelayRecord, RelaySink, TracingSink};

use std::{
    fmt,
    str::FromStr,
    sync::Arc,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use cex_model::{ContainerId, Labels};
use thiserror::Error;
use tokio::{
    io::{AsyncBufReadExt, AsyncRead, BufReader},
    task::JoinHandle,
    time,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::runtime::{ContainerRuntime, RuntimeError};

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("unknown stream type: {0:?}")]
    UnknownStream(String),

    #[error("failed to read {stream}: {source}")]
    Io {
        stream: LogStream,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogStream {
    Stdout,
    Stderr,
}

impl LogStream {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogStream::Stdout => "stdout",
            LogStream::Stderr => "stderr",
        }
    }
}

impl fmt::Display for LogStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogStream {
    type Err = RelayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "stdout" => Ok(LogStream::Stdout),
            "stderr" => Ok(LogStream::Stderr),
            other => Err(RelayError::UnknownStream(other.to_string())),
        }
    }
}

/// Relay one named stream line by line until EOF or `cancel`.
///
/// The stream name is checked before anything is read. Invalid UTF-8 is
/// replaced, never fatal. Returns the number of records emitted. EOF is a
/// normal end.
pub async fn relay_stream<R>(
    stream: &str,
    reader: R,
    sink: &dyn RelaySink,
    container: &ContainerId,
    labels: &Labels,
    cancel: &CancellationToken,
) -> Result<usize, RelayError>
where
    R: AsyncRead + Unpin,
{
    let stream: LogStream = stream.parse()?;
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::with_capacity(256);
    let mut emitted = 0usize;

    loop {
        buf.clear();
        let read = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            read = reader.read_until(b'\n', &mut buf) => read,
        };

        match read {
            Ok(0) => break,
            Ok(_) => {
                sink.emit(&RelayRecord {
                    container: container.clone(),
                    stream,
                    line: decode_line(&buf),
                    labels: labels.clone(),
                });
                emitted += 1;
            }
            Err(source) => return Err(RelayError::Io { stream, source }),
        }
    }

    Ok(emitted)
}

fn decode_line(raw: &[u8]) -> String {
    let raw = raw.strip_suffix(b"\n").unwrap_or(raw);
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    String::from_utf8_lossy(raw).into_owned()
}

/// Background relay bound to one container.
pub struct RelaySession {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl RelaySession {
    /// Open the container's followed log streams and relay both into `sink`.
    pub fn spawn(
        runtime: Arc<dyn ContainerRuntime>,
        container: ContainerId,
        labels: Labels,
        sink: Arc<dyn RelaySink>,
    ) -> Self {
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        let handle = tokio::spawn(async move {
            let streams = tokio::select! {
                biased;
                _ = token.cancelled() => return,
                res = runtime.logs(&container, None, true) => res,
            };
            let streams = match streams {
                Ok(streams) => streams,
                Err(e) => {
                    warn!(container = %container, error = %e, "log relay could not open streams");
                    return;
                }
            };

            let sink_ref = sink.as_ref();
            let (out, err) = tokio::join!(
                relay_stream("stdout", streams.stdout, sink_ref, &container, &labels, &token),
                relay_stream("stderr", streams.stderr, sink_ref, &container, &labels, &token),
            );
            for res in [out, err] {
                match res {
                    Ok(n) => debug!(container = %container, records = n, "log relay stream ended"),
                    Err(e) => warn!(container = %container, error = %e, "log relay stream failed"),
                }
            }
            sink.close();
        });

        Self { cancel, handle }
    }

    /// Signal the relay to stop and wait up to `drain` for it to close its sink.
    pub async fn stop(self, drain: Duration) {
        self.cancel.cancel();
        let mut handle = self.handle;
        match time::timeout(drain, &mut handle).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(error = %e, "log relay task failed"),
            Err(_) => {
                warn!(after = ?drain, "log relay did not stop in time; aborting");
                handle.abort();
            }
        }
    }
}

/// Relay the last `since` of the container's output into `sink`, then return.
///
/// Both streams are read to EOF. Returns the number of records emitted; a
/// failing stream is logged and counted as zero.
pub async fn capture_logs(
    runtime: &dyn ContainerRuntime,
    container: &ContainerId,
    since: Duration,
    labels: &Labels,
    sink: &dyn RelaySink,
) -> Result<usize, RuntimeError> {
    let since_epoch = SystemTime::now()
        .checked_sub(since)
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_secs() as i64);

    let streams = runtime.logs(container, since_epoch, false).await?;
    let cancel = CancellationToken::new();
    let (out, err) = tokio::join!(
        relay_stream("stdout", streams.stdout, sink, container, labels, &cancel),
        relay_stream("stderr", streams.stderr, sink, container, labels, &cancel),
    );

    let mut emitted = 0;
    for res in [out, err] {
        match res {
            Ok(n) => emitted += n,
            Err(e) => warn!(container = %container, error = %e, "log capture stream failed"),
        }
    }
    Ok(emitted)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::testing::{MemorySink, MockRuntime};

    fn container() -> ContainerId {
        ContainerId::new("c0ffee")
    }

    fn labels() -> Labels {
        [("Environment", "test")].into_iter().collect()
    }

    #[tokio::test]
    async fn one_record_per_line_until_eof() {
        let sink = JsonLinesSink::new(Vec::new());
        let reader = Cursor::new(b"testing testing testing\n123\n456".to_vec());

        let n = relay_stream(
            "stdout",
            reader,
            &sink,
            &container(),
            &labels(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();
        assert_eq!(n, 3);

        let out = String::from_utf8(sink.into_inner()).unwrap();
        let msgs: Vec<String> = out
            .lines()
            .map(|l| {
                let v: serde_json::Value = serde_json::from_str(l).unwrap();
                assert_eq!(v["Environment"], "test");
                v["msg"].as_str().unwrap().to_string()
            })
            .collect();
        assert_eq!(msgs, vec!["testing testing testing", "123", "456"]);
    }

    #[tokio::test]
    async fn unknown_stream_is_rejected_before_reading() {
        let sink = JsonLinesSink::new(Vec::new());

        let err = relay_stream(
            "stdin",
            tokio::io::empty(),
            &sink,
            &container(),
            &labels(),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, RelayError::UnknownStream(ref s) if s == "stdin"));
        assert!(sink.into_inner().is_empty());
    }

    #[tokio::test]
    async fn cancel_ends_a_blocked_reader() {
        let sink = JsonLinesSink::new(Vec::new());
        let (_keep_open, reader) = tokio::io::duplex(64);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let n = relay_stream("stderr", reader, &sink, &container(), &labels(), &cancel)
            .await
            .unwrap();
        assert_eq!(n, 0);
    }

    #[tokio::test]
    async fn session_relays_both_streams_and_closes_sink() {
        let rt = Arc::new(MockRuntime::new());
        rt.set_logs("out-1\nout-2\n", "err-1\n");
        let sink = Arc::new(MemorySink::default());

        let session = RelaySession::spawn(rt.clone(), container(), labels(), sink.clone());
        time::timeout(Duration::from_secs(5), async {
            while !sink.closed() {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();
        session.stop(Duration::from_secs(1)).await;

        let mut got = sink.lines();
        got.sort();
        assert_eq!(got, vec!["stderr:err-1", "stdout:out-1", "stdout:out-2"]);
        assert!(sink.closed());
    }

    #[tokio::test]
    async fn invalid_utf8_does_not_end_the_stream() {
        let sink = MemorySink::default();
        let mut raw = b"first\n".to_vec();
        raw.extend_from_slice(&[0xff, 0xfe, b'\n']);
        raw.extend_from_slice(b"third\r\nfourth\n");

        let n = relay_stream(
            "stdout",
            Cursor::new(raw),
            &sink,
            &container(),
            &labels(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(n, 4);
        assert_eq!(
            sink.lines(),
            vec![
                "stdout:first",
                "stdout:\u{FFFD}\u{FFFD}",
                "stdout:third",
                "stdout:fourth"
            ]
        );
    }

    #[tokio::test]
    async fn capture_reads_recent_output_into_sink() {
        let rt = MockRuntime::new();
        rt.set_logs("hello\n", "oops\n");
        let sink = MemorySink::default();

        let n = capture_logs(&rt, &container(), Duration::from_secs(180), &labels(), &sink)
            .await
            .unwrap();

        assert_eq!(n, 2);
        let mut lines = sink.lines();
        lines.sort();
        assert_eq!(lines, vec!["stderr:oops", "stdout:hello"]);
        assert!(!sink.closed());
        assert!(rt.calls().iter().any(|c| c == "logs(follow=false)"));
    }
}
