use std::{
    io::Write,
    sync::{Arc, Mutex},
};

use cex_model::{ContainerId, Labels};
use serde_json::{Map, Value};
use tracing::{info, warn};

use super::LogStream;

/// One container output line, ready to be emitted.
#[derive(Debug, Clone, PartialEq)]
pub struct RelayRecord {
    pub container: ContainerId,
    pub stream: LogStream,
    pub line: String,
    /// Labels attached as structured fields.
    pub labels: Labels,
}

/// Destination of relayed container output.
///
/// Called concurrently by the stdout and stderr readers.
pub trait RelaySink: Send + Sync + 'static {
    fn emit(&self, record: &RelayRecord);

    /// Called once after both readers are done.
    fn close(&self) {}
}

/// Emits each line as a `tracing` event with target `container`.
///
/// Stdout lines log at INFO, stderr lines at WARN. Lines longer than
/// `max_line_length` bytes are cut at a char boundary. Label names are not
/// known statically, so the labels travel as a single `labels` field holding
/// a JSON object.
#[derive(Debug, Clone, Copy)]
pub struct TracingSink {
    pub max_line_length: usize,
}

impl Default for TracingSink {
    fn default() -> Self {
        Self {
            max_line_length: 4096,
        }
    }
}

impl RelaySink for TracingSink {
    fn emit(&self, record: &RelayRecord) {
        let line = truncate(&record.line, self.max_line_length);
        let labels = render_labels(&record.labels);
        match record.stream {
            LogStream::Stdout => info!(
                target: "container",
                container = %record.container,
                stream = %record.stream,
                labels = %labels,
                "{line}"
            ),
            LogStream::Stderr => warn!(
                target: "container",
                container = %record.container,
                stream = %record.stream,
                labels = %labels,
                "{line}"
            ),
        }
    }
}

/// Forwards every record to each inner sink in order.
pub struct FanoutSink {
    sinks: Vec<Arc<dyn RelaySink>>,
}

impl FanoutSink {
    pub fn new(sinks: Vec<Arc<dyn RelaySink>>) -> Self {
        Self { sinks }
    }
}

impl RelaySink for FanoutSink {
    fn emit(&self, record: &RelayRecord) {
        for sink in &self.sinks {
            sink.emit(record);
        }
    }

    fn close(&self) {
        for sink in &self.sinks {
            sink.close();
        }
    }
}

/// Writes one JSON object per line to `W`:
/// `{"container": .., "stream": .., "msg": .., <label>: <value>, ..}`.
///
/// Write errors are dropped; the relay never fails because of its sink.
pub struct JsonLinesSink<W: Write + Send + 'static> {
    out: Mutex<W>,
}

impl<W: Write + Send + 'static> JsonLinesSink<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    /// Consume the sink and return the writer.
    pub fn into_inner(self) -> W {
        match self.out.into_inner() {
            Ok(w) => w,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl<W: Write + Send + 'static> RelaySink for JsonLinesSink<W> {
    fn emit(&self, record: &RelayRecord) {
        let mut obj = Map::new();
        for (k, v) in record.labels.iter() {
            obj.insert(k.to_string(), Value::String(v.to_string()));
        }
        obj.insert("container".into(), Value::String(record.container.as_str().into()));
        obj.insert("stream".into(), Value::String(record.stream.to_string()));
        obj.insert("msg".into(), Value::String(record.line.clone()));

        let Ok(mut out) = self.out.lock() else {
            return;
        };
        if serde_json::to_writer(&mut *out, &obj).is_ok() {
            let _ = out.write_all(b"\n");
        }
    }

    fn close(&self) {
        if let Ok(mut out) = self.out.lock() {
            let _ = out.flush();
        }
    }
}

fn truncate(line: &str, max: usize) -> &str {
    if line.len() <= max {
        return line;
    }
    let mut end = max;
    while !line.is_char_boundary(end) {
        end -= 1;
    }
    &line[..end]
}

fn render_labels(labels: &Labels) -> String {
    let obj: Map<String, Value> = labels
        .iter()
        .map(|(k, v)| (k.to_string(), Value::String(v.to_string())))
        .collect();
    Value::Object(obj).to_string()
}
