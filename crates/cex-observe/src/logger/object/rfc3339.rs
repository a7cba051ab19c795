use std::fmt;

use time::{OffsetDateTime, UtcOffset, format_description::well_known::Rfc3339};
use tracing_subscriber::fmt::{format::Writer, time::FormatTime};

use crate::logger::object::timezone::{LoggerTimeZone, get_or_detect_local_offset};

/// RFC3339 timestamp formatter honoring the configured [`LoggerTimeZone`].
///
/// For `Local`, the offset is re-read on every event from the cache filled by
/// [`crate::init_local_offset`]; detection failures fall back to UTC.
#[derive(Debug, Clone, Copy)]
pub struct LoggerRfc3339 {
    tz: LoggerTimeZone,
}

impl LoggerRfc3339 {
    pub fn new(tz: LoggerTimeZone) -> Self {
        Self { tz }
    }

    fn offset(&self) -> UtcOffset {
        match self.tz {
            LoggerTimeZone::Utc => UtcOffset::UTC,
            LoggerTimeZone::Local => get_or_detect_local_offset(),
        }
    }
}

impl FormatTime for LoggerRfc3339 {
    fn format_time(&self, w: &mut Writer<'_>) -> fmt::Result {
        let now = OffsetDateTime::now_utc().to_offset(self.offset());

        match now.format(&Rfc3339) {
            Ok(ts) => write!(w, "{} ", ts),
            Err(_) => write!(w, "<invalid-time> "),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn utc_timer_has_zero_offset() {
        assert_eq!(LoggerRfc3339::new(LoggerTimeZone::Utc).offset(), UtcOffset::UTC);
    }

    #[test]
    fn writes_rfc3339_with_trailing_space() {
        let timer = LoggerRfc3339::new(LoggerTimeZone::Utc);
        let mut buf = String::new();
        timer.format_time(&mut Writer::new(&mut buf)).unwrap();

        assert!(buf.ends_with(' '));
        let ts = buf.trim_end();
        assert_eq!(ts.as_bytes()[10], b'T', "not rfc3339: {ts}");
        assert!(ts.ends_with('Z'), "not utc: {ts}");
    }
}
