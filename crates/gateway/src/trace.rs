//! Optional per-request diagnostic lines.
//!
//! The tracer is silent until a sink is installed. Each call emits one start
//! line and exactly one completion line; the completion is carried by a
//! [`TraceSpan`] guard so a dropped call future still reports `cancelled`.

use std::{
    fmt,
    io::Write,
    sync::{Arc, Mutex, PoisonError, RwLock},
    time::Duration,
};
use tokio::time::Instant;

/// Receives formatted trace lines. Implementations must not block for long.
pub trait TraceSink: Send + Sync {
    fn write_line(&self, line: &str);
}

/// Writes lines to any [`Write`] implementation (stderr, a file, a buffer).
pub struct WriterSink<W: Write + Send> {
    inner: Mutex<W>,
}

impl<W: Write + Send> WriterSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            inner: Mutex::new(writer),
        }
    }
}

impl WriterSink<std::io::Stderr> {
    #[must_use]
    pub fn stderr() -> Self {
        Self::new(std::io::stderr())
    }
}

impl<W: Write + Send> TraceSink for WriterSink<W> {
    fn write_line(&self, line: &str) {
        let mut w = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        // Trace output is best effort.
        let _ = writeln!(w, "{line}");
    }
}

/// Forwards lines to `tracing` at debug level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl TraceSink for TracingSink {
    fn write_line(&self, line: &str) {
        tracing::debug!(target: "wolt::trace", "{line}");
    }
}

/// Swappable holder of the current sink.
#[derive(Default)]
pub struct Tracer {
    sink: RwLock<Option<Arc<dyn TraceSink>>>,
}

impl fmt::Debug for Tracer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tracer")
            .field("enabled", &self.current().is_some())
            .finish()
    }
}

impl Tracer {
    /// Installs (`Some`) or removes (`None`) the sink. Safe to call while
    /// requests are in flight.
    pub fn set_sink(&self, sink: Option<Arc<dyn TraceSink>>) {
        *self.sink.write().unwrap_or_else(PoisonError::into_inner) = sink;
    }

    /// Snapshot of the installed sink; the read lock is released before any
    /// line is written.
    fn current(&self) -> Option<Arc<dyn TraceSink>> {
        self.sink
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn emit(&self, line: impl FnOnce() -> String) {
        if let Some(sink) = self.current() {
            sink.write_line(&line());
        }
    }

    /// Emits the start line and returns the guard that will emit the
    /// completion line.
    pub fn start<'a>(&'a self, method: &str, url: &str, body_len: Option<usize>) -> TraceSpan<'a> {
        self.emit(|| match body_len {
            Some(n) => format!("--> {method} {url} body={n}B"),
            None => format!("--> {method} {url}"),
        });
        TraceSpan {
            tracer: self,
            method: method.to_string(),
            url: url.to_string(),
            started: Instant::now(),
            finished: false,
        }
    }
}

/// Pending completion line for one call.
pub struct TraceSpan<'a> {
    tracer: &'a Tracer,
    method: String,
    url: String,
    started: Instant,
    finished: bool,
}

impl TraceSpan<'_> {
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Completion with an HTTP response.
    pub fn response(mut self, status: u16, bytes: usize) {
        self.finished = true;
        let took = round_millis(self.elapsed());
        self.tracer.emit(|| {
            format!(
                "<-- {} {} status={status} bytes={bytes} duration={took:?}",
                self.method, self.url
            )
        });
    }

    /// Completion without a usable response.
    pub fn failure(mut self, err: &dyn fmt::Display) {
        self.finished = true;
        self.emit_error(&err.to_string());
    }

    fn emit_error(&self, err: &str) {
        let took = round_millis(self.elapsed());
        self.tracer.emit(|| {
            format!(
                "<-- {} {} error={err} duration={took:?}",
                self.method, self.url
            )
        });
    }
}

impl Drop for TraceSpan<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.emit_error("cancelled");
        }
    }
}

fn round_millis(d: Duration) -> Duration {
    let micros = d.as_micros() + 500;
    Duration::from_millis(u64::try_from(micros / 1000).unwrap_or(u64::MAX))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Collects lines in memory.
    #[derive(Default)]
    pub(crate) struct LineBuffer {
        lines: Mutex<Vec<String>>,
    }

    impl LineBuffer {
        pub(crate) fn lines(&self) -> Vec<String> {
            self.lines.lock().unwrap().clone()
        }
    }

    impl TraceSink for LineBuffer {
        fn write_line(&self, line: &str) {
            self.lines.lock().unwrap().push(line.to_string());
        }
    }

    #[test]
    fn test_silent_by_default() {
        let tracer = Tracer::default();
        tracer.start("GET", "https://x.test", None).response(200, 2);
        assert!(tracer.current().is_none());
    }

    #[tokio::test]
    async fn test_start_and_response_lines() {
        let tracer = Tracer::default();
        let buf = Arc::new(LineBuffer::default());
        tracer.set_sink(Some(buf.clone()));

        tracer.start("POST", "https://x.test/search", Some(42)).response(200, 1024);
        tracer.start("GET", "https://x.test/front", None).response(204, 0);

        let lines = buf.lines();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], "--> POST https://x.test/search body=42B");
        assert!(lines[1].starts_with("<-- POST https://x.test/search status=200 bytes=1024 duration="));
        assert_eq!(lines[2], "--> GET https://x.test/front");
        assert!(!lines[3].contains("error="));
    }

    #[tokio::test]
    async fn test_failure_line_has_error_not_status() {
        let tracer = Tracer::default();
        let buf = Arc::new(LineBuffer::default());
        tracer.set_sink(Some(buf.clone()));

        tracer
            .start("GET", "https://x.test", None)
            .failure(&"connection refused");

        let lines = buf.lines();
        assert_eq!(lines.len(), 2);
        assert!(lines[1].contains("error=connection refused"));
        assert!(!lines[1].contains("status="));
        assert!(lines[1].contains("duration="));
    }

    #[tokio::test]
    async fn test_dropped_span_reports_cancelled() {
        let tracer = Tracer::default();
        let buf = Arc::new(LineBuffer::default());
        tracer.set_sink(Some(buf.clone()));
        {
            let _span = tracer.start("GET", "https://x.test", None);
        }
        let lines = buf.lines();
        assert_eq!(lines.len(), 2);
        assert!(lines[1].contains("error=cancelled"));
    }

    #[test]
    fn test_sink_removal() {
        let tracer = Tracer::default();
        let buf = Arc::new(LineBuffer::default());
        tracer.set_sink(Some(buf.clone()));
        tracer.set_sink(None);
        tracer.start("GET", "https://x.test", None).response(200, 0);
        assert!(buf.lines().is_empty());
    }

    /// Records `(target, message)` of every event.
    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<(String, String)>>>);

    impl<S: tracing::Subscriber> tracing_subscriber::Layer<S> for Captured {
        fn on_event(
            &self,
            event: &tracing::Event<'_>,
            _ctx: tracing_subscriber::layer::Context<'_, S>,
        ) {
            struct Message(String);
            impl tracing::field::Visit for Message {
                fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn fmt::Debug) {
                    if field.name() == "message" {
                        self.0 = format!("{value:?}");
                    }
                }
            }
            let mut message = Message(String::new());
            event.record(&mut message);
            self.0
                .lock()
                .unwrap()
                .push((event.metadata().target().to_string(), message.0));
        }
    }

    #[test]
    fn test_tracing_sink_emits_under_trace_target() {
        use tracing_subscriber::layer::SubscriberExt as _;

        let captured = Captured::default();
        let subscriber = tracing_subscriber::registry().with(captured.clone());
        tracing::subscriber::with_default(subscriber, || {
            let tracer = Tracer::default();
            tracer.set_sink(Some(Arc::new(TracingSink)));
            tracer.start("GET", "https://x.test/me", None).response(200, 2);
        });

        let events = captured.0.lock().unwrap().clone();
        assert_eq!(events.len(), 2);
        assert!(events.iter().all(|(target, _)| target == "wolt::trace"));
        assert_eq!(events[0].1, "--> GET https://x.test/me");
        assert!(events[1].1.starts_with("<-- GET https://x.test/me status=200 bytes=2"));
    }

    #[test]
    fn test_writer_sink_appends_newline() {
        let sink = WriterSink::new(Vec::new());
        sink.write_line("hello");
        let out = sink.inner.into_inner().unwrap();
        assert_eq!(out, b"hello\n");
    }

    #[test]
    fn test_round_millis() {
        assert_eq!(round_millis(Duration::from_micros(1499)), Duration::from_millis(1));
        assert_eq!(round_millis(Duration::from_micros(1500)), Duration::from_millis(2));
    }
}
