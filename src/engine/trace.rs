use std::time::{Duration, Instant};

use tracing::{Span, info};

/// Identifies the observations of one measurement transaction. Operations
/// that continue a transaction (a TLS handshake over a TCP connection, an
/// HTTP request over either) reuse their input's trace.
#[derive(Debug, Clone)]
pub struct Trace {
    index: i64,
    zero_time: Instant,
}

impl Trace {
    pub(crate) fn new(index: i64, zero_time: Instant) -> Self {
        Self { index, zero_time }
    }

    /// Unique, monotonically assigned index of this trace.
    pub fn index(&self) -> i64 {
        self.index
    }

    /// Seconds elapsed since the runtime zero time.
    pub fn elapsed(&self) -> f64 {
        self.zero_time.elapsed().as_secs_f64()
    }
}

/// Logs the start and the end of one operation.
pub struct OperationLogger {
    span: Span,
    message: String,
    trace_id: i64,
    started: Instant,
}

impl OperationLogger {
    pub fn start(span: &Span, trace: &Trace, message: String) -> Self {
        span.in_scope(|| info!(trace_id = trace.index(), "[#{}] {}...", trace.index(), message));
        Self {
            span: span.clone(),
            message,
            trace_id: trace.index(),
            started: Instant::now(),
        }
    }

    /// Logs the outcome; `failure` is `None` on success.
    pub fn stop(self, failure: Option<&str>) {
        let elapsed = self.started.elapsed();
        let ms = elapsed_ms(elapsed);
        self.span.in_scope(|| match failure {
            None => info!(
                trace_id = self.trace_id,
                elapsed_ms = ms,
                "[#{}] {}... ok",
                self.trace_id,
                self.message
            ),
            Some(failure) => info!(
                trace_id = self.trace_id,
                elapsed_ms = ms,
                failure = %failure,
                "[#{}] {}... {}",
                self.trace_id,
                self.message,
                failure
            ),
        });
    }
}

fn elapsed_ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}
