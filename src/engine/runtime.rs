use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use tracing::Span;

use super::observations::Observations;
use super::trace::Trace;
use crate::config::Config;

/// A resource the runtime closes when the evaluation is over.
pub trait Closer: Send + Sync {
    fn close(&self);
}

enum SlotState<S> {
    Open(S),
    Taken,
    Closed,
}

/// Shared ownership cell for a connection.
///
/// The slot is registered with the [`Runtime`] when the connection is
/// established. Later stages can [`take`](ConnSlot::take) the stream (e.g. to
/// upgrade it to TLS) and optionally [`restore`](ConnSlot::restore) it. When
/// the runtime closes, whatever the slot still owns is dropped.
pub struct ConnSlot<S> {
    state: Mutex<SlotState<S>>,
}

impl<S> ConnSlot<S> {
    pub fn new(stream: S) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(SlotState::Open(stream)),
        })
    }

    fn lock(&self) -> MutexGuard<'_, SlotState<S>> {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Takes the stream out of the slot, if still there.
    pub fn take(&self) -> Option<S> {
        let mut state = self.lock();
        match std::mem::replace(&mut *state, SlotState::Taken) {
            SlotState::Open(stream) => Some(stream),
            SlotState::Taken => None,
            SlotState::Closed => {
                *state = SlotState::Closed;
                None
            }
        }
    }

    /// Puts a stream back. If the slot was closed meanwhile, the stream is
    /// dropped instead and `false` is returned.
    pub fn restore(&self, stream: S) -> bool {
        let mut state = self.lock();
        if matches!(*state, SlotState::Closed) {
            return false;
        }
        *state = SlotState::Open(stream);
        true
    }

    pub fn is_open(&self) -> bool {
        matches!(*self.lock(), SlotState::Open(_))
    }

    pub fn is_closed(&self) -> bool {
        matches!(*self.lock(), SlotState::Closed)
    }
}

impl<S: Send> Closer for ConnSlot<S> {
    fn close(&self) {
        let previous = std::mem::replace(&mut *self.lock(), SlotState::Closed);
        drop(previous);
    }
}

impl<S> fmt::Debug for ConnSlot<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match *self.lock() {
            SlotState::Open(_) => "open",
            SlotState::Taken => "taken",
            SlotState::Closed => "closed",
        };
        f.debug_struct("ConnSlot").field("state", &state).finish()
    }
}

/// Options for [`Runtime::new`].
#[derive(Debug, Clone)]
pub struct RuntimeOptions {
    /// Probe configuration (timeouts, HTTP defaults).
    pub config: Arc<Config>,

    /// Reference point for relative observation times.
    pub zero_time: Instant,

    /// Parent span of every operation log line.
    pub span: Span,
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        Self {
            config: Arc::new(Config::default()),
            zero_time: Instant::now(),
            span: Span::none(),
        }
    }
}

/// State shared by every operation of one evaluation: tracked resources,
/// collected observations and the trace counter.
///
/// All methods take `&self` and are safe to call concurrently.
pub struct Runtime {
    closers: Mutex<Vec<Arc<dyn Closer>>>,
    id_generator: AtomicI64,
    observations: Mutex<Vec<Observations>>,
    config: Arc<Config>,
    zero_time: Instant,
    span: Span,
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new(RuntimeOptions::default())
    }
}

impl Runtime {
    pub fn new(options: RuntimeOptions) -> Self {
        Self {
            closers: Mutex::new(Vec::new()),
            id_generator: AtomicI64::new(0),
            observations: Mutex::new(Vec::new()),
            config: options.config,
            zero_time: options.zero_time,
            span: options.span,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn span(&self) -> &Span {
        &self.span
    }

    pub fn zero_time(&self) -> Instant {
        self.zero_time
    }

    /// Allocates a new trace with the next index (the first is 1).
    pub fn new_trace(&self) -> Trace {
        let index = self.id_generator.fetch_add(1, Ordering::SeqCst) + 1;
        Trace::new(index, self.zero_time)
    }

    /// Registers a resource to close in [`Runtime::close`].
    pub fn track_closer(&self, closer: Arc<dyn Closer>) {
        lock(&self.closers).push(closer);
    }

    /// Number of resources currently tracked.
    pub fn tracked_closers(&self) -> usize {
        lock(&self.closers).len()
    }

    pub fn save_observations(&self, observations: Observations) {
        lock(&self.observations).push(observations);
    }

    /// Removes and returns the observations collected so far.
    pub fn extract_observations(&self) -> Vec<Observations> {
        std::mem::take(&mut *lock(&self.observations))
    }

    /// Closes every tracked resource. Idempotent: resources are forgotten
    /// once closed, so each is closed exactly once.
    pub fn close(&self) {
        let closers = std::mem::take(&mut *lock(&self.closers));
        for closer in closers {
            closer.close();
        }
    }
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("tracked_closers", &self.tracked_closers())
            .field("traces", &self.id_generator.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
}
