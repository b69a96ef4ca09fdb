//! Reentrancy-safe FIFO event queue.
//!
//! Whoever posts into an idle queue becomes the *drainer*: it processes
//! events, oldest first, until the queue is empty. Posting while a drain is in
//! progress only appends to the queue, so a hook that posts an event extends
//! the current drain instead of recursing into it.
//!
//! The queue and the draining flag share one lock. "Queue is empty, so stop
//! draining" and "push, then check whether someone is draining" are each a
//! single critical section, so an event posted from another task can never be
//! left behind without a drainer.

use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};

use futures::FutureExt;
use parking_lot::Mutex;
use tracing::{Instrument, debug_span, error};

use crate::error::{BoxError, HandlerResult};
use crate::event::Event;
use crate::features::HookHandler;

// =============================================================================
// Handler failures
// =============================================================================

/// Why a hook or command handler did not complete successfully.
#[derive(Debug)]
pub enum HandlerFailure {
    /// The handler returned an error.
    Error(BoxError),
    /// The handler panicked.
    Panic(String),
}

impl fmt::Display for HandlerFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Error(e) => write!(f, "{e}"),
            Self::Panic(msg) => write!(f, "panicked: {msg}"),
        }
    }
}

/// Runs a handler future, turning both errors and panics into a
/// [`HandlerFailure`].
pub async fn run_handler<F>(handler: F) -> Result<(), HandlerFailure>
where
    F: Future<Output = HandlerResult>,
{
    match AssertUnwindSafe(handler).catch_unwind().await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(HandlerFailure::Error(e)),
        Err(payload) => {
            let msg = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            Err(HandlerFailure::Panic(msg))
        }
    }
}

// =============================================================================
// Dispatcher
// =============================================================================

/// Counters exposed by [`Dispatcher::stats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    /// Events fully processed.
    pub events: u64,
    /// Hooks that returned an error or panicked.
    pub hook_failures: u64,
}

#[derive(Default)]
struct DispatchQueue {
    events: VecDeque<Event>,
    draining: bool,
}

/// The bot's event queue.
#[derive(Default)]
pub struct Dispatcher {
    queue: Mutex<DispatchQueue>,
    events: AtomicU64,
    hook_failures: AtomicU64,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `event` and, if no drain is running, drains the queue with
    /// `process`.
    ///
    /// Returns once the event has been queued (if another drain is running)
    /// or once the queue is empty (if this call became the drainer).
    pub async fn dispatch<P, Fut>(&self, event: Event, mut process: P)
    where
        P: FnMut(Event) -> Fut,
        Fut: Future<Output = ()>,
    {
        if !self.enqueue(event) {
            return;
        }

        let mut drain = Drain {
            dispatcher: self,
            finished: false,
        };
        while let Some(event) = drain.next() {
            let span = debug_span!("dispatch", event = %event.kind());
            process(event).instrument(span).await;
            self.events.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Fires `hooks` in order with a copy of `event` each.
    ///
    /// A hook that fails or panics is logged and counted; the rest still run.
    pub async fn fire(&self, event: &Event, hooks: Vec<(String, HookHandler)>) {
        for (plugin, hook) in hooks {
            let event = event.clone();
            let kind = event.kind();
            if let Err(failure) = run_handler(async move { hook(event).await }).await {
                self.hook_failures.fetch_add(1, Ordering::Relaxed);
                error!(plugin = %plugin, event = %kind, error = %failure, "Hook failed");
            }
        }
    }

    /// Appends `event` to the running drain without claiming it.
    ///
    /// Only the drainer itself (code running inside `process`) may call this;
    /// anywhere else use [`dispatch`](Self::dispatch).
    pub(crate) fn push_within_drain(&self, event: Event) {
        let mut queue = self.queue.lock();
        debug_assert!(queue.draining, "push_within_drain called outside a drain");
        queue.events.push_back(event);
    }

    /// Number of events waiting to be processed.
    pub fn pending(&self) -> usize {
        self.queue.lock().events.len()
    }

    /// Whether a drain is currently running.
    pub fn is_draining(&self) -> bool {
        self.queue.lock().draining
    }

    pub fn stats(&self) -> DispatchStats {
        DispatchStats {
            events: self.events.load(Ordering::Relaxed),
            hook_failures: self.hook_failures.load(Ordering::Relaxed),
        }
    }

    /// Pushes `event`; returns `true` if the caller must drain.
    fn enqueue(&self, event: Event) -> bool {
        let mut queue = self.queue.lock();
        queue.events.push_back(event);
        if queue.draining {
            false
        } else {
            queue.draining = true;
            true
        }
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let queue = self.queue.lock();
        f.debug_struct("Dispatcher")
            .field("pending", &queue.events.len())
            .field("draining", &queue.draining)
            .field("stats", &self.stats())
            .finish()
    }
}

/// The drainer's claim on the queue.
///
/// If the drain future is dropped part way (its task was cancelled) the
/// claim is released so the next post starts a new drain.
struct Drain<'a> {
    dispatcher: &'a Dispatcher,
    finished: bool,
}

impl Drain<'_> {
    fn next(&mut self) -> Option<Event> {
        let mut queue = self.dispatcher.queue.lock();
        let event = queue.events.pop_front();
        if event.is_none() {
            queue.draining = false;
            self.finished = true;
        }
        event
    }
}

impl Drop for Drain<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.dispatcher.queue.lock().draining = false;
        }
    }
}
