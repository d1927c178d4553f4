//! Shared on/off switch for the watch handlers

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Decides whether watch events are handled or dropped.
///
/// Bulk operations take a [`PauseGuard`] so their own writes do not
/// re-trigger the handlers. Pauses nest; handling resumes once the last guard
/// is dropped, including on early returns and panics.
#[derive(Debug, Default)]
pub struct WatchGate {
    paused: AtomicUsize,
    stopped: AtomicBool,
}

impl WatchGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// True if events should be handled right now
    pub fn is_enabled(&self) -> bool {
        !self.stopped.load(Ordering::SeqCst) && self.paused.load(Ordering::SeqCst) == 0
    }

    /// Drops events until the returned guard goes out of scope
    pub fn pause(&self) -> PauseGuard<'_> {
        self.paused.fetch_add(1, Ordering::SeqCst);
        PauseGuard { gate: self }
    }

    /// Stops handling events until [`start`](Self::start) is called
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
        tracing::debug!("File system watcher stopped");
    }

    pub fn start(&self) {
        self.stopped.store(false, Ordering::SeqCst);
        tracing::debug!("File system watcher started");
    }
}

/// Keeps a [`WatchGate`] paused while alive
#[must_use = "the gate resumes as soon as the guard is dropped"]
pub struct PauseGuard<'a> {
    gate: &'a WatchGate,
}

impl Drop for PauseGuard<'_> {
    fn drop(&mut self) {
        self.gate.paused.fetch_sub(1, Ordering::SeqCst);
    }
}
