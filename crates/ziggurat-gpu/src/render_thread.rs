//! Render-thread affinity.
//!
//! The engine is single-threaded by contract: every [`Server`] operation
//! runs on the thread that created it. Other threads never touch the
//! server directly; they record closures into a [`RenderCallQueue`] that
//! the render thread drains between frames.

use std::sync::Mutex;
use std::thread::{self, ThreadId};

use crate::server::Server;

/// Captures the constructing thread and checks it in debug builds.
///
/// The check compiles to nothing in release builds; affinity violations
/// are programmer errors, not recoverable conditions.
#[derive(Debug)]
pub struct ThreadGuard {
    owner: ThreadId,
}

impl ThreadGuard {
    pub fn capture() -> Self {
        Self {
            owner: thread::current().id(),
        }
    }

    #[inline]
    pub fn is_owner(&self) -> bool {
        thread::current().id() == self.owner
    }

    #[track_caller]
    #[inline]
    pub fn check(&self) {
        debug_assert!(self.is_owner(), "called off the render thread");
    }
}

/// A deferred call against the server.
pub type RenderCall = Box<dyn FnOnce(&mut Server) + Send>;

/// Cross-thread mailbox of deferred server calls.
///
/// `record` may be called from any thread; `drain` runs the calls in
/// recording order on whichever thread calls it (by contract, the render
/// thread, with its server).
#[derive(Default)]
pub struct RenderCallQueue {
    calls: Mutex<Vec<RenderCall>>,
}

impl RenderCallQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, call: impl FnOnce(&mut Server) + Send + 'static) {
        self.calls.lock().unwrap().push(Box::new(call));
    }

    /// Runs all recorded calls in order; returns how many ran.
    pub fn drain(&self, server: &mut Server) -> usize {
        let calls = std::mem::take(&mut *self.calls.lock().unwrap());
        let count = calls.len();
        for call in calls {
            call(server);
        }
        count
    }

    pub fn len(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for RenderCallQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderCallQueue")
            .field("pending", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guard_accepts_owning_thread() {
        let guard = ThreadGuard::capture();
        assert!(guard.is_owner());
        guard.check();
    }

    #[test]
    fn guard_rejects_other_threads() {
        let guard = ThreadGuard::capture();
        let off_thread = thread::spawn(move || guard.is_owner()).join().unwrap();
        assert!(!off_thread);
    }
}
