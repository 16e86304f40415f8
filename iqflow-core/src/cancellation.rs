//! Global shutdown flag and the fatal-error latch, shared by every worker.
//!
//! A signal handler or any worker on fatal error sets `shutdown_requested`,
//! which propagates by calling `signal_shutdown` on every queue and ring in
//! the graph. This token is the explicit, `Arc`-shared replacement for a
//! bare global flag.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::errors::FatalError;

#[derive(Clone, Default)]
pub struct CancellationToken {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    shutdown_requested: AtomicBool,
    error_occurred: AtomicBool,
    first_error: Mutex<Option<FatalError>>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request shutdown without recording an error (cancellation, or a
    /// clean end-of-stream the writer has already drained).
    pub fn cancel(&self) {
        self.inner.shutdown_requested.store(true, Ordering::SeqCst);
    }

    /// Flip the shared error flag and request shutdown. Idempotent.
    pub fn fail(&self) {
        self.inner.error_occurred.store(true, Ordering::SeqCst);
        self.cancel();
    }

    /// Like `fail`, but keeps the first reported `FatalError` for the
    /// orchestrator to surface once every worker has joined. Later calls
    /// lose the race and their error is dropped after being logged.
    pub fn fail_with(&self, error: FatalError) {
        let mut slot = self.inner.first_error.lock().unwrap();
        if slot.is_none() {
            *slot = Some(error);
        }
        drop(slot);
        self.fail();
    }

    pub fn take_error(&self) -> Option<FatalError> {
        self.inner.first_error.lock().unwrap().clone()
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.shutdown_requested.load(Ordering::SeqCst)
    }

    pub fn has_error(&self) -> bool {
        self.inner.error_occurred.load(Ordering::SeqCst)
    }
}
