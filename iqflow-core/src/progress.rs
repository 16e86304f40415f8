//! Progress counters guarded by a single mutex, and the callback the writer
//! worker drives them through.

use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Copy, Default)]
pub struct ProgressSnapshot {
    pub current_frames: u64,
    /// `None` when the source has no known length (SDR sources).
    pub total_frames: Option<u64>,
    pub current_bytes: u64,
}

pub type ProgressCallback = Arc<dyn Fn(ProgressSnapshot) + Send + Sync>;

#[derive(Clone)]
pub struct ProgressTracker {
    state: Arc<Mutex<ProgressSnapshot>>,
    callback: Option<ProgressCallback>,
}

impl ProgressTracker {
    pub fn new(total_frames: Option<u64>, callback: Option<ProgressCallback>) -> Self {
        Self {
            state: Arc::new(Mutex::new(ProgressSnapshot {
                current_frames: 0,
                total_frames,
                current_bytes: 0,
            })),
            callback,
        }
    }

    pub fn advance(&self, frames: u64, bytes: u64) {
        let snapshot = {
            let mut state = self.state.lock().unwrap();
            state.current_frames += frames;
            state.current_bytes += bytes;
            *state
        };
        if let Some(cb) = &self.callback {
            cb(snapshot);
        }
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        *self.state.lock().unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    #[test]
    fn advance_accumulates_and_invokes_callback() {
        let calls = Arc::new(AtomicU64::new(0));
        let calls2 = calls.clone();
        let tracker = ProgressTracker::new(Some(100), Some(Arc::new(move |_| {
            calls2.fetch_add(1, Ordering::SeqCst);
        })));
        tracker.advance(10, 40);
        tracker.advance(5, 20);
        let snap = tracker.snapshot();
        assert_eq!(snap.current_frames, 15);
        assert_eq!(snap.current_bytes, 60);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
