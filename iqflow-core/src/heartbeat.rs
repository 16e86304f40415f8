//! Monotonic liveness timestamp shared between an SDR source's capture
//! callback and the watchdog worker that polls it.

use std::sync::{Arc, Mutex};
use std::time::Instant;

#[derive(Clone)]
pub struct Heartbeat {
    last_beat: Arc<Mutex<Instant>>,
}

impl Heartbeat {
    pub fn new() -> Self {
        Self {
            last_beat: Arc::new(Mutex::new(Instant::now())),
        }
    }

    pub fn beat(&self) {
        *self.last_beat.lock().unwrap() = Instant::now();
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.last_beat.lock().unwrap().elapsed().as_millis() as u64
    }
}

impl Default for Heartbeat {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn beat_resets_elapsed() {
        let hb = Heartbeat::new();
        thread::sleep(Duration::from_millis(30));
        assert!(hb.elapsed_ms() >= 30);
        hb.beat();
        assert!(hb.elapsed_ms() < 30);
    }
}
