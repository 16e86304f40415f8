//! Polls an SDR capture worker's heartbeat and fails the pipeline if it
//! stalls for longer than the configured threshold.

use std::thread;
use std::time::Duration;

use crate::cancellation::CancellationToken;
use crate::errors::FatalError;
use crate::heartbeat::Heartbeat;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

pub fn run(heartbeat: Heartbeat, timeout_ms: u64, cancel: CancellationToken) {
    while !cancel.is_cancelled() {
        let elapsed = heartbeat.elapsed_ms();
        if elapsed > timeout_ms {
            cancel.fail_with(FatalError::DriverHung {
                worker: "watchdog",
                elapsed_ms: elapsed,
            });
            return;
        }
        thread::sleep(POLL_INTERVAL);
    }
}
