//! Stand-in for a real SDR device driver. Produces a synthetic complex
//! sinusoid burst-by-burst on the calling thread, the same shape a real
//! driver's capture callback would deliver, so the pipeline's SDR-mode
//! worker wiring is exercisable without hardware.

use std::thread;
use std::time::Duration;

use super::SourceInfo;
use crate::cancellation::CancellationToken;
use crate::errors::ConfigError;
use crate::heartbeat::Heartbeat;
use crate::sample_format::SampleFormat;

pub struct MockSdrSource {
    sample_rate_hz: f64,
    tone_hz: f64,
    burst_frames: usize,
    /// `None` means "run until cancelled", matching real hardware.
    max_bursts: Option<u64>,
    /// Emit a `STREAM_RESET` event after this many data bursts, once.
    reset_after_burst: Option<u64>,
    burst_count: u64,
    phase: f64,
}

impl MockSdrSource {
    pub fn new(sample_rate_hz: f64, tone_hz: f64, burst_frames: usize) -> Self {
        Self {
            sample_rate_hz,
            tone_hz,
            burst_frames,
            max_bursts: None,
            reset_after_burst: None,
            burst_count: 0,
            phase: 0.0,
        }
    }

    pub fn with_max_bursts(mut self, max_bursts: u64) -> Self {
        self.max_bursts = Some(max_bursts);
        self
    }

    pub fn with_reset_after(mut self, burst_index: u64) -> Self {
        self.reset_after_burst = Some(burst_index);
        self
    }

    pub fn initialize(&mut self) -> Result<SourceInfo, ConfigError> {
        Ok(SourceInfo {
            sample_rate_hz: self.sample_rate_hz,
            total_frames: None,
            sample_format: SampleFormat::Ci16,
        })
    }

    fn next_burst_bytes(&mut self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.burst_frames * 4);
        let step = std::f64::consts::TAU * self.tone_hz / self.sample_rate_hz;
        for _ in 0..self.burst_frames {
            let i = (self.phase.cos() * 16_000.0) as i16;
            let q = (self.phase.sin() * 16_000.0) as i16;
            bytes.extend_from_slice(&i.to_le_bytes());
            bytes.extend_from_slice(&q.to_le_bytes());
            self.phase += step;
        }
        bytes
    }

    pub fn run_capture_loop(
        &mut self,
        heartbeat: &Heartbeat,
        cancel: &CancellationToken,
        mut on_burst: impl FnMut(&[u8], SampleFormat, bool),
    ) {
        loop {
            if cancel.is_cancelled() {
                return;
            }
            if let Some(max) = self.max_bursts {
                if self.burst_count >= max {
                    return;
                }
            }

            if self.reset_after_burst == Some(self.burst_count) {
                on_burst(&[], SampleFormat::Ci16, true);
            }

            let burst = self.next_burst_bytes();
            heartbeat.beat();
            on_burst(&burst, SampleFormat::Ci16, false);
            self.burst_count += 1;

            thread::sleep(Duration::from_micros(200));
        }
    }

    pub fn stop(&mut self) {}
}
