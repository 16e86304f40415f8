//! Input sources: a tagged variant rather than a vtable, since the set of
//! concrete sources is closed at compile time and dynamic loading is not a
//! goal of this port.

mod mock_sdr;
mod raw_file;
mod wav_file;

pub use mock_sdr::MockSdrSource;
pub use raw_file::RawFileSource;
pub use wav_file::WavFileSource;

use crate::cancellation::CancellationToken;
use crate::errors::{ConfigError, FatalError};
use crate::heartbeat::Heartbeat;
use crate::sample_format::SampleFormat;

#[derive(Debug, Clone, Copy)]
pub struct SourceInfo {
    pub sample_rate_hz: f64,
    pub total_frames: Option<u64>,
    pub sample_format: SampleFormat,
}

pub enum InputSource {
    RawFile(RawFileSource),
    WavFile(WavFileSource),
    MockSdr(MockSdrSource),
}

impl InputSource {
    pub fn initialize(&mut self) -> Result<SourceInfo, ConfigError> {
        match self {
            InputSource::RawFile(s) => s.initialize(),
            InputSource::WavFile(s) => s.initialize(),
            InputSource::MockSdr(s) => s.initialize(),
        }
    }

    pub fn has_known_length(&self) -> bool {
        !matches!(self, InputSource::MockSdr(_))
    }

    pub fn is_sdr(&self) -> bool {
        matches!(self, InputSource::MockSdr(_))
    }

    /// FILE_PROCESSING mode: pull the next block of raw bytes. `Ok(0)` is EOF.
    pub fn read_block(&mut self, buf: &mut [u8]) -> Result<usize, FatalError> {
        match self {
            InputSource::RawFile(s) => s.read_block(buf),
            InputSource::WavFile(s) => s.read_block(buf),
            InputSource::MockSdr(_) => {
                unreachable!("MockSdr is driven by run_capture_loop, not read_block")
            }
        }
    }

    /// SDR modes: runs until `cancel` fires or the source exhausts itself,
    /// invoking `on_burst` with each captured interleaved sample burst.
    pub fn run_capture_loop(
        &mut self,
        heartbeat: &Heartbeat,
        cancel: &CancellationToken,
        on_burst: impl FnMut(&[u8], SampleFormat, bool),
    ) {
        match self {
            InputSource::MockSdr(s) => s.run_capture_loop(heartbeat, cancel, on_burst),
            _ => unreachable!("run_capture_loop only applies to SDR sources"),
        }
    }

    pub fn stop_stream(&mut self) {
        if let InputSource::MockSdr(s) = self {
            s.stop();
        }
    }
}
