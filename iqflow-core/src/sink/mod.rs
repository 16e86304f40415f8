//! Output writers: tagged variant mirroring [`crate::source::InputSource`].

mod raw_file;
mod stdout;
mod wav_file;

pub use raw_file::RawFileWriter;
pub use stdout::StdoutWriter;
pub use wav_file::WavFileWriter;

use crate::errors::{ConfigError, FatalError};
use crate::sample_format::SampleFormat;

pub enum OutputWriter {
    RawFile(RawFileWriter),
    WavFile(WavFileWriter),
    Stdout(StdoutWriter),
}

impl OutputWriter {
    pub fn open(&mut self) -> Result<(), ConfigError> {
        match self {
            OutputWriter::RawFile(w) => w.open(),
            OutputWriter::WavFile(w) => w.open(),
            OutputWriter::Stdout(w) => w.open(),
        }
    }

    /// True for bounded file sinks, false for byte-stream sinks (stdout):
    /// see the pacing-scope decision recorded in DESIGN.md.
    pub fn requires_pacing(&self) -> bool {
        !matches!(self, OutputWriter::Stdout(_))
    }

    pub fn write(&mut self, data: &[u8]) -> Result<usize, FatalError> {
        match self {
            OutputWriter::RawFile(w) => w.write(data),
            OutputWriter::WavFile(w) => w.write(data),
            OutputWriter::Stdout(w) => w.write(data),
        }
    }

    pub fn total_bytes_written(&self) -> u64 {
        match self {
            OutputWriter::RawFile(w) => w.total_bytes_written(),
            OutputWriter::WavFile(w) => w.total_bytes_written(),
            OutputWriter::Stdout(w) => w.total_bytes_written(),
        }
    }

    pub fn close(&mut self) -> Result<(), FatalError> {
        match self {
            OutputWriter::RawFile(w) => w.close(),
            OutputWriter::WavFile(w) => w.close(),
            OutputWriter::Stdout(w) => w.close(),
        }
    }
}

/// Declares the sample-format/container compatibility the writer enforces
/// at `open` time, shared by the RAW and WAV concrete writers.
pub(crate) fn require_container_supports(
    container: &str,
    format: SampleFormat,
    supported: &[SampleFormat],
) -> Result<(), ConfigError> {
    if supported.contains(&format) {
        Ok(())
    } else {
        Err(ConfigError::UnsupportedContainerFormat {
            container: container.to_string(),
            format: format!("{format:?}"),
        })
    }
}
