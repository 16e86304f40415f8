//! WAV-container output writer, backed by `hound`.
//!
//! `WAV_RF64` is accepted as a configuration value but rejected here with a
//! `ConfigError` at `open` time — `hound` has no RF64 support, and silently
//! downgrading to a 32-bit `RIFF` container would misrepresent files beyond
//! the 4 GiB `RIFF` size limit rather than fail loudly.

use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;

use hound::{SampleFormat as HoundFormat, WavSpec, WavWriter};

use super::require_container_supports;
use crate::errors::{ConfigError, FatalError};
use crate::sample_format::SampleFormat;

const SUPPORTED: &[SampleFormat] = &[SampleFormat::Ci16, SampleFormat::Ci32, SampleFormat::Cf32];

pub struct WavFileWriter {
    path: PathBuf,
    format: SampleFormat,
    sample_rate_hz: u32,
    writer: Option<WavWriter<BufWriter<File>>>,
    total_bytes: u64,
}

impl WavFileWriter {
    pub fn new(path: PathBuf, format: SampleFormat, sample_rate_hz: u32) -> Self {
        Self {
            path,
            format,
            sample_rate_hz,
            writer: None,
            total_bytes: 0,
        }
    }

    pub fn open(&mut self) -> Result<(), ConfigError> {
        require_container_supports("WAV", self.format, SUPPORTED)?;
        let (bits_per_sample, sample_format) = match self.format {
            SampleFormat::Ci16 => (16, HoundFormat::Int),
            SampleFormat::Ci32 => (32, HoundFormat::Int),
            SampleFormat::Cf32 => (32, HoundFormat::Float),
            _ => unreachable!("checked by require_container_supports"),
        };
        let spec = WavSpec {
            channels: 2,
            sample_rate: self.sample_rate_hz,
            bits_per_sample,
            sample_format,
        };
        let writer = WavWriter::create(&self.path, spec).map_err(|e| ConfigError::SinkOpenFailed {
            reason: format!("creating {}: {e}", self.path.display()),
        })?;
        self.writer = Some(writer);
        Ok(())
    }

    pub fn write(&mut self, data: &[u8]) -> Result<usize, FatalError> {
        let writer = self.writer.as_mut().expect("open must run before write");
        let io_err = |e: hound::Error| FatalError::Io {
            worker: "wav_file_writer",
            reason: e.to_string(),
        };
        match self.format {
            SampleFormat::Ci16 => {
                for chunk in data.chunks_exact(2) {
                    let v = i16::from_le_bytes([chunk[0], chunk[1]]);
                    writer.write_sample(v).map_err(io_err)?;
                }
            }
            SampleFormat::Ci32 => {
                for chunk in data.chunks_exact(4) {
                    let v = i32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
                    writer.write_sample(v).map_err(io_err)?;
                }
            }
            SampleFormat::Cf32 => {
                for chunk in data.chunks_exact(4) {
                    let v = f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
                    writer.write_sample(v).map_err(io_err)?;
                }
            }
            _ => unreachable!("checked by require_container_supports at open time"),
        }
        self.total_bytes += data.len() as u64;
        Ok(data.len())
    }

    pub fn total_bytes_written(&self) -> u64 {
        self.total_bytes
    }

    pub fn close(&mut self) -> Result<(), FatalError> {
        if let Some(writer) = self.writer.take() {
            writer.finalize().map_err(|e| FatalError::Io {
                worker: "wav_file_writer",
                reason: e.to_string(),
            })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_ci16_frames_and_reads_back_via_hound() {
        let mut path = std::env::temp_dir();
        path.push(format!("iqflow_wav_sink_test_{:?}.wav", std::thread::current().id()));
        let mut writer = WavFileWriter::new(path.clone(), SampleFormat::Ci16, 48_000);
        writer.open().unwrap();
        let data: Vec<u8> = [1i16, -1, 2, -2]
            .iter()
            .flat_map(|v| v.to_le_bytes())
            .collect();
        writer.write(&data).unwrap();
        writer.close().unwrap();

        let mut reader = hound::WavReader::open(&path).unwrap();
        let samples: Vec<i16> = reader.samples::<i16>().map(Result::unwrap).collect();
        assert_eq!(samples, vec![1, -1, 2, -2]);
        std::fs::remove_file(&path).ok();
    }
}
