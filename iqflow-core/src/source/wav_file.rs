//! WAV-container I/Q source, backed by `hound`. The whole file is decoded
//! to raw interleaved bytes at `initialize` time; the WAV container's exact
//! chunk layout is `hound`'s concern, not this port's.

use std::path::PathBuf;

use super::SourceInfo;
use crate::errors::{ConfigError, FatalError};
use crate::sample_format::SampleFormat;

pub struct WavFileSource {
    path: PathBuf,
    data: Vec<u8>,
    pos: usize,
    format: SampleFormat,
    sample_rate_hz: f64,
}

impl WavFileSource {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            data: Vec::new(),
            pos: 0,
            format: SampleFormat::Unknown,
            sample_rate_hz: 0.0,
        }
    }

    pub fn initialize(&mut self) -> Result<SourceInfo, ConfigError> {
        let mut reader = hound::WavReader::open(&self.path).map_err(|e| ConfigError::SourceInitializeFailed {
            reason: format!("opening {}: {e}", self.path.display()),
        })?;
        let spec = reader.spec();
        if spec.channels != 2 {
            return Err(ConfigError::Invalid {
                reason: format!("WAV source must be stereo I/Q, got {} channel(s)", spec.channels),
            });
        }
        self.sample_rate_hz = spec.sample_rate as f64;
        self.format = match (spec.sample_format, spec.bits_per_sample) {
            (hound::SampleFormat::Int, 16) => SampleFormat::Ci16,
            (hound::SampleFormat::Int, 32) => SampleFormat::Ci32,
            (hound::SampleFormat::Float, 32) => SampleFormat::Cf32,
            (fmt, bits) => {
                return Err(ConfigError::Invalid {
                    reason: format!("unsupported WAV sample layout {fmt:?}/{bits}-bit"),
                })
            }
        };

        self.data = match self.format {
            SampleFormat::Ci16 => reader
                .samples::<i16>()
                .filter_map(Result::ok)
                .flat_map(|s| s.to_le_bytes())
                .collect(),
            SampleFormat::Ci32 => reader
                .samples::<i32>()
                .filter_map(Result::ok)
                .flat_map(|s| s.to_le_bytes())
                .collect(),
            SampleFormat::Cf32 => reader
                .samples::<f32>()
                .filter_map(Result::ok)
                .flat_map(|s| s.to_le_bytes())
                .collect(),
            _ => unreachable!("format was just matched from spec above"),
        };

        let bytes_per_pair = self.format.bytes_per_sample_pair();
        let total_frames = if bytes_per_pair > 0 {
            (self.data.len() / bytes_per_pair) as u64
        } else {
            0
        };

        Ok(SourceInfo {
            sample_rate_hz: self.sample_rate_hz,
            total_frames: Some(total_frames),
            sample_format: self.format,
        })
    }

    pub fn read_block(&mut self, buf: &mut [u8]) -> Result<usize, FatalError> {
        let remaining = self.data.len() - self.pos;
        let n = remaining.min(buf.len());
        buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_mono_wav() {
        let mut path = std::env::temp_dir();
        path.push(format!("iqflow_wav_mono_test_{:?}.wav", std::thread::current().id()));
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 48_000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        writer.write_sample(0i16).unwrap();
        writer.finalize().unwrap();

        let mut source = WavFileSource::new(path.clone());
        assert!(matches!(source.initialize(), Err(ConfigError::Invalid { .. })));
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn decodes_stereo_i16_wav_into_raw_ci16_bytes() {
        let mut path = std::env::temp_dir();
        path.push(format!("iqflow_wav_stereo_test_{:?}.wav", std::thread::current().id()));
        let spec = hound::WavSpec {
            channels: 2,
            sample_rate: 48_000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        for frame in 0..4 {
            writer.write_sample(frame as i16).unwrap();
            writer.write_sample(-(frame as i16)).unwrap();
        }
        writer.finalize().unwrap();

        let mut source = WavFileSource::new(path.clone());
        let info = source.initialize().unwrap();
        assert_eq!(info.sample_format, SampleFormat::Ci16);
        assert_eq!(info.total_frames, Some(4));
        let mut buf = [0u8; 16];
        assert_eq!(source.read_block(&mut buf).unwrap(), 16);
        std::fs::remove_file(&path).ok();
    }
}
