//! Headerless raw-sample file source: the simplest `InputSource`, reading
//! bytes in the configured sample format straight off disk.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::PathBuf;

use super::SourceInfo;
use crate::errors::{ConfigError, FatalError};
use crate::sample_format::SampleFormat;

pub struct RawFileSource {
    path: PathBuf,
    format: SampleFormat,
    sample_rate_hz: f64,
    reader: Option<BufReader<File>>,
}

impl RawFileSource {
    pub fn new(path: PathBuf, format: SampleFormat, sample_rate_hz: f64) -> Self {
        Self {
            path,
            format,
            sample_rate_hz,
            reader: None,
        }
    }

    pub fn initialize(&mut self) -> Result<SourceInfo, ConfigError> {
        let file = File::open(&self.path).map_err(|e| ConfigError::SourceInitializeFailed {
            reason: format!("opening {}: {e}", self.path.display()),
        })?;
        let len = file
            .metadata()
            .map_err(|e| ConfigError::SourceInitializeFailed {
                reason: format!("stat {}: {e}", self.path.display()),
            })?
            .len();
        let bytes_per_pair = self.format.bytes_per_sample_pair();
        let total_frames = if bytes_per_pair > 0 {
            Some(len / bytes_per_pair as u64)
        } else {
            None
        };
        self.reader = Some(BufReader::with_capacity(1 << 20, file));
        Ok(SourceInfo {
            sample_rate_hz: self.sample_rate_hz,
            total_frames,
            sample_format: self.format,
        })
    }

    pub fn read_block(&mut self, buf: &mut [u8]) -> Result<usize, FatalError> {
        let reader = self.reader.as_mut().expect("initialize must run before read_block");
        let mut total = 0;
        while total < buf.len() {
            match reader.read(&mut buf[total..]) {
                Ok(0) => break,
                Ok(n) => total += n,
                Err(e) => {
                    return Err(FatalError::Io {
                        worker: "raw_file_source",
                        reason: e.to_string(),
                    })
                }
            }
        }
        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn reads_full_file_contents() {
        let mut path = std::env::temp_dir();
        path.push(format!("iqflow_raw_source_test_{:?}.bin", std::thread::current().id()));
        {
            let mut f = File::create(&path).unwrap();
            f.write_all(&[1u8, 2, 3, 4, 5, 6, 7, 8]).unwrap();
        }
        let mut source = RawFileSource::new(path.clone(), SampleFormat::Ci16, 48_000.0);
        let info = source.initialize().unwrap();
        assert_eq!(info.total_frames, Some(2));
        let mut buf = [0u8; 8];
        assert_eq!(source.read_block(&mut buf).unwrap(), 8);
        assert_eq!(source.read_block(&mut buf).unwrap(), 0);
        std::fs::remove_file(&path).ok();
    }
}
