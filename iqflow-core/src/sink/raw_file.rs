//! Headerless raw-sample file sink.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use crate::errors::{ConfigError, FatalError};

pub struct RawFileWriter {
    path: PathBuf,
    writer: Option<BufWriter<File>>,
    total_bytes: u64,
}

impl RawFileWriter {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            writer: None,
            total_bytes: 0,
        }
    }

    pub fn open(&mut self) -> Result<(), ConfigError> {
        let file = File::create(&self.path).map_err(|e| ConfigError::SinkOpenFailed {
            reason: format!("creating {}: {e}", self.path.display()),
        })?;
        self.writer = Some(BufWriter::with_capacity(1 << 20, file));
        Ok(())
    }

    pub fn write(&mut self, data: &[u8]) -> Result<usize, FatalError> {
        let writer = self.writer.as_mut().expect("open must run before write");
        writer.write_all(data).map_err(|e| FatalError::Io {
            worker: "raw_file_writer",
            reason: e.to_string(),
        })?;
        self.total_bytes += data.len() as u64;
        Ok(data.len())
    }

    pub fn total_bytes_written(&self) -> u64 {
        self.total_bytes
    }

    pub fn close(&mut self) -> Result<(), FatalError> {
        if let Some(mut writer) = self.writer.take() {
            writer.flush().map_err(|e| FatalError::Io {
                worker: "raw_file_writer",
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
    fn writes_bytes_and_reports_total() {
        let mut path = std::env::temp_dir();
        path.push(format!("iqflow_raw_sink_test_{:?}.bin", std::thread::current().id()));
        let mut writer = RawFileWriter::new(path.clone());
        writer.open().unwrap();
        writer.write(&[1, 2, 3, 4]).unwrap();
        writer.write(&[5, 6]).unwrap();
        assert_eq!(writer.total_bytes_written(), 6);
        writer.close().unwrap();
        let contents = std::fs::read(&path).unwrap();
        assert_eq!(contents, vec![1, 2, 3, 4, 5, 6]);
        std::fs::remove_file(&path).ok();
    }
}
