//! Byte-stream sink: raw bytes to standard output, unpaced. A short write
//! here almost always means the downstream reader closed its end of the
//! pipe, so it is treated as orderly shutdown rather than a fatal error —
//! the caller (chunk-direct writer worker) makes that distinction.

use std::io::{self, Write};

use crate::errors::{ConfigError, FatalError};

pub struct StdoutWriter {
    total_bytes: u64,
}

impl StdoutWriter {
    pub fn new() -> Self {
        Self { total_bytes: 0 }
    }

    pub fn open(&mut self) -> Result<(), ConfigError> {
        Ok(())
    }

    /// Returns the number of bytes actually written; a short return is not
    /// itself an error, callers interpret it.
    pub fn write(&mut self, data: &[u8]) -> Result<usize, FatalError> {
        let mut stdout = io::stdout().lock();
        match stdout.write(data) {
            Ok(n) => {
                self.total_bytes += n as u64;
                Ok(n)
            }
            Err(e) if e.kind() == io::ErrorKind::BrokenPipe => Ok(0),
            Err(e) => Err(FatalError::Io {
                worker: "stdout_writer",
                reason: e.to_string(),
            }),
        }
    }

    pub fn total_bytes_written(&self) -> u64 {
        self.total_bytes
    }

    pub fn close(&mut self) -> Result<(), FatalError> {
        io::stdout().flush().ok();
        Ok(())
    }
}

impl Default for StdoutWriter {
    fn default() -> Self {
        Self::new()
    }
}
