//! Byte-level single-producer/single-consumer ring buffer.
//!
//! `write` is non-blocking (realtime producers must never stall); `read`
//! blocks until data is available, end-of-stream, or shutdown. One byte of
//! capacity is reserved to disambiguate full from empty.

use std::sync::{Condvar, Mutex};

struct State {
    buf: Vec<u8>,
    write_pos: usize,
    read_pos: usize,
    end_of_stream: bool,
    shutting_down: bool,
}

impl State {
    fn capacity(&self) -> usize {
        self.buf.len()
    }

    fn occupied(&self) -> usize {
        (self.write_pos + self.capacity() - self.read_pos) % self.capacity()
    }

    fn vacant(&self) -> usize {
        self.capacity() - self.occupied() - 1
    }
}

pub struct RingBuffer {
    state: Mutex<State>,
    data_available: Condvar,
}

impl RingBuffer {
    /// `capacity_bytes` is the usable capacity; the backing buffer is one
    /// byte larger to hold the full/empty sentinel.
    pub fn new(capacity_bytes: usize) -> Self {
        Self {
            state: Mutex::new(State {
                buf: vec![0u8; capacity_bytes + 1],
                write_pos: 0,
                read_pos: 0,
                end_of_stream: false,
                shutting_down: false,
            }),
            data_available: Condvar::new(),
        }
    }

    /// Non-blocking write. Returns the number of bytes actually written
    /// (0..=data.len()); a short return is a producer overrun.
    pub fn write(&self, data: &[u8]) -> usize {
        let mut state = self.state.lock().unwrap();
        let vacant = state.vacant();
        let n = data.len().min(vacant);
        if n == 0 {
            return 0;
        }
        let cap = state.capacity();
        let write_pos = state.write_pos;
        let first = n.min(cap - write_pos);
        state.buf[write_pos..write_pos + first].copy_from_slice(&data[..first]);
        if first < n {
            state.buf[0..n - first].copy_from_slice(&data[first..n]);
        }
        state.write_pos = (write_pos + n) % cap;
        drop(state);
        self.data_available.notify_one();
        n
    }

    /// Blocking read of 1..=max bytes. Returns 0 iff the buffer is empty and
    /// either end-of-stream or shutdown has been signaled.
    pub fn read(&self, out: &mut [u8]) -> usize {
        let mut state = self.state.lock().unwrap();
        loop {
            let occupied = state.occupied();
            if occupied > 0 {
                let cap = state.capacity();
                let read_pos = state.read_pos;
                let n = out.len().min(occupied);
                let first = n.min(cap - read_pos);
                out[..first].copy_from_slice(&state.buf[read_pos..read_pos + first]);
                if first < n {
                    out[first..n].copy_from_slice(&state.buf[0..n - first]);
                }
                state.read_pos = (read_pos + n) % cap;
                return n;
            }
            if state.end_of_stream || state.shutting_down {
                return 0;
            }
            state = self.data_available.wait(state).unwrap();
        }
    }

    /// Issued by the producer after the final write; drains naturally.
    pub fn signal_end_of_stream(&self) {
        let mut state = self.state.lock().unwrap();
        state.end_of_stream = true;
        drop(state);
        self.data_available.notify_all();
    }

    /// Forces an immediate consumer wakeup even with data remaining.
    pub fn signal_shutdown(&self) {
        let mut state = self.state.lock().unwrap();
        state.shutting_down = true;
        drop(state);
        self.data_available.notify_all();
    }

    pub fn occupied_len(&self) -> usize {
        self.state.lock().unwrap().occupied()
    }

    pub fn vacant_len(&self) -> usize {
        self.state.lock().unwrap().vacant()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn write_then_read_roundtrip() {
        let rb = RingBuffer::new(16);
        assert_eq!(rb.write(b"hello"), 5);
        let mut buf = [0u8; 5];
        assert_eq!(rb.read(&mut buf), 5);
        assert_eq!(&buf, b"hello");
    }

    #[test]
    fn write_wraps_around() {
        let rb = RingBuffer::new(4);
        assert_eq!(rb.write(b"ab"), 2);
        let mut small = [0u8; 1];
        assert_eq!(rb.read(&mut small), 1);
        assert_eq!(&small, b"a");
        // write_pos wraps past the end of the backing buffer now.
        assert_eq!(rb.write(b"cde"), 3);
        let mut rest = [0u8; 4];
        assert_eq!(rb.read(&mut rest), 4);
        assert_eq!(&rest, b"bcde");
    }

    #[test]
    fn short_write_signals_overrun() {
        let rb = RingBuffer::new(4);
        let written = rb.write(b"abcdef");
        assert!(written < 6);
    }

    #[test]
    fn end_of_stream_drains_then_returns_zero() {
        let rb = RingBuffer::new(8);
        rb.write(b"ab");
        rb.signal_end_of_stream();
        let mut buf = [0u8; 2];
        assert_eq!(rb.read(&mut buf), 2);
        assert_eq!(rb.read(&mut buf), 0);
    }

    #[test]
    fn shutdown_wakes_blocked_reader_with_data_remaining() {
        let rb = Arc::new(RingBuffer::new(8));
        let rb2 = rb.clone();
        let handle = thread::spawn(move || {
            let mut buf = [0u8; 8];
            rb2.read(&mut buf)
        });
        thread::sleep(Duration::from_millis(50));
        rb.signal_shutdown();
        assert_eq!(handle.join().unwrap(), 0);
    }

    #[test]
    fn never_fills_completely_one_byte_reserved() {
        let rb = RingBuffer::new(4);
        let written = rb.write(&[0u8; 10]);
        assert_eq!(written, 4);
        assert_eq!(rb.vacant_len(), 0);
    }
}
