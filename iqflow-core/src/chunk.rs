//! Reusable sample-block carrier and its fixed-size pool.
//!
//! Every byte buffer a chunk owns is allocated once, at pool construction,
//! from one contiguous region; chunks never grow or reallocate in the hot
//! path. DSP stages ping-pong between `complex_a`/`complex_b` via
//! `current_in`/`current_out` so a "pass this downstream" never costs a
//! copy — only a pointer-index swap.

use std::sync::{Arc, Mutex};

use num_complex::Complex32;

use crate::errors::ConfigError;
use crate::queue::BlockingQueue;
use crate::sample_format::SampleFormat;

pub const PIPELINE_NUM_CHUNKS: usize = 8;
pub const PIPELINE_CHUNK_BASE_SAMPLES: usize = 32_768;
pub const MAX_ALLOWED_FFT_BLOCK_SIZE: usize = 1 << 20;

pub const IO_SDR_INPUT_BUFFER_BYTES: usize = 64 * 1024 * 1024;
pub const IO_OUTPUT_WRITER_BUFFER_BYTES: usize = 256 * 1024 * 1024;
pub const IO_OUTPUT_WRITER_CHUNK_SIZE: usize = 4 * 1024 * 1024;
pub const SDR_INITIALIZE_TIMEOUT_MS: u64 = 5_000;
pub const SDR_HEARTBEAT_TIMEOUT_MS: u64 = 2_000;

/// Which of `complex_a`/`complex_b` a chunk currently reads/writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    A,
    B,
}

pub struct Chunk {
    pub raw_input: Vec<u8>,
    pub complex_a: Vec<Complex32>,
    pub complex_b: Vec<Complex32>,
    pub final_output: Vec<u8>,

    pub current_in: Side,
    pub current_out: Side,

    pub frames_read: usize,
    pub frames_to_write: usize,

    pub packet_sample_format: SampleFormat,
    pub input_bytes_per_sample_pair: usize,
    pub output_bytes_per_sample_pair: usize,

    pub is_last_chunk: bool,
    pub stream_discontinuity_event: bool,
}

impl Chunk {
    fn new(raw_capacity: usize, max_out_samples: usize, output_capacity: usize) -> Self {
        Self {
            raw_input: vec![0u8; raw_capacity],
            complex_a: vec![Complex32::new(0.0, 0.0); max_out_samples],
            complex_b: vec![Complex32::new(0.0, 0.0); max_out_samples],
            final_output: vec![0u8; output_capacity],
            current_in: Side::A,
            current_out: Side::B,
            frames_read: 0,
            frames_to_write: 0,
            packet_sample_format: SampleFormat::Unknown,
            input_bytes_per_sample_pair: 0,
            output_bytes_per_sample_pair: 0,
            is_last_chunk: false,
            stream_discontinuity_event: false,
        }
    }

    /// Exchanges `current_in`/`current_out` so the next stage reads what was
    /// just written. O(1): only the two side tags move.
    pub fn swap(&mut self) {
        std::mem::swap(&mut self.current_in, &mut self.current_out);
    }

    pub fn input_view(&self) -> &[Complex32] {
        match self.current_in {
            Side::A => &self.complex_a,
            Side::B => &self.complex_b,
        }
    }

    pub fn output_view_mut(&mut self) -> &mut [Complex32] {
        match self.current_out {
            Side::A => &mut self.complex_a,
            Side::B => &mut self.complex_b,
        }
    }

    pub fn input_view_mut(&mut self) -> &mut [Complex32] {
        match self.current_in {
            Side::A => &mut self.complex_a,
            Side::B => &mut self.complex_b,
        }
    }

    /// Copies `current_in[..frames]` into `current_out`, used by stages run
    /// in passthrough mode that must still honor the ping-pong discipline.
    pub fn copy_in_to_out(&mut self, frames: usize) {
        match self.current_out {
            Side::A => {
                let src_b = self.complex_b.clone();
                self.complex_a[..frames].copy_from_slice(&src_b[..frames]);
            }
            Side::B => {
                let src_a = self.complex_a.clone();
                self.complex_b[..frames].copy_from_slice(&src_a[..frames]);
            }
        }
    }

    /// Resets the per-stream bookkeeping a reset-event chunk carries; data
    /// buffers are left untouched since `frames_read`/`frames_to_write`
    /// already gate how much of them is meaningful.
    pub fn reset_as_discontinuity(&mut self) {
        self.frames_read = 0;
        self.frames_to_write = 0;
        self.is_last_chunk = false;
        self.stream_discontinuity_event = true;
    }

    pub fn reset_as_terminator(&mut self) {
        self.frames_read = 0;
        self.frames_to_write = 0;
        self.stream_discontinuity_event = false;
        self.is_last_chunk = true;
    }

    pub fn reset_as_data(&mut self) {
        self.is_last_chunk = false;
        self.stream_discontinuity_event = false;
    }
}

/// Computes `max_out_samples` per the pool-sizing rule: the larger of the
/// base chunk size, any enabled block-oriented filter's block size, and the
/// upsampled frame count with safety margin.
pub fn compute_max_out_samples(
    base_samples: usize,
    filter_block_size: Option<usize>,
    resample_ratio: Option<f64>,
) -> Result<usize, ConfigError> {
    let mut max_samples = base_samples;
    if let Some(block) = filter_block_size {
        max_samples = max_samples.max(block);
    }
    if let Some(ratio) = resample_ratio {
        if ratio > 1.0 {
            let safety_margin = 64;
            let upsampled = (base_samples as f64 * ratio).ceil() as usize + safety_margin;
            max_samples = max_samples.max(upsampled);
        }
    }
    if max_samples > MAX_ALLOWED_FFT_BLOCK_SIZE {
        return Err(ConfigError::FftBlockTooLarge {
            needed: max_samples,
            max: MAX_ALLOWED_FFT_BLOCK_SIZE,
        });
    }
    Ok(max_samples)
}

/// Owns every chunk's storage and the free-list queue chunks circulate
/// through when no stage currently holds them.
pub struct ChunkPool {
    chunks: Vec<Mutex<Chunk>>,
    pub free_queue: BlockingQueue<usize>,
}

impl ChunkPool {
    pub fn new(
        num_chunks: usize,
        raw_capacity: usize,
        max_out_samples: usize,
        output_capacity: usize,
    ) -> Arc<Self> {
        let chunks = (0..num_chunks)
            .map(|_| Mutex::new(Chunk::new(raw_capacity, max_out_samples, output_capacity)))
            .collect();
        let free_queue = BlockingQueue::new(num_chunks);
        for id in 0..num_chunks {
            free_queue.enqueue(id);
        }
        Arc::new(Self { chunks, free_queue })
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn with_chunk<R>(&self, id: usize, f: impl FnOnce(&mut Chunk) -> R) -> R {
        let mut chunk = self.chunks[id].lock().unwrap();
        f(&mut chunk)
    }

    /// Blocks for a free chunk id.
    pub fn acquire(&self) -> Option<usize> {
        self.free_queue.dequeue()
    }

    /// Non-blocking acquire, used by realtime producers that must never stall.
    pub fn try_acquire(&self) -> Option<usize> {
        self.free_queue.try_dequeue()
    }

    pub fn release(&self, id: usize) {
        self.free_queue.enqueue(id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_starts_fully_free() {
        let pool = ChunkPool::new(PIPELINE_NUM_CHUNKS, 1024, 1024, 1024);
        assert_eq!(pool.free_queue.len(), PIPELINE_NUM_CHUNKS);
    }

    #[test]
    fn acquire_release_round_trips_through_free_queue() {
        let pool = ChunkPool::new(4, 64, 64, 64);
        let id = pool.acquire().unwrap();
        assert_eq!(pool.free_queue.len(), 3);
        pool.release(id);
        assert_eq!(pool.free_queue.len(), 4);
    }

    #[test]
    fn swap_exchanges_in_and_out() {
        let pool = ChunkPool::new(1, 64, 64, 64);
        let id = pool.acquire().unwrap();
        pool.with_chunk(id, |chunk| {
            assert_eq!(chunk.current_in, Side::A);
            assert_eq!(chunk.current_out, Side::B);
            chunk.swap();
            assert_eq!(chunk.current_in, Side::B);
            assert_eq!(chunk.current_out, Side::A);
        });
    }

    #[test]
    fn max_out_samples_respects_filter_block_and_ratio() {
        let base = compute_max_out_samples(1000, None, None).unwrap();
        assert_eq!(base, 1000);

        let with_filter = compute_max_out_samples(1000, Some(4096), None).unwrap();
        assert_eq!(with_filter, 4096);

        let with_upsample = compute_max_out_samples(1000, None, Some(2.0)).unwrap();
        assert_eq!(with_upsample, 2064);
    }

    #[test]
    fn oversized_requirement_is_a_config_error() {
        let result = compute_max_out_samples(MAX_ALLOWED_FFT_BLOCK_SIZE + 1, None, None);
        assert!(matches!(result, Err(ConfigError::FftBlockTooLarge { .. })));
    }
}
