//! Drains either the sink-side pacing ring or the writer queue, depending on
//! whether the configured output sink requires pacing, and hands bytes to
//! the concrete `OutputWriter`.

use std::sync::Arc;

use crate::cancellation::CancellationToken;
use crate::chunk::{ChunkPool, IO_OUTPUT_WRITER_CHUNK_SIZE};
use crate::errors::FatalError;
use crate::progress::ProgressTracker;
use crate::queue::BlockingQueue;
use crate::ring_buffer::RingBuffer;
use crate::sink::OutputWriter;

/// Writes all of `data`, looping over `OutputWriter::write`'s partial-write
/// contract. Returns `Ok(true)` on full completion, `Ok(false)` on a
/// zero-length write before `data` is exhausted. Callers interpret `Ok(false)`
/// differently: `run_chunk_direct`'s sink is an unpaced stream where the
/// downstream end closing (e.g. a pipe reader exiting) is an orderly
/// shutdown, while `run_paced`'s sink is a bounded file where a short write
/// means the disk rejected bytes the pacing ring already accepted — fatal.
fn write_all(writer: &mut OutputWriter, data: &[u8]) -> Result<bool, FatalError> {
    let mut offset = 0;
    while offset < data.len() {
        match writer.write(&data[offset..])? {
            0 => return Ok(false),
            n => offset += n,
        }
    }
    Ok(true)
}

pub fn run_paced(
    mut writer: OutputWriter,
    ring: Arc<RingBuffer>,
    bytes_per_frame: usize,
    progress: ProgressTracker,
    cancel: CancellationToken,
) {
    let mut local_buffer = vec![0u8; IO_OUTPUT_WRITER_CHUNK_SIZE];
    loop {
        let n = ring.read(&mut local_buffer);
        if n == 0 {
            break;
        }
        match write_all(&mut writer, &local_buffer[..n]) {
            Ok(true) => {
                let frames = (n / bytes_per_frame.max(1)) as u64;
                progress.advance(frames, n as u64);
            }
            Ok(false) => {
                cancel.fail_with(FatalError::Io {
                    worker: "writer_worker::run_paced",
                    reason: "short write: sink accepted fewer bytes than the pacing ring held".to_string(),
                });
                return;
            }
            Err(e) => {
                cancel.fail_with(e);
                return;
            }
        }
    }
    let _ = writer.close();
}

pub fn run_chunk_direct(
    mut writer: OutputWriter,
    queue: Arc<BlockingQueue<usize>>,
    chunk_pool: Arc<ChunkPool>,
    bytes_per_frame: usize,
    progress: ProgressTracker,
    cancel: CancellationToken,
) {
    loop {
        let Some(chunk_id) = queue.dequeue() else {
            break;
        };

        let mut is_terminator = false;
        let mut requested = 0usize;
        let mut write_result: Option<Result<bool, FatalError>> = None;
        chunk_pool.with_chunk(chunk_id, |chunk| {
            if chunk.is_last_chunk {
                is_terminator = true;
                return;
            }
            if chunk.stream_discontinuity_event {
                return;
            }
            requested = chunk.frames_to_write * chunk.output_bytes_per_sample_pair;
            write_result = Some(write_all(&mut writer, &chunk.final_output[..requested]));
        });
        chunk_pool.release(chunk_id);

        match write_result {
            Some(Ok(true)) => {
                let frames = (requested / bytes_per_frame.max(1)) as u64;
                progress.advance(frames, requested as u64);
            }
            Some(Ok(false)) => {
                cancel.cancel();
                break;
            }
            Some(Err(e)) => {
                cancel.fail_with(e);
                return;
            }
            None => {}
        }

        if is_terminator {
            break;
        }
    }
    let _ = writer.close();
}
