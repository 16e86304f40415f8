//! Drives SDR capture. Two shapes depending on pipeline mode:
//!
//! - REALTIME_SDR: chunks each burst directly into the chunk pool and
//!   enqueues onto the reader-output queue (no reader thread runs this mode).
//! - BUFFERED_SDR: serializes each burst as a framed packet onto the
//!   source-side ring; `reader_worker` deframes it on its own thread.

use std::sync::Arc;

use crate::cancellation::CancellationToken;
use crate::chunk::ChunkPool;
use crate::heartbeat::Heartbeat;
use crate::packet;
use crate::queue::BlockingQueue;
use crate::ring_buffer::RingBuffer;
use crate::source::InputSource;

use super::stats::PipelineStats;

pub fn run_buffered(
    mut source: InputSource,
    ring: Arc<RingBuffer>,
    heartbeat: Heartbeat,
    cancel: CancellationToken,
    stats: Arc<PipelineStats>,
) {
    source.run_capture_loop(&heartbeat, &cancel, |bytes, format, reset| {
        let num_samples = if reset { 0 } else { (bytes.len() / format.bytes_per_sample_pair()) as u32 };
        if !packet::write_packet(&ring, format, num_samples, reset, true, bytes) {
            tracing::warn!("dropped burst: source-side ring overrun");
            stats.record_overrun();
        }
    });
    source.stop_stream();
    ring.signal_end_of_stream();
}

/// `raw_passthrough` skips the DSP chain and routes bursts straight to the
/// sink via `route_chunk_to_sink`; otherwise bursts are chunked and handed
/// to the pre-processor's input queue.
#[allow(clippy::too_many_arguments)]
pub fn run_realtime(
    mut source: InputSource,
    chunk_pool: Arc<ChunkPool>,
    output_queue: Arc<BlockingQueue<usize>>,
    heartbeat: Heartbeat,
    cancel: CancellationToken,
    sink_ring: Option<Arc<RingBuffer>>,
    writer_queue: Arc<BlockingQueue<usize>>,
    raw_passthrough: bool,
    stats: Arc<PipelineStats>,
) {
    source.run_capture_loop(&heartbeat, &cancel, |bytes, format, reset| {
        let Some(chunk_id) = chunk_pool.try_acquire() else {
            tracing::warn!("dropped burst: chunk pool exhausted");
            stats.record_overrun();
            return;
        };
        chunk_pool.with_chunk(chunk_id, |chunk| {
            chunk.reset_as_data();
            chunk.packet_sample_format = format;
            if reset {
                chunk.reset_as_discontinuity();
                if raw_passthrough {
                    stats.record_discontinuity();
                }
                return;
            }
            if raw_passthrough {
                let nbytes = bytes.len();
                chunk.final_output[..nbytes].copy_from_slice(bytes);
                chunk.frames_to_write = nbytes / format.bytes_per_sample_pair();
            } else {
                let nbytes = bytes.len();
                chunk.raw_input[..nbytes].copy_from_slice(bytes);
                chunk.frames_read = nbytes / format.bytes_per_sample_pair();
            }
        });

        if raw_passthrough {
            super::route_chunk_to_sink(&chunk_pool, chunk_id, sink_ring.as_deref(), &writer_queue, &stats);
        } else {
            output_queue.enqueue(chunk_id);
        }
    });
    source.stop_stream();

    if let Some(chunk_id) = chunk_pool.acquire() {
        chunk_pool.with_chunk(chunk_id, |chunk| chunk.reset_as_terminator());
        if raw_passthrough {
            if let Some(ring) = &sink_ring {
                ring.signal_end_of_stream();
                chunk_pool.release(chunk_id);
            } else {
                writer_queue.enqueue(chunk_id);
            }
        } else {
            output_queue.enqueue(chunk_id);
        }
    }
}
