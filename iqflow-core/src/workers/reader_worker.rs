//! Pulls samples into chunks for the rest of the pipeline. FILE_PROCESSING
//! mode calls `InputSource::read_block` directly; BUFFERED_SDR mode
//! deframes packets off the source-side ring that `source_worker` fills.

use std::sync::Arc;

use crate::cancellation::CancellationToken;
use crate::chunk::ChunkPool;
use crate::errors::FatalError;
use crate::packet::{self, PacketEvent};
use crate::queue::BlockingQueue;
use crate::ring_buffer::RingBuffer;
use crate::source::InputSource;

use super::route_chunk_to_sink;
use super::stats::PipelineStats;

/// FILE_PROCESSING mode. `raw_passthrough` skips the DSP chain entirely and
/// routes bytes straight to the sink via `route_chunk_to_sink`.
#[allow(clippy::too_many_arguments)]
pub fn run_file(
    mut source: InputSource,
    chunk_pool: Arc<ChunkPool>,
    output_queue: Arc<BlockingQueue<usize>>,
    sink_ring: Option<Arc<RingBuffer>>,
    writer_queue: Arc<BlockingQueue<usize>>,
    raw_passthrough: bool,
    bytes_per_frame: usize,
    cancel: CancellationToken,
    stats: Arc<PipelineStats>,
) {
    loop {
        if cancel.is_cancelled() {
            return;
        }
        let Some(chunk_id) = chunk_pool.acquire() else {
            return;
        };

        let mut frames_read = 0usize;
        let mut io_error: Option<FatalError> = None;
        chunk_pool.with_chunk(chunk_id, |chunk| {
            chunk.reset_as_data();
            let buf = if raw_passthrough {
                &mut chunk.final_output
            } else {
                &mut chunk.raw_input
            };
            let want = bytes_per_frame * (buf.len() / bytes_per_frame.max(1));
            match source.read_block(&mut buf[..want]) {
                Ok(n) => frames_read = n / bytes_per_frame.max(1),
                Err(e) => io_error = Some(e),
            }
            chunk.frames_read = frames_read;
            chunk.frames_to_write = frames_read;
        });

        if let Some(e) = io_error {
            cancel.fail_with(e);
            chunk_pool.release(chunk_id);
            return;
        }

        if frames_read == 0 {
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
            return;
        }

        if raw_passthrough {
            route_chunk_to_sink(&chunk_pool, chunk_id, sink_ring.as_deref(), &writer_queue, &stats);
        } else {
            output_queue.enqueue(chunk_id);
        }
    }
}

/// BUFFERED_SDR mode: deframe packets off `ring` into chunks.
pub fn run_buffered(
    ring: Arc<RingBuffer>,
    chunk_pool: Arc<ChunkPool>,
    output_queue: Arc<BlockingQueue<usize>>,
    cancel: CancellationToken,
) {
    loop {
        let Some(chunk_id) = chunk_pool.acquire() else {
            return;
        };

        match packet::read_packet(&ring) {
            Ok(PacketEvent::EndOfStream) => {
                chunk_pool.with_chunk(chunk_id, |chunk| chunk.reset_as_terminator());
                output_queue.enqueue(chunk_id);
                return;
            }
            Ok(PacketEvent::Data {
                format,
                num_samples,
                reset,
                payload,
            }) => {
                chunk_pool.with_chunk(chunk_id, |chunk| {
                    chunk.packet_sample_format = format;
                    if reset {
                        chunk.reset_as_discontinuity();
                    } else {
                        chunk.reset_as_data();
                        chunk.raw_input[..payload.len()].copy_from_slice(&payload);
                        chunk.frames_read = num_samples as usize;
                    }
                });
                output_queue.enqueue(chunk_id);
            }
            Err(e) => {
                cancel.fail_with(FatalError::PacketCorruption {
                    worker: "reader",
                    source: e,
                });
                chunk_pool.release(chunk_id);
                return;
            }
        }
    }
}
