//! One dedicated OS thread per stage, wired by [`crate::orchestrator`].
//! Every worker follows the same shutdown discipline: on exit (clean or
//! cancelled) it never leaks a chunk it currently holds back to the free
//! queue.

pub mod iq_optimizer_worker;
pub mod postprocessor;
pub mod preprocessor;
pub mod reader_worker;
pub mod resampler_worker;
pub mod source_worker;
pub mod stats;
pub mod watchdog;
pub mod writer_worker;

use crate::chunk::{Chunk, ChunkPool};
use crate::queue::BlockingQueue;
use crate::ring_buffer::RingBuffer;

use self::stats::PipelineStats;

/// Routes a chunk carrying `frames_to_write` bytes of `final_output` to the
/// sink: into the sink-side ring buffer when pacing is required, or onto the
/// writer's queue otherwise (chunk-direct). Shared by the post-processor and
/// by the reader's raw-passthrough shortcut.
pub(crate) fn route_chunk_to_sink(
    chunk_pool: &ChunkPool,
    chunk_id: usize,
    sink_ring: Option<&RingBuffer>,
    writer_queue: &BlockingQueue<usize>,
    stats: &PipelineStats,
) {
    let should_enqueue = match sink_ring {
        Some(ring) => {
            chunk_pool.with_chunk(chunk_id, |chunk| {
                let nbytes = chunk.frames_to_write * chunk.output_bytes_per_sample_pair;
                let written = ring.write(&chunk.final_output[..nbytes]);
                if written < nbytes {
                    tracing::warn!(wrote = written, want = nbytes, "sink ring overrun, dropping tail");
                    stats.record_overrun();
                }
            });
            false
        }
        None => true,
    };
    if should_enqueue {
        writer_queue.enqueue(chunk_id);
    } else {
        chunk_pool.release(chunk_id);
    }
}

/// Shared discontinuity/terminator dispatch used by every mid-pipeline
/// stage: returns `true` if the chunk was fully handled (terminator or
/// reset) and the caller should `continue`/`return` without running its
/// normal per-sample processing.
pub(crate) fn handle_control_chunk(
    chunk: &mut Chunk,
    on_reset: impl FnOnce(),
) -> ControlOutcome {
    if chunk.is_last_chunk {
        ControlOutcome::Terminator
    } else if chunk.stream_discontinuity_event {
        on_reset();
        ControlOutcome::Reset
    } else {
        ControlOutcome::Data
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ControlOutcome {
    Terminator,
    Reset,
    Data,
}
