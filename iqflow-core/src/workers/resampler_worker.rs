//! Sample-rate conversion stage, or a straight pass-through of `no_resample`
//! pipelines that still need the chunk to cross to the other buffer side.

use std::sync::Arc;

use crate::cancellation::CancellationToken;
use crate::chunk::ChunkPool;
use crate::dsp::resampler::Resampler;
use crate::dsp::Resettable;
use crate::queue::BlockingQueue;

use super::{handle_control_chunk, ControlOutcome};

pub fn run(
    input_queue: Arc<BlockingQueue<usize>>,
    output_queue: Arc<BlockingQueue<usize>>,
    chunk_pool: Arc<ChunkPool>,
    mut resampler: Resampler,
    _cancel: CancellationToken,
) {
    loop {
        let Some(chunk_id) = input_queue.dequeue() else {
            return;
        };

        let mut outcome = ControlOutcome::Data;
        let mut frames_out = 0usize;
        chunk_pool.with_chunk(chunk_id, |chunk| {
            outcome = handle_control_chunk(chunk, || resampler.reset());
            if outcome != ControlOutcome::Data {
                return;
            }

            let frames = chunk.frames_read;
            let in_view = chunk.input_view();
            let input_snapshot = in_view[..frames].to_vec();
            let out_view = chunk.output_view_mut();
            frames_out = resampler.process(&input_snapshot, frames, out_view);
            chunk.frames_read = frames_out;
            chunk.swap();
        });

        match outcome {
            ControlOutcome::Terminator => {
                resampler.flush();
                loop {
                    let Some(flush_id) = chunk_pool.acquire() else { break };
                    let mut frames_out = 0usize;
                    chunk_pool.with_chunk(flush_id, |chunk| {
                        chunk.reset_as_data();
                        let out_view = chunk.output_view_mut();
                        frames_out = resampler.process(&[], 0, out_view);
                        chunk.frames_read = frames_out;
                        chunk.swap();
                    });
                    if frames_out > 0 {
                        output_queue.enqueue(flush_id);
                    } else {
                        chunk_pool.release(flush_id);
                        break;
                    }
                }
                output_queue.enqueue(chunk_id);
                return;
            }
            ControlOutcome::Reset => {
                output_queue.enqueue(chunk_id);
                continue;
            }
            ControlOutcome::Data => {
                if frames_out > 0 {
                    output_queue.enqueue(chunk_id);
                } else {
                    chunk_pool.release(chunk_id);
                }
            }
        }
    }
}
