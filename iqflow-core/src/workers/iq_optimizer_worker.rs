//! Drains forked optimizer chunks off the critical path and folds them into
//! the shared I/Q correction coefficients.

use std::sync::Arc;

use crate::chunk::ChunkPool;
use crate::dsp::iq_correction::SharedCoefficients;
use crate::dsp::iq_optimizer::IqOptimizer;
use crate::queue::BlockingQueue;

pub fn run(queue: Arc<BlockingQueue<usize>>, chunk_pool: Arc<ChunkPool>, coefficients: SharedCoefficients) {
    let mut optimizer = IqOptimizer::new(coefficients);
    while let Some(chunk_id) = queue.dequeue() {
        chunk_pool.with_chunk(chunk_id, |chunk| {
            let frames = chunk.frames_read;
            let samples = chunk.input_view()[..frames].to_vec();
            optimizer.refine(&samples);
        });
        chunk_pool.release(chunk_id);
    }
}
