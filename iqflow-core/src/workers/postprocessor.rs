//! Post-filter, post-shift, AGC, and complex→wire-format encode, the last
//! DSP-touching stage before a chunk reaches its sink.

use std::sync::Arc;

use num_complex::Complex32;

use crate::cancellation::CancellationToken;
use crate::chunk::ChunkPool;
use crate::dsp::agc::Agc;
use crate::dsp::filter::{Filter, FilterRequest};
use crate::dsp::nco::Nco;
use crate::dsp::Resettable;
use crate::errors::FatalError;
use crate::queue::BlockingQueue;
use crate::ring_buffer::RingBuffer;
use crate::sample_format::SampleFormat;

use super::stats::PipelineStats;
use super::{handle_control_chunk, route_chunk_to_sink, ControlOutcome};

pub struct PostprocessorConfig {
    pub post_filter: Option<FilterRequest>,
    pub post_shift_hz: Option<f64>,
    pub sample_rate_hz: f64,
    pub agc: Option<(f32, f32, f32, f32)>,
    pub output_format: SampleFormat,
}

pub fn run(
    input_queue: Arc<BlockingQueue<usize>>,
    writer_queue: Arc<BlockingQueue<usize>>,
    sink_ring: Option<Arc<RingBuffer>>,
    chunk_pool: Arc<ChunkPool>,
    cfg: PostprocessorConfig,
    stats: Arc<PipelineStats>,
    cancel: CancellationToken,
) {
    let mut filter = cfg.post_filter.map(|req| Filter::new(req, cfg.sample_rate_hz));
    let mut nco = cfg.post_shift_hz.map(|hz| Nco::new(hz, cfg.sample_rate_hz));
    let mut agc = cfg
        .agc
        .map(|(target, attack, decay, max_gain)| Agc::new(target, attack, decay, max_gain));

    loop {
        let Some(chunk_id) = input_queue.dequeue() else {
            return;
        };

        let mut outcome = ControlOutcome::Data;
        let mut frames_to_write = 0usize;
        chunk_pool.with_chunk(chunk_id, |chunk| {
            outcome = handle_control_chunk(chunk, || {
                if let Some(f) = &mut filter {
                    f.reset();
                }
                if let Some(n) = &mut nco {
                    n.reset();
                }
                if let Some(a) = &mut agc {
                    a.reset();
                }
            });
            if outcome != ControlOutcome::Data {
                return;
            }

            let frames = chunk.frames_read;
            if let Some(f) = &mut filter {
                let out_frames = match chunk.current_in {
                    crate::chunk::Side::A => f.process(&chunk.complex_a[..frames], frames, &mut chunk.complex_b),
                    crate::chunk::Side::B => f.process(&chunk.complex_b[..frames], frames, &mut chunk.complex_a),
                };
                chunk.frames_read = out_frames;
                chunk.swap();
            }

            let frames = chunk.frames_read;
            if let Some(n) = &mut nco {
                n.process(chunk.input_view_mut(), frames);
            }
            if let Some(a) = &mut agc {
                a.process(chunk.input_view_mut(), frames);
            }

            let samples: &[Complex32] = match chunk.current_in {
                crate::chunk::Side::A => &chunk.complex_a,
                crate::chunk::Side::B => &chunk.complex_b,
            };
            let ok = cfg.output_format.encode(samples, frames, &mut chunk.final_output);
            if !ok {
                cancel.fail_with(FatalError::FormatConversion {
                    worker: "postprocessor",
                    reason: format!("unsupported output format {:?}", cfg.output_format),
                });
                chunk.frames_to_write = 0;
            } else {
                chunk.frames_to_write = frames;
            }

            frames_to_write = chunk.frames_to_write;
        });

        match outcome {
            ControlOutcome::Terminator => {
                if let Some(ring) = &sink_ring {
                    ring.signal_end_of_stream();
                    chunk_pool.release(chunk_id);
                } else {
                    writer_queue.enqueue(chunk_id);
                }
                return;
            }
            ControlOutcome::Reset => {
                chunk_pool.release(chunk_id);
                continue;
            }
            ControlOutcome::Data => {
                if frames_to_write > 0 {
                    route_chunk_to_sink(&chunk_pool, chunk_id, sink_ring.as_deref(), &writer_queue, &stats);
                } else {
                    chunk_pool.release(chunk_id);
                }
            }
        }
    }
}
