//! Raw→complex conversion, DC block, I/Q correction, pre-shift, pre-filter.

use std::sync::Arc;

use crate::cancellation::CancellationToken;
use crate::chunk::{ChunkPool, Side};
use crate::dsp::dc_block::DcBlock;
use crate::dsp::filter::{Filter, FilterRequest};
use crate::dsp::iq_correction::{IqCorrection, SharedCoefficients};
use crate::dsp::nco::Nco;
use crate::dsp::{Resettable, IQ_CORRECTION_FFT_SIZE};
use crate::queue::BlockingQueue;

use super::stats::PipelineStats;
use super::{handle_control_chunk, ControlOutcome};

pub struct PreprocessorConfig {
    pub gain: f32,
    pub dc_block_enabled: bool,
    pub pre_shift_hz: Option<f64>,
    pub sample_rate_hz: f64,
    pub pre_filter: Option<FilterRequest>,
    pub iq_optimization_enabled: bool,
}

pub fn run(
    input_queue: Arc<BlockingQueue<usize>>,
    output_queue: Arc<BlockingQueue<usize>>,
    optimizer_queue: Option<Arc<BlockingQueue<usize>>>,
    chunk_pool: Arc<ChunkPool>,
    iq_coeffs: SharedCoefficients,
    cfg: PreprocessorConfig,
    stats: Arc<PipelineStats>,
    _cancel: CancellationToken,
) {
    let mut dc_block = DcBlock::new();
    let mut iq_correction = IqCorrection::new(iq_coeffs);
    let mut nco = cfg.pre_shift_hz.map(|hz| Nco::new(hz, cfg.sample_rate_hz));
    let mut filter = cfg.pre_filter.map(|req| Filter::new(req, cfg.sample_rate_hz));

    loop {
        let Some(chunk_id) = input_queue.dequeue() else {
            return;
        };

        let mut outcome = ControlOutcome::Data;
        let mut frames_read = 0usize;
        chunk_pool.with_chunk(chunk_id, |chunk| {
            outcome = handle_control_chunk(chunk, || {
                dc_block.reset();
                if let Some(n) = &mut nco {
                    n.reset();
                }
                if let Some(f) = &mut filter {
                    f.reset();
                }
                stats.record_discontinuity();
            });
            if outcome != ControlOutcome::Data {
                return;
            }

            let frames = chunk.frames_read;
            let format = chunk.packet_sample_format;
            match chunk.current_in {
                Side::A => format.decode(&chunk.raw_input, frames, cfg.gain, &mut chunk.complex_a[..frames]),
                Side::B => format.decode(&chunk.raw_input, frames, cfg.gain, &mut chunk.complex_b[..frames]),
            }

            if cfg.dc_block_enabled {
                dc_block.process(chunk.input_view_mut(), frames);
            }
            iq_correction.process(chunk.input_view_mut(), frames);
            if let Some(n) = &mut nco {
                n.process(chunk.input_view_mut(), frames);
            }

            if let Some(f) = &mut filter {
                let out_frames = match chunk.current_in {
                    Side::A => f.process(&chunk.complex_a[..frames], frames, &mut chunk.complex_b),
                    Side::B => f.process(&chunk.complex_b[..frames], frames, &mut chunk.complex_a),
                };
                chunk.frames_read = out_frames;
                chunk.swap();
            }

            if cfg.iq_optimization_enabled && chunk.frames_read >= IQ_CORRECTION_FFT_SIZE {
                if let Some(opt_queue) = &optimizer_queue {
                    if let Some(opt_id) = chunk_pool.try_acquire() {
                        let snippet = chunk.input_view()[..IQ_CORRECTION_FFT_SIZE].to_vec();
                        chunk_pool.with_chunk(opt_id, |opt_chunk| {
                            opt_chunk.input_view_mut()[..IQ_CORRECTION_FFT_SIZE]
                                .copy_from_slice(&snippet);
                            opt_chunk.frames_read = IQ_CORRECTION_FFT_SIZE;
                        });
                        opt_queue.enqueue(opt_id);
                    }
                }
            }

            frames_read = chunk.frames_read;
        });

        match outcome {
            ControlOutcome::Terminator => {
                if let Some(q) = &optimizer_queue {
                    q.signal_shutdown();
                }
                output_queue.enqueue(chunk_id);
                return;
            }
            ControlOutcome::Reset => {
                output_queue.enqueue(chunk_id);
                continue;
            }
            ControlOutcome::Data => {
                if frames_read > 0 {
                    output_queue.enqueue(chunk_id);
                } else {
                    chunk_pool.release(chunk_id);
                }
            }
        }
    }
}
