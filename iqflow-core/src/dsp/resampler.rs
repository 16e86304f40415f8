//! Sample-rate conversion, backed by `rubato`'s windowed-sinc resampler.
//!
//! `rubato`'s `Resampler` implementations consume and produce fixed-size
//! blocks, but chunks arriving from upstream carry a variable frame count
//! (the last chunk of a stream is typically short). This wrapper buffers
//! input across calls and holds over any resampled output that didn't fit
//! the caller's buffer, so `process` behaves like a streaming resampler from
//! the worker's point of view.

use num_complex::Complex32;
use rubato::{
    Resampler as RubatoResampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType,
    WindowFunction,
};

use crate::errors::ConfigError;

use super::Resettable;

pub const MIN_ACCEPTABLE_RATIO: f64 = 1.0 / 64.0;
pub const MAX_ACCEPTABLE_RATIO: f64 = 64.0;

pub struct Resampler {
    inner: SincFixedIn<f32>,
    chunk_frames: usize,
    ratio: f64,
    pending_in: [Vec<f32>; 2],
    pending_out: [Vec<f32>; 2],
}

impl Resampler {
    pub fn new(input_rate_hz: f64, output_rate_hz: f64, chunk_frames: usize) -> Result<Self, ConfigError> {
        let ratio = output_rate_hz / input_rate_hz;
        if !(MIN_ACCEPTABLE_RATIO..=MAX_ACCEPTABLE_RATIO).contains(&ratio) {
            return Err(ConfigError::ResampleRatioOutOfRange {
                ratio,
                min: MIN_ACCEPTABLE_RATIO,
                max: MAX_ACCEPTABLE_RATIO,
            });
        }
        let params = SincInterpolationParameters {
            sinc_len: 128,
            f_cutoff: 0.92,
            interpolation: SincInterpolationType::Linear,
            oversampling_factor: 128,
            window: WindowFunction::BlackmanHarris2,
        };
        let inner = SincFixedIn::<f32>::new(ratio, 4.0, params, chunk_frames, 2)
            .map_err(|e| ConfigError::Invalid {
                reason: format!("resampler construction failed: {e}"),
            })?;
        Ok(Self {
            inner,
            chunk_frames,
            ratio,
            pending_in: [Vec::new(), Vec::new()],
            pending_out: [Vec::new(), Vec::new()],
        })
    }

    pub fn ratio(&self) -> f64 {
        self.ratio
    }

    /// Feeds `input[..frames]` through the resampler and writes as many
    /// resampled frames as fit into `output`, returning the count written.
    /// Any input that does not fill a full processing block, and any output
    /// that does not fit in `output`, is carried over to the next call.
    pub fn process(&mut self, input: &[Complex32], frames: usize, output: &mut [Complex32]) -> usize {
        for s in input.iter().take(frames) {
            self.pending_in[0].push(s.re);
            self.pending_in[1].push(s.im);
        }

        while self.pending_in[0].len() >= self.chunk_frames {
            let block: Vec<Vec<f32>> = self
                .pending_in
                .iter_mut()
                .map(|ch| ch.drain(..self.chunk_frames).collect())
                .collect();
            if let Ok(resampled) = self.inner.process(&block, None) {
                self.pending_out[0].extend_from_slice(&resampled[0]);
                self.pending_out[1].extend_from_slice(&resampled[1]);
            }
        }

        let available = self.pending_out[0].len();
        let n = available.min(output.len());
        for i in 0..n {
            output[i] = Complex32::new(self.pending_out[0][i], self.pending_out[1][i]);
        }
        self.pending_out[0].drain(..n);
        self.pending_out[1].drain(..n);
        n
    }

    /// Drains a buffered partial block that never reached `chunk_frames`, by
    /// zero-padding it to a full block and running it through the underlying
    /// resampler — the same trick `rubato` callers use for a stream's last
    /// short chunk. The padded block overshoots the true output length by a
    /// few samples; those are trimmed by rounding `pending_frames * ratio`.
    /// Call once, after the last `process` call for a stream, then keep
    /// calling `process(&[], 0, out)` to copy the drained samples out.
    pub fn flush(&mut self) {
        let pending_frames = self.pending_in[0].len();
        if pending_frames == 0 {
            return;
        }
        let expected_out = (pending_frames as f64 * self.ratio).round() as usize;
        for ch in self.pending_in.iter_mut() {
            ch.resize(self.chunk_frames, 0.0);
        }
        let block: Vec<Vec<f32>> = self.pending_in.iter_mut().map(|ch| ch.drain(..).collect()).collect();
        if let Ok(resampled) = self.inner.process(&block, None) {
            let n = expected_out.min(resampled[0].len());
            self.pending_out[0].extend_from_slice(&resampled[0][..n]);
            self.pending_out[1].extend_from_slice(&resampled[1][..n]);
        }
    }
}

impl Resettable for Resampler {
    fn reset(&mut self) {
        self.pending_in[0].clear();
        self.pending_in[1].clear();
        self.pending_out[0].clear();
        self.pending_out[1].clear();
        let _ = self.inner.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_ratio_outside_acceptable_range() {
        let result = Resampler::new(48_000.0, 48_000.0 * 128.0, 1024);
        assert!(matches!(result, Err(ConfigError::ResampleRatioOutOfRange { .. })));
    }

    #[test]
    fn downsamples_by_roughly_the_configured_ratio() {
        let mut resampler = Resampler::new(48_000.0, 24_000.0, 1024).unwrap();
        let n = 1024 * 8;
        let input: Vec<Complex32> = (0..n)
            .map(|i| {
                let phase = 2.0 * std::f32::consts::PI * 1_000.0 * i as f32 / 48_000.0;
                Complex32::new(phase.cos(), phase.sin())
            })
            .collect();
        let mut output = vec![Complex32::new(0.0, 0.0); n];
        let mut total_out = 0;
        for block in input.chunks(1024) {
            total_out += resampler.process(block, block.len(), &mut output[total_out..]);
        }
        let expected = (n as f64 * resampler.ratio()) as usize;
        assert!((total_out as i64 - expected as i64).unsigned_abs() < 256);
    }

    #[test]
    fn flush_emits_the_trailing_partial_block() {
        let mut resampler = Resampler::new(48_000.0, 24_000.0, 1024).unwrap();
        // Not a multiple of chunk_frames: 3 full blocks plus a 300-frame tail.
        let n = 1024 * 3 + 300;
        let input: Vec<Complex32> = (0..n)
            .map(|i| {
                let phase = 2.0 * std::f32::consts::PI * 1_000.0 * i as f32 / 48_000.0;
                Complex32::new(phase.cos(), phase.sin())
            })
            .collect();
        let mut output = vec![Complex32::new(0.0, 0.0); n];
        let mut total_out = 0;
        for block in input.chunks(1024) {
            total_out += resampler.process(block, block.len(), &mut output[total_out..]);
        }
        resampler.flush();
        loop {
            let n = resampler.process(&[], 0, &mut output[total_out..]);
            if n == 0 {
                break;
            }
            total_out += n;
        }
        let expected = (n as f64 * resampler.ratio()) as usize;
        assert!(
            (total_out as i64 - expected as i64).unsigned_abs() < 256,
            "flush should recover the trailing partial block, got {total_out} vs expected {expected}"
        );
    }
}
