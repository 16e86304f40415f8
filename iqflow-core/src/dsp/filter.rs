//! Lowpass/highpass/passband/stopband filtering, realized either as direct
//! time-domain FIR convolution or FFT overlap-save, mirroring the
//! `rustfft`-based spectral analysis pattern used elsewhere in this crate's
//! lineage.

use std::sync::Arc;

use num_complex::Complex32;
use rustfft::{Fft, FftPlanner};
use serde::{Deserialize, Serialize};

use super::Resettable;
use crate::errors::ConfigError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterKind {
    Lowpass,
    Highpass,
    Passband,
    Stopband,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImplementationHint {
    Auto,
    Fir,
    Fft,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FilterRequest {
    pub kind: FilterKind,
    pub low_hz: f64,
    pub high_hz: f64,
    pub hint: ImplementationHint,
}

fn sinc(x: f64) -> f64 {
    if x.abs() < 1e-12 {
        1.0
    } else {
        (std::f64::consts::PI * x).sin() / (std::f64::consts::PI * x)
    }
}

fn hamming(i: usize, n: usize) -> f64 {
    0.54 - 0.46 * (2.0 * std::f64::consts::PI * i as f64 / (n as f64 - 1.0)).cos()
}

fn design_lowpass(cutoff_hz: f64, sample_rate_hz: f64, num_taps: usize) -> Vec<f32> {
    let fc = cutoff_hz / sample_rate_hz;
    let mid = (num_taps - 1) as f64 / 2.0;
    let mut taps: Vec<f64> = (0..num_taps)
        .map(|i| 2.0 * fc * sinc(2.0 * fc * (i as f64 - mid)) * hamming(i, num_taps))
        .collect();
    let sum: f64 = taps.iter().sum();
    if sum.abs() > 1e-12 {
        taps.iter_mut().for_each(|t| *t /= sum);
    }
    taps.into_iter().map(|t| t as f32).collect()
}

fn design_highpass(cutoff_hz: f64, sample_rate_hz: f64, num_taps: usize) -> Vec<f32> {
    // Spectral inversion of a lowpass design.
    let mut taps = design_lowpass(cutoff_hz, sample_rate_hz, num_taps);
    for t in taps.iter_mut() {
        *t = -*t;
    }
    taps[(num_taps - 1) / 2] += 1.0;
    taps
}

/// Validates the requested edges against the output Nyquist frequency.
pub fn validate_request(req: &FilterRequest, output_sample_rate_hz: f64) -> Result<(), ConfigError> {
    let nyquist = output_sample_rate_hz / 2.0;
    let edge = req.high_hz.max(req.low_hz);
    if edge >= nyquist {
        return Err(ConfigError::FilterExceedsNyquist {
            edge_hz: edge,
            nyquist_hz: nyquist,
        });
    }
    Ok(())
}

fn design_taps(req: &FilterRequest, sample_rate_hz: f64, num_taps: usize) -> Vec<f32> {
    match req.kind {
        FilterKind::Lowpass => design_lowpass(req.low_hz, sample_rate_hz, num_taps),
        FilterKind::Highpass => design_highpass(req.low_hz, sample_rate_hz, num_taps),
        FilterKind::Passband => {
            let lo = design_highpass(req.low_hz, sample_rate_hz, num_taps);
            let hi = design_lowpass(req.high_hz, sample_rate_hz, num_taps);
            lo.iter().zip(hi.iter()).map(|(a, b)| a * b * num_taps as f32).collect()
        }
        FilterKind::Stopband => {
            let lo = design_lowpass(req.low_hz, sample_rate_hz, num_taps);
            let hi = design_highpass(req.high_hz, sample_rate_hz, num_taps);
            lo.iter().zip(hi.iter()).map(|(a, b)| a + b).collect()
        }
    }
}

fn next_pow2(n: usize) -> usize {
    n.next_power_of_two()
}

enum Engine {
    Fir {
        taps: Vec<f32>,
        history: Vec<Complex32>,
    },
    FftOverlapSave {
        taps_freq: Vec<Complex32>,
        fft: Arc<dyn Fft<f32>>,
        ifft: Arc<dyn Fft<f32>>,
        block_size: usize,
        num_taps: usize,
        overlap: Vec<Complex32>,
    },
}

pub struct Filter {
    engine: Engine,
}

impl Filter {
    pub fn new(req: FilterRequest, sample_rate_hz: f64) -> Self {
        let num_taps = 127;
        let taps = design_taps(&req, sample_rate_hz, num_taps);
        let use_fft = match req.hint {
            ImplementationHint::Fft => true,
            ImplementationHint::Fir => false,
            ImplementationHint::Auto => num_taps > 64,
        };
        let engine = if use_fft {
            let block_size = next_pow2(num_taps * 4);
            let mut planner = FftPlanner::new();
            let fft = planner.plan_fft_forward(block_size);
            let ifft = planner.plan_fft_inverse(block_size);
            let mut taps_freq: Vec<Complex32> =
                taps.iter().map(|&t| Complex32::new(t, 0.0)).collect();
            taps_freq.resize(block_size, Complex32::new(0.0, 0.0));
            fft.process(&mut taps_freq);
            Engine::FftOverlapSave {
                taps_freq,
                fft,
                ifft,
                block_size,
                num_taps,
                overlap: vec![Complex32::new(0.0, 0.0); num_taps - 1],
            }
        } else {
            Engine::Fir {
                taps,
                history: vec![Complex32::new(0.0, 0.0); num_taps - 1],
            }
        };
        Self { engine }
    }

    /// Block size the chunk pool must accommodate for this filter (only
    /// meaningful for the FFT engine; the FIR engine processes in place).
    pub fn block_size(&self) -> Option<usize> {
        match &self.engine {
            Engine::Fir { .. } => None,
            Engine::FftOverlapSave { block_size, .. } => Some(*block_size),
        }
    }

    /// Filters `input[..frames]` into `output`, returning the frame count
    /// written (may be less than `frames` for block-oriented engines whose
    /// last partial block is held over to the next call).
    pub fn process(&mut self, input: &[Complex32], frames: usize, output: &mut [Complex32]) -> usize {
        match &mut self.engine {
            Engine::Fir { taps, history } => {
                for i in 0..frames {
                    let mut acc = Complex32::new(0.0, 0.0);
                    for (k, &tap) in taps.iter().enumerate() {
                        let sample = if i >= k {
                            input[i - k]
                        } else {
                            history[history.len() - (k - i)]
                        };
                        acc += sample * tap;
                    }
                    output[i] = acc;
                }
                let hist_len = history.len();
                let keep = hist_len.min(frames);
                if frames >= hist_len {
                    let src = &input[frames - hist_len..frames];
                    history.copy_from_slice(src);
                } else {
                    history.rotate_left(keep);
                    let start = hist_len - keep;
                    let src = &input[..keep];
                    history[start..].copy_from_slice(src);
                }
                frames
            }
            Engine::FftOverlapSave {
                taps_freq,
                fft,
                ifft,
                block_size,
                num_taps,
                overlap,
            } => {
                let valid_per_block = *block_size - (*num_taps - 1);
                let mut produced = 0;
                let mut pos = 0;
                while pos < frames {
                    let take = valid_per_block.min(frames - pos);
                    let mut buf = vec![Complex32::new(0.0, 0.0); *block_size];
                    buf[..overlap.len()].copy_from_slice(overlap);
                    buf[overlap.len()..overlap.len() + take].copy_from_slice(&input[pos..pos + take]);

                    fft.process(&mut buf);
                    for (b, t) in buf.iter_mut().zip(taps_freq.iter()) {
                        *b *= t;
                    }
                    ifft.process(&mut buf);
                    let scale = 1.0 / *block_size as f32;

                    let valid_start = *num_taps - 1;
                    let out_slice = &buf[valid_start..valid_start + take];
                    if produced + take <= output.len() {
                        for (o, v) in output[produced..produced + take].iter_mut().zip(out_slice) {
                            *o = *v * scale;
                        }
                    }
                    produced += take;

                    let tail_start = (pos + take).saturating_sub(overlap.len());
                    for (i, o) in overlap.iter_mut().enumerate() {
                        let src_idx = tail_start + i;
                        *o = if src_idx < frames { input[src_idx] } else { *o };
                    }

                    pos += take;
                }
                produced
            }
        }
    }
}

impl Resettable for Filter {
    fn reset(&mut self) {
        match &mut self.engine {
            Engine::Fir { history, .. } => history.iter_mut().for_each(|s| *s = Complex32::new(0.0, 0.0)),
            Engine::FftOverlapSave { overlap, .. } => {
                overlap.iter_mut().for_each(|s| *s = Complex32::new(0.0, 0.0))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fir_lowpass_attenuates_high_frequency_tone() {
        let req = FilterRequest {
            kind: FilterKind::Lowpass,
            low_hz: 1_000.0,
            high_hz: 0.0,
            hint: ImplementationHint::Fir,
        };
        let mut filter = Filter::new(req, 48_000.0);
        let n = 2048;
        let input: Vec<Complex32> = (0..n)
            .map(|i| {
                let phase = 2.0 * std::f32::consts::PI * 15_000.0 * i as f32 / 48_000.0;
                Complex32::new(phase.cos(), phase.sin())
            })
            .collect();
        let mut output = vec![Complex32::new(0.0, 0.0); n];
        filter.process(&input, n, &mut output);
        let tail_power: f32 = output[512..].iter().map(|c| c.norm_sqr()).sum::<f32>() / (n - 512) as f32;
        assert!(tail_power < 0.3);
    }

    #[test]
    fn fft_engine_reports_a_block_size() {
        let req = FilterRequest {
            kind: FilterKind::Lowpass,
            low_hz: 1_000.0,
            high_hz: 0.0,
            hint: ImplementationHint::Fft,
        };
        let filter = Filter::new(req, 48_000.0);
        assert!(filter.block_size().is_some());
    }

    #[test]
    fn validate_rejects_edge_past_nyquist() {
        let req = FilterRequest {
            kind: FilterKind::Lowpass,
            low_hz: 30_000.0,
            high_hz: 0.0,
            hint: ImplementationHint::Auto,
        };
        assert!(validate_request(&req, 48_000.0).is_err());
    }
}
