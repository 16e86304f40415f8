//! Numerically-controlled oscillator: a complex mixer applying a constant
//! frequency shift by multiplying each sample by `exp(-j * phase)` and
//! advancing the phase accumulator each frame.

use std::f64::consts::TAU;

use num_complex::Complex32;

use super::Resettable;

pub struct Nco {
    shift_hz: f64,
    sample_rate_hz: f64,
    phase: f64,
}

impl Nco {
    pub fn new(shift_hz: f64, sample_rate_hz: f64) -> Self {
        Self {
            shift_hz,
            sample_rate_hz,
            phase: 0.0,
        }
    }

    pub fn shift_hz(&self) -> f64 {
        self.shift_hz
    }

    /// In-place mix over `samples[..frames]`.
    pub fn process(&mut self, samples: &mut [Complex32], frames: usize) {
        if self.shift_hz == 0.0 {
            return;
        }
        let step = TAU * self.shift_hz / self.sample_rate_hz;
        for s in samples.iter_mut().take(frames) {
            let (sin, cos) = self.phase.sin_cos();
            let mixer = Complex32::new(cos as f32, -sin as f32);
            *s *= mixer;
            self.phase += step;
            if self.phase > TAU {
                self.phase -= TAU;
            } else if self.phase < -TAU {
                self.phase += TAU;
            }
        }
    }
}

impl Resettable for Nco {
    fn reset(&mut self) {
        self.phase = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_shift_is_identity() {
        let mut nco = Nco::new(0.0, 48_000.0);
        let mut samples = vec![Complex32::new(1.0, 2.0); 8];
        let original = samples.clone();
        let len = samples.len();
        nco.process(&mut samples, len);
        assert_eq!(samples, original);
    }

    #[test]
    fn preserves_magnitude() {
        let mut nco = Nco::new(1000.0, 48_000.0);
        let mut samples = vec![Complex32::new(1.0, 0.0); 100];
        let len = samples.len();
        nco.process(&mut samples, len);
        for s in samples {
            assert!((s.norm() - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn reset_rewinds_phase() {
        let mut nco = Nco::new(1000.0, 48_000.0);
        let mut warmup = vec![Complex32::new(1.0, 0.0); 50];
        let warmup_len = warmup.len();
        nco.process(&mut warmup, warmup_len);
        nco.reset();
        assert_eq!(nco.phase, 0.0);
    }
}
