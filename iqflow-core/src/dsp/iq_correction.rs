//! I/Q amplitude/phase imbalance correction.
//!
//! Coefficients are published through a shared, lock-guarded cell so the
//! optimizer worker (running off the critical path) can update them while
//! the pre-processor reads the latest snapshot each chunk — a "coherently
//! readable shared state" publication discipline rather than a lock held
//! across the whole DSP call.

use std::sync::{Arc, Mutex};

use num_complex::Complex32;

use super::Resettable;

#[derive(Debug, Clone, Copy)]
pub struct IqCoefficients {
    pub gain_imbalance: f32,
    pub phase_imbalance_rad: f32,
}

impl Default for IqCoefficients {
    fn default() -> Self {
        Self {
            gain_imbalance: 1.0,
            phase_imbalance_rad: 0.0,
        }
    }
}

pub type SharedCoefficients = Arc<Mutex<IqCoefficients>>;

pub fn new_shared_coefficients() -> SharedCoefficients {
    Arc::new(Mutex::new(IqCoefficients::default()))
}

pub struct IqCorrection {
    coefficients: SharedCoefficients,
}

impl IqCorrection {
    pub fn new(coefficients: SharedCoefficients) -> Self {
        Self { coefficients }
    }

    /// In-place correction over `samples[..frames]` using the latest
    /// published coefficients.
    pub fn process(&mut self, samples: &mut [Complex32], frames: usize) {
        let coeffs = *self.coefficients.lock().unwrap();
        if coeffs.gain_imbalance == 1.0 && coeffs.phase_imbalance_rad == 0.0 {
            return;
        }
        let (sin_phi, cos_phi) = coeffs.phase_imbalance_rad.sin_cos();
        for s in samples.iter_mut().take(frames) {
            let i = s.re;
            let q = (s.im / cos_phi - i * sin_phi / cos_phi) / coeffs.gain_imbalance;
            *s = Complex32::new(i, q);
        }
    }
}

impl Resettable for IqCorrection {
    fn reset(&mut self) {
        // Correction coefficients are a slow, global estimate of hardware
        // imbalance; a stream discontinuity does not invalidate them.
    }
}
