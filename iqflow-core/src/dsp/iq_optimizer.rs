//! Decision-directed gradient refinement of the shared I/Q correction
//! coefficients, run off the critical path by the optimizer worker.
//!
//! Amplitude imbalance is estimated from the power ratio between the I and
//! Q rails; phase imbalance from their normalized cross-correlation (the
//! small-angle estimator `phi ≈ E[I·Q] / E[I²]`). Both are nudged towards
//! their estimate by a fixed learning rate rather than snapped directly, so
//! a single noisy block cannot destabilize the correction already applied
//! upstream.

use num_complex::Complex32;

use super::iq_correction::{IqCoefficients, SharedCoefficients};

const LEARNING_RATE: f32 = 0.05;

pub struct IqOptimizer {
    coefficients: SharedCoefficients,
}

impl IqOptimizer {
    pub fn new(coefficients: SharedCoefficients) -> Self {
        Self { coefficients }
    }

    /// Refines coefficients from one block of (already partially corrected)
    /// complex samples.
    pub fn refine(&mut self, samples: &[Complex32]) {
        if samples.is_empty() {
            return;
        }
        let n = samples.len() as f32;
        let mut sum_i2 = 0.0f32;
        let mut sum_q2 = 0.0f32;
        let mut sum_iq = 0.0f32;
        for s in samples {
            sum_i2 += s.re * s.re;
            sum_q2 += s.im * s.im;
            sum_iq += s.re * s.im;
        }
        let mean_i2 = sum_i2 / n;
        let mean_q2 = sum_q2 / n;
        let mean_iq = sum_iq / n;
        if mean_i2 < 1e-9 {
            return;
        }

        let gain_estimate = (mean_q2 / mean_i2).sqrt();
        let phase_estimate = mean_iq / mean_i2;

        let mut coeffs: IqCoefficients = *self.coefficients.lock().unwrap();
        coeffs.gain_imbalance += LEARNING_RATE * (gain_estimate - coeffs.gain_imbalance);
        coeffs.phase_imbalance_rad += LEARNING_RATE * (phase_estimate - coeffs.phase_imbalance_rad);
        *self.coefficients.lock().unwrap() = coeffs;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::iq_correction::new_shared_coefficients;

    #[test]
    fn converges_towards_known_gain_imbalance() {
        let shared = new_shared_coefficients();
        let mut optimizer = IqOptimizer::new(shared.clone());
        let samples: Vec<Complex32> = (0..4096)
            .map(|i| {
                let phase = 2.0 * std::f32::consts::PI * i as f32 / 64.0;
                Complex32::new(phase.cos(), 1.5 * phase.sin())
            })
            .collect();
        for _ in 0..40 {
            optimizer.refine(&samples);
        }
        let final_gain = shared.lock().unwrap().gain_imbalance;
        assert!((final_gain - 1.5).abs() < 0.1);
    }

    #[test]
    fn empty_block_is_a_no_op() {
        let shared = new_shared_coefficients();
        let mut optimizer = IqOptimizer::new(shared.clone());
        optimizer.refine(&[]);
        assert_eq!(shared.lock().unwrap().gain_imbalance, 1.0);
    }
}
