//! Feedback automatic gain control driving the envelope towards a target
//! RMS level, with independent attack and decay time constants.

use num_complex::Complex32;

use super::Resettable;

pub struct Agc {
    target_rms: f32,
    attack: f32,
    decay: f32,
    gain: f32,
    max_gain: f32,
}

impl Agc {
    pub fn new(target_rms: f32, attack: f32, decay: f32, max_gain: f32) -> Self {
        Self {
            target_rms,
            attack,
            decay,
            gain: 1.0,
            max_gain,
        }
    }

    pub fn process(&mut self, samples: &mut [Complex32], frames: usize) {
        for s in samples.iter_mut().take(frames) {
            let envelope = s.norm();
            *s *= self.gain;
            if envelope < 1e-9 {
                continue;
            }
            let error = self.target_rms - envelope * self.gain;
            let rate = if error > 0.0 { self.attack } else { self.decay };
            self.gain = (self.gain + rate * error).clamp(1e-3, self.max_gain);
        }
    }
}

impl Resettable for Agc {
    fn reset(&mut self) {
        self.gain = 1.0;
    }
}
