//! Single-pole DC-removal notch: `y[n] = x[n] - x[n-1] + r*y[n-1]`.

use num_complex::Complex32;

use super::Resettable;

const DEFAULT_POLE: f32 = 0.9975;

pub struct DcBlock {
    pole: f32,
    prev_in: Complex32,
    prev_out: Complex32,
}

impl DcBlock {
    pub fn new() -> Self {
        Self {
            pole: DEFAULT_POLE,
            prev_in: Complex32::new(0.0, 0.0),
            prev_out: Complex32::new(0.0, 0.0),
        }
    }

    pub fn with_pole(pole: f32) -> Self {
        Self {
            pole,
            ..Self::new()
        }
    }

    /// In-place DC removal over `samples[..frames]`.
    pub fn process(&mut self, samples: &mut [Complex32], frames: usize) {
        for s in samples.iter_mut().take(frames) {
            let x = *s;
            let y = x - self.prev_in + self.pole * self.prev_out;
            self.prev_in = x;
            self.prev_out = y;
            *s = y;
        }
    }
}

impl Default for DcBlock {
    fn default() -> Self {
        Self::new()
    }
}

impl Resettable for DcBlock {
    fn reset(&mut self) {
        self.prev_in = Complex32::new(0.0, 0.0);
        self.prev_out = Complex32::new(0.0, 0.0);
    }
}
