//! Sample formats carried in `packet_sample_format` and negotiated between
//! source/sink modules and the DSP chain.
//!
//! Integer formats normalize to `[-1, 1]` by the integer max; unsigned
//! formats apply a midpoint bias; the Nuand Q4.11 fixed-point format scales
//! by 2048. Complex→integer conversion multiplies by the integer max,
//! saturates, and rounds half-away-from-zero.

use num_complex::Complex32;

use crate::errors::PacketError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum SampleFormat {
    Unknown = 0,
    U8 = 1,
    I8 = 2,
    Cu8 = 3,
    Ci8 = 4,
    U16 = 5,
    I16 = 6,
    Cu16 = 7,
    Ci16 = 8,
    U32 = 9,
    I32 = 10,
    Cu32 = 11,
    Ci32 = 12,
    F32 = 13,
    Cf32 = 14,
    /// Nuand bladeRF SC16-Q11: 16-bit signed container, 11 fractional bits.
    CQ4_11 = 15,
}

impl SampleFormat {
    pub fn from_tag(tag: u8) -> Result<Self, PacketError> {
        Ok(match tag {
            0 => Self::Unknown,
            1 => Self::U8,
            2 => Self::I8,
            3 => Self::Cu8,
            4 => Self::Ci8,
            5 => Self::U16,
            6 => Self::I16,
            7 => Self::Cu16,
            8 => Self::Ci16,
            9 => Self::U32,
            10 => Self::I32,
            11 => Self::Cu32,
            12 => Self::Ci32,
            13 => Self::F32,
            14 => Self::Cf32,
            15 => Self::CQ4_11,
            other => return Err(PacketError::UnknownFormat(other)),
        })
    }

    pub fn tag(self) -> u8 {
        self as u8
    }

    pub fn is_complex(self) -> bool {
        !matches!(
            self,
            Self::Unknown | Self::U8 | Self::I8 | Self::U16 | Self::I16 | Self::U32 | Self::I32 | Self::F32
        )
    }

    /// Bytes needed to store one frame (one I/Q pair, or one real sample for
    /// I-only formats) in this format.
    pub fn bytes_per_sample_pair(self) -> usize {
        match self {
            Self::Unknown => 0,
            Self::U8 | Self::I8 => 1,
            Self::Cu8 | Self::Ci8 => 2,
            Self::U16 | Self::I16 => 2,
            Self::Cu16 | Self::Ci16 | Self::CQ4_11 => 4,
            Self::U32 | Self::I32 | Self::F32 => 4,
            Self::Cu32 | Self::Ci32 | Self::Cf32 => 8,
        }
    }

    /// Convert `frames` frames of raw bytes in this format into complex
    /// samples, applying `gain` in the same pass.
    pub fn decode(self, raw: &[u8], frames: usize, gain: f32, out: &mut [Complex32]) {
        debug_assert!(out.len() >= frames);
        let stride = self.bytes_per_sample_pair();
        for i in 0..frames {
            let b = &raw[i * stride..i * stride + stride];
            out[i] = self.decode_one(b) * gain;
        }
    }

    fn decode_one(self, b: &[u8]) -> Complex32 {
        match self {
            Self::Unknown => Complex32::new(0.0, 0.0),
            Self::U8 => Complex32::new((b[0] as f32 - 128.0) / 128.0, 0.0),
            Self::I8 => Complex32::new(b[0] as i8 as f32 / 127.0, 0.0),
            Self::Cu8 => Complex32::new(
                (b[0] as f32 - 128.0) / 128.0,
                (b[1] as f32 - 128.0) / 128.0,
            ),
            Self::Ci8 => Complex32::new(b[0] as i8 as f32 / 127.0, b[1] as i8 as f32 / 127.0),
            Self::U16 => {
                let v = u16::from_le_bytes([b[0], b[1]]);
                Complex32::new((v as f32 - 32768.0) / 32768.0, 0.0)
            }
            Self::I16 => {
                let v = i16::from_le_bytes([b[0], b[1]]);
                Complex32::new(v as f32 / 32767.0, 0.0)
            }
            Self::Cu16 => {
                let i = u16::from_le_bytes([b[0], b[1]]);
                let q = u16::from_le_bytes([b[2], b[3]]);
                Complex32::new((i as f32 - 32768.0) / 32768.0, (q as f32 - 32768.0) / 32768.0)
            }
            Self::Ci16 => {
                let i = i16::from_le_bytes([b[0], b[1]]);
                let q = i16::from_le_bytes([b[2], b[3]]);
                Complex32::new(i as f32 / 32767.0, q as f32 / 32767.0)
            }
            Self::U32 => {
                let v = u32::from_le_bytes([b[0], b[1], b[2], b[3]]);
                Complex32::new((v as f64 - 2147483648.0) as f32 / 2147483648.0, 0.0)
            }
            Self::I32 => {
                let v = i32::from_le_bytes([b[0], b[1], b[2], b[3]]);
                Complex32::new(v as f32 / 2147483647.0, 0.0)
            }
            Self::Cu32 => {
                let i = u32::from_le_bytes([b[0], b[1], b[2], b[3]]);
                let q = u32::from_le_bytes([b[4], b[5], b[6], b[7]]);
                Complex32::new(
                    (i as f64 - 2147483648.0) as f32 / 2147483648.0,
                    (q as f64 - 2147483648.0) as f32 / 2147483648.0,
                )
            }
            Self::Ci32 => {
                let i = i32::from_le_bytes([b[0], b[1], b[2], b[3]]);
                let q = i32::from_le_bytes([b[4], b[5], b[6], b[7]]);
                Complex32::new(i as f32 / 2147483647.0, q as f32 / 2147483647.0)
            }
            Self::F32 => Complex32::new(f32::from_le_bytes([b[0], b[1], b[2], b[3]]), 0.0),
            Self::Cf32 => Complex32::new(
                f32::from_le_bytes([b[0], b[1], b[2], b[3]]),
                f32::from_le_bytes([b[4], b[5], b[6], b[7]]),
            ),
            Self::CQ4_11 => {
                let i = i16::from_le_bytes([b[0], b[1]]);
                let q = i16::from_le_bytes([b[2], b[3]]);
                Complex32::new(i as f32 / 2048.0, q as f32 / 2048.0)
            }
        }
    }

    /// Convert `frames` complex samples into raw bytes in this format.
    /// Returns `false` (and writes nothing further) on an unsupported
    /// output format — the caller raises a fatal format-conversion error.
    pub fn encode(self, samples: &[Complex32], frames: usize, out: &mut [u8]) -> bool {
        if self == Self::Unknown {
            return false;
        }
        let stride = self.bytes_per_sample_pair();
        for i in 0..frames {
            let b = &mut out[i * stride..i * stride + stride];
            self.encode_one(samples[i], b);
        }
        true
    }

    fn encode_one(self, s: Complex32, b: &mut [u8]) {
        match self {
            Self::Unknown => {}
            Self::U8 => b[0] = sat_round_unsigned(s.re, 127.0, 128.0) as u8,
            Self::I8 => b[0] = sat_round_signed(s.re, 127.0) as i8 as u8,
            Self::Cu8 => {
                b[0] = sat_round_unsigned(s.re, 127.0, 128.0) as u8;
                b[1] = sat_round_unsigned(s.im, 127.0, 128.0) as u8;
            }
            Self::Ci8 => {
                b[0] = sat_round_signed(s.re, 127.0) as i8 as u8;
                b[1] = sat_round_signed(s.im, 127.0) as i8 as u8;
            }
            Self::U16 => {
                let v = sat_round_unsigned(s.re, 32767.0, 32768.0) as u16;
                b.copy_from_slice(&v.to_le_bytes());
            }
            Self::I16 => {
                let v = sat_round_signed(s.re, 32767.0) as i16;
                b.copy_from_slice(&v.to_le_bytes());
            }
            Self::Cu16 => {
                let i = sat_round_unsigned(s.re, 32767.0, 32768.0) as u16;
                let q = sat_round_unsigned(s.im, 32767.0, 32768.0) as u16;
                b[0..2].copy_from_slice(&i.to_le_bytes());
                b[2..4].copy_from_slice(&q.to_le_bytes());
            }
            Self::Ci16 => {
                let i = sat_round_signed(s.re, 32767.0) as i16;
                let q = sat_round_signed(s.im, 32767.0) as i16;
                b[0..2].copy_from_slice(&i.to_le_bytes());
                b[2..4].copy_from_slice(&q.to_le_bytes());
            }
            Self::U32 => {
                let v = sat_round_unsigned(s.re, 2147483647.0, 2147483648.0) as u32;
                b.copy_from_slice(&v.to_le_bytes());
            }
            Self::I32 => {
                let v = sat_round_signed(s.re, 2147483647.0) as i32;
                b.copy_from_slice(&v.to_le_bytes());
            }
            Self::Cu32 => {
                let i = sat_round_unsigned(s.re, 2147483647.0, 2147483648.0) as u32;
                let q = sat_round_unsigned(s.im, 2147483647.0, 2147483648.0) as u32;
                b[0..4].copy_from_slice(&i.to_le_bytes());
                b[4..8].copy_from_slice(&q.to_le_bytes());
            }
            Self::Ci32 => {
                let i = sat_round_signed(s.re, 2147483647.0) as i32;
                let q = sat_round_signed(s.im, 2147483647.0) as i32;
                b[0..4].copy_from_slice(&i.to_le_bytes());
                b[4..8].copy_from_slice(&q.to_le_bytes());
            }
            Self::F32 => b.copy_from_slice(&s.re.to_le_bytes()),
            Self::Cf32 => {
                b[0..4].copy_from_slice(&s.re.to_le_bytes());
                b[4..8].copy_from_slice(&s.im.to_le_bytes());
            }
            Self::CQ4_11 => {
                let i = sat_round_signed(s.re, 2048.0) as i16;
                let q = sat_round_signed(s.im, 2048.0) as i16;
                b[0..2].copy_from_slice(&i.to_le_bytes());
                b[2..4].copy_from_slice(&q.to_le_bytes());
            }
        }
    }
}

/// Round half-away-from-zero and saturate to `[-max, max]`.
fn sat_round_signed(value: f32, max: f32) -> f64 {
    let scaled = (value as f64 * max as f64).round();
    scaled.clamp(-(max as f64), max as f64)
}

/// Round half-away-from-zero and saturate to `[0, 2*bias - 1]`, biased for
/// unsigned midpoint formats.
fn sat_round_unsigned(value: f32, max: f32, bias: f32) -> f64 {
    let scaled = (value as f64 * max as f64 + bias as f64).round();
    scaled.clamp(0.0, bias as f64 * 2.0 - 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ci16_roundtrip_within_quantization() {
        let format = SampleFormat::Ci16;
        let raw = [0x00, 0x40, 0x00, 0xC0]; // I=0x4000, Q=-0x4000 (LE)
        let mut out = [Complex32::new(0.0, 0.0); 1];
        format.decode(&raw, 1, 1.0, &mut out);
        assert!((out[0].re - 0.5).abs() < 1e-3);
        assert!((out[0].im + 0.5).abs() < 1e-3);

        let mut bytes = [0u8; 4];
        assert!(format.encode(&out, 1, &mut bytes));
        assert_eq!(bytes, raw);
    }

    #[test]
    fn cs8_gain_clamps_to_saturation() {
        // S2: input (100, 0), gain=2.0, expect saturating round to (127, 0).
        let format = SampleFormat::Ci8;
        let raw = [100i8 as u8, 0];
        let mut complex = [Complex32::new(0.0, 0.0); 1];
        format.decode(&raw, 1, 2.0, &mut complex);
        let mut out = [0u8; 2];
        format.encode(&complex, 1, &mut out);
        assert_eq!(out[0] as i8, 127);
        assert_eq!(out[1] as i8, 0);
    }

    #[test]
    fn unsigned_formats_apply_midpoint_bias() {
        let format = SampleFormat::Cu8;
        let raw = [128u8, 64u8]; // midpoint, below midpoint
        let mut out = [Complex32::new(0.0, 0.0); 1];
        format.decode(&raw, 1, 1.0, &mut out);
        assert!((out[0].re).abs() < 1e-6);
        assert!(out[0].im < 0.0);
    }

    #[test]
    fn unknown_format_rejects_encode() {
        let format = SampleFormat::Unknown;
        let samples = [Complex32::new(0.1, 0.2)];
        let mut out = [0u8; 4];
        assert!(!format.encode(&samples, 1, &mut out));
    }

    #[test]
    fn from_tag_roundtrips_known_tags() {
        for tag in 0u8..=15 {
            let fmt = SampleFormat::from_tag(tag).unwrap();
            assert_eq!(fmt.tag(), tag);
        }
        assert!(SampleFormat::from_tag(200).is_err());
    }
}
