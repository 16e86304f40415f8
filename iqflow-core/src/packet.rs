//! Framed packet codec used on the source-side ring buffer in buffered SDR
//! mode: a small self-synchronizing header precedes each batch of raw
//! samples so a reader that loses alignment (a partial write, a dropped
//! byte) can resynchronize without tearing down the stream.
//!
//! Layout (little-endian, 10 bytes):
//! `magic: [u8; 4]` (`b"IQPK"`), `num_samples: u32`, `flags: u8`,
//! `format_id: u8`.

use crate::errors::PacketError;
use crate::ring_buffer::RingBuffer;
use crate::sample_format::SampleFormat;

pub const MAGIC: [u8; 4] = *b"IQPK";
pub const HEADER_LEN: usize = 10;

/// Hard upper bound on `num_samples` in a single packet: twice the base
/// chunk size. Anything larger cannot have been produced honestly and is
/// treated as stream corruption rather than a big-but-legal packet.
pub const MAX_SAMPLES_PER_PACKET: u32 = 2 * 32_768;

pub mod flag {
    pub const INTERLEAVED: u8 = 0b01;
    pub const STREAM_RESET: u8 = 0b10;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketHeader {
    pub num_samples: u32,
    pub flags: u8,
    pub format: SampleFormat,
}

impl PacketHeader {
    pub fn is_reset(&self) -> bool {
        self.flags & flag::STREAM_RESET != 0
    }

    pub fn is_interleaved(&self) -> bool {
        self.flags & flag::INTERLEAVED != 0
    }

    pub fn to_bytes(self) -> [u8; HEADER_LEN] {
        let mut buf = [0u8; HEADER_LEN];
        buf[0..4].copy_from_slice(&MAGIC);
        buf[4..8].copy_from_slice(&self.num_samples.to_le_bytes());
        buf[8] = self.flags;
        buf[9] = self.format.tag();
        buf
    }

    fn from_bytes(b: &[u8; HEADER_LEN]) -> Result<Self, PacketError> {
        debug_assert_eq!(&b[0..4], &MAGIC);
        let num_samples = u32::from_le_bytes([b[4], b[5], b[6], b[7]]);
        let format = SampleFormat::from_tag(b[9])?;
        if num_samples > MAX_SAMPLES_PER_PACKET {
            return Err(PacketError::ImpossibleSize(num_samples, MAX_SAMPLES_PER_PACKET));
        }
        if num_samples > 0 && format == SampleFormat::Unknown {
            return Err(PacketError::DataPacketMissingFormat);
        }
        Ok(Self {
            num_samples,
            flags: b[8],
            format,
        })
    }
}

/// One decoded frame off the ring, or the clean end of the stream.
#[derive(Debug, Clone, PartialEq)]
pub enum PacketEvent {
    Data {
        format: SampleFormat,
        num_samples: u32,
        reset: bool,
        payload: Vec<u8>,
    },
    EndOfStream,
}

/// Writes one packet (header + payload) to `ring`. A short write on either
/// half is a producer overrun: the packet is dropped and logged, not
/// retried — the realtime source thread must never block here.
///
/// `interleaved` selects the payload's wire shape: when true, `payload` is
/// already interleaved I/Q bytes in `format`; when false, `payload` is the
/// de-interleaved shape (`num_samples` 16-bit I values followed by
/// `num_samples` 16-bit Q values) regardless of `format`.
pub fn write_packet(
    ring: &RingBuffer,
    format: SampleFormat,
    num_samples: u32,
    reset: bool,
    interleaved: bool,
    payload: &[u8],
) -> bool {
    let mut flags = 0u8;
    if interleaved {
        flags |= flag::INTERLEAVED;
    }
    if reset {
        flags |= flag::STREAM_RESET;
    }
    let header = PacketHeader {
        num_samples,
        flags,
        format,
    };
    let header_bytes = header.to_bytes();
    let written = ring.write(&header_bytes);
    if written < header_bytes.len() {
        tracing::warn!(wrote = written, want = header_bytes.len(), "packet header overrun, dropping packet");
        return false;
    }
    let written = ring.write(payload);
    if written < payload.len() {
        tracing::warn!(wrote = written, want = payload.len(), "packet payload overrun, dropping packet");
        return false;
    }
    true
}

/// Reads one packet off `ring`, resynchronizing on the magic number one
/// byte at a time if the stream has drifted out of alignment.
pub fn read_packet(ring: &RingBuffer) -> Result<PacketEvent, PacketError> {
    let mut header_buf = [0u8; HEADER_LEN];
    let mut filled = 0usize;
    loop {
        let n = ring.read(&mut header_buf[filled..]);
        if n == 0 {
            return if filled == 0 {
                Ok(PacketEvent::EndOfStream)
            } else {
                Err(PacketError::TruncatedStream)
            };
        }
        filled += n;
        if filled < HEADER_LEN {
            continue;
        }
        if header_buf[0..4] == MAGIC {
            break;
        }
        header_buf.copy_within(1.., 0);
        filled -= 1;
    }

    let header = PacketHeader::from_bytes(&header_buf)?;
    let num_samples = header.num_samples as usize;
    let wire_len = if header.is_interleaved() {
        num_samples * header.format.bytes_per_sample_pair()
    } else {
        // 16-bit I block followed by a 16-bit Q block.
        num_samples * 4
    };
    let mut wire = vec![0u8; wire_len];
    let mut got = 0;
    while got < wire_len {
        let n = ring.read(&mut wire[got..]);
        if n == 0 {
            return Err(PacketError::TruncatedStream);
        }
        got += n;
    }

    let payload = if header.is_interleaved() {
        wire
    } else {
        reinterleave(&wire, num_samples)
    };

    Ok(PacketEvent::Data {
        format: header.format,
        num_samples: header.num_samples,
        reset: header.is_reset(),
        payload,
    })
}

/// Re-interleaves a de-interleaved payload (`num_samples` 16-bit I values
/// followed by `num_samples` 16-bit Q values) into interleaved I/Q pairs.
fn reinterleave(wire: &[u8], num_samples: usize) -> Vec<u8> {
    let i_block = &wire[..num_samples * 2];
    let q_block = &wire[num_samples * 2..num_samples * 4];
    let mut out = vec![0u8; num_samples * 4];
    for i in 0..num_samples {
        out[i * 4..i * 4 + 2].copy_from_slice(&i_block[i * 2..i * 2 + 2]);
        out[i * 4 + 2..i * 4 + 4].copy_from_slice(&q_block[i * 2..i * 2 + 2]);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_single_packet() {
        let ring = RingBuffer::new(256);
        let payload = vec![1u8, 2, 3, 4, 5, 6, 7, 8];
        assert!(write_packet(&ring, SampleFormat::Ci16, 2, false, true, &payload));
        match read_packet(&ring).unwrap() {
            PacketEvent::Data {
                format,
                num_samples,
                reset,
                payload: got,
            } => {
                assert_eq!(format, SampleFormat::Ci16);
                assert_eq!(num_samples, 2);
                assert!(!reset);
                assert_eq!(got, payload);
            }
            other => panic!("expected Data, got {other:?}"),
        }
    }

    #[test]
    fn reset_flag_roundtrips() {
        let ring = RingBuffer::new(256);
        assert!(write_packet(&ring, SampleFormat::Cf32, 0, true, true, &[]));
        match read_packet(&ring).unwrap() {
            PacketEvent::Data { reset, num_samples, .. } => {
                assert!(reset);
                assert_eq!(num_samples, 0);
            }
            other => panic!("expected Data, got {other:?}"),
        }
    }

    #[test]
    fn resync_skips_leading_garbage() {
        let ring = RingBuffer::new(256);
        ring.write(b"garbage-bytes-before-frame");
        let payload = vec![9u8, 9, 9, 9];
        assert!(write_packet(&ring, SampleFormat::Ci16, 1, false, true, &payload));
        match read_packet(&ring).unwrap() {
            PacketEvent::Data { payload: got, .. } => assert_eq!(got, payload),
            other => panic!("expected Data, got {other:?}"),
        }
    }

    #[test]
    fn clean_end_of_stream_between_packets() {
        let ring = RingBuffer::new(64);
        ring.signal_end_of_stream();
        assert_eq!(read_packet(&ring).unwrap(), PacketEvent::EndOfStream);
    }

    #[test]
    fn deinterleaved_payload_is_reinterleaved_on_read() {
        let ring = RingBuffer::new(256);
        // 3 samples, I-block then Q-block, 16-bit each.
        let i_block: [u8; 6] = [1, 0, 2, 0, 3, 0];
        let q_block: [u8; 6] = [10, 0, 20, 0, 30, 0];
        let mut wire = Vec::new();
        wire.extend_from_slice(&i_block);
        wire.extend_from_slice(&q_block);
        assert!(write_packet(&ring, SampleFormat::Ci16, 3, false, false, &wire));
        match read_packet(&ring).unwrap() {
            PacketEvent::Data {
                format,
                num_samples,
                reset,
                payload,
            } => {
                assert_eq!(format, SampleFormat::Ci16);
                assert_eq!(num_samples, 3);
                assert!(!reset);
                assert_eq!(
                    payload,
                    vec![1, 0, 10, 0, 2, 0, 20, 0, 3, 0, 30, 0],
                    "I/Q blocks must be re-interleaved into pairs"
                );
            }
            other => panic!("expected Data, got {other:?}"),
        }
    }

    #[test]
    fn truncated_header_is_fatal() {
        let ring = RingBuffer::new(64);
        ring.write(&MAGIC);
        ring.signal_end_of_stream();
        assert_eq!(read_packet(&ring), Err(PacketError::TruncatedStream));
    }

    #[test]
    fn truncated_payload_is_fatal() {
        let ring = RingBuffer::new(64);
        let header = PacketHeader {
            num_samples: 4,
            flags: flag::INTERLEAVED,
            format: SampleFormat::Ci16,
        };
        ring.write(&header.to_bytes());
        ring.write(&[0u8; 3]); // short of the 16 bytes a 4-sample ci16 payload needs
        ring.signal_end_of_stream();
        assert_eq!(read_packet(&ring), Err(PacketError::TruncatedStream));
    }

    #[test]
    fn impossible_size_is_rejected() {
        let ring = RingBuffer::new(64);
        let header = PacketHeader {
            num_samples: MAX_SAMPLES_PER_PACKET + 1,
            flags: flag::INTERLEAVED,
            format: SampleFormat::Ci16,
        };
        ring.write(&header.to_bytes());
        assert!(matches!(read_packet(&ring), Err(PacketError::ImpossibleSize(_, _))));
    }

    #[test]
    fn data_packet_missing_format_is_rejected() {
        let ring = RingBuffer::new(64);
        let header = PacketHeader {
            num_samples: 4,
            flags: flag::INTERLEAVED,
            format: SampleFormat::Unknown,
        };
        ring.write(&header.to_bytes());
        assert_eq!(read_packet(&ring), Err(PacketError::DataPacketMissingFormat));
    }
}
