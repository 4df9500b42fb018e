//! Incremental STX/ETX frame decoder.
//!
//! A byte-at-a-time state machine: each incoming byte is matched against the
//! current [`Phase`] and moves the machine forward or back to [`Phase::AwaitStart`].
//! There is no lookahead and no buffering beyond the packet being assembled, so
//! chunk boundaries never matter and a stream that stops mid-packet simply leaves
//! the decoder parked until more bytes arrive.
use log::{debug, trace};

use super::{FnSink, FrameError, PacketSink, END_MARKER, MAX_CAPACITY, MIN_CAPACITY, START_MARKER};
use crate::error::{Error, Result};
use crate::logutil::hex_snippet;
use crate::metrics::DecoderStats;

/// Position within the byte sequence of one frame attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    AwaitStart,
    AwaitLength,
    AwaitPayload,
    AwaitChecksum,
    AwaitEnd,
}

impl Phase {
    pub fn name(&self) -> &'static str {
        match self {
            Phase::AwaitStart => "await_start",
            Phase::AwaitLength => "await_length",
            Phase::AwaitPayload => "await_payload",
            Phase::AwaitChecksum => "await_checksum",
            Phase::AwaitEnd => "await_end",
        }
    }
}

/// Resynchronizing frame decoder bound to one [`PacketSink`].
///
/// One instance per byte stream. The decoder is never shared internally, so
/// independent links each get their own instance (and may live on different
/// threads when `S: Send`).
#[derive(Debug)]
pub struct FrameDecoder<S> {
    phase: Phase,
    buffer: [u8; MAX_CAPACITY],
    capacity: usize,
    /// Declared length of the packet being assembled.
    expected: usize,
    /// Payload bytes stored so far; never exceeds `expected`.
    received: usize,
    running_checksum: u8,
    stats: DecoderStats,
    sink: S,
}

impl<S: PacketSink> FrameDecoder<S> {
    /// Create a decoder with the full 256-byte buffer.
    pub fn new(sink: S) -> Self {
        Self {
            phase: Phase::AwaitStart,
            buffer: [0; MAX_CAPACITY],
            capacity: MAX_CAPACITY,
            expected: 0,
            received: 0,
            running_checksum: 0,
            stats: DecoderStats::default(),
            sink,
        }
    }

    /// Create a decoder that rejects declared lengths `>= capacity`.
    pub fn with_capacity(sink: S, capacity: usize) -> Result<Self> {
        if !(MIN_CAPACITY..=MAX_CAPACITY).contains(&capacity) {
            return Err(Error::Capacity {
                requested: capacity,
                min: MIN_CAPACITY,
                max: MAX_CAPACITY,
            });
        }
        let mut decoder = Self::new(sink);
        decoder.capacity = capacity;
        Ok(decoder)
    }

    /// Feed a chunk of raw bytes. Notifications fire synchronously, in order.
    pub fn process(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            self.push_byte(byte);
        }
    }

    /// Apply the transition function to a single byte.
    pub fn push_byte(&mut self, byte: u8) {
        self.stats.bytes_processed = self.stats.bytes_processed.saturating_add(1);

        self.phase = match self.phase {
            Phase::AwaitStart => {
                if byte == START_MARKER {
                    self.clear_attempt();
                    Phase::AwaitLength
                } else {
                    self.stats.noise_bytes = self.stats.noise_bytes.saturating_add(1);
                    Phase::AwaitStart
                }
            }
            Phase::AwaitLength => {
                let declared = usize::from(byte);
                if declared > 0 && declared < self.capacity {
                    self.expected = declared;
                    Phase::AwaitPayload
                } else {
                    self.reject(FrameError::InvalidLength {
                        declared,
                        capacity: self.capacity,
                    })
                }
            }
            Phase::AwaitPayload => {
                self.buffer[self.received] = byte;
                self.running_checksum ^= byte;
                self.received += 1;
                if self.received < self.expected {
                    Phase::AwaitPayload
                } else {
                    Phase::AwaitChecksum
                }
            }
            Phase::AwaitChecksum => {
                if byte == self.running_checksum {
                    Phase::AwaitEnd
                } else {
                    self.reject(FrameError::ChecksumMismatch {
                        expected: self.running_checksum,
                        received: byte,
                    })
                }
            }
            Phase::AwaitEnd => {
                if byte == END_MARKER {
                    let payload = &self.buffer[..self.expected];
                    trace!(
                        "frame ok: {} bytes [{}]",
                        payload.len(),
                        hex_snippet(payload, 32)
                    );
                    self.stats.record_packet(payload.len());
                    self.sink.on_packet(payload);
                    self.clear_attempt();
                    Phase::AwaitStart
                } else {
                    self.reject(FrameError::BadTerminator { received: byte })
                }
            }
        };
    }

    /// Drop any partial packet and hunt for the next start marker.
    ///
    /// The sink and the statistics are left untouched.
    pub fn reset(&mut self) {
        self.clear_attempt();
        self.phase = Phase::AwaitStart;
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn stats(&self) -> DecoderStats {
        self.stats
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    fn clear_attempt(&mut self) {
        self.expected = 0;
        self.received = 0;
        self.running_checksum = 0;
    }

    fn reject(&mut self, error: FrameError) -> Phase {
        debug!("frame rejected in {}: {}", self.phase.name(), error);
        self.stats.record_error(&error);
        self.sink.on_error(error);
        self.clear_attempt();
        Phase::AwaitStart
    }
}

impl<P, E> FrameDecoder<FnSink<P, E>>
where
    P: FnMut(&[u8]),
    E: FnMut(FrameError),
{
    /// Build a decoder around a pair of closures.
    pub fn from_fns(on_packet: P, on_error: E) -> Self {
        Self::new(FnSink::new(on_packet, on_error))
    }
}

impl<S: PacketSink + Default> Default for FrameDecoder<S> {
    fn default() -> Self {
        Self::new(S::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{DecodeEvent, Recorder};

    fn recorder() -> FrameDecoder<Recorder> {
        FrameDecoder::new(Recorder::default())
    }

    #[test]
    fn starts_idle() {
        let dec = recorder();
        assert_eq!(dec.phase(), Phase::AwaitStart);
        assert_eq!(dec.capacity(), 256);
        assert_eq!(dec.stats(), DecoderStats::default());
    }

    #[test]
    fn walks_every_phase() {
        let mut dec = recorder();
        let steps = [
            (0x02, Phase::AwaitLength),
            (0x02, Phase::AwaitPayload),
            (0x01, Phase::AwaitPayload),
            (0x02, Phase::AwaitChecksum),
            (0x03, Phase::AwaitEnd),
            (0x03, Phase::AwaitStart),
        ];
        for (byte, phase) in steps {
            dec.push_byte(byte);
            assert_eq!(dec.phase(), phase, "after byte {:#04x}", byte);
        }
        assert_eq!(dec.sink().packets().count(), 1);
    }

    #[test]
    fn zero_length_is_rejected() {
        let mut dec = recorder();
        dec.process(&[0x02, 0x00]);
        assert_eq!(
            dec.sink().events(),
            &[DecodeEvent::Error {
                error: FrameError::InvalidLength {
                    declared: 0,
                    capacity: 256
                }
            }]
        );
        assert_eq!(dec.phase(), Phase::AwaitStart);
    }

    #[test]
    fn max_length_byte_accepted_at_full_capacity() {
        let mut dec = recorder();
        let payload = vec![0x5A; 255];
        let mut wire = vec![0x02, 0xFF];
        wire.extend_from_slice(&payload);
        wire.push(crate::protocol::checksum(&payload));
        wire.push(0x03);
        dec.process(&wire);
        let packets: Vec<&[u8]> = dec.sink().packets().collect();
        assert_eq!(packets, vec![payload.as_slice()]);
    }

    #[test]
    fn reduced_capacity_rejects_length_at_limit() {
        let mut dec = FrameDecoder::with_capacity(Recorder::default(), 8).unwrap();
        dec.process(&[0x02, 0x08]);
        assert_eq!(
            dec.sink().errors().collect::<Vec<_>>(),
            vec![FrameError::InvalidLength {
                declared: 8,
                capacity: 8
            }]
        );

        dec.process(&[0x02, 0x07, 1, 2, 3, 4, 5, 6, 7, 1 ^ 2 ^ 3 ^ 4 ^ 5 ^ 6 ^ 7, 0x03]);
        assert_eq!(dec.sink().packets().count(), 1);
    }

    #[test]
    fn capacity_out_of_range_is_an_error() {
        assert!(FrameDecoder::with_capacity(Recorder::default(), 1).is_err());
        assert!(FrameDecoder::with_capacity(Recorder::default(), 257).is_err());
        assert!(FrameDecoder::with_capacity(Recorder::default(), 2).is_ok());
    }

    #[test]
    fn start_marker_inside_payload_is_data() {
        let mut dec = recorder();
        // Payload contains both marker values
        dec.process(&[0x02, 0x02, 0x02, 0x03, 0x01, 0x03]);
        let packets: Vec<&[u8]> = dec.sink().packets().collect();
        assert_eq!(packets, vec![&[0x02, 0x03][..]]);
    }

    #[test]
    fn bad_terminator_reported_after_valid_checksum() {
        let mut dec = recorder();
        dec.process(&[0x02, 0x01, 0x7E, 0x7E, 0x04]);
        assert_eq!(
            dec.sink().errors().collect::<Vec<_>>(),
            vec![FrameError::BadTerminator { received: 0x04 }]
        );
        assert_eq!(dec.sink().packets().count(), 0);
        assert_eq!(dec.stats().bad_terminator, 1);
    }

    #[test]
    fn reset_discards_partial_packet() {
        let mut dec = recorder();
        dec.process(&[0x02, 0x03, 0xAA]);
        assert_eq!(dec.phase(), Phase::AwaitPayload);
        dec.reset();
        assert_eq!(dec.phase(), Phase::AwaitStart);
        // Tail of the abandoned packet is noise now
        dec.process(&[0xBB, 0xCC]);
        assert!(dec.sink().is_empty());
        assert_eq!(dec.stats().noise_bytes, 2);
    }

    #[test]
    fn stats_track_noise_and_packets() {
        let mut dec = recorder();
        dec.process(&[0xFF, 0xFF, 0x02, 0x02, 0x01, 0x02, 0x03, 0x03]);
        let stats = dec.stats();
        assert_eq!(stats.bytes_processed, 8);
        assert_eq!(stats.noise_bytes, 2);
        assert_eq!(stats.packets_ok, 1);
        assert_eq!(stats.payload_bytes_ok, 2);
        assert_eq!(stats.errors(), 0);
    }

    #[test]
    fn closure_sinks() {
        let mut lengths = Vec::new();
        let mut errors = Vec::new();
        {
            let mut dec =
                FrameDecoder::from_fns(|p: &[u8]| lengths.push(p.len()), |e: FrameError| errors.push(e));
            dec.process(&[0x02, 0x01, 0x10, 0x10, 0x03, 0x02, 0x00]);
        }
        assert_eq!(lengths, vec![1]);
        assert_eq!(errors.len(), 1);
    }
}
