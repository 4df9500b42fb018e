//! # STX/ETX Frame Protocol
//!
//! Point-to-point byte-stream links (UART, USB CDC, pipes) carry packets as:
//!
//! ```text
//! [STX 0x02] [LEN 1..CAP-1] [PAYLOAD (LEN bytes)] [CHK] [ETX 0x03]
//! ```
//!
//! where `CHK` is the XOR of every payload byte and `CAP` is the decoder's buffer
//! capacity (256 unless configured lower).
//!
//! ## Components
//!
//! - [`FrameDecoder`]: incremental, resynchronizing state machine. Feed it chunks of
//!   any size; it reports completed packets and framing violations to a [`PacketSink`].
//! - [`encode_frame`]: sender side, wraps a payload in markers, length and checksum.
//! - [`Recorder`] / [`FnSink`]: ready-made sinks for collecting events or adapting closures.
//!
//! ## Example
//!
//! ```rust
//! use stxframe::protocol::{encode_frame, FrameDecoder, Recorder};
//!
//! let mut decoder = FrameDecoder::new(Recorder::default());
//! let wire = encode_frame(b"hello").unwrap();
//!
//! // Noise before the start marker is skipped silently
//! decoder.process(&[0xFF, 0x00]);
//! decoder.process(&wire);
//!
//! let packets: Vec<&[u8]> = decoder.sink().packets().collect();
//! assert_eq!(packets, vec![&b"hello"[..]]);
//! ```

use serde::Serialize;
use thiserror::Error;

mod decoder;
mod encoder;

pub use decoder::{FrameDecoder, Phase};
pub use encoder::{encode_frame, encode_frame_with_capacity};

/// Start-of-text marker opening every frame.
pub const START_MARKER: u8 = 0x02;
/// End-of-text marker closing every frame.
pub const END_MARKER: u8 = 0x03;
/// Largest supported payload buffer. The declared length must stay strictly below it.
pub const MAX_CAPACITY: usize = 256;
/// Smallest capacity that still admits a one-byte payload.
pub const MIN_CAPACITY: usize = 2;

/// A framing violation detected while decoding.
///
/// Each violation discards the current packet attempt; the decoder resumes
/// hunting for the next start marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FrameError {
    /// Declared length was zero or not below the buffer capacity.
    #[error("invalid length {declared} (capacity {capacity})")]
    InvalidLength { declared: usize, capacity: usize },

    /// XOR of the received payload differs from the checksum byte.
    #[error("checksum mismatch: computed {expected:#04x}, received {received:#04x}")]
    ChecksumMismatch { expected: u8, received: u8 },

    /// Byte after a valid checksum was not the end marker.
    #[error("bad terminator {received:#04x}, expected 0x03")]
    BadTerminator { received: u8 },
}

/// Notification target for decoded packets and framing violations.
///
/// Calls happen synchronously from inside [`FrameDecoder::process`], in stream
/// order. The payload slice borrows the decoder's buffer and is only valid for
/// the duration of the call; copy it to keep it.
pub trait PacketSink {
    /// A complete packet passed length, checksum and terminator checks.
    fn on_packet(&mut self, payload: &[u8]);

    /// A packet attempt was rejected.
    fn on_error(&mut self, error: FrameError);
}

impl<S: PacketSink + ?Sized> PacketSink for &mut S {
    fn on_packet(&mut self, payload: &[u8]) {
        (**self).on_packet(payload)
    }

    fn on_error(&mut self, error: FrameError) {
        (**self).on_error(error)
    }
}

impl<S: PacketSink + ?Sized> PacketSink for Box<S> {
    fn on_packet(&mut self, payload: &[u8]) {
        (**self).on_packet(payload)
    }

    fn on_error(&mut self, error: FrameError) {
        (**self).on_error(error)
    }
}

/// Adapts a pair of closures to [`PacketSink`].
pub struct FnSink<P, E> {
    on_packet: P,
    on_error: E,
}

impl<P, E> FnSink<P, E>
where
    P: FnMut(&[u8]),
    E: FnMut(FrameError),
{
    pub fn new(on_packet: P, on_error: E) -> Self {
        Self {
            on_packet,
            on_error,
        }
    }
}

impl<P, E> PacketSink for FnSink<P, E>
where
    P: FnMut(&[u8]),
    E: FnMut(FrameError),
{
    fn on_packet(&mut self, payload: &[u8]) {
        (self.on_packet)(payload)
    }

    fn on_error(&mut self, error: FrameError) {
        (self.on_error)(error)
    }
}

/// One notification observed by a [`Recorder`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum DecodeEvent {
    Packet { payload: Vec<u8> },
    Error { error: FrameError },
}

/// Sink that copies every notification, in order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Recorder {
    events: Vec<DecodeEvent>,
}

impl Recorder {
    pub fn events(&self) -> &[DecodeEvent] {
        &self.events
    }

    /// Payloads of successfully decoded packets, in arrival order.
    pub fn packets(&self) -> impl Iterator<Item = &[u8]> {
        self.events.iter().filter_map(|ev| match ev {
            DecodeEvent::Packet { payload } => Some(payload.as_slice()),
            DecodeEvent::Error { .. } => None,
        })
    }

    /// Violations, in arrival order.
    pub fn errors(&self) -> impl Iterator<Item = FrameError> + '_ {
        self.events.iter().filter_map(|ev| match ev {
            DecodeEvent::Error { error } => Some(*error),
            DecodeEvent::Packet { .. } => None,
        })
    }

    /// Drain recorded events, leaving the recorder empty.
    pub fn take(&mut self) -> Vec<DecodeEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

impl PacketSink for Recorder {
    fn on_packet(&mut self, payload: &[u8]) {
        self.events.push(DecodeEvent::Packet {
            payload: payload.to_vec(),
        });
    }

    fn on_error(&mut self, error: FrameError) {
        self.events.push(DecodeEvent::Error { error });
    }
}

/// XOR fold of `payload`, the frame checksum.
pub fn checksum(payload: &[u8]) -> u8 {
    payload.iter().fold(0, |acc, b| acc ^ b)
}
