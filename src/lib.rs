//! # stxframe - STX/ETX Frame Decoder for Byte-Stream Links
//!
//! stxframe recovers packets from noisy point-to-point byte streams such as an
//! embedded UART. Each packet travels as a start marker, a one-byte length, the
//! payload, an XOR checksum and an end marker; the decoder validates all of them
//! and resynchronizes on its own after noise or corruption.
//!
//! ## Features
//!
//! - **Incremental Decoding**: Feed chunks of any size; packets may span calls.
//! - **Self-Resynchronizing**: Noise is skipped, malformed attempts are reported once and dropped.
//! - **Typed Notifications**: Packets and violation kinds go to a [`protocol::PacketSink`].
//! - **Independent Instances**: No global state; one decoder per stream.
//! - **Serial Driver**: Optional UART polling via `serialport` (feature `serial`).
//!
//! ## Quick Start
//!
//! ```rust
//! use stxframe::protocol::{FrameDecoder, Recorder};
//!
//! let mut decoder = FrameDecoder::new(Recorder::default());
//! decoder.process(&[0x02, 0x04, 0x0A, 0x0B]);
//! decoder.process(&[0x0C, 0x0D, 0x00, 0x03]);
//!
//! let packets: Vec<&[u8]> = decoder.sink().packets().collect();
//! assert_eq!(packets, vec![&[0x0A, 0x0B, 0x0C, 0x0D][..]]);
//! ```
//!
//! ## Module Organization
//!
//! - [`protocol`] - Frame decoder state machine, encoder, sinks
//! - [`link`] - Drivers that pump bytes from readers and serial ports into a decoder
//! - [`config`] - Configuration management and validation
//! - [`metrics`] - Per-decoder statistics
//! - [`logutil`] - Hex helpers for logs and the command line
//! - [`error`] - Library error type

pub mod config;
pub mod error;
pub mod link;
pub mod logutil;
pub mod metrics;
pub mod protocol;

pub use error::{Error, Result};
pub use protocol::{FrameDecoder, FrameError, PacketSink};
