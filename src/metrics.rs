//! Per-decoder statistics.
//! Counters live inside each [`crate::protocol::FrameDecoder`] so independent
//! streams never share state; read them through `FrameDecoder::stats()`.
use serde::Serialize;

use crate::protocol::FrameError;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DecoderStats {
    /// Every byte handed to the decoder.
    pub bytes_processed: u64,
    /// Bytes discarded while hunting for a start marker.
    pub noise_bytes: u64,
    pub packets_ok: u64,
    pub payload_bytes_ok: u64,
    pub invalid_length: u64,
    pub checksum_mismatch: u64,
    pub bad_terminator: u64,
}

impl DecoderStats {
    pub(crate) fn record_packet(&mut self, len: usize) {
        self.packets_ok = self.packets_ok.saturating_add(1);
        self.payload_bytes_ok = self.payload_bytes_ok.saturating_add(len as u64);
    }

    pub(crate) fn record_error(&mut self, error: &FrameError) {
        let counter = match error {
            FrameError::InvalidLength { .. } => &mut self.invalid_length,
            FrameError::ChecksumMismatch { .. } => &mut self.checksum_mismatch,
            FrameError::BadTerminator { .. } => &mut self.bad_terminator,
        };
        *counter = counter.saturating_add(1);
    }

    /// Total framing violations of any kind.
    pub fn errors(&self) -> u64 {
        self.invalid_length
            .saturating_add(self.checksum_mismatch)
            .saturating_add(self.bad_terminator)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_counters_split_by_kind() {
        let mut stats = DecoderStats::default();
        stats.record_error(&FrameError::InvalidLength {
            declared: 0,
            capacity: 256,
        });
        stats.record_error(&FrameError::BadTerminator { received: 0x00 });
        stats.record_error(&FrameError::BadTerminator { received: 0x01 });

        assert_eq!(stats.invalid_length, 1);
        assert_eq!(stats.checksum_mismatch, 0);
        assert_eq!(stats.bad_terminator, 2);
        assert_eq!(stats.errors(), 3);
    }

    #[test]
    fn packet_counters_accumulate() {
        let mut stats = DecoderStats::default();
        stats.record_packet(4);
        stats.record_packet(2);
        assert_eq!(stats.packets_ok, 2);
        assert_eq!(stats.payload_bytes_ok, 6);
    }

    #[test]
    fn error_total_saturates() {
        let stats = DecoderStats {
            invalid_length: u64::MAX,
            checksum_mismatch: 5,
            bad_terminator: 1,
            ..DecoderStats::default()
        };
        assert_eq!(stats.errors(), u64::MAX);
    }
}
