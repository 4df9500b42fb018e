//! Frame encoder (sender side).

use super::{checksum, FrameError, END_MARKER, MAX_CAPACITY, START_MARKER};

/// Wrap `payload` as `[STX][LEN][PAYLOAD][CHK][ETX]` for a full-capacity receiver.
pub fn encode_frame(payload: &[u8]) -> Result<Vec<u8>, FrameError> {
    encode_frame_with_capacity(payload, MAX_CAPACITY)
}

/// Like [`encode_frame`], but for a receiver configured with a smaller buffer.
///
/// Fails with [`FrameError::InvalidLength`] when the payload is empty or would be
/// rejected by that receiver.
pub fn encode_frame_with_capacity(payload: &[u8], capacity: usize) -> Result<Vec<u8>, FrameError> {
    let capacity = capacity.min(MAX_CAPACITY);
    if payload.is_empty() || payload.len() >= capacity {
        return Err(FrameError::InvalidLength {
            declared: payload.len(),
            capacity,
        });
    }

    let mut out = Vec::with_capacity(payload.len() + 4);
    out.push(START_MARKER);
    out.push(payload.len() as u8);
    out.extend_from_slice(payload);
    out.push(checksum(payload));
    out.push(END_MARKER);
    Ok(out)
}
