//! Hex helpers for logging raw link traffic and for reading byte captures typed
//! on the command line.

use crate::error::{Error, Result};

/// Render up to `max` bytes as space-separated lowercase hex for single-line logs.
/// Longer inputs end with an ellipsis so noisy links cannot flood the log.
pub fn hex_snippet(data: &[u8], max: usize) -> String {
    use std::fmt::Write;
    let shown = data.len().min(max);
    let mut out = String::with_capacity(shown * 3 + 3);
    for (i, b) in data.iter().take(shown).enumerate() {
        if i > 0 {
            out.push(' ');
        }
        let _ = write!(&mut out, "{:02x}", b);
    }
    if data.len() > shown {
        out.push_str(" …");
    }
    out
}

/// Parse loosely formatted hex into bytes.
///
/// Accepts `02 04 0a`, `02040a`, `0x02,0x04,0x0A` and `02:04:0a`. Separators are
/// whitespace, commas, colons and dashes; each byte may carry a `0x` prefix.
pub fn parse_hex(text: &str) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    let mut pending: Option<u8> = None;
    let bytes = text.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        let c = bytes[i];
        match c {
            b' ' | b'\t' | b'\n' | b'\r' | b',' | b':' | b'-' => {
                if pending.is_some() {
                    return Err(Error::Hex {
                        offset: i,
                        reason: "odd number of hex digits",
                    });
                }
            }
            b'0' if pending.is_none() && matches!(bytes.get(i + 1), Some(b'x') | Some(b'X')) => {
                i += 1;
            }
            _ => {
                let nibble = match c {
                    b'0'..=b'9' => c - b'0',
                    b'a'..=b'f' => c - b'a' + 10,
                    b'A'..=b'F' => c - b'A' + 10,
                    _ => {
                        return Err(Error::Hex {
                            offset: i,
                            reason: "not a hex digit",
                        })
                    }
                };
                pending = match pending.take() {
                    Some(hi) => {
                        out.push((hi << 4) | nibble);
                        None
                    }
                    None => Some(nibble),
                };
            }
        }
        i += 1;
    }
    if pending.is_some() {
        return Err(Error::Hex {
            offset: bytes.len(),
            reason: "odd number of hex digits",
        });
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snippet_truncates_with_ellipsis() {
        assert_eq!(hex_snippet(&[0x02, 0x0a, 0xff], 8), "02 0a ff");
        assert_eq!(hex_snippet(&[0x02, 0x0a, 0xff], 2), "02 0a …");
        assert_eq!(hex_snippet(&[], 4), "");
    }

    #[test]
    fn parses_common_capture_formats() {
        let expected = vec![0x02, 0x04, 0x0A];
        assert_eq!(parse_hex("02 04 0a").unwrap(), expected);
        assert_eq!(parse_hex("02040A").unwrap(), expected);
        assert_eq!(parse_hex("0x02,0x04,0x0a").unwrap(), expected);
        assert_eq!(parse_hex("02:04:0a\n").unwrap(), expected);
        assert!(parse_hex("").unwrap().is_empty());
    }

    #[test]
    fn rejects_bad_digits_and_odd_length() {
        assert!(matches!(parse_hex("0g"), Err(Error::Hex { offset: 1, .. })));
        assert!(matches!(parse_hex("020"), Err(Error::Hex { offset: 3, .. })));
        assert!(parse_hex("0 2").is_err());
    }
}
