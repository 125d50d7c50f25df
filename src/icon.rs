//! Best-effort icon payload decoding
//!
//! Icon payloads arrive as strings produced by several generations of the
//! companion platform shim: standard base64, unpadded base64, plain hex, or
//! a legacy latin-1 byte string. Decoding tries each strategy in a fixed
//! order; the first success wins. Total failure yields a placeholder so
//! mirror synthesis never stalls on a bad icon.

use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD};
use base64::Engine;

/// 1x1 transparent PNG, used when no usable icon payload exists.
pub const PLACEHOLDER_ICON: &str =
    "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNkYPhfDwAChwGA60e6kgAAAABJRU5ErkJggg==";

/// One decode attempt in the fallback chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeStrategy {
    /// RFC 4648 base64 with padding
    StandardBase64,
    /// base64 emitted without trailing padding
    UnpaddedBase64,
    /// hex pairs, optionally `0x`-prefixed or `:`/space separated
    Hex,
    /// legacy latin-1 byte string (always succeeds on non-empty input)
    RawBytes,
}

/// Strategies in the order they are attempted.
pub const DECODE_ORDER: [DecodeStrategy; 4] = [
    DecodeStrategy::StandardBase64,
    DecodeStrategy::UnpaddedBase64,
    DecodeStrategy::Hex,
    DecodeStrategy::RawBytes,
];

impl DecodeStrategy {
    /// Attempt to decode the payload with this strategy.
    pub fn decode(&self, payload: &str) -> Option<Vec<u8>> {
        match self {
            DecodeStrategy::StandardBase64 => STANDARD.decode(payload.trim()).ok(),
            DecodeStrategy::UnpaddedBase64 => STANDARD_NO_PAD.decode(payload.trim()).ok(),
            DecodeStrategy::Hex => decode_hex(payload.trim()),
            DecodeStrategy::RawBytes => {
                if payload.is_empty() {
                    None
                } else {
                    Some(payload.chars().map(|c| c as u32 as u8).collect())
                }
            }
        }
    }
}

fn decode_hex(s: &str) -> Option<Vec<u8>> {
    let s = s.strip_prefix("0x").unwrap_or(s);
    let digits: Vec<char> = s.chars().filter(|c| !matches!(c, ':' | ' ')).collect();
    if digits.is_empty() || digits.len() % 2 != 0 {
        return None;
    }
    let mut bytes = Vec::with_capacity(digits.len() / 2);
    for pair in digits.chunks(2) {
        let hi = pair[0].to_digit(16)?;
        let lo = pair[1].to_digit(16)?;
        bytes.push((hi * 16 + lo) as u8);
    }
    Some(bytes)
}

/// Decode an icon payload, trying each strategy in order.
pub fn decode_icon(payload: &str) -> Option<Vec<u8>> {
    DECODE_ORDER.iter().find_map(|s| s.decode(payload))
}

/// Decode and re-encode as standard base64; placeholder on missing/empty input.
pub fn normalize_icon(payload: Option<&str>) -> String {
    payload
        .and_then(decode_icon)
        .map(|bytes| STANDARD.encode(bytes))
        .unwrap_or_else(|| PLACEHOLDER_ICON.to_string())
}
