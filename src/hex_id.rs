//! Hex encoding helpers for fixed-width trace and span identifiers.
//!
//! Trace ids are 128-bit (OTLP-compatible); span ids are 64-bit. The
//! encode/decode pair mirrors the W3C trace-context hex helpers this crate
//! used to carry, generalized to both widths.

pub fn encode_16(bytes: &[u8; 16]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

pub fn encode_8(bytes: &[u8; 8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

pub fn decode_16(hex: &str) -> Option<[u8; 16]> {
    decode_fixed(hex)
}

pub fn decode_8(hex: &str) -> Option<[u8; 8]> {
    decode_fixed(hex)
}

fn decode_fixed<const N: usize>(hex: &str) -> Option<[u8; N]> {
    if hex.len() != N * 2 {
        return None;
    }
    let mut bytes = [0u8; N];
    for (i, chunk) in hex.as_bytes().chunks(2).enumerate() {
        let hex_str = std::str::from_utf8(chunk).ok()?;
        bytes[i] = u8::from_str_radix(hex_str, 16).ok()?;
    }
    Some(bytes)
}
