//! ULID-shaped identifiers for violation records.
//!
//! No crate in the dependency stack already provides ULIDs, so this hand-
//! rolls the usual shape (48-bit millisecond timestamp + 80 bits of
//! randomness, Crockford base32) the same way the crate hand-rolls hex
//! encoding for trace/span ids in [`crate::hex_id`], rather than pull in an
//! ungrounded dependency for it.

use rand::RngCore;

const CROCKFORD: &[u8; 32] = b"0123456789ABCDEFGHJKMNPQRSTVWXYZ";

/// Generate a new ULID-style identifier from a millisecond timestamp and a
/// source of randomness. Callers supply the timestamp so identifier
/// generation stays deterministic and testable.
pub fn generate(timestamp_millis: u64, rng: &mut impl RngCore) -> String {
    let mut randomness = [0u8; 10];
    rng.fill_bytes(&mut randomness);
    encode(timestamp_millis, &randomness)
}

/// Generate a new identifier using the thread-local RNG and the current
/// wall clock. Not used inside the evaluator (which must stay deterministic
/// given fixed inputs), only at the points where a violation is first
/// minted from a live firing.
pub fn new_id() -> String {
    let millis = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64;
    let mut rng = rand::thread_rng();
    generate(millis, &mut rng)
}

fn encode(timestamp_millis: u64, randomness: &[u8; 10]) -> String {
    let mut bytes = [0u8; 16];
    bytes[0] = (timestamp_millis >> 40) as u8;
    bytes[1] = (timestamp_millis >> 32) as u8;
    bytes[2] = (timestamp_millis >> 24) as u8;
    bytes[3] = (timestamp_millis >> 16) as u8;
    bytes[4] = (timestamp_millis >> 8) as u8;
    bytes[5] = timestamp_millis as u8;
    bytes[6..16].copy_from_slice(randomness);

    let mut out = String::with_capacity(26);
    let mut acc: u32 = 0;
    let mut bits: u32 = 0;
    for byte in bytes {
        acc = (acc << 8) | byte as u32;
        bits += 8;
        while bits >= 5 {
            bits -= 5;
            let idx = ((acc >> bits) & 0x1f) as usize;
            out.push(CROCKFORD[idx] as char);
        }
    }
    if bits > 0 {
        let idx = ((acc << (5 - bits)) & 0x1f) as usize;
        out.push(CROCKFORD[idx] as char);
    }
    out
}
