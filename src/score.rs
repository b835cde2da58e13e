//! Candidate scoring: leading zero bits of a double SHA-256.

use sha2::{Digest, Sha256};

/// Highest score a candidate can reach (digest length in bits).
pub const MAX_SCORE: u32 = 256;

/// `SHA256(SHA256(payload || be32(candidate)))`.
///
/// The candidate is appended big-endian; workers and the coordinator must
/// agree on this byte layout for reported hashes to line up.
pub fn double_hash(payload: &[u8], candidate: u32) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(payload);
    hasher.update(candidate.to_be_bytes());
    let first = hasher.finalize();
    let second = Sha256::digest(first);
    let mut out = [0u8; 32];
    out.copy_from_slice(&second);
    out
}

/// Consecutive zero bits from the most significant bit of `bytes[0]`.
pub fn leading_zero_bits(bytes: &[u8]) -> u32 {
    let mut zeros = 0;
    for &b in bytes {
        if b != 0 {
            return zeros + b.leading_zeros();
        }
        zeros += 8;
    }
    zeros
}

pub fn score(payload: &[u8], candidate: u32) -> u32 {
    leading_zero_bits(&double_hash(payload, candidate))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leading_zero_bits_counts_from_msb() {
        assert_eq!(leading_zero_bits(&[0x80]), 0);
        assert_eq!(leading_zero_bits(&[0x01]), 7);
        assert_eq!(leading_zero_bits(&[0x00, 0x40, 0xff]), 9);
        assert_eq!(leading_zero_bits(&[0x00, 0x00]), 16);
        assert_eq!(leading_zero_bits(&[0u8; 32]), MAX_SCORE);
        assert_eq!(leading_zero_bits(&[]), 0);
    }

    #[test]
    fn score_is_deterministic() {
        for candidate in [0u32, 1, 330, u32::MAX] {
            let a = score(b"COMSM0010cloud", candidate);
            let b = score(b"COMSM0010cloud", candidate);
            assert_eq!(a, b);
        }
    }

    #[test]
    fn known_scores() {
        assert_eq!(
            hex::encode(double_hash(b"COMSM0010cloud", 0)),
            "09d4de769266f3131783265c9f0068f8f497a96d20a9d86af9bcd25e9128e1ec"
        );
        assert_eq!(score(b"COMSM0010cloud", 0), 4);
        assert_eq!(score(b"COMSM0010cloud", 1), 0);
        assert_eq!(score(b"COMSM0010cloud", 694), 11);
    }

    #[test]
    fn candidate_is_big_endian() {
        let mut joined = b"COMSM0010cloud".to_vec();
        joined.extend_from_slice(&[0, 0, 1, 74]);
        let first = Sha256::digest(&joined);
        let second = Sha256::digest(first);
        assert_eq!(double_hash(b"COMSM0010cloud", 330).as_slice(), second.as_slice());
    }
}
