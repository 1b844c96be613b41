//! Hashing utilities for proof-of-work
//!
//! The puzzle hashes a fixed header prefix once and appends the nonce per
//! attempt, so the prefix layout here is the canonical preimage.

use primitive_types::{H256, U256};
use sha2::{Digest, Sha256};
use shared_types::Header;

/// Compute SHA-256 hash of data
#[inline]
pub fn sha256(data: &[u8]) -> H256 {
    H256::from_slice(&Sha256::digest(data))
}

/// Interpret a hash as a big-endian 256-bit integer
#[inline]
pub fn h256_to_u256(hash: &H256) -> U256 {
    U256::from_big_endian(hash.as_bytes())
}

/// Check if hash meets difficulty target
///
/// Returns true iff hash < target (strict)
#[inline]
pub fn meets_target(hash: &H256, target: U256) -> bool {
    h256_to_u256(hash) < target
}

/// Serialize the nonce-independent part of the PoW preimage
///
/// Layout: prev_hash ‖ height ‖ chain_id ‖ txn_root ‖ timestamp ‖ target_bits,
/// integers big-endian.
pub fn serialize_pow_prefix(header: &Header, txn_root: &H256, target_bits: u32) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(32 + 8 + 8 + 32 + 8 + 4);

    bytes.extend_from_slice(header.prev_hash.as_bytes());
    bytes.extend_from_slice(&header.height.to_be_bytes());
    bytes.extend_from_slice(&header.chain_id.to_be_bytes());
    bytes.extend_from_slice(txn_root.as_bytes());
    bytes.extend_from_slice(&header.timestamp.to_be_bytes());
    bytes.extend_from_slice(&target_bits.to_be_bytes());

    bytes
}

/// Finish a prefix hasher with `nonce`
#[inline]
pub fn seal_with_nonce(prefix: &Sha256, nonce: u64) -> H256 {
    let mut hasher = prefix.clone();
    hasher.update(nonce.to_be_bytes());
    H256::from_slice(&hasher.finalize())
}

/// Short hex form for log lines
pub fn short_hex(hash: &H256) -> String {
    hex::encode(&hash.as_bytes()[..6])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_known_vector() {
        let hash = sha256(b"abc");
        assert_eq!(
            hex::encode(hash.as_bytes()),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_meets_target_is_strict() {
        let target = U256::from(0x100);
        let mut below = H256::zero();
        below.0[31] = 0xFF;
        let mut equal = H256::zero();
        equal.0[30] = 0x01;

        assert!(meets_target(&below, target));
        assert!(!meets_target(&equal, target));
    }

    #[test]
    fn test_seal_matches_one_shot_hash() {
        let header = Header {
            height: 42,
            timestamp: 1_700_000_000_000,
            ..Header::default()
        };
        let root = H256::repeat_byte(7);
        let mut preimage = serialize_pow_prefix(&header, &root, 16);
        let prefix = Sha256::new_with_prefix(&preimage);
        preimage.extend_from_slice(&9u64.to_be_bytes());

        assert_eq!(seal_with_nonce(&prefix, 9), sha256(&preimage));
    }

    #[test]
    fn test_prefix_covers_linkage() {
        let root = H256::zero();
        let a = Header::default();
        let b = Header {
            prev_hash: H256::repeat_byte(1),
            ..Header::default()
        };
        assert_ne!(
            serialize_pow_prefix(&a, &root, 16),
            serialize_pow_prefix(&b, &root, 16)
        );
    }
}
