//! Proof-of-work puzzle engine
//!
//! Pure computation over a block header: no I/O, no clocks, no locks.
//! A proof is valid iff SHA-256 of the header preimage with the nonce,
//! read as a big-endian integer, is strictly below `2^(256 - target_bits)`.

use crate::error::{PowError, Result};
use crate::utils::hashing::{meets_target, seal_with_nonce, serialize_pow_prefix};
use primitive_types::{H256, U256};
use sha2::{Digest, Sha256};
use shared_types::CompactBlock;

/// Smallest accepted difficulty (target = 2^255)
pub const MIN_TARGET_BITS: u32 = 1;

/// Largest accepted difficulty (target = 2)
pub const MAX_TARGET_BITS: u32 = 255;

/// Puzzle parameters for one difficulty
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProofOfWork {
    target: U256,
    target_bits: u32,
}

impl ProofOfWork {
    /// Build the puzzle for `target_bits`.
    pub fn new(target_bits: u32) -> Result<Self> {
        if !(MIN_TARGET_BITS..=MAX_TARGET_BITS).contains(&target_bits) {
            return Err(PowError::InvalidTargetBits { bits: target_bits });
        }

        Ok(Self {
            target: U256::from(2).pow(U256::from(256 - target_bits)),
            target_bits,
        })
    }

    /// Exclusive upper bound for a valid hash
    pub fn target(&self) -> U256 {
        self.target
    }

    /// Difficulty in bits
    pub fn target_bits(&self) -> u32 {
        self.target_bits
    }

    /// Search nonces from zero until the hash is below target.
    ///
    /// Blocking and CPU-bound. The block's transaction root must be set.
    pub fn run(&self, block: &CompactBlock) -> Result<(u64, H256)> {
        let height = block.height();
        let root = block
            .header
            .txn_root
            .ok_or(PowError::MissingTxnRoot { height })?;

        let prefix = Sha256::new_with_prefix(serialize_pow_prefix(
            &block.header,
            &root,
            self.target_bits,
        ));

        for nonce in 0..=u64::MAX {
            let hash = seal_with_nonce(&prefix, nonce);
            if meets_target(&hash, self.target) {
                return Ok((nonce, hash));
            }
        }

        Err(PowError::NonceSpaceExhausted { height })
    }

    /// Recompute the hash from the stored header and nonce.
    ///
    /// True iff it equals the declared hash and is below target. Never
    /// errors; a block without a transaction root is simply invalid.
    pub fn validate(&self, block: &CompactBlock) -> bool {
        let Some(root) = block.header.txn_root else {
            return false;
        };

        let prefix = Sha256::new_with_prefix(serialize_pow_prefix(
            &block.header,
            &root,
            self.target_bits,
        ));
        let hash = seal_with_nonce(&prefix, block.header.nonce);

        hash == block.header.hash && meets_target(&hash, self.target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn candidate(height: u64) -> CompactBlock {
        let mut block = CompactBlock::genesis(1);
        block.header.height = height;
        block.header.prev_hash = H256::repeat_byte(0x11);
        block.header.timestamp = 1_700_000_000_000;
        block.header.txn_root = Some(H256::zero());
        block
    }

    fn seal(pow: &ProofOfWork, block: &mut CompactBlock) {
        let (nonce, hash) = pow.run(block).unwrap();
        block.header.nonce = nonce;
        block.header.hash = hash;
    }

    #[test]
    fn test_target_from_bits() {
        let pow = ProofOfWork::new(16).unwrap();
        assert_eq!(pow.target(), U256::from(2).pow(U256::from(240)));
        assert_eq!(ProofOfWork::new(255).unwrap().target(), U256::from(2));
    }

    #[test]
    fn test_rejects_out_of_range_bits() {
        assert!(matches!(
            ProofOfWork::new(0),
            Err(PowError::InvalidTargetBits { bits: 0 })
        ));
        assert!(ProofOfWork::new(256).is_err());
    }

    #[test]
    fn test_run_requires_txn_root() {
        let pow = ProofOfWork::new(8).unwrap();
        let mut block = candidate(10);
        block.header.txn_root = None;

        assert!(matches!(
            pow.run(&block),
            Err(PowError::MissingTxnRoot { height: 10 })
        ));
    }

    #[test]
    fn test_validate_without_root_is_false() {
        let pow = ProofOfWork::new(8).unwrap();
        let mut block = candidate(10);
        seal(&pow, &mut block);
        block.header.txn_root = None;

        assert!(!pow.validate(&block));
    }

    #[test]
    fn test_forged_hash_rejected() {
        let pow = ProofOfWork::new(8).unwrap();
        let mut block = candidate(10);
        seal(&pow, &mut block);

        // Valid nonce, but a different (still tiny) declared hash
        block.header.hash = H256::zero();
        assert!(!pow.validate(&block));
    }

    #[test]
    fn test_harder_puzzle_rejects_easier_proof() {
        let easy = ProofOfWork::new(1).unwrap();
        let hard = ProofOfWork::new(24).unwrap();
        let mut block = candidate(3);
        seal(&easy, &mut block);

        // Different bits change the preimage, so the proof never transfers
        assert!(!hard.validate(&block));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn prop_run_then_validate(
            bits in 1u32..=10,
            height in any::<u64>(),
            timestamp in any::<u64>(),
            root in any::<[u8; 32]>(),
        ) {
            let pow = ProofOfWork::new(bits).unwrap();
            let mut block = candidate(height);
            block.header.timestamp = timestamp;
            block.header.txn_root = Some(H256::from(root));

            seal(&pow, &mut block);

            prop_assert!(U256::from_big_endian(block.header.hash.as_bytes()) < pow.target());
            prop_assert!(pow.validate(&block));
        }

        #[test]
        fn prop_tampered_height_invalidates(bits in 1u32..=8, height in 0u64..u64::MAX) {
            let pow = ProofOfWork::new(bits).unwrap();
            let mut block = candidate(height);
            seal(&pow, &mut block);

            block.header.height = height + 1;
            prop_assert!(!pow.validate(&block));
        }
    }
}
