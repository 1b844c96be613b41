//! # Core Domain Entities
//!
//! Blocks as they move through a production round and over the wire.
//!
//! ## Clusters
//!
//! - **Chain**: `Header`, `CompactBlock`, `Block` (the full envelope)
//! - **Transactions**: `SignedTxn`, `TxnCall`, the commitment root
//! - **Networking**: `PeerId`

use crate::errors::CodecError;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

// Re-export the 256-bit primitives for use across all crates
pub use primitive_types::{H256, U256};

// =============================================================================
// CLUSTER A: NETWORKING
// =============================================================================

/// Identifier of a node on the P2P network.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct PeerId(pub String);

impl PeerId {
    /// Create a peer id from any string-like value.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// CLUSTER B: THE CHAIN
// =============================================================================

/// A validator entry carried in the header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Validator {
    /// Validator public key bytes.
    pub pubkey: Vec<u8>,
    /// Weight when proposing.
    pub propose_weight: u64,
    /// Weight when voting.
    pub vote_weight: u64,
}

/// Block header.
///
/// Only the hash, linkage, commitment, timestamp, origin, nonce and
/// difficulty fields matter to proof-of-work. Everything else passes
/// through untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Header {
    /// Hash of this block. Zero until the block is mined or adopted.
    pub hash: H256,
    /// Hash of the parent block.
    pub prev_hash: H256,
    /// Block height in the chain.
    pub height: u64,
    /// Chain the block belongs to.
    pub chain_id: u64,
    /// Merkle root over the committed transaction hashes. `None` until packed.
    pub txn_root: Option<H256>,
    /// State root after executing the block.
    pub state_root: H256,
    /// Root over execution receipts.
    pub receipt_root: H256,
    /// Unix timestamp (milliseconds) of the round that built the block.
    pub timestamp: u64,
    /// Peer that produced the block.
    pub peer_id: PeerId,
    /// Execution resource limit.
    pub lei_limit: u64,
    /// Execution resource consumed.
    pub lei_used: u64,
    /// Public key of the producer.
    pub miner_pubkey: Vec<u8>,
    /// Producer signature over the block hash.
    pub miner_signature: Vec<u8>,
    /// Validator set.
    pub validators: Vec<Validator>,
    /// Hash of the block a consensus proof refers to.
    pub proof_block_hash: H256,
    /// Height of the block a consensus proof refers to.
    pub proof_height: u64,
    /// Opaque consensus proof.
    pub proof: Vec<u8>,
    /// Proof-of-work nonce.
    pub nonce: u64,
    /// Difficulty the block was mined at, in target bits.
    pub difficulty: u64,
    /// Free-form extra bytes.
    pub extra: Vec<u8>,
}

/// A header plus the hashes of the transactions it commits to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct CompactBlock {
    /// The block header.
    pub header: Header,
    /// Ordered hashes of the committed transactions.
    pub txns_hashes: Vec<H256>,
}

impl CompactBlock {
    /// The empty block at height zero.
    pub fn genesis(chain_id: u64) -> Self {
        Self {
            header: Header {
                chain_id,
                txn_root: Some(H256::zero()),
                ..Header::default()
            },
            txns_hashes: Vec::new(),
        }
    }

    /// An empty candidate that extends `parent`.
    pub fn child_of(parent: &Header, chain_id: u64, timestamp: u64) -> Self {
        Self {
            header: Header {
                prev_hash: parent.hash,
                height: parent.height + 1,
                chain_id,
                timestamp,
                ..Header::default()
            },
            txns_hashes: Vec::new(),
        }
    }

    /// Block hash.
    pub fn hash(&self) -> H256 {
        self.header.hash
    }

    /// Block height.
    pub fn height(&self) -> u64 {
        self.header.height
    }

    /// Whether the block has been sealed by mining or adoption.
    pub fn is_produced(&self) -> bool {
        !self.header.hash.is_zero()
    }

    /// Replace every field with the ones from `other`.
    pub fn copy_from(&mut self, other: &CompactBlock) {
        self.header.clone_from(&other.header);
        self.txns_hashes.clone_from(&other.txns_hashes);
    }
}

/// The full block envelope: what is broadcast and what is persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Block {
    /// Header and committed hashes.
    pub compact: CompactBlock,
    /// The committed transactions, in commitment order.
    pub txns: Vec<SignedTxn>,
}

impl Block {
    /// Bundle a compact block with its transactions.
    pub fn new(compact: CompactBlock, txns: Vec<SignedTxn>) -> Self {
        Self { compact, txns }
    }

    /// Serialize the envelope for the wire.
    pub fn encode(&self) -> Result<Vec<u8>, CodecError> {
        bincode::serialize(self).map_err(CodecError::Encode)
    }

    /// Parse an envelope received from the wire.
    pub fn decode(bytes: &[u8]) -> Result<Self, CodecError> {
        bincode::deserialize(bytes).map_err(CodecError::Decode)
    }

    /// Whether the transaction list matches the committed hashes and root.
    pub fn body_matches_commitment(&self) -> bool {
        let hashes = txn_hashes(&self.txns);
        hashes == self.compact.txns_hashes
            && self.compact.header.txn_root == Some(make_txn_root(&hashes))
    }
}

// =============================================================================
// CLUSTER C: TRANSACTIONS
// =============================================================================

/// The call a transaction makes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct TxnCall {
    /// Target module name.
    pub module: String,
    /// Function within the module.
    pub func: String,
    /// Encoded parameters.
    pub params: Vec<u8>,
}

/// A signed transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct SignedTxn {
    /// Caller address.
    pub caller: String,
    /// What the transaction invokes.
    pub call: TxnCall,
    /// Caller-chosen nonce.
    pub nonce: u64,
    /// Caller public key.
    pub pubkey: Vec<u8>,
    /// Signature over the other fields.
    pub signature: Vec<u8>,
}

impl SignedTxn {
    /// SHA-256 over the length-prefixed transaction fields.
    pub fn hash(&self) -> H256 {
        let mut hasher = Sha256::new();
        let fields: [&[u8]; 6] = [
            self.caller.as_bytes(),
            self.call.module.as_bytes(),
            self.call.func.as_bytes(),
            &self.call.params,
            &self.pubkey,
            &self.signature,
        ];
        for field in fields {
            hasher.update((field.len() as u64).to_be_bytes());
            hasher.update(field);
        }
        hasher.update(self.nonce.to_be_bytes());
        H256::from_slice(&hasher.finalize())
    }
}

/// Hashes of `txns`, in order.
pub fn txn_hashes(txns: &[SignedTxn]) -> Vec<H256> {
    txns.iter().map(SignedTxn::hash).collect()
}

/// Binary SHA-256 Merkle root over transaction hashes.
///
/// An odd node at any level is paired with itself. The empty list has the
/// zero root.
pub fn make_txn_root(hashes: &[H256]) -> H256 {
    if hashes.is_empty() {
        return H256::zero();
    }

    let mut level: Vec<H256> = hashes.to_vec();
    while level.len() > 1 {
        level = level
            .chunks(2)
            .map(|pair| {
                let left = pair[0];
                let right = pair.get(1).copied().unwrap_or(left);
                let mut hasher = Sha256::new();
                hasher.update(left.as_bytes());
                hasher.update(right.as_bytes());
                H256::from_slice(&hasher.finalize())
            })
            .collect();
    }
    level[0]
}
