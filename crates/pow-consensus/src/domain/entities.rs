//! Round lifecycle and race resolution types

use primitive_types::H256;
use shared_types::SignedTxn;
use std::fmt;

/// Where the module is in the per-height lifecycle
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RoundPhase {
    /// `init_chain` has not run
    Uninitialized,
    /// Genesis installed and listener running, no round yet
    Initialized,
    /// A block for `height` was mined or adopted and awaits commit
    Producing {
        /// Height being produced
        height: u64,
    },
    /// The block at `height` is executed and appended
    Committed {
        /// Last committed height
        height: u64,
    },
}

impl RoundPhase {
    /// Whether `init_chain` has completed
    pub fn is_initialized(&self) -> bool {
        !matches!(self, RoundPhase::Uninitialized)
    }
}

/// How a round obtained its block
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlockSource {
    /// Mined locally and broadcast
    Mined,
    /// Taken from a peer announcement
    Adopted,
}

/// Decision for one peer announcement
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Verdict {
    /// Valid block for this height; local candidate replaced
    Adopted,
    /// Our own broadcast coming back
    Echo,
    /// Block for a different height
    WrongHeight {
        /// Height the peer announced
        announced: u64,
    },
    /// Right height, but built on a block other than our tip
    WrongParent,
    /// Proof does not satisfy the puzzle
    InvalidProof,
    /// Transactions do not match the committed hashes or root
    InconsistentBody,
    /// Bytes are not a block envelope
    Undecodable,
    /// Block was valid but persisting it failed
    ApplyFailed,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Adopted => write!(f, "adopted"),
            Verdict::Echo => write!(f, "echo"),
            Verdict::WrongHeight { announced } => write!(f, "wrong height {}", announced),
            Verdict::WrongParent => write!(f, "wrong parent"),
            Verdict::InvalidProof => write!(f, "invalid proof"),
            Verdict::InconsistentBody => write!(f, "inconsistent body"),
            Verdict::Undecodable => write!(f, "undecodable"),
            Verdict::ApplyFailed => write!(f, "apply failed"),
        }
    }
}

/// Result of scanning the queued announcements for one round
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RaceOutcome {
    /// Hash of the adopted block, if any
    pub adopted: Option<H256>,
    /// One verdict per inspected message, in queue order
    pub verdicts: Vec<Verdict>,
    /// Body of the adopted block; these left the local pool on adoption
    pub txns: Vec<SignedTxn>,
}

impl RaceOutcome {
    /// Whether a peer block replaced the local candidate
    pub fn is_adopted(&self) -> bool {
        self.adopted.is_some()
    }

    /// Number of inspected messages with the given verdict
    pub fn count(&self, verdict: Verdict) -> usize {
        self.verdicts.iter().filter(|v| **v == verdict).count()
    }
}
