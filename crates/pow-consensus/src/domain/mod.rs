//! Domain layer for proof-of-work consensus
//!
//! Pure logic: the puzzle engine and the round lifecycle types.

pub mod entities;
pub mod puzzle;

pub use entities::*;
pub use puzzle::{ProofOfWork, MAX_TARGET_BITS, MIN_TARGET_BITS};
