//! Hexagonal architecture ports
//!
//! The inbound side is [`shared_types::ConsensusModule`], implemented by
//! [`crate::PowConsensus`].

pub mod outbound;

pub use outbound::*;
