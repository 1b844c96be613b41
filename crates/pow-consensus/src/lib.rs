//! # PoW Consensus - Pluggable Proof-of-Work Module
//!
//! Produces one block per height by racing local mining against blocks
//! announced by peers.
//!
//! ## Round Flow
//!
//! ```text
//!  network ──► listener task ──► BlockQueue (bounded FIFO)
//!                                     │
//!  timer ──► start_block ──► grace ──► RaceResolver ──adopted──┐
//!                                     │ not adopted            │
//!                                     ▼                        │
//!                        pack ► root ► ProofOfWork::run        │
//!                                     │                        │
//!                           persist ► broadcast                │
//!                                     ▼                        ▼
//!                 end_block: execute ► append ► mark readable ► reset pool
//! ```
//!
//! ## Architecture Layers
//!
//! - [`domain`]: the puzzle engine and round lifecycle types (pure)
//! - [`ports`]: collaborator traits (chain storage, pool, executor)
//! - [`adapters`]: in-memory implementations of the ports
//! - [`resolver`]: first-valid-wins adoption of peer blocks
//! - [`service`]: [`PowConsensus`], the lifecycle controller implementing
//!   [`shared_types::ConsensusModule`]
//!
//! ## Invariants
//!
//! 1. A block's hash is set by local mining or by adoption, never both
//! 2. A node never adopts its own broadcast
//! 3. Only blocks for the height being produced, built on the local tip,
//!    are adopted
//! 4. Adoption completes before any local mining starts
//! 5. The pool is reset only after execute, append and mark-readable succeed

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod adapters;
pub mod config;
pub mod domain;
pub mod error;
pub mod metrics;
pub mod ports;
pub mod queue;
pub mod resolver;
pub mod service;
pub mod utils;

pub use config::{OverflowPolicy, PowConfig};
pub use domain::{BlockSource, ProofOfWork, RaceOutcome, RoundPhase, Verdict};
pub use error::{PowError, Result};
pub use metrics::{Metrics, MetricsSnapshot};
pub use ports::{ChainEnv, ChainStorage, StateExecutor, TxPool};
pub use queue::{BlockQueue, PushOutcome};
pub use resolver::RaceResolver;
pub use service::{PowConsensus, MODULE_NAME};

/// Default difficulty in target bits
pub const DEFAULT_TARGET_BITS: u32 = 16;

/// Default maximum transactions per block
pub const DEFAULT_PACK_LIMIT: u64 = 500;

/// Default pause before each round (milliseconds)
pub const DEFAULT_GRACE_PERIOD_MS: u64 = 2_000;

/// Default announcement queue capacity
pub const DEFAULT_QUEUE_CAPACITY: usize = 100;

/// Default in-memory pool size
pub const DEFAULT_POOL_SIZE: usize = 10_000;
