//! # PoW-Chain Node Runtime Library
//!
//! Configuration loading, node wiring and the round scheduler, exposed as a
//! library so integration tests can run several nodes in one process.
//!
//! ## Startup Sequence
//!
//! 1. Load configuration (defaults, file, environment)
//! 2. Wire storage, pool, executor and transport into the consensus module
//! 3. Register the module and initialize its chain (genesis + listener)
//! 4. Run one round per tick until shutdown

pub mod config;
pub mod runtime;
pub mod telemetry;
pub mod wiring;

pub use config::{ConfigError, NodeConfig};
pub use runtime::{NodeRuntime, RuntimeError};
pub use wiring::{build_in_memory_node, InMemoryNode};
