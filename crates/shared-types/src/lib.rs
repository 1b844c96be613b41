//! # Shared Types Crate
//!
//! Domain entities and contracts shared by every crate in the workspace.
//!
//! ## Contents
//!
//! - [`entities`]: block headers, compact blocks, full block envelopes and
//!   signed transactions, plus the transaction-commitment root.
//! - [`errors`]: envelope codec errors.
//! - [`module_trait`]: the [`ConsensusModule`] capability set every consensus
//!   variant implements.
//! - [`module_registry`]: the name-indexed, insertion-ordered module registry
//!   the node runtime drives each round.

pub mod entities;
pub mod errors;
pub mod module_registry;
pub mod module_trait;

pub use entities::*;
pub use errors::*;
pub use module_registry::ModuleRegistry;
pub use module_trait::{ConsensusModule, DynModule, ModuleError, ModuleErrorKind};
