//! # Consensus Module Trait
//!
//! Defines the capability set every consensus variant implements so the node
//! runtime can drive block production without knowing which variant it runs.
//!
//! ## Round Contract
//!
//! For each height the runtime calls, in order:
//!
//! 1. [`ConsensusModule::start_block`] to fill the candidate (mine or adopt)
//! 2. [`ConsensusModule::end_block`] to execute and append it
//! 3. [`ConsensusModule::finalize_block`] as a post-commit hook
//!
//! [`ConsensusModule::init_chain`] runs once before the first round.
//!
//! ## Example Implementation
//!
//! ```rust,ignore
//! use shared_types::{CompactBlock, ConsensusModule, ModuleError, SignedTxn};
//! use async_trait::async_trait;
//!
//! pub struct Solo;
//!
//! #[async_trait]
//! impl ConsensusModule for Solo {
//!     fn name(&self) -> &'static str { "solo" }
//!     async fn init_chain(&self) -> Result<(), ModuleError> { Ok(()) }
//!     async fn start_block(&self, _: &mut CompactBlock) -> Result<(), ModuleError> { Ok(()) }
//!     async fn end_block(&self, _: &CompactBlock) -> Result<(), ModuleError> { Ok(()) }
//!     async fn finalize_block(&self, _: &CompactBlock) -> Result<(), ModuleError> { Ok(()) }
//!     fn check_txn(&self, _: &SignedTxn) -> Result<(), ModuleError> { Ok(()) }
//!     fn verify_block(&self, _: &CompactBlock) -> bool { true }
//! }
//! ```

use crate::entities::{CompactBlock, SignedTxn};
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

/// Error type for consensus module operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleError {
    /// Name of the module that failed.
    pub module: String,
    /// Error kind.
    pub kind: ModuleErrorKind,
    /// Human-readable error message.
    pub message: String,
}

impl ModuleError {
    /// Build an error for `module`.
    pub fn new(module: impl Into<String>, kind: ModuleErrorKind, message: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for ModuleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.module, self.kind, self.message)
    }
}

impl std::error::Error for ModuleError {}

/// Categories of module errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleErrorKind {
    /// Chain initialization failed; the node cannot start.
    InitializationFailed,
    /// A round operation was called before `init_chain`.
    NotInitialized,
    /// The round was aborted before commit; retry on the next trigger.
    RoundAborted,
    /// Execution or append failed while committing.
    CommitFailed,
    /// A transaction was rejected by the module.
    InvalidTransaction,
    /// No module is registered under the requested name.
    ModuleNotFound,
    /// A module with the same name is already registered.
    DuplicateModule,
    /// Configuration error.
    ConfigurationError,
}

impl fmt::Display for ModuleErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InitializationFailed => write!(f, "InitializationFailed"),
            Self::NotInitialized => write!(f, "NotInitialized"),
            Self::RoundAborted => write!(f, "RoundAborted"),
            Self::CommitFailed => write!(f, "CommitFailed"),
            Self::InvalidTransaction => write!(f, "InvalidTransaction"),
            Self::ModuleNotFound => write!(f, "ModuleNotFound"),
            Self::DuplicateModule => write!(f, "DuplicateModule"),
            Self::ConfigurationError => write!(f, "ConfigurationError"),
        }
    }
}

/// The capability set of a consensus variant.
#[async_trait]
pub trait ConsensusModule: Send + Sync {
    /// Registry name, unique per node.
    fn name(&self) -> &'static str;

    /// One-time chain setup: genesis and background listeners.
    async fn init_chain(&self) -> Result<(), ModuleError>;

    /// Fill `block` for its height, either by mining or by adopting a peer's.
    async fn start_block(&self, block: &mut CompactBlock) -> Result<(), ModuleError>;

    /// Execute and append `block`; the pool is reset only on success.
    async fn end_block(&self, block: &CompactBlock) -> Result<(), ModuleError>;

    /// Post-commit hook.
    async fn finalize_block(&self, block: &CompactBlock) -> Result<(), ModuleError>;

    /// Admission check for a transaction entering the pool.
    fn check_txn(&self, txn: &SignedTxn) -> Result<(), ModuleError>;

    /// Whether `block` carries a valid consensus proof.
    fn verify_block(&self, block: &CompactBlock) -> bool;
}

/// Shared handle to a module.
pub type DynModule = Arc<dyn ConsensusModule>;
