//! Error types for the proof-of-work consensus module

use shared_bus::NetworkError;
use shared_types::{CodecError, ModuleError, ModuleErrorKind};
use thiserror::Error;

/// Result type alias for consensus operations
pub type Result<T> = std::result::Result<T, PowError>;

/// Errors that can occur while producing or committing blocks
#[derive(Debug, Error)]
pub enum PowError {
    /// Block was handed to the miner before its transactions were committed
    #[error("Transaction root not set on block at height {height}")]
    MissingTxnRoot {
        /// Height of the offending block
        height: u64,
    },

    /// Every nonce was tried without meeting the target
    #[error("Nonce space exhausted at height {height}")]
    NonceSpaceExhausted {
        /// Height being mined
        height: u64,
    },

    /// Target bits outside the representable range
    #[error("Invalid target bits {bits}: must be within 1..=255")]
    InvalidTargetBits {
        /// Rejected value
        bits: u32,
    },

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Transaction pool failure
    #[error("Pool error: {0}")]
    Pool(String),

    /// Chain storage failure
    #[error("Storage error: {0}")]
    Storage(String),

    /// State execution failure
    #[error("Execution error: {0}")]
    Execution(String),

    /// Publishing to the network failed
    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    /// Envelope encoding failed
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// A round operation ran before chain initialization
    #[error("Chain not initialized")]
    NotInitialized,

    /// Chain initialization ran twice
    #[error("Chain already initialized")]
    AlreadyInitialized,

    /// Another round is still producing
    #[error("Round already in progress, rejected start at height {height}")]
    RoundInProgress {
        /// Height of the rejected start
        height: u64,
    },

    /// Commit was requested for a block that was never mined or adopted
    #[error("Block at height {height} was not produced")]
    BlockNotProduced {
        /// Height of the unsealed block
        height: u64,
    },

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl PowError {
    /// The round can be retried on the next trigger
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            PowError::MissingTxnRoot { .. }
                | PowError::NonceSpaceExhausted { .. }
                | PowError::Pool(_)
                | PowError::Storage(_)
                | PowError::Execution(_)
                | PowError::Network(_)
                | PowError::Codec(_)
                | PowError::RoundInProgress { .. }
                | PowError::BlockNotProduced { .. }
        )
    }

    /// The node cannot continue; startup or wiring is broken
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            PowError::InvalidTargetBits { .. }
                | PowError::InvalidConfig(_)
                | PowError::AlreadyInitialized
                | PowError::Internal(_)
        )
    }

    /// Convert to the module-level error, classifying by the failing phase.
    ///
    /// `phase` is the kind used for errors that do not carry their own.
    pub fn into_module_error(self, module: &str, phase: ModuleErrorKind) -> ModuleError {
        let kind = match &self {
            PowError::NotInitialized => ModuleErrorKind::NotInitialized,
            PowError::InvalidTargetBits { .. } | PowError::InvalidConfig(_) => {
                ModuleErrorKind::ConfigurationError
            }
            _ => phase,
        };
        ModuleError::new(module, kind, self.to_string())
    }
}
