//! # Error Types
//!
//! Errors raised while moving blocks across the wire.

use thiserror::Error;

/// Errors from encoding or decoding a block envelope.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The envelope could not be serialized.
    #[error("Failed to encode block envelope: {0}")]
    Encode(#[source] bincode::Error),

    /// The bytes are not a valid block envelope.
    #[error("Failed to decode block envelope: {0}")]
    Decode(#[source] bincode::Error),
}
