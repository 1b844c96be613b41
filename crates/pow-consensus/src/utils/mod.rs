//! Utility functions for proof-of-work consensus

pub mod hashing;

pub use hashing::*;
