//! Canonical error and result types for the crate.
//!
//! Each stage reports its own error type. [`SpillframeError`] gathers them
//! for hosts that drive several stages and want a single failure surface.

use thiserror::Error;

use crate::{
    codec::{DecodeError, EncodeError},
    config::ConfigError,
    spill::SpillError,
    writer::WriteError,
};

/// Top-level error type exposed by `spillframe`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SpillframeError {
    /// The bridge configuration was rejected.
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    /// A body could not be written to or finalised on disk.
    #[error("spill failed: {0}")]
    Spill(#[from] SpillError),
    /// Inbound frames could not be turned into a message.
    #[error("decode failed: {0}")]
    Decode(#[from] DecodeError),
    /// An outbound item could not be turned into frames.
    #[error("encode failed: {0}")]
    Encode(#[from] EncodeError),
    /// A queued write did not complete.
    #[error("write failed: {0}")]
    Write(#[from] WriteError),
}

impl SpillframeError {
    /// Returns true if this error reports a closed connection.
    #[must_use]
    pub fn is_closed(&self) -> bool { matches!(self, Self::Write(e) if e.is_closed()) }
}

/// Canonical result alias used by `spillframe` public APIs.
pub type Result<T> = std::result::Result<T, SpillframeError>;
