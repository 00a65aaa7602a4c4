//! Error types for the protocol crate.

use thiserror::Error;

/// Protocol error type covering all possible failure modes.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    /// The invite string is malformed.
    #[error("invalid invite: {0}")]
    InviteFormat(String),
}

/// Result type alias for protocol operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;
