//! Crate-wide error type
//!
//! Decoding and synthesis either succeed completely or fail with one of these
//! kinds. Malformed individual MIDI events are never errors; the parser just
//! yields a partial or absent event.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CcmzError {
    /// Unsupported version tag, empty buffer, unusable score model
    #[error("format error: {0}")]
    Format(String),
    /// Archive cannot be opened or a required member is missing
    #[error("container error: {0}")]
    Container(String),
    #[error("midi write error: {0}")]
    Midi(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, CcmzError>;
