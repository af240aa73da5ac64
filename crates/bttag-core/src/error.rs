//! Error types for bttag-core
//!
//! Every failure of a single write attempt is expressed as an [`Error`].
//! Transport failures carry the [`Step`] they happened in so callers can
//! tell a failed format apart from a lost connection.

use core::fmt;

use thiserror::Error;

use crate::tech::TransportError;

/// Tag I/O step an [`Error::Io`] happened in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Step {
    /// Opening the connection to the tag
    Connect,
    /// Writing pages, blocks or an NDEF message
    Write,
    /// Formatting the tag (NdefFormatable format, Classic sector setup)
    Format,
    /// Closing the connection
    Close,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Connect => write!(f, "connect"),
            Step::Write => write!(f, "write"),
            Step::Format => write!(f, "format"),
            Step::Close => write!(f, "close"),
        }
    }
}

/// Core error type
#[derive(Debug, Error)]
pub enum Error {
    /// Encoded content does not fit the medium, even after dropping optional fields
    #[error("not enough space on tag: {needed} bytes needed, {available} available")]
    OutOfSpace {
        /// Bytes the smallest representation needs
        needed: usize,
        /// Bytes the medium offers
        available: usize,
    },

    /// Data read from a tag could not be decoded
    #[error("malformed data: {0}")]
    MalformedData(String),

    /// Transport failure while talking to the tag
    #[error("{step} failed: {source}")]
    Io {
        /// Step the failure happened in
        step: Step,
        /// Underlying transport error
        #[source]
        source: TransportError,
    },

    /// No supported technology matched the presented tag
    #[error("tag technology not supported")]
    UnsupportedMedium,

    /// The tag refused the write because it is locked
    #[error("tag is write protected")]
    WriteProtected,

    /// A block write was refused before reaching the tag
    #[error("refusing to write block {block}: {reason}")]
    InvalidBlock {
        /// Block index that was requested
        block: usize,
        /// Why the block is off limits
        reason: &'static str,
    },

    /// None of the candidate keys opened a Classic sector
    #[error("authentication failed for sector {sector}")]
    AuthenticationFailed {
        /// Sector index
        sector: usize,
    },

    /// Bluetooth address string could not be parsed
    #[error("invalid Bluetooth address: {0}")]
    InvalidAddress(String),

    /// Tag information file could not be loaded
    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Wrap a transport error with the step it happened in
    ///
    /// A tag rejecting a write because it is read-only becomes
    /// [`Error::WriteProtected`] instead of a generic I/O failure.
    pub fn io(step: Step, source: TransportError) -> Self {
        match source {
            TransportError::ReadOnly => Error::WriteProtected,
            source => Error::Io { step, source },
        }
    }

    /// Step of an I/O failure, if this is one
    pub fn step(&self) -> Option<Step> {
        match self {
            Error::Io { step, .. } => Some(*step),
            _ => None,
        }
    }
}

/// Result type alias using the core Error type
pub type Result<T> = core::result::Result<T, Error>;
