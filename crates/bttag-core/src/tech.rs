//! Tag technology traits
//!
//! A presented tag is a [`Tag`]: it reports a set of [`TagCapabilities`] and
//! hands out a technology interface for each one it supports. The
//! technology interfaces mirror what an NFC stack exposes for a physical tag:
//!
//! - [`NdefTech`]: tag already holding an NDEF structure
//! - [`NdefFormatableTech`]: blank tag the stack can format with a message
//! - [`UltralightTech`]: raw page access on Mifare Ultralight
//! - [`ClassicTech`]: keyed sector/block access on Mifare Classic
//!
//! All calls block until the tag answers or the link drops.

use std::sync::Arc;

use bitflags::bitflags;
use thiserror::Error;

bitflags! {
    /// Technologies a tag exposes
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct TagCapabilities: u32 {
        /// NDEF read/write
        const NDEF            = 1 << 0;
        /// NDEF format-on-write
        const NDEF_FORMATABLE = 1 << 1;
        /// Mifare Ultralight page access
        const ULTRALIGHT      = 1 << 2;
        /// Mifare Classic sector access
        const CLASSIC         = 1 << 3;
    }
}

impl Default for TagCapabilities {
    fn default() -> Self {
        TagCapabilities::empty()
    }
}

/// Error raised by a tag handle
#[derive(Debug, Error)]
pub enum TransportError {
    /// The tag left the field or stopped answering
    #[error("tag was lost")]
    TagLost,
    /// Operation on a connection that is not open
    #[error("tag connection is closed")]
    Closed,
    /// The tag refused the write because it is locked
    #[error("tag is read-only")]
    ReadOnly,
    /// The operation was aborted by a close from another thread
    #[error("operation cancelled")]
    Cancelled,
    /// The tag answered with an error
    #[error("tag rejected command: {0}")]
    Rejected(String),
    /// OS level I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for tag handle operations
pub type TransportResult<T> = core::result::Result<T, TransportError>;

/// Connection lifecycle shared by all technologies
pub trait TagConnection {
    /// Open the connection
    fn connect(&mut self) -> TransportResult<()>;

    /// Whether the connection is open
    fn is_connected(&self) -> bool;

    /// Close the connection
    fn close(&mut self) -> TransportResult<()>;
}

/// Tag already formatted for NDEF
pub trait NdefTech: TagConnection {
    /// Largest NDEF message the tag accepts, in bytes
    fn max_size(&self) -> usize;

    /// Whether the tag accepts writes
    fn is_writable(&self) -> bool;

    /// Replace the tag contents with an encoded NDEF message
    fn write_ndef_message(&mut self, message: &[u8]) -> TransportResult<()>;

    /// Permanently lock the tag
    fn make_read_only(&mut self) -> TransportResult<()>;
}

/// Blank tag that can be formatted for NDEF
pub trait NdefFormatableTech: TagConnection {
    /// Format the tag and store `message` as its first NDEF message
    fn format(&mut self, message: &[u8]) -> TransportResult<()>;

    /// Format, store `message` and lock the tag in one step
    fn format_read_only(&mut self, message: &[u8]) -> TransportResult<()>;
}

/// Mifare Ultralight variant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UltralightKind {
    /// MF0ICU1, 16 pages
    Ultralight,
    /// MF0ICU2, 48 pages
    UltralightC,
}

impl UltralightKind {
    /// Pages available for NDEF data, starting at page 4
    pub const fn usable_pages(self) -> usize {
        match self {
            UltralightKind::Ultralight => 12,
            UltralightKind::UltralightC => 36,
        }
    }

    /// Total number of pages including the reserved ones
    pub const fn total_pages(self) -> usize {
        match self {
            UltralightKind::Ultralight => 16,
            UltralightKind::UltralightC => 48,
        }
    }
}

/// Page-addressed access to Mifare Ultralight
pub trait UltralightTech: TagConnection {
    /// Variant of the tag
    fn kind(&self) -> UltralightKind;

    /// Write one 4-byte page
    fn write_page(&mut self, page: u8, data: &[u8; 4]) -> TransportResult<()>;

    /// Send a raw command frame and return the response
    fn transceive(&mut self, data: &[u8]) -> TransportResult<Vec<u8>>;
}

/// Sector-addressed access to Mifare Classic
pub trait ClassicTech: TagConnection {
    /// Number of sectors
    fn sector_count(&self) -> usize;

    /// Authenticate a sector with key A
    ///
    /// Returns `Ok(false)` when the tag refused the key.
    fn authenticate_sector_with_key_a(
        &mut self,
        sector: usize,
        key: &[u8; 6],
    ) -> TransportResult<bool>;

    /// Write one 16-byte block
    fn write_block(&mut self, block: usize, data: &[u8; 16]) -> TransportResult<()>;
}

/// Handle that closes a tag connection from another thread
///
/// Closing makes the blocking call in flight (or the next one) fail, which
/// is how a running write is interrupted.
pub trait CloseHandle: Send + Sync {
    /// Close the underlying connection
    fn close(&self) -> TransportResult<()>;
}

/// A physical tag presented by the NFC stack
pub trait Tag: Send {
    /// Tag UID
    fn id(&self) -> &[u8];

    /// Technologies the tag exposes
    fn capabilities(&self) -> TagCapabilities;

    /// NDEF interface, if the tag has one
    fn ndef(&mut self) -> Option<&mut dyn NdefTech> {
        None
    }

    /// NDEF format interface, if the tag has one
    fn ndef_formatable(&mut self) -> Option<&mut dyn NdefFormatableTech> {
        None
    }

    /// Ultralight interface, if the tag has one
    fn ultralight(&mut self) -> Option<&mut dyn UltralightTech> {
        None
    }

    /// Classic interface, if the tag has one
    fn classic(&mut self) -> Option<&mut dyn ClassicTech> {
        None
    }

    /// Handle for closing the connection from another thread
    fn close_handle(&self) -> Arc<dyn CloseHandle>;
}
