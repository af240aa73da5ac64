//! Technology writers
//!
//! A [`TechWriter`] performs one complete write on a tag: connect, format
//! or write, optionally lock, close. The connection is held by a
//! [`Connected`] guard so it is closed on every exit path.

pub mod classic;
pub mod ndef;
pub mod ultralight;

pub use classic::ClassicWriter;
pub use ndef::{NdefFormatableWriter, NdefWriter};
pub use ultralight::UltralightWriter;

use core::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::{Error, Result, Step};
use crate::info::TagInformation;
use crate::medium::Technology;
use crate::ndef::build_ndef_message;
use crate::tech::{CloseHandle, Tag, TagConnection, TransportError};
use crate::tlv;

/// Cooperative cancellation flag shared between a write and its owner
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// New, not cancelled
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation was requested
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Fail with a cancelled I/O error if cancellation was requested
    ///
    /// Called before each tag operation so no new I/O starts after a
    /// cancel.
    pub fn check(&self, step: Step) -> Result<()> {
        if self.is_cancelled() {
            Err(Error::io(step, TransportError::Cancelled))
        } else {
            Ok(())
        }
    }
}

/// Open connection to a tag technology, closed on drop
pub struct Connected<'a, T: TagConnection + ?Sized> {
    tech: &'a mut T,
    open: bool,
}

impl<'a, T: TagConnection + ?Sized> Connected<'a, T> {
    /// Connect unless the tag is already connected
    pub fn open(tech: &'a mut T) -> Result<Self> {
        if !tech.is_connected() {
            tech.connect().map_err(|e| Error::io(Step::Connect, e))?;
        }
        Ok(Self { tech, open: true })
    }

    /// Close the connection, reporting failures
    pub fn close(mut self) -> Result<()> {
        self.open = false;
        self.tech.close().map_err(|e| Error::io(Step::Close, e))
    }
}

impl<T: TagConnection + ?Sized> Deref for Connected<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        self.tech
    }
}

impl<T: TagConnection + ?Sized> DerefMut for Connected<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        self.tech
    }
}

impl<T: TagConnection + ?Sized> Drop for Connected<'_, T> {
    fn drop(&mut self) {
        if self.open && self.tech.is_connected() {
            if let Err(e) = self.tech.close() {
                log::warn!("Failed to close tag after error: {}", e);
            }
        }
    }
}

/// Result of a successful write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteOutcome {
    /// Technology used
    pub technology: Technology,
    /// Bytes stored on the tag (message or TLV payload)
    pub payload_len: usize,
    /// Whether the tag was locked
    pub locked: bool,
}

/// Writes tag information to one tag technology
pub trait TechWriter: Send + Sync {
    /// Technology this writer drives
    fn technology(&self) -> Technology;

    /// Connect, write and close
    ///
    /// The connection is closed on every exit path.
    fn write_to_tag(
        &self,
        tag: &mut dyn Tag,
        info: &TagInformation,
        cancel: &CancelToken,
    ) -> Result<WriteOutcome>;

    /// Best-effort close used to interrupt a running write
    ///
    /// Errors are logged, never returned.
    fn close(&self, handle: &dyn CloseHandle) {
        if let Err(e) = handle.close() {
            log::error!("Failed to close {} tag: {}", self.technology(), e);
        }
    }
}

/// Build the TLV framed NDEF message for raw tag memory of `size_limit` bytes
pub fn generate_payload(info: &TagInformation, size_limit: usize) -> Result<Vec<u8>> {
    let too_small = || Error::OutOfSpace {
        needed: tlv::SHORT_HEADER,
        available: size_limit,
    };

    let budget = size_limit.checked_sub(tlv::SHORT_HEADER).ok_or_else(too_small)?;
    let mut message = build_ndef_message(info, Some(budget))?;

    if tlv::header_len(message.encoded_len()) > tlv::SHORT_HEADER {
        let budget = size_limit.checked_sub(tlv::LONG_HEADER).ok_or_else(too_small)?;
        message = build_ndef_message(info, Some(budget))?;
    }

    let payload = tlv::wrap(&message.to_bytes())?;
    if payload.len() > size_limit {
        return Err(Error::OutOfSpace {
            needed: payload.len(),
            available: size_limit,
        });
    }

    log::debug!("TLV payload {} bytes of {} available", payload.len(), size_limit);
    Ok(payload)
}
