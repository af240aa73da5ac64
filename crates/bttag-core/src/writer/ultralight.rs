//! Mifare Ultralight writer
//!
//! Memory layout (4-byte pages):
//!
//! ```text
//! page 0-1  serial number (factory)
//! page 2    serial, internal, lock bytes 0-1
//! page 3    capability container (OTP)
//! page 4..  NDEF TLV
//! ```
//!
//! The payload goes first, then the capability container, then (when
//! locking) the lock bytes. Nothing is rolled back if the tag leaves the
//! field part way through.

use super::{generate_payload, CancelToken, Connected, TechWriter, WriteOutcome};
use crate::error::{Error, Result, Step};
use crate::info::TagInformation;
use crate::medium::Technology;
use crate::tech::{Tag, UltralightKind};

/// Bytes per page
pub const PAGE_SIZE: usize = 4;

const LOCK_PAGE: u8 = 2;
const CC_PAGE: u8 = 3;
const FIRST_DATA_PAGE: u8 = 4;

const CC_NDEF_MAGIC: u8 = 0xE1;
const CC_VERSION_1_1: u8 = 0x11;
const CC_ACCESS_OPEN: u8 = 0x00;
const CC_ACCESS_READ_ONLY: u8 = 0x0F;

/// Static lock bytes 0-1 set, all pages locked and lock bits frozen
const LOCK_BYTES: [u8; PAGE_SIZE] = [0x00, 0x00, 0xFF, 0xFF];

/// WUPA, sent after locking
const WAKE_COMMAND: [u8; 1] = [0x52];

/// Writer for Mifare Ultralight and Ultralight C
#[derive(Debug, Clone, Copy)]
pub struct UltralightWriter {
    kind: UltralightKind,
}

impl UltralightWriter {
    /// Writer for the given variant
    pub fn new(kind: UltralightKind) -> Self {
        Self { kind }
    }

    /// Bytes available for the TLV payload
    pub fn capacity(&self) -> usize {
        self.kind.usable_pages() * PAGE_SIZE
    }

    /// Capability container page
    pub fn capability_container(&self, read_only: bool) -> [u8; PAGE_SIZE] {
        [
            CC_NDEF_MAGIC,
            CC_VERSION_1_1,
            (self.capacity() / 8) as u8,
            if read_only {
                CC_ACCESS_READ_ONLY
            } else {
                CC_ACCESS_OPEN
            },
        ]
    }
}

impl TechWriter for UltralightWriter {
    fn technology(&self) -> Technology {
        Technology::Ultralight
    }

    fn write_to_tag(
        &self,
        tag: &mut dyn Tag,
        info: &TagInformation,
        cancel: &CancelToken,
    ) -> Result<WriteOutcome> {
        let ultralight = tag.ultralight().ok_or(Error::UnsupportedMedium)?;

        cancel.check(Step::Connect)?;
        let mut ultralight = Connected::open(ultralight)?;

        let usable_pages = self.kind.usable_pages();
        let payload = generate_payload(info, self.capacity())?;

        let pages_needed = payload.len().div_ceil(PAGE_SIZE);
        if pages_needed > usable_pages {
            return Err(Error::OutOfSpace {
                needed: pages_needed * PAGE_SIZE,
                available: self.capacity(),
            });
        }

        log::debug!(
            "Writing {} bytes to {} of {} pages",
            payload.len(),
            pages_needed,
            usable_pages
        );

        for (i, chunk) in payload.chunks(PAGE_SIZE).enumerate() {
            let mut page = [0u8; PAGE_SIZE];
            page[..chunk.len()].copy_from_slice(chunk);

            cancel.check(Step::Write)?;
            ultralight
                .write_page(FIRST_DATA_PAGE + i as u8, &page)
                .map_err(|e| Error::io(Step::Write, e))?;
        }

        cancel.check(Step::Write)?;
        ultralight
            .write_page(CC_PAGE, &self.capability_container(info.read_only()))
            .map_err(|e| Error::io(Step::Write, e))?;

        if info.read_only() {
            cancel.check(Step::Write)?;
            ultralight
                .write_page(LOCK_PAGE, &LOCK_BYTES)
                .map_err(|e| Error::io(Step::Write, e))?;

            // Some tags only apply the lock after a wake-up; the answer is
            // irrelevant and many tags time out here.
            if let Err(e) = ultralight.transceive(&WAKE_COMMAND) {
                log::debug!("Ignoring wake command failure after lock: {}", e);
            }
            log::info!("Ultralight tag locked");
        }

        ultralight.close()?;

        Ok(WriteOutcome {
            technology: Technology::Ultralight,
            payload_len: payload.len(),
            locked: info.read_only(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capability_container() {
        let writer = UltralightWriter::new(UltralightKind::UltralightC);
        assert_eq!(writer.capability_container(false), [0xE1, 0x11, 0x12, 0x00]);
        assert_eq!(writer.capability_container(true), [0xE1, 0x11, 0x12, 0x0F]);

        let writer = UltralightWriter::new(UltralightKind::Ultralight);
        assert_eq!(writer.capability_container(false), [0xE1, 0x11, 0x06, 0x00]);
    }
}
