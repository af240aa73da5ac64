//! Writers delegating to the NFC stack's NDEF primitives

use super::{CancelToken, Connected, TechWriter, WriteOutcome};
use crate::error::{Error, Result, Step};
use crate::info::TagInformation;
use crate::medium::Technology;
use crate::ndef::build_ndef_message;
use crate::tech::Tag;

/// Writer for tags already formatted for NDEF
#[derive(Debug, Clone, Copy)]
pub struct NdefWriter {
    max_size: usize,
}

impl NdefWriter {
    /// Writer for a tag accepting messages up to `max_size` bytes
    pub fn new(max_size: usize) -> Self {
        Self { max_size }
    }
}

impl TechWriter for NdefWriter {
    fn technology(&self) -> Technology {
        Technology::Ndef
    }

    fn write_to_tag(
        &self,
        tag: &mut dyn Tag,
        info: &TagInformation,
        cancel: &CancelToken,
    ) -> Result<WriteOutcome> {
        let ndef = tag.ndef().ok_or(Error::UnsupportedMedium)?;

        cancel.check(Step::Connect)?;
        let mut ndef = Connected::open(ndef)?;

        if !ndef.is_writable() {
            return Err(Error::WriteProtected);
        }

        let message = build_ndef_message(info, Some(self.max_size))?.to_bytes();

        cancel.check(Step::Write)?;
        ndef.write_ndef_message(&message)
            .map_err(|e| Error::io(Step::Write, e))?;

        if info.read_only() {
            cancel.check(Step::Write)?;
            ndef.make_read_only()
                .map_err(|e| Error::io(Step::Write, e))?;
            log::info!("NDEF tag locked");
        }

        ndef.close()?;

        Ok(WriteOutcome {
            technology: Technology::Ndef,
            payload_len: message.len(),
            locked: info.read_only(),
        })
    }
}

/// Writer for blank tags formatted with the message
///
/// Formatting is the write: the message is passed to the format call.
#[derive(Debug, Clone, Copy, Default)]
pub struct NdefFormatableWriter;

impl TechWriter for NdefFormatableWriter {
    fn technology(&self) -> Technology {
        Technology::NdefFormatable
    }

    fn write_to_tag(
        &self,
        tag: &mut dyn Tag,
        info: &TagInformation,
        cancel: &CancelToken,
    ) -> Result<WriteOutcome> {
        let formatable = tag.ndef_formatable().ok_or(Error::UnsupportedMedium)?;

        cancel.check(Step::Connect)?;
        let mut formatable = Connected::open(formatable)?;

        let message = build_ndef_message(info, None)?.to_bytes();

        cancel.check(Step::Format)?;
        let formatted = if info.read_only() {
            formatable.format_read_only(&message)
        } else {
            formatable.format(&message)
        };
        formatted.map_err(|e| Error::io(Step::Format, e))?;

        formatable.close()?;

        Ok(WriteOutcome {
            technology: Technology::NdefFormatable,
            payload_len: message.len(),
            locked: info.read_only(),
        })
    }
}
