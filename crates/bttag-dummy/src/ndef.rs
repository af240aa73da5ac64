//! Emulated NDEF and NDEF formatable technologies

use bttag_core::tech::{
    NdefFormatableTech, NdefTech, TagConnection, TransportError, TransportResult,
};

use crate::{Port, Shared};

/// Stored NDEF message
#[derive(Debug, Default)]
pub struct NdefMemory {
    message: Option<Vec<u8>>,
    read_only: bool,
}

impl NdefMemory {
    /// Last message written
    pub fn message(&self) -> Option<&[u8]> {
        self.message.as_deref()
    }

    /// Whether the tag is locked
    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// Lock or unlock the tag
    pub fn set_read_only(&mut self, read_only: bool) {
        self.read_only = read_only;
    }

    fn store(&mut self, message: &[u8], capacity: usize) -> TransportResult<()> {
        if self.read_only {
            return Err(TransportError::ReadOnly);
        }
        if message.len() > capacity {
            return Err(TransportError::Rejected(format!(
                "message of {} bytes exceeds {} byte capacity",
                message.len(),
                capacity
            )));
        }
        self.message = Some(message.to_vec());
        Ok(())
    }
}

/// Emulated NDEF technology
pub struct DummyNdef {
    port: Port,
    max_size: usize,
    memory: Shared<NdefMemory>,
}

impl DummyNdef {
    pub(crate) fn new(port: Port, max_size: usize) -> Self {
        Self {
            port,
            max_size,
            memory: Shared::default(),
        }
    }

    /// Handle to the stored message
    pub fn memory(&self) -> Shared<NdefMemory> {
        self.memory.clone()
    }
}

impl TagConnection for DummyNdef {
    fn connect(&mut self) -> TransportResult<()> {
        self.port.connect()
    }

    fn is_connected(&self) -> bool {
        self.port.is_connected()
    }

    fn close(&mut self) -> TransportResult<()> {
        self.port.close()
    }
}

impl NdefTech for DummyNdef {
    fn max_size(&self) -> usize {
        self.max_size
    }

    fn is_writable(&self) -> bool {
        !self.memory.lock().is_read_only()
    }

    fn write_ndef_message(&mut self, message: &[u8]) -> TransportResult<()> {
        self.port.before_write()?;
        self.memory.lock().store(message, self.max_size)
    }

    fn make_read_only(&mut self) -> TransportResult<()> {
        self.port.before_write()?;
        self.memory.lock().set_read_only(true);
        Ok(())
    }
}

/// Emulated NDEF formatable technology
pub struct DummyNdefFormatable {
    port: Port,
    capacity: usize,
    memory: Shared<NdefMemory>,
}

impl DummyNdefFormatable {
    pub(crate) fn new(port: Port, capacity: usize) -> Self {
        Self {
            port,
            capacity,
            memory: Shared::default(),
        }
    }

    /// Handle to the stored message
    pub fn memory(&self) -> Shared<NdefMemory> {
        self.memory.clone()
    }

    fn format_inner(&mut self, message: &[u8], read_only: bool) -> TransportResult<()> {
        self.port.before_write()?;
        let mut memory = self.memory.lock();
        if memory.message().is_some() {
            return Err(TransportError::Rejected("tag is already formatted".into()));
        }
        memory.store(message, self.capacity)?;
        memory.set_read_only(read_only);
        Ok(())
    }
}

impl TagConnection for DummyNdefFormatable {
    fn connect(&mut self) -> TransportResult<()> {
        self.port.connect()
    }

    fn is_connected(&self) -> bool {
        self.port.is_connected()
    }

    fn close(&mut self) -> TransportResult<()> {
        self.port.close()
    }
}

impl NdefFormatableTech for DummyNdefFormatable {
    fn format(&mut self, message: &[u8]) -> TransportResult<()> {
        self.format_inner(message, false)
    }

    fn format_read_only(&mut self, message: &[u8]) -> TransportResult<()> {
        self.format_inner(message, true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{DummyTag, Faults};
    use bttag_core::decode::decode_tag_payload;
    use bttag_core::error::{Error, Step};
    use bttag_core::ndef::NdefMessage;
    use bttag_core::writer::{CancelToken, NdefFormatableWriter, NdefWriter, TechWriter};
    use bttag_core::{bssp, TagFormat, TagInformation, Technology};

    fn info() -> TagInformation {
        TagInformation::new("5C:F3:70:8B:12:9E".parse().unwrap(), "Soundbar")
    }

    #[test]
    fn test_write_ndef() {
        let mut tag = DummyTag::ndef(137);
        let memory = tag.ndef_memory().unwrap();

        let outcome = NdefWriter::new(137)
            .write_to_tag(&mut tag, &info(), &CancelToken::new())
            .unwrap();
        assert_eq!(outcome.technology, Technology::Ndef);
        assert!(!outcome.locked);

        let memory = memory.lock();
        let message = memory.message().unwrap();
        assert_eq!(message.len(), outcome.payload_len);
        assert_eq!(decode_tag_payload(message).unwrap(), info());
        assert!(!memory.is_read_only());
        assert!(!tag.port().is_connected());
    }

    #[test]
    fn test_write_ndef_handover() {
        let mut tag = DummyTag::ndef(137);
        let memory = tag.ndef_memory().unwrap();
        let info = info().with_format(TagFormat::Handover);

        NdefWriter::new(137)
            .write_to_tag(&mut tag, &info, &CancelToken::new())
            .unwrap();

        let memory = memory.lock();
        let message = NdefMessage::parse(memory.message().unwrap()).unwrap();
        assert!(message.is_handover());
        assert!(message.find_mime(bssp::MIME_TYPE).is_some());
        assert_eq!(decode_tag_payload(memory.message().unwrap()).unwrap(), info);
    }

    #[test]
    fn test_write_ndef_lock() {
        let mut tag = DummyTag::ndef(137);
        let memory = tag.ndef_memory().unwrap();

        let outcome = NdefWriter::new(137)
            .write_to_tag(&mut tag, &info().with_read_only(true), &CancelToken::new())
            .unwrap();
        assert!(outcome.locked);
        assert!(memory.lock().is_read_only());
    }

    #[test]
    fn test_write_protected_ndef() {
        let mut tag = DummyTag::ndef(137);
        tag.ndef_memory().unwrap().lock().set_read_only(true);

        let err = NdefWriter::new(137)
            .write_to_tag(&mut tag, &info(), &CancelToken::new())
            .unwrap_err();
        assert!(matches!(err, Error::WriteProtected));
        assert_eq!(tag.port().writes(), 0);
        assert!(!tag.port().is_connected());
    }

    #[test]
    fn test_ndef_too_small() {
        let mut tag = DummyTag::ndef(46);
        let err = NdefWriter::new(46)
            .write_to_tag(&mut tag, &info(), &CancelToken::new())
            .unwrap_err();
        assert!(matches!(err, Error::OutOfSpace { .. }));
    }

    #[test]
    fn test_ndef_lost_on_lock() {
        let mut tag = DummyTag::ndef(137).with_faults(Faults {
            lose_after_writes: Some(1),
            ..Faults::default()
        });
        let err = NdefWriter::new(137)
            .write_to_tag(&mut tag, &info().with_read_only(true), &CancelToken::new())
            .unwrap_err();
        assert_eq!(err.step(), Some(Step::Write));
    }

    #[test]
    fn test_format() {
        let mut tag = DummyTag::formatable(716);
        let memory = tag.formatable_memory().unwrap();

        let outcome = NdefFormatableWriter
            .write_to_tag(&mut tag, &info(), &CancelToken::new())
            .unwrap();
        assert_eq!(outcome.technology, Technology::NdefFormatable);

        let memory = memory.lock();
        assert_eq!(decode_tag_payload(memory.message().unwrap()).unwrap(), info());
        assert!(!memory.is_read_only());
        assert_eq!(tag.port().writes(), 1);
    }

    #[test]
    fn test_format_read_only() {
        let mut tag = DummyTag::formatable(716);
        let memory = tag.formatable_memory().unwrap();

        let outcome = NdefFormatableWriter
            .write_to_tag(&mut tag, &info().with_read_only(true), &CancelToken::new())
            .unwrap();
        assert!(outcome.locked);
        assert!(memory.lock().is_read_only());
    }

    #[test]
    fn test_format_failure_step() {
        // Capacity below the full message: the format call itself fails
        let mut tag = DummyTag::formatable(20);
        let err = NdefFormatableWriter
            .write_to_tag(&mut tag, &info(), &CancelToken::new())
            .unwrap_err();
        assert_eq!(err.step(), Some(Step::Format));
    }
}
