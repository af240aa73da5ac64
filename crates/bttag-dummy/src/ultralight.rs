//! Emulated Mifare Ultralight

use bttag_core::tech::{
    TagConnection, TransportError, TransportResult, UltralightKind, UltralightTech,
};

use crate::{Port, Shared};

const PAGE_SIZE: usize = 4;
const LOCK_PAGE: usize = 2;
const CC_PAGE: usize = 3;
const FIRST_DATA_PAGE: usize = 4;

/// Cascade tag for the first BCC byte
const CASCADE_TAG: u8 = 0x88;

/// Ultralight page memory
#[derive(Debug)]
pub struct UltralightMemory {
    pages: Vec<[u8; PAGE_SIZE]>,
    write_log: Vec<u8>,
    wakes: usize,
}

impl UltralightMemory {
    fn new(kind: UltralightKind, id: &[u8]) -> Self {
        let mut uid = [0u8; 7];
        let n = id.len().min(uid.len());
        uid[..n].copy_from_slice(&id[..n]);

        let mut pages = vec![[0u8; PAGE_SIZE]; kind.total_pages()];
        let bcc0 = CASCADE_TAG ^ uid[0] ^ uid[1] ^ uid[2];
        let bcc1 = uid[3] ^ uid[4] ^ uid[5] ^ uid[6];
        pages[0] = [uid[0], uid[1], uid[2], bcc0];
        pages[1] = [uid[3], uid[4], uid[5], uid[6]];
        pages[LOCK_PAGE] = [bcc1, 0x48, 0x00, 0x00];

        Self {
            pages,
            write_log: Vec::new(),
            wakes: 0,
        }
    }

    /// Contents of one page
    pub fn page(&self, page: usize) -> [u8; PAGE_SIZE] {
        self.pages[page]
    }

    /// User memory from page 4 on
    pub fn data_area(&self) -> Vec<u8> {
        self.pages[FIRST_DATA_PAGE..].concat()
    }

    /// Page numbers in the order they were written
    pub fn write_log(&self) -> &[u8] {
        &self.write_log
    }

    /// Whether the static lock bytes are set
    pub fn is_locked(&self) -> bool {
        let lock = self.pages[LOCK_PAGE];
        lock[2] == 0xFF && lock[3] == 0xFF
    }

    /// Number of wake commands answered
    pub fn wakes(&self) -> usize {
        self.wakes
    }

    fn write(&mut self, page: u8, data: &[u8; PAGE_SIZE]) -> TransportResult<()> {
        let index = page as usize;
        if index >= self.pages.len() {
            return Err(TransportError::Rejected(format!("page {} out of range", page)));
        }
        if index < LOCK_PAGE {
            return Err(TransportError::Rejected(format!("page {} is read-only", page)));
        }
        if self.is_locked() && index >= CC_PAGE {
            return Err(TransportError::ReadOnly);
        }

        match index {
            // Only the lock bytes are writable, and only 0 -> 1
            LOCK_PAGE => {
                self.pages[index][2] |= data[2];
                self.pages[index][3] |= data[3];
            }
            // One time programmable
            CC_PAGE => {
                for (cell, bits) in self.pages[index].iter_mut().zip(data) {
                    *cell |= bits;
                }
            }
            _ => self.pages[index] = *data,
        }

        self.write_log.push(page);
        Ok(())
    }
}

/// Emulated Ultralight technology
pub struct DummyUltralight {
    port: Port,
    kind: UltralightKind,
    memory: Shared<UltralightMemory>,
}

impl DummyUltralight {
    pub(crate) fn new(port: Port, kind: UltralightKind, id: &[u8]) -> Self {
        Self {
            port,
            kind,
            memory: Shared::new(UltralightMemory::new(kind, id)),
        }
    }

    /// Handle to the page memory
    pub fn memory(&self) -> Shared<UltralightMemory> {
        self.memory.clone()
    }
}

impl TagConnection for DummyUltralight {
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

impl UltralightTech for DummyUltralight {
    fn kind(&self) -> UltralightKind {
        self.kind
    }

    fn write_page(&mut self, page: u8, data: &[u8; 4]) -> TransportResult<()> {
        self.port.before_write()?;
        self.memory.lock().write(page, data)
    }

    fn transceive(&mut self, data: &[u8]) -> TransportResult<Vec<u8>> {
        self.port.ensure_connected()?;
        if self.port.faults().fail_wake {
            return Err(TransportError::Io(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                "no answer to wake-up",
            )));
        }

        match data.first() {
            Some(0x52) | Some(0x26) => {
                self.memory.lock().wakes += 1;
                Ok(vec![0x44, 0x00])
            }
            _ => Err(TransportError::Rejected(format!("unsupported command {:02X?}", data))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{DummyTag, Faults};
    use bttag_core::decode::decode_tag_payload;
    use bttag_core::error::{Error, Step};
    use bttag_core::tech::Tag;
    use bttag_core::writer::{CancelToken, TechWriter, UltralightWriter};
    use bttag_core::{medium, TagInformation, Technology};

    fn info() -> TagInformation {
        TagInformation::new("00:1A:7D:DA:71:13".parse().unwrap(), "Car Kit")
    }

    fn write(tag: &mut DummyTag, info: &TagInformation) -> bttag_core::Result<bttag_core::writer::WriteOutcome> {
        let medium = medium::resolve(&mut *tag)?;
        medium.writer().write_to_tag(&mut *tag, info, &CancelToken::new())
    }

    #[test]
    fn test_write_ultralight_c() {
        let mut tag = DummyTag::ultralight(UltralightKind::UltralightC);
        let memory = tag.ultralight_memory().unwrap();

        let outcome = write(&mut tag, &info()).unwrap();
        assert_eq!(outcome.technology, Technology::Ultralight);
        assert!(!outcome.locked);

        let memory = memory.lock();
        assert_eq!(decode_tag_payload(&memory.data_area()).unwrap(), info());
        assert_eq!(memory.page(CC_PAGE), [0xE1, 0x11, 0x12, 0x00]);
        assert!(!memory.is_locked());

        // Payload pages in order, then the capability container
        let pages = outcome.payload_len.div_ceil(PAGE_SIZE) as u8;
        let mut expected: Vec<u8> = (4..4 + pages).collect();
        expected.push(3);
        assert_eq!(memory.write_log(), expected.as_slice());
        assert!(!tag.port().is_connected());
    }

    #[test]
    fn test_last_page_zero_padded() {
        let mut tag = DummyTag::ultralight(UltralightKind::UltralightC);
        let memory = tag.ultralight_memory().unwrap();
        {
            let mut memory = memory.lock();
            for page in 4..48 {
                memory.pages[page] = [0xAA; 4];
            }
        }

        let outcome = write(&mut tag, &info()).unwrap();
        let memory = memory.lock();
        let data = memory.data_area();
        let written = outcome.payload_len.div_ceil(PAGE_SIZE) * PAGE_SIZE;
        assert!(data[outcome.payload_len..written].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_write_read_only() {
        let mut tag = DummyTag::ultralight(UltralightKind::UltralightC);
        let memory = tag.ultralight_memory().unwrap();

        let outcome = write(&mut tag, &info().with_read_only(true)).unwrap();
        assert!(outcome.locked);
        {
            let memory = memory.lock();
            assert_eq!(memory.page(CC_PAGE), [0xE1, 0x11, 0x12, 0x0F]);
            assert_eq!(&memory.page(LOCK_PAGE)[2..], &[0xFF, 0xFF]);
            assert!(memory.is_locked());
            assert_eq!(memory.wakes(), 1);
            assert_eq!(&memory.write_log()[memory.write_log().len() - 2..], &[3, 2]);
        }

        assert!(matches!(write(&mut tag, &info()), Err(Error::WriteProtected)));
    }

    #[test]
    fn test_wake_failure_ignored() {
        let mut tag = DummyTag::ultralight(UltralightKind::UltralightC).with_faults(Faults {
            fail_wake: true,
            ..Faults::default()
        });
        let memory = tag.ultralight_memory().unwrap();

        let outcome = write(&mut tag, &info().with_read_only(true)).unwrap();
        assert!(outcome.locked);
        assert!(memory.lock().is_locked());
        assert_eq!(memory.lock().wakes(), 0);
    }

    #[test]
    fn test_too_small_writes_nothing() {
        let mut tag = DummyTag::ultralight(UltralightKind::Ultralight);
        let memory = tag.ultralight_memory().unwrap();

        let err = write(&mut tag, &info()).unwrap_err();
        assert!(matches!(err, Error::OutOfSpace { .. }));
        assert_eq!(tag.port().writes(), 0);
        assert!(memory.lock().write_log().is_empty());
        assert!(!tag.port().is_connected());
    }

    #[test]
    fn test_long_name_dropped() {
        let mut tag = DummyTag::ultralight(UltralightKind::UltralightC);
        let memory = tag.ultralight_memory().unwrap();
        let info = TagInformation::new("00:1A:7D:DA:71:13".parse().unwrap(), "n".repeat(120));

        write(&mut tag, &info).unwrap();
        let read = decode_tag_payload(&memory.lock().data_area()).unwrap();
        assert_eq!(read.name(), "");
        assert_eq!(read.address(), info.address());
    }

    #[test]
    fn test_tag_lost_mid_write() {
        let mut tag = DummyTag::ultralight(UltralightKind::UltralightC).with_faults(Faults {
            lose_after_writes: Some(3),
            ..Faults::default()
        });
        let memory = tag.ultralight_memory().unwrap();

        let err = UltralightWriter::new(UltralightKind::UltralightC)
            .write_to_tag(&mut tag, &info(), &CancelToken::new())
            .unwrap_err();
        assert_eq!(err.step(), Some(Step::Write));
        assert_eq!(memory.lock().write_log(), &[4, 5, 6]);
        // The capability container was never written
        assert_eq!(memory.lock().page(CC_PAGE), [0; 4]);
    }

    #[test]
    fn test_connect_failure() {
        let mut tag = DummyTag::ultralight(UltralightKind::UltralightC).with_faults(Faults {
            fail_connect: true,
            ..Faults::default()
        });
        let err = write(&mut tag, &info()).unwrap_err();
        assert_eq!(err.step(), Some(Step::Connect));
    }

    #[test]
    fn test_factory_pages_protected() {
        let mut tag = DummyTag::ultralight(UltralightKind::Ultralight);
        let ultralight = tag.ultralight().unwrap();
        ultralight.connect().unwrap();
        assert!(matches!(
            ultralight.write_page(0, &[0; 4]),
            Err(TransportError::Rejected(_))
        ));
        assert!(matches!(
            ultralight.write_page(16, &[0; 4]),
            Err(TransportError::Rejected(_))
        ));
    }
}
