//! Mifare Classic writer
//!
//! Classic memory is split into sectors of four 16-byte blocks; the last
//! block of each sector is the trailer holding the keys and access bits.
//! Block 0 is the manufacturer block and sector 0 holds the MIFARE
//! Application Directory. The NDEF TLV starts at block 4 and fills the
//! three data blocks of each following sector. Locking rewrites the trailer
//! of every NDEF sector with read-only access conditions.

use super::{generate_payload, CancelToken, Connected, TechWriter, WriteOutcome};
use crate::error::{Error, Result, Step};
use crate::info::TagInformation;
use crate::medium::Technology;
use crate::tech::{ClassicTech, Tag};

/// Bytes per block
pub const BLOCK_SIZE: usize = 16;
/// Blocks per sector
pub const BLOCKS_PER_SECTOR: usize = 4;
/// Data blocks per sector
const DATA_BLOCKS_PER_SECTOR: usize = BLOCKS_PER_SECTOR - 1;

/// Key A of the MAD sector
pub const KEY_MAD: [u8; 6] = [0xA0, 0xA1, 0xA2, 0xA3, 0xA4, 0xA5];
/// Key A of NFC Forum data sectors
pub const KEY_NFC_FORUM: [u8; 6] = [0xD3, 0xF7, 0xD3, 0xF7, 0xD3, 0xF7];
/// Factory key
pub const KEY_DEFAULT: [u8; 6] = [0xFF; 6];

/// Keys tried on a sector that is not yet formatted
const CANDIDATE_KEYS: [[u8; 6]; 3] = [KEY_DEFAULT, KEY_NFC_FORUM, KEY_MAD];

const MAD_BLOCK_1: usize = 1;
const MAD_BLOCK_2: usize = 2;

/// MAD block 1: CRC, info byte, then sector 1 assigned to NDEF (0x03E1)
const MAD_BLOCK_1_DATA: [u8; BLOCK_SIZE] = [
    0xF3, 0x01, 0x03, 0xE1, 0x03, 0xE1, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
];

/// Access bytes for the three access condition nibbles
///
/// Bit `n` of each nibble is the condition bit for block `n` of the sector.
pub fn access_bytes(c1: u8, c2: u8, c3: u8) -> [u8; 3] {
    let (c1, c2, c3) = (c1 & 0x0F, c2 & 0x0F, c3 & 0x0F);
    [
        !((c2 << 4) | c1),
        ((c1 << 4) | c3) ^ 0x0F,
        (c3 << 4) | c2,
    ]
}

/// General purpose byte carrying the MAD version
pub fn general_purpose_byte(major: u8, minor: u8) -> u8 {
    ((major & 0x03) << 6) | ((minor & 0x03) << 4)
}

/// Write access nibble of the general purpose byte for a read-only sector
const GPB_READ_ONLY: u8 = 0x03;

/// Access conditions a sector trailer grants
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectorAccess {
    /// Data blocks readable and writable with key A, trailer rewritable
    ReadWrite,
    /// Data blocks readable with key A, nothing writable
    ReadOnly,
}

impl SectorAccess {
    /// Access bytes 6..9 of the trailer
    pub fn access_bytes(self) -> [u8; 3] {
        match self {
            // Data blocks 000, trailer 001
            SectorAccess::ReadWrite => access_bytes(0, 0, 0b1000),
            // Data blocks 010, trailer 110
            SectorAccess::ReadOnly => access_bytes(0b1000, 0b1111, 0),
        }
    }

    /// General purpose byte of the trailer
    pub fn general_purpose_byte(self) -> u8 {
        match self {
            SectorAccess::ReadWrite => general_purpose_byte(1, 0),
            SectorAccess::ReadOnly => general_purpose_byte(1, 0) | GPB_READ_ONLY,
        }
    }
}

/// Whether `block` is a sector trailer
pub fn is_trailer(block: usize) -> bool {
    (block + 1) % BLOCKS_PER_SECTOR == 0
}

fn sector_trailer(key_a: &[u8; 6], key_b: &[u8; 6], access: SectorAccess) -> [u8; BLOCK_SIZE] {
    let mut trailer = [0u8; BLOCK_SIZE];
    trailer[..6].copy_from_slice(key_a);
    trailer[6..9].copy_from_slice(&access.access_bytes());
    trailer[9] = access.general_purpose_byte();
    trailer[10..].copy_from_slice(key_b);
    trailer
}

/// Write a sector trailer; refuses any block that is not a trailer
pub fn write_sector_trailer<T: ClassicTech + ?Sized>(
    tech: &mut T,
    block: usize,
    key_a: &[u8; 6],
    key_b: &[u8; 6],
    access: SectorAccess,
    step: Step,
) -> Result<()> {
    if !is_trailer(block) {
        return Err(Error::InvalidBlock {
            block,
            reason: "not a sector trailer",
        });
    }

    let trailer = sector_trailer(key_a, key_b, access);
    log::trace!("Sector trailer for block {}: {:02X?}", block, trailer);
    tech.write_block(block, &trailer).map_err(|e| Error::io(step, e))
}

/// Write a data block; refuses the manufacturer block and trailers
pub fn write_block_data<T: ClassicTech + ?Sized>(
    tech: &mut T,
    block: usize,
    data: &[u8; BLOCK_SIZE],
    step: Step,
) -> Result<()> {
    if block == 0 {
        return Err(Error::InvalidBlock {
            block,
            reason: "manufacturer block",
        });
    }
    if is_trailer(block) {
        return Err(Error::InvalidBlock {
            block,
            reason: "sector trailer",
        });
    }

    tech.write_block(block, data).map_err(|e| Error::io(step, e))
}

fn trailer_block(sector: usize) -> usize {
    sector * BLOCKS_PER_SECTOR + BLOCKS_PER_SECTOR - 1
}

fn authenticate<T: ClassicTech + ?Sized>(
    tech: &mut T,
    sector: usize,
    key: &[u8; 6],
    step: Step,
) -> Result<bool> {
    tech.authenticate_sector_with_key_a(sector, key)
        .map_err(|e| Error::io(step, e))
}

/// Format sectors `0..sectors` for NDEF unless already formatted
///
/// A sector that opens with its formatted key is left alone, so running
/// this twice rewrites nothing the second time. Returns the number of
/// sectors initialized.
pub fn ndef_format<T: ClassicTech + ?Sized>(
    tech: &mut T,
    sectors: usize,
    cancel: &CancelToken,
) -> Result<usize> {
    let mut initialized = 0;

    for sector in 0..sectors {
        let key_a = if sector == 0 { &KEY_MAD } else { &KEY_NFC_FORUM };

        cancel.check(Step::Format)?;
        if authenticate(tech, sector, key_a, Step::Format)? {
            log::debug!("Skip sector {}", sector);
            continue;
        }

        let mut opened = false;
        for key in &CANDIDATE_KEYS {
            cancel.check(Step::Format)?;
            if authenticate(tech, sector, key, Step::Format)? {
                opened = true;
                break;
            }
        }
        if !opened {
            log::error!("No key opens sector {}", sector);
            return Err(Error::AuthenticationFailed { sector });
        }

        cancel.check(Step::Format)?;
        write_sector_trailer(
            tech,
            trailer_block(sector),
            key_a,
            &KEY_DEFAULT,
            SectorAccess::ReadWrite,
            Step::Format,
        )?;

        if sector == 0 {
            cancel.check(Step::Format)?;
            write_block_data(tech, MAD_BLOCK_2, &[0u8; BLOCK_SIZE], Step::Format)?;
            cancel.check(Step::Format)?;
            write_block_data(tech, MAD_BLOCK_1, &MAD_BLOCK_1_DATA, Step::Format)?;
        }

        initialized += 1;
    }

    log::debug!("{} sectors initialized", initialized);
    Ok(initialized)
}

/// Write `payload` to the data blocks from sector 1 onwards
pub fn write_data<T: ClassicTech + ?Sized>(
    tech: &mut T,
    payload: &[u8],
    cancel: &CancelToken,
) -> Result<()> {
    let sector_bytes = DATA_BLOCKS_PER_SECTOR * BLOCK_SIZE;

    for (i, sector_data) in payload.chunks(sector_bytes).enumerate() {
        let sector = i + 1;

        cancel.check(Step::Write)?;
        if !authenticate(tech, sector, &KEY_NFC_FORUM, Step::Write)? {
            return Err(Error::AuthenticationFailed { sector });
        }

        for (j, chunk) in sector_data.chunks(BLOCK_SIZE).enumerate() {
            let mut block = [0u8; BLOCK_SIZE];
            block[..chunk.len()].copy_from_slice(chunk);

            cancel.check(Step::Write)?;
            write_block_data(tech, sector * BLOCKS_PER_SECTOR + j, &block, Step::Write)?;
        }
    }

    Ok(())
}

/// Make NDEF sectors `1..sectors` read-only
///
/// Irreversible: the new trailers allow no further writes with either key.
pub fn lock_sectors<T: ClassicTech + ?Sized>(
    tech: &mut T,
    sectors: usize,
    cancel: &CancelToken,
) -> Result<()> {
    for sector in 1..sectors {
        cancel.check(Step::Write)?;
        if !authenticate(tech, sector, &KEY_NFC_FORUM, Step::Write)? {
            return Err(Error::AuthenticationFailed { sector });
        }

        cancel.check(Step::Write)?;
        write_sector_trailer(
            tech,
            trailer_block(sector),
            &KEY_NFC_FORUM,
            &KEY_DEFAULT,
            SectorAccess::ReadOnly,
            Step::Write,
        )?;
    }

    log::debug!("Locked {} sectors", sectors.saturating_sub(1));
    Ok(())
}

/// Writer for Mifare Classic
#[derive(Debug, Clone, Copy)]
pub struct ClassicWriter {
    sectors: usize,
}

impl ClassicWriter {
    /// Writer using `sectors` 4-block sectors
    pub fn new(sectors: usize) -> Self {
        Self { sectors }
    }

    /// Bytes available for the TLV payload: every data block after sector 0
    pub fn capacity(&self) -> usize {
        self.sectors.saturating_sub(1) * DATA_BLOCKS_PER_SECTOR * BLOCK_SIZE
    }
}

impl TechWriter for ClassicWriter {
    fn technology(&self) -> Technology {
        Technology::Classic
    }

    fn write_to_tag(
        &self,
        tag: &mut dyn Tag,
        info: &TagInformation,
        cancel: &CancelToken,
    ) -> Result<WriteOutcome> {
        let classic = tag.classic().ok_or(Error::UnsupportedMedium)?;

        cancel.check(Step::Connect)?;
        let mut classic = Connected::open(classic)?;

        let payload = generate_payload(info, self.capacity())?;
        log::debug!(
            "Writing {} bytes to Classic tag with {} sectors",
            payload.len(),
            self.sectors
        );

        ndef_format(&mut *classic, self.sectors, cancel)?;
        write_data(&mut *classic, &payload, cancel)?;

        let locked = info.read_only();
        if locked {
            lock_sectors(&mut *classic, self.sectors, cancel)?;
        }

        classic.close()?;

        Ok(WriteOutcome {
            technology: Technology::Classic,
            payload_len: payload.len(),
            locked,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_access_bytes() {
        assert_eq!(access_bytes(0, 0, 0), [0xFF, 0x0F, 0x00]);
        // Transport configuration: only the trailer has C3 set
        assert_eq!(access_bytes(0, 0, 0b1000), [0xFF, 0x07, 0x80]);
    }

    #[test]
    fn test_general_purpose_byte() {
        assert_eq!(general_purpose_byte(1, 0), 0x40);
        assert_eq!(general_purpose_byte(0b111, 0b101), 0xD0);
    }

    #[test]
    fn test_trailer_layout() {
        let trailer = sector_trailer(&KEY_NFC_FORUM, &KEY_DEFAULT, SectorAccess::ReadWrite);
        assert_eq!(&trailer[..6], &KEY_NFC_FORUM);
        assert_eq!(&trailer[6..10], &[0xFF, 0x07, 0x80, 0x40]);
        assert_eq!(&trailer[10..], &KEY_DEFAULT);
    }

    #[test]
    fn test_read_only_trailer() {
        let trailer = sector_trailer(&KEY_NFC_FORUM, &KEY_DEFAULT, SectorAccess::ReadOnly);
        assert_eq!(&trailer[6..10], &[0x07, 0x8F, 0x0F, 0x43]);
    }

    #[test]
    fn test_trailer_blocks() {
        assert!(is_trailer(3));
        assert!(is_trailer(63));
        assert!(!is_trailer(0));
        assert!(!is_trailer(4));
    }

    #[test]
    fn test_capacity() {
        assert_eq!(ClassicWriter::new(16).capacity(), 15 * 48);
        assert_eq!(ClassicWriter::new(1).capacity(), 0);
        assert_eq!(ClassicWriter::new(0).capacity(), 0);
    }
}
