//! Emulated Mifare Classic
//!
//! Only 4-block sectors are modelled. Authentication compares against key
//! A of the sector trailer; a block write needs the sector of the block to
//! be the one last authenticated and access bits that let key A write it.

use bttag_core::tech::{ClassicTech, TagConnection, TransportError, TransportResult};

use crate::{Port, Shared};

const BLOCK_SIZE: usize = 16;
const BLOCKS_PER_SECTOR: usize = 4;

/// Trailer of a factory fresh sector: default keys, transport access bits
pub const FACTORY_TRAILER: [u8; BLOCK_SIZE] = [
    0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x07, 0x80, 0x69, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF,
    0xFF,
];

/// Classic block memory
#[derive(Debug)]
pub struct ClassicMemory {
    blocks: Vec<[u8; BLOCK_SIZE]>,
    authenticated: Option<usize>,
    trailer_writes: usize,
    write_log: Vec<usize>,
}

impl ClassicMemory {
    fn new(sectors: usize, id: &[u8]) -> Self {
        let mut blocks = vec![[0u8; BLOCK_SIZE]; sectors * BLOCKS_PER_SECTOR];
        for sector in 0..sectors {
            blocks[Self::trailer_of(sector)] = FACTORY_TRAILER;
        }

        if let Some(manufacturer) = blocks.first_mut() {
            let n = id.len().min(4);
            manufacturer[..n].copy_from_slice(&id[..n]);
            manufacturer[4] = manufacturer[..4].iter().fold(0, |acc, b| acc ^ b);
            manufacturer[5] = 0x08;
        }

        Self {
            blocks,
            authenticated: None,
            trailer_writes: 0,
            write_log: Vec::new(),
        }
    }

    fn trailer_of(sector: usize) -> usize {
        sector * BLOCKS_PER_SECTOR + BLOCKS_PER_SECTOR - 1
    }

    fn sectors(&self) -> usize {
        self.blocks.len() / BLOCKS_PER_SECTOR
    }

    /// Contents of one block
    pub fn block(&self, block: usize) -> [u8; BLOCK_SIZE] {
        self.blocks[block]
    }

    /// Key A stored in a sector trailer
    pub fn key_a(&self, sector: usize) -> [u8; 6] {
        let mut key = [0u8; 6];
        key.copy_from_slice(&self.blocks[Self::trailer_of(sector)][..6]);
        key
    }

    /// Replace key A of a sector
    pub fn set_key_a(&mut self, sector: usize, key: [u8; 6]) {
        self.blocks[Self::trailer_of(sector)][..6].copy_from_slice(&key);
    }

    /// Number of sector trailer writes so far
    pub fn trailer_writes(&self) -> usize {
        self.trailer_writes
    }

    /// Block numbers in the order they were written
    pub fn write_log(&self) -> &[usize] {
        &self.write_log
    }

    /// Data blocks from sector 1 on, trailers skipped
    pub fn data_area(&self) -> Vec<u8> {
        self.blocks
            .iter()
            .enumerate()
            .skip(BLOCKS_PER_SECTOR)
            .filter(|(i, _)| (i + 1) % BLOCKS_PER_SECTOR != 0)
            .flat_map(|(_, block)| block.iter().copied())
            .collect()
    }

    /// Whether key A may write `block` under its sector's access bits
    fn key_a_may_write(&self, block: usize) -> bool {
        let trailer = &self.blocks[Self::trailer_of(block / BLOCKS_PER_SECTOR)];
        let n = block % BLOCKS_PER_SECTOR;
        let c1 = (trailer[7] >> (4 + n)) & 1;
        let c2 = (trailer[8] >> n) & 1;
        let c3 = (trailer[8] >> (4 + n)) & 1;

        if n == BLOCKS_PER_SECTOR - 1 {
            // Trailer conditions 000 and 001
            c1 == 0 && c2 == 0
        } else {
            (c1, c2, c3) == (0, 0, 0)
        }
    }

    fn authenticate(&mut self, sector: usize, key: &[u8; 6]) -> TransportResult<bool> {
        if sector >= self.sectors() {
            return Err(TransportError::Rejected(format!("sector {} out of range", sector)));
        }

        if self.key_a(sector) == *key {
            self.authenticated = Some(sector);
            Ok(true)
        } else {
            self.authenticated = None;
            Ok(false)
        }
    }

    fn write(&mut self, block: usize, data: &[u8; BLOCK_SIZE]) -> TransportResult<()> {
        if block >= self.blocks.len() {
            return Err(TransportError::Rejected(format!("block {} out of range", block)));
        }
        if block == 0 {
            return Err(TransportError::Rejected("manufacturer block is read-only".into()));
        }
        if self.authenticated != Some(block / BLOCKS_PER_SECTOR) {
            return Err(TransportError::Rejected(format!(
                "sector {} not authenticated",
                block / BLOCKS_PER_SECTOR
            )));
        }
        if !self.key_a_may_write(block) {
            return Err(TransportError::ReadOnly);
        }

        self.blocks[block] = *data;
        if (block + 1) % BLOCKS_PER_SECTOR == 0 {
            self.trailer_writes += 1;
        }
        self.write_log.push(block);
        Ok(())
    }
}

/// Emulated Classic technology
pub struct DummyClassic {
    port: Port,
    memory: Shared<ClassicMemory>,
}

impl DummyClassic {
    pub(crate) fn new(port: Port, sectors: usize, id: &[u8]) -> Self {
        Self {
            port,
            memory: Shared::new(ClassicMemory::new(sectors, id)),
        }
    }

    /// Handle to the block memory
    pub fn memory(&self) -> Shared<ClassicMemory> {
        self.memory.clone()
    }
}

impl TagConnection for DummyClassic {
    fn connect(&mut self) -> TransportResult<()> {
        self.port.connect()
    }

    fn is_connected(&self) -> bool {
        self.port.is_connected()
    }

    fn close(&mut self) -> TransportResult<()> {
        self.memory.lock().authenticated = None;
        self.port.close()
    }
}

impl ClassicTech for DummyClassic {
    fn sector_count(&self) -> usize {
        self.memory.lock().sectors()
    }

    fn authenticate_sector_with_key_a(
        &mut self,
        sector: usize,
        key: &[u8; 6],
    ) -> TransportResult<bool> {
        self.port.ensure_connected()?;
        self.memory.lock().authenticate(sector, key)
    }

    fn write_block(&mut self, block: usize, data: &[u8; 16]) -> TransportResult<()> {
        self.port.before_write()?;
        self.memory.lock().write(block, data)
    }
}
