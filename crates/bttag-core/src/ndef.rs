//! NDEF records and messages
//!
//! Only the subset needed for Bluetooth OOB tags is modelled: unchunked
//! records with short or long payload length. [`build_ndef_message`] turns
//! [`TagInformation`] into the message written to a tag.

use crate::bssp::{self, BsspData};
use crate::error::{Error, Result};
use crate::info::{TagFormat, TagInformation};

/// Message begin
const FLAG_MB: u8 = 0x80;
/// Message end
const FLAG_ME: u8 = 0x40;
/// Chunk flag
const FLAG_CF: u8 = 0x20;
/// Short record
const FLAG_SR: u8 = 0x10;
/// ID length present
const FLAG_IL: u8 = 0x08;
const TNF_MASK: u8 = 0x07;

/// Largest payload a short record can carry
const SHORT_RECORD_MAX: usize = u8::MAX as usize;

/// Extra header bytes of a long record over a short one
const LONG_RECORD_EXTRA: usize = 3;

/// ID of the record carrying the OOB data
pub const RECORD_ID: u8 = 0x01;

/// Connection Handover version 1.2
pub const HANDOVER_VERSION: u8 = 0x12;

/// Handover Select record type
pub const RTD_HANDOVER_SELECT: &[u8] = b"Hs";

/// Alternative Carrier record type
pub const RTD_ALTERNATIVE_CARRIER: &[u8] = b"ac";

/// Carrier power state "active"
const CPS_ACTIVE: u8 = 0x01;

/// Type name format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Tnf {
    /// No type
    Empty = 0x00,
    /// NFC Forum well-known type
    WellKnown = 0x01,
    /// RFC 2046 media type
    MimeMedia = 0x02,
    /// Absolute URI
    AbsoluteUri = 0x03,
    /// NFC Forum external type
    External = 0x04,
    /// Unknown
    Unknown = 0x05,
    /// Continuation of a chunked record
    Unchanged = 0x06,
    /// Reserved
    Reserved = 0x07,
}

impl Tnf {
    fn from_bits(bits: u8) -> Self {
        match bits & TNF_MASK {
            0x00 => Tnf::Empty,
            0x01 => Tnf::WellKnown,
            0x02 => Tnf::MimeMedia,
            0x03 => Tnf::AbsoluteUri,
            0x04 => Tnf::External,
            0x05 => Tnf::Unknown,
            0x06 => Tnf::Unchanged,
            _ => Tnf::Reserved,
        }
    }
}

/// Header size of a record with the given field lengths
pub const fn record_overhead(type_len: usize, id_len: usize, payload_len: usize) -> usize {
    let payload_len_field = if payload_len <= SHORT_RECORD_MAX { 1 } else { 4 };
    let id_len_field = if id_len > 0 { 1 } else { 0 };
    2 + payload_len_field + id_len_field + type_len + id_len
}

/// A single NDEF record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NdefRecord {
    /// Type name format
    pub tnf: Tnf,
    /// Record type
    pub record_type: Vec<u8>,
    /// Record ID, empty when absent
    pub id: Vec<u8>,
    /// Payload
    pub payload: Vec<u8>,
}

impl NdefRecord {
    /// Media-type record
    pub fn mime(mime_type: &str, id: &[u8], payload: Vec<u8>) -> Self {
        Self {
            tnf: Tnf::MimeMedia,
            record_type: mime_type.as_bytes().to_vec(),
            id: id.to_vec(),
            payload,
        }
    }

    /// NFC Forum well-known record
    pub fn well_known(record_type: &[u8], payload: Vec<u8>) -> Self {
        Self {
            tnf: Tnf::WellKnown,
            record_type: record_type.to_vec(),
            id: Vec::new(),
            payload,
        }
    }

    /// Encoded size
    pub fn encoded_len(&self) -> usize {
        record_overhead(self.record_type.len(), self.id.len(), self.payload.len())
            + self.payload.len()
    }

    /// Encode as a message of its own (MB and ME set)
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.encoded_len());
        self.write(&mut out, true, true);
        out
    }

    fn write(&self, out: &mut Vec<u8>, first: bool, last: bool) {
        let short = self.payload.len() <= SHORT_RECORD_MAX;

        let mut header = self.tnf as u8;
        if first {
            header |= FLAG_MB;
        }
        if last {
            header |= FLAG_ME;
        }
        if short {
            header |= FLAG_SR;
        }
        if !self.id.is_empty() {
            header |= FLAG_IL;
        }

        out.push(header);
        out.push(self.record_type.len() as u8);
        if short {
            out.push(self.payload.len() as u8);
        } else {
            out.extend_from_slice(&(self.payload.len() as u32).to_be_bytes());
        }
        if !self.id.is_empty() {
            out.push(self.id.len() as u8);
        }
        out.extend_from_slice(&self.record_type);
        out.extend_from_slice(&self.id);
        out.extend_from_slice(&self.payload);
    }
}

/// An NDEF message
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NdefMessage {
    /// Records in order
    pub records: Vec<NdefRecord>,
}

impl NdefMessage {
    /// Message from records
    pub fn new(records: Vec<NdefRecord>) -> Self {
        Self { records }
    }

    /// Encoded size
    pub fn encoded_len(&self) -> usize {
        self.records.iter().map(NdefRecord::encoded_len).sum()
    }

    /// Encode the message
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.encoded_len());
        let last = self.records.len().saturating_sub(1);
        for (i, record) in self.records.iter().enumerate() {
            record.write(&mut out, i == 0, i == last);
        }
        out
    }

    /// Parse an encoded message
    ///
    /// Parsing stops after the record carrying the ME flag; bytes after it
    /// are ignored. Chunked records are not supported.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let mut records = Vec::new();
        let mut reader = Reader::new(bytes);

        loop {
            let header = reader.byte("record header")?;
            if header & FLAG_CF != 0 {
                return Err(Error::MalformedData("chunked NDEF records are not supported".into()));
            }

            let type_len = reader.byte("type length")? as usize;
            let payload_len = if header & FLAG_SR != 0 {
                reader.byte("payload length")? as usize
            } else {
                let b = reader.take(4, "payload length")?;
                u32::from_be_bytes([b[0], b[1], b[2], b[3]]) as usize
            };
            let id_len = if header & FLAG_IL != 0 {
                reader.byte("id length")? as usize
            } else {
                0
            };

            let record_type = reader.take(type_len, "record type")?.to_vec();
            let id = reader.take(id_len, "record id")?.to_vec();
            let payload = reader.take(payload_len, "record payload")?.to_vec();

            records.push(NdefRecord {
                tnf: Tnf::from_bits(header),
                record_type,
                id,
                payload,
            });

            if header & FLAG_ME != 0 {
                break;
            }
        }

        Ok(Self { records })
    }

    /// First media-type record of the given type
    pub fn find_mime(&self, mime_type: &str) -> Option<&NdefRecord> {
        self.records
            .iter()
            .find(|r| r.tnf == Tnf::MimeMedia && r.record_type == mime_type.as_bytes())
    }

    /// Whether the message starts with a Handover Select record
    pub fn is_handover(&self) -> bool {
        self.records
            .first()
            .is_some_and(|r| r.tnf == Tnf::WellKnown && r.record_type == RTD_HANDOVER_SELECT)
    }
}

struct Reader<'a> {
    data: &'a [u8],
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data }
    }

    fn byte(&mut self, what: &str) -> Result<u8> {
        Ok(self.take(1, what)?[0])
    }

    fn take(&mut self, len: usize, what: &str) -> Result<&'a [u8]> {
        if len > self.data.len() {
            return Err(Error::MalformedData(format!(
                "NDEF {} truncated: need {} bytes, {} left",
                what,
                len,
                self.data.len()
            )));
        }
        let (head, tail) = self.data.split_at(len);
        self.data = tail;
        Ok(head)
    }
}

/// Handover Select record pointing at the OOB carrier record
fn handover_select_record() -> NdefRecord {
    let ac = NdefRecord::well_known(
        RTD_ALTERNATIVE_CARRIER,
        vec![CPS_ACTIVE, 1, RECORD_ID, 0x00],
    );

    let mut payload = vec![HANDOVER_VERSION];
    payload.extend_from_slice(&ac.to_bytes());
    NdefRecord::well_known(RTD_HANDOVER_SELECT, payload)
}

/// Build the NDEF message for a tag
///
/// `size_limit` is the largest encoded message the medium can hold; `None`
/// builds the full message without dropping anything.
pub fn build_ndef_message(info: &TagInformation, size_limit: Option<usize>) -> Result<NdefMessage> {
    let mime_len = bssp::MIME_TYPE.len();

    let mut records = Vec::with_capacity(2);
    if info.format() == TagFormat::Handover {
        records.push(handover_select_record());
    }
    let leading: usize = records.iter().map(NdefRecord::encoded_len).sum();

    let bssp_limit = match size_limit {
        None => bssp::MAX_SIZE,
        Some(limit) => {
            let min_record = record_overhead(mime_len, 1, bssp::MIN_SIZE) + bssp::MIN_SIZE;
            if leading + min_record > limit {
                log::debug!(
                    "Minimum message is {} bytes, limit {}",
                    leading + min_record,
                    limit
                );
                return Err(Error::OutOfSpace {
                    needed: leading + min_record,
                    available: limit,
                });
            }

            let budget = limit - leading - record_overhead(mime_len, 1, 0);
            if budget <= SHORT_RECORD_MAX {
                budget
            } else {
                // Leave room for the long payload length field
                (budget - LONG_RECORD_EXTRA).max(SHORT_RECORD_MAX)
            }
        }
    };

    let data = BsspData::from(info);
    let payload = bssp::encode(&data, bssp_limit)?;
    records.push(NdefRecord::mime(bssp::MIME_TYPE, &[RECORD_ID], payload));

    let message = NdefMessage::new(records);
    let len = message.encoded_len();
    log::debug!("NDEF message {} bytes ({} format)", len, info.format());

    if let Some(limit) = size_limit {
        if len > limit {
            return Err(Error::OutOfSpace {
                needed: len,
                available: limit,
            });
        }
    }

    Ok(message)
}
