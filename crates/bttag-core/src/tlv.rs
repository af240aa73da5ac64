//! TLV framing of NDEF messages in raw tag memory
//!
//! ```text
//! [0x03][len][message...]              len < 255
//! [0x03][0xFF][len_hi][len_lo][message...]
//! ```

use crate::error::{Error, Result};

/// NULL TLV, a single padding byte
pub const TLV_NULL: u8 = 0x00;
/// NDEF message TLV
pub const TLV_NDEF_MESSAGE: u8 = 0x03;
/// Terminator TLV
pub const TLV_TERMINATOR: u8 = 0xFE;

/// Length byte announcing a 3-byte length field
const LONG_FORM: u8 = 0xFF;

/// Header size of the short form
pub const SHORT_HEADER: usize = 2;
/// Header size of the long form
pub const LONG_HEADER: usize = 4;

/// Header size needed for a message of `len` bytes
pub const fn header_len(len: usize) -> usize {
    if len < LONG_FORM as usize {
        SHORT_HEADER
    } else {
        LONG_HEADER
    }
}

/// Wrap an encoded NDEF message in an NDEF message TLV
pub fn wrap(message: &[u8]) -> Result<Vec<u8>> {
    if message.len() > u16::MAX as usize {
        return Err(Error::OutOfSpace {
            needed: message.len(),
            available: u16::MAX as usize,
        });
    }

    let mut out = Vec::with_capacity(header_len(message.len()) + message.len());
    out.push(TLV_NDEF_MESSAGE);
    if message.len() < LONG_FORM as usize {
        out.push(message.len() as u8);
    } else {
        out.push(LONG_FORM);
        out.extend_from_slice(&(message.len() as u16).to_be_bytes());
    }
    out.extend_from_slice(message);
    Ok(out)
}

/// Find the first NDEF message TLV in raw memory and return its value
///
/// NULL TLVs are skipped, other TLVs are stepped over by their length.
/// Hitting the terminator before an NDEF TLV is an error.
pub fn unwrap(data: &[u8]) -> Result<&[u8]> {
    let mut pos = 0;

    while pos < data.len() {
        let tag = data[pos];
        pos += 1;

        match tag {
            TLV_NULL => continue,
            TLV_TERMINATOR => break,
            _ => {}
        }

        let (len, header) = match data.get(pos) {
            None => break,
            Some(&LONG_FORM) => match data.get(pos + 1..pos + 3) {
                Some(b) => (u16::from_be_bytes([b[0], b[1]]) as usize, 3),
                None => break,
            },
            Some(&len) => (len as usize, 1),
        };
        pos += header;

        if pos + len > data.len() {
            return Err(Error::MalformedData(format!(
                "TLV 0x{:02X} of {} bytes runs past end of data",
                tag, len
            )));
        }

        if tag == TLV_NDEF_MESSAGE {
            return Ok(&data[pos..pos + len]);
        }

        log::trace!("Skipping TLV 0x{:02X} ({} bytes)", tag, len);
        pos += len;
    }

    Err(Error::MalformedData("no NDEF message TLV found".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_form() {
        let out = wrap(&[1, 2, 3]).unwrap();
        assert_eq!(out, vec![0x03, 0x03, 1, 2, 3]);
        assert_eq!(unwrap(&out).unwrap(), &[1, 2, 3]);
    }

    #[test]
    fn test_long_form() {
        let message = vec![0xAB; 300];
        let out = wrap(&message).unwrap();
        assert_eq!(&out[..4], &[0x03, 0xFF, 0x01, 0x2C]);
        assert_eq!(out.len(), 304);
        assert_eq!(unwrap(&out).unwrap(), message.as_slice());

        // 254 is the last length that fits the short form
        assert_eq!(wrap(&[0; 254]).unwrap().len(), 256);
        assert_eq!(wrap(&[0; 255]).unwrap()[1], 0xFF);
    }

    #[test]
    fn test_unwrap_skips_other_tlvs() {
        // NULL, lock control TLV, then NDEF, then terminator and padding
        let data = [0x00, 0x01, 0x03, 0xA0, 0x10, 0x44, 0x03, 0x02, 0xD0, 0x00, 0xFE, 0x00];
        assert_eq!(unwrap(&data).unwrap(), &[0xD0, 0x00]);
    }

    #[test]
    fn test_unwrap_errors() {
        assert!(unwrap(&[]).is_err());
        assert!(unwrap(&[0xFE, 0x03, 0x01, 0x00]).is_err());
        assert!(matches!(
            unwrap(&[0x03, 0x05, 0x01]),
            Err(Error::MalformedData(_))
        ));
    }
}
