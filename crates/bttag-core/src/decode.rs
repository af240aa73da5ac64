//! Reading tag contents back into [`TagInformation`]

use crate::bssp;
use crate::error::{Error, Result};
use crate::info::{TagFormat, TagInformation};
use crate::ndef::NdefMessage;
use crate::tlv;

/// MB flag of the first record
const NDEF_MESSAGE_BEGIN: u8 = 0x80;

/// Recover tag information from tag contents
///
/// `data` is either raw tag memory holding an NDEF message TLV, or a bare
/// NDEF message as returned by an NDEF read. Tag memory is tried first; a
/// bare message is only considered when the first byte carries the MB flag.
/// Either message layout is accepted; the returned format reflects which
/// one was found. The PIN and read-only flag cannot be recovered and are
/// left at their defaults.
pub fn decode_tag_payload(data: &[u8]) -> Result<TagInformation> {
    let first = *data
        .first()
        .ok_or_else(|| Error::MalformedData("empty tag payload".into()))?;

    match tlv::unwrap(data).and_then(decode_message) {
        Ok(info) => Ok(info),
        Err(e) if first & NDEF_MESSAGE_BEGIN != 0 => {
            log::debug!("Not tag memory ({}), trying a bare message", e);
            decode_message(data)
        }
        Err(e) => Err(e),
    }
}

fn decode_message(bytes: &[u8]) -> Result<TagInformation> {
    let message = NdefMessage::parse(bytes)?;
    let record = message.find_mime(bssp::MIME_TYPE).ok_or_else(|| {
        Error::MalformedData(format!("no {} record in message", bssp::MIME_TYPE))
    })?;

    let data = bssp::decode(&record.payload)?;
    let format = if message.is_handover() {
        TagFormat::Handover
    } else {
        TagFormat::Simplified
    };

    Ok(TagInformation::new(data.address, data.name)
        .with_device_class(data.device_class)
        .with_format(format))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ndef::{build_ndef_message, NdefRecord};

    fn info() -> TagInformation {
        TagInformation::new("12:34:56:78:9A:BC".parse().unwrap(), "Headphones")
            .with_device_class(0x24_0404)
    }

    #[test]
    fn test_decode_bare_message() {
        let message = build_ndef_message(&info(), None).unwrap().to_bytes();
        assert_eq!(decode_tag_payload(&message).unwrap(), info());
    }

    #[test]
    fn test_decode_tlv() {
        let message = build_ndef_message(&info(), None).unwrap().to_bytes();
        let mut raw = tlv::wrap(&message).unwrap();
        raw.extend_from_slice(&[0x00; 7]);
        assert_eq!(decode_tag_payload(&raw).unwrap(), info());
    }

    #[test]
    fn test_decode_after_proprietary_tlv() {
        let message = build_ndef_message(&info(), None).unwrap().to_bytes();
        let mut raw = vec![0xFD, 0x02, 0xAA, 0xBB];
        raw.extend_from_slice(&tlv::wrap(&message).unwrap());
        raw.push(0xFE);
        assert_eq!(decode_tag_payload(&raw).unwrap(), info());
    }

    #[test]
    fn test_decode_handover() {
        let info = info().with_format(TagFormat::Handover);
        let message = build_ndef_message(&info, None).unwrap().to_bytes();
        assert_eq!(decode_tag_payload(&message).unwrap(), info);
    }

    #[test]
    fn test_pin_and_lock_not_recovered() {
        let written = info().with_pin("0000").with_read_only(true);
        let message = build_ndef_message(&written, None).unwrap().to_bytes();
        let read = decode_tag_payload(&message).unwrap();
        assert_eq!(read.pin(), None);
        assert!(!read.read_only());
    }

    #[test]
    fn test_decode_errors() {
        assert!(decode_tag_payload(&[]).is_err());

        let other = NdefRecord::well_known(b"T", b"\x02enhi".to_vec()).to_bytes();
        assert!(matches!(
            decode_tag_payload(&other),
            Err(Error::MalformedData(_))
        ));
    }
}
