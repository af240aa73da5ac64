//! Bluetooth Secure Simple Pairing OOB data
//!
//! Binary layout:
//!
//! ```text
//! +--------+----------------+-------------------------------------+
//! | len:2  | address:6      | EIR elements ...                    |
//! | (BE)   | (LSB first)    | {len:1, type:1, value:len-1} ...    |
//! +--------+----------------+-------------------------------------+
//! ```
//!
//! `len` covers the whole structure including itself. The encoder emits an
//! optional complete-local-name element, an optional legacy PIN element and
//! the class-of-device element, in that order.

use crate::error::{Error, Result};
use crate::info::{BtAddress, TagInformation, DEFAULT_DEVICE_CLASS};

/// MIME type of the NDEF record carrying OOB data
pub const MIME_TYPE: &str = "application/vnd.bluetooth.ep.oob";

/// EIR type: shortened local name
pub const EIR_SHORTENED_LOCAL_NAME: u8 = 0x08;
/// EIR type: complete local name
pub const EIR_COMPLETE_LOCAL_NAME: u8 = 0x09;
/// EIR type: class of device
pub const EIR_CLASS_OF_DEVICE: u8 = 0x0D;
/// EIR type used for the legacy PIN, outside the assigned range
pub const EIR_LEGACY_PIN: u8 = 0xF0;

const LENGTH_FIELD_SIZE: usize = 2;
const ADDRESS_SIZE: usize = 6;
const HEADER_SIZE: usize = LENGTH_FIELD_SIZE + ADDRESS_SIZE;
const CLASS_OF_DEVICE_SIZE: usize = 3;
/// Class-of-device element: length, type and three value bytes
const CLASS_ELEMENT_SIZE: usize = 2 + CLASS_OF_DEVICE_SIZE;

/// Smallest encoding: length field, address and class-of-device element
pub const MIN_SIZE: usize = HEADER_SIZE + CLASS_ELEMENT_SIZE;

/// Largest encoding the 16-bit length field can describe
pub const MAX_SIZE: usize = u16::MAX as usize;

/// Longest value an element length byte can describe
const MAX_VALUE_LEN: usize = u8::MAX as usize - 1;

/// Decoded OOB data
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BsspData {
    /// Device address
    pub address: BtAddress,
    /// Device name, empty when absent
    pub name: String,
    /// 24-bit class of device
    pub device_class: u32,
    /// Legacy PIN; written when there is room, never decoded
    pub pin: Option<String>,
}

impl Default for BsspData {
    fn default() -> Self {
        Self {
            address: BtAddress::default(),
            name: String::new(),
            device_class: DEFAULT_DEVICE_CLASS,
            pin: None,
        }
    }
}

impl From<&TagInformation> for BsspData {
    fn from(info: &TagInformation) -> Self {
        Self {
            address: info.address(),
            name: info.name().to_string(),
            device_class: info.device_class(),
            pin: info.pin().map(str::to_string),
        }
    }
}

/// Encode OOB data, keeping the result within `size_limit` bytes
///
/// The name and PIN elements are dropped entirely when they do not fit;
/// they are never truncated. The name gets the space first. Fails with
/// [`Error::OutOfSpace`] when even the mandatory structure does not fit.
pub fn encode(data: &BsspData, size_limit: usize) -> Result<Vec<u8>> {
    let size_limit = size_limit.min(MAX_SIZE);

    if size_limit < MIN_SIZE {
        return Err(Error::OutOfSpace {
            needed: MIN_SIZE,
            available: size_limit,
        });
    }

    let mut len = MIN_SIZE;
    let name = optional_element("name", data.name.as_bytes(), &mut len, size_limit);
    let pin = optional_element(
        "PIN",
        data.pin.as_deref().unwrap_or_default().as_bytes(),
        &mut len,
        size_limit,
    );

    let mut out = Vec::with_capacity(len);
    out.extend_from_slice(&(len as u16).to_be_bytes());
    out.extend_from_slice(&data.address.to_reversed());

    if !name.is_empty() {
        out.push((name.len() + 1) as u8);
        out.push(EIR_COMPLETE_LOCAL_NAME);
        out.extend_from_slice(name);
    }

    if !pin.is_empty() {
        out.push((pin.len() + 1) as u8);
        out.push(EIR_LEGACY_PIN);
        out.extend_from_slice(pin);
    }

    let class = data.device_class.to_be_bytes();
    out.push((CLASS_OF_DEVICE_SIZE + 1) as u8);
    out.push(EIR_CLASS_OF_DEVICE);
    out.extend_from_slice(&class[1..]);

    debug_assert_eq!(out.len(), len);
    Ok(out)
}

/// Keep an optional element value if it fits, growing `len` by its size
fn optional_element<'a>(
    what: &str,
    value: &'a [u8],
    len: &mut usize,
    size_limit: usize,
) -> &'a [u8] {
    if value.is_empty() {
        return value;
    }
    if value.len() > MAX_VALUE_LEN {
        log::warn!(
            "{} is {} bytes, longer than an EIR element allows; leaving it out",
            what,
            value.len()
        );
        return &[];
    }

    let element = 2 + value.len();
    if *len + element > size_limit {
        log::debug!(
            "No room for {} ({} + {} > {}), leaving it out",
            what,
            len,
            element,
            size_limit
        );
        return &[];
    }

    *len += element;
    value
}

/// Decode OOB data
///
/// Unknown element types are skipped. A zero element length ends the
/// significant part of the structure. Any element running past the end of
/// the data fails the whole decode.
pub fn decode(bytes: &[u8]) -> Result<BsspData> {
    if bytes.len() < HEADER_SIZE {
        return Err(Error::MalformedData(format!(
            "OOB data is {} bytes, header needs {}",
            bytes.len(),
            HEADER_SIZE
        )));
    }

    let total = u16::from_be_bytes([bytes[0], bytes[1]]) as usize;
    if total < HEADER_SIZE || total > bytes.len() {
        return Err(Error::MalformedData(format!(
            "OOB length field {} does not match {} available bytes",
            total,
            bytes.len()
        )));
    }
    let bytes = &bytes[..total];

    let mut address = [0u8; ADDRESS_SIZE];
    address.copy_from_slice(&bytes[LENGTH_FIELD_SIZE..HEADER_SIZE]);

    let mut complete_name: Option<String> = None;
    let mut shortened_name: Option<String> = None;
    let mut device_class = DEFAULT_DEVICE_CLASS;

    let mut rest = &bytes[HEADER_SIZE..];
    while let Some((&len, tail)) = rest.split_first() {
        let len = len as usize;
        if len == 0 {
            log::trace!("Zero length element, {} padding bytes ignored", tail.len());
            break;
        }
        if len > tail.len() {
            return Err(Error::MalformedData(format!(
                "EIR element of {} bytes with only {} remaining",
                len,
                tail.len()
            )));
        }

        let (element, next) = tail.split_at(len);
        let (kind, value) = (element[0], &element[1..]);

        match kind {
            EIR_COMPLETE_LOCAL_NAME => {
                if complete_name.is_none() {
                    complete_name = Some(decode_name(value)?);
                }
            }
            EIR_SHORTENED_LOCAL_NAME => {
                if shortened_name.is_none() {
                    shortened_name = Some(decode_name(value)?);
                }
            }
            EIR_CLASS_OF_DEVICE => {
                if value.len() != CLASS_OF_DEVICE_SIZE {
                    return Err(Error::MalformedData(format!(
                        "class of device is {} bytes",
                        value.len()
                    )));
                }
                device_class = u32::from_be_bytes([0, value[0], value[1], value[2]]);
            }
            EIR_LEGACY_PIN => log::trace!("Skipping PIN element"),
            other => log::warn!("Unknown EIR element 0x{:02X} ({} bytes)", other, value.len()),
        }

        rest = next;
    }

    let data = BsspData {
        address: BtAddress::from_reversed(address),
        name: complete_name.or(shortened_name).unwrap_or_default(),
        device_class,
        pin: None,
    };

    log::debug!("Parsed OOB data: '{}' '{}'", data.address, data.name);
    Ok(data)
}

fn decode_name(value: &[u8]) -> Result<String> {
    String::from_utf8(value.to_vec())
        .map_err(|_| Error::MalformedData("local name is not valid UTF-8".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data(name: &str) -> BsspData {
        BsspData {
            address: "AA:BB:CC:DD:EE:FF".parse().unwrap(),
            name: name.to_string(),
            device_class: 0x20_0404,
            pin: None,
        }
    }

    #[test]
    fn test_address_is_reversed() {
        let out = encode(&data(""), 32).unwrap();
        assert_eq!(&out[2..8], &[0xFF, 0xEE, 0xDD, 0xCC, 0xBB, 0xAA]);
    }

    #[test]
    fn test_encode_layout() {
        let out = encode(&data("Car"), 64).unwrap();
        assert_eq!(
            out,
            vec![
                0x00, 0x12, // total length 18
                0xFF, 0xEE, 0xDD, 0xCC, 0xBB, 0xAA, // address
                0x04, 0x09, b'C', b'a', b'r', // complete name
                0x04, 0x0D, 0x20, 0x04, 0x04, // class of device
            ]
        );
    }

    #[test]
    fn test_round_trip() {
        for name in ["", "Headset", "Äänentoisto", "車載オーディオ"] {
            let input = data(name);
            let out = encode(&input, 256).unwrap();
            let parsed = decode(&out).unwrap();
            assert_eq!(parsed.address, input.address);
            assert_eq!(parsed.name, input.name);
            assert_eq!(parsed.device_class, input.device_class);
        }
    }

    #[test]
    fn test_minimum_size() {
        assert!(matches!(
            encode(&data(""), MIN_SIZE - 1),
            Err(Error::OutOfSpace { needed: 13, available: 12 })
        ));
        assert_eq!(encode(&data(""), MIN_SIZE).unwrap().len(), MIN_SIZE);
    }

    #[test]
    fn test_name_dropped_not_truncated() {
        let input = data("Long device name");
        let needed = MIN_SIZE + 2 + input.name.len();

        let out = encode(&input, needed - 1).unwrap();
        assert_eq!(out.len(), MIN_SIZE);
        assert!(!out.windows(4).any(|w| w == b"Long"));
        assert_eq!(decode(&out).unwrap().name, "");

        let out = encode(&input, needed).unwrap();
        assert_eq!(out.len(), needed);
    }

    #[test]
    fn test_never_exceeds_limit() {
        let input = data("Speaker");
        for limit in MIN_SIZE..40 {
            let out = encode(&input, limit).unwrap();
            assert!(out.len() <= limit);
        }
    }

    #[test]
    fn test_pin_element() {
        let mut input = data("Kit");
        input.pin = Some("1234".into());
        let out = encode(&input, 64).unwrap();
        assert_eq!(out.len(), MIN_SIZE + 5 + 6);
        // Name, then PIN, class of device stays last
        assert_eq!(&out[13..19], &[0x05, EIR_LEGACY_PIN, b'1', b'2', b'3', b'4']);
        assert_eq!(&out[19..21], &[0x04, EIR_CLASS_OF_DEVICE]);

        let parsed = decode(&out).unwrap();
        assert_eq!(parsed.name, "Kit");
        assert_eq!(parsed.device_class, input.device_class);
        assert_eq!(parsed.pin, None);
    }

    #[test]
    fn test_pin_dropped_not_truncated() {
        let mut input = data("Kit");
        input.pin = Some("1234".into());
        let with_name = MIN_SIZE + 5;

        let out = encode(&input, with_name + 5).unwrap();
        assert_eq!(out, encode(&data("Kit"), 64).unwrap());
        assert!(!out.windows(2).any(|w| w == b"12"));

        assert_eq!(encode(&input, with_name + 6).unwrap().len(), with_name + 6);

        // The name wins when only one of the two fits
        input.name = "Speaker".into();
        let out = encode(&input, MIN_SIZE + 9).unwrap();
        assert_eq!(decode(&out).unwrap().name, "Speaker");
        assert!(!out.contains(&EIR_LEGACY_PIN));
    }

    #[test]
    fn test_empty_pin_not_emitted() {
        let mut input = data("Kit");
        input.pin = Some(String::new());
        assert_eq!(encode(&input, 64).unwrap(), encode(&data("Kit"), 64).unwrap());
    }

    #[test]
    fn test_decode_prefers_complete_name() {
        let mut raw = vec![0x00, 0x00, 1, 2, 3, 4, 5, 6];
        raw.extend_from_slice(&[0x04, EIR_SHORTENED_LOCAL_NAME, b'A', b'B', b'C']);
        raw.extend_from_slice(&[0x03, EIR_COMPLETE_LOCAL_NAME, b'X', b'Y']);
        raw.extend_from_slice(&[0x02, EIR_COMPLETE_LOCAL_NAME, b'Z']);
        let total = raw.len() as u16;
        raw[..2].copy_from_slice(&total.to_be_bytes());

        let parsed = decode(&raw).unwrap();
        assert_eq!(parsed.name, "XY");
        assert_eq!(parsed.address.to_string(), "06:05:04:03:02:01");
        assert_eq!(parsed.device_class, DEFAULT_DEVICE_CLASS);
    }

    #[test]
    fn test_decode_shortened_name_only() {
        let mut raw = vec![0x00, 0x0E, 1, 2, 3, 4, 5, 6];
        raw.extend_from_slice(&[0x05, EIR_SHORTENED_LOCAL_NAME, b'S', b'p', b'k', b'r']);
        assert_eq!(decode(&raw).unwrap().name, "Spkr");
    }

    #[test]
    fn test_decode_skips_unknown_elements() {
        let mut raw = vec![0x00, 0x00, 1, 2, 3, 4, 5, 6];
        raw.extend_from_slice(&[0x03, 0x0E, 0xAB, 0xCD]);
        raw.extend_from_slice(&[0x04, EIR_CLASS_OF_DEVICE, 0x24, 0x04, 0x18]);
        let total = raw.len() as u16;
        raw[..2].copy_from_slice(&total.to_be_bytes());

        assert_eq!(decode(&raw).unwrap().device_class, 0x24_0418);
    }

    #[test]
    fn test_decode_truncated() {
        assert!(matches!(decode(&[0x00, 0x08, 1, 2]), Err(Error::MalformedData(_))));

        let out = encode(&data("Car"), 64).unwrap();
        assert!(matches!(
            decode(&out[..out.len() - 2]),
            Err(Error::MalformedData(_))
        ));

        // Length field agrees, but the element claims more than is left
        let raw = [0x00, 0x0B, 1, 2, 3, 4, 5, 6, 0x05, 0x09, b'A'];
        assert!(matches!(decode(&raw), Err(Error::MalformedData(_))));
    }

    #[test]
    fn test_decode_ignores_trailing_padding() {
        let mut out = encode(&data("Car"), 64).unwrap();
        out.extend_from_slice(&[0, 0, 0]);
        assert_eq!(decode(&out).unwrap().name, "Car");
    }
}
