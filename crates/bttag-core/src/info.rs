//! Information written to a tag
//!
//! [`TagInformation`] is an immutable value. Fields are set through the
//! `with_*` builders, which consume and return it.

use core::fmt;
use core::str::FromStr;

use crate::error::Error;

/// Class of device used when none is given: car audio (major class
/// audio/video, minor class car audio) with the audio and rendering
/// service bits set
pub const DEFAULT_DEVICE_CLASS: u32 = 0x14_0420;

/// Mask for the 24 bits a class of device occupies
const DEVICE_CLASS_MASK: u32 = 0x00FF_FFFF;

/// Bluetooth device address
///
/// Octets are stored in the order they appear in the canonical string
/// form, most significant first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct BtAddress(pub [u8; 6]);

impl BtAddress {
    /// Create an address from octets, most significant first
    pub const fn new(octets: [u8; 6]) -> Self {
        Self(octets)
    }

    /// Octets, most significant first
    pub const fn octets(&self) -> [u8; 6] {
        self.0
    }

    /// Octets least significant first, as stored in EIR structures
    pub fn to_reversed(&self) -> [u8; 6] {
        let mut out = self.0;
        out.reverse();
        out
    }

    /// Build an address from least-significant-first octets
    pub fn from_reversed(octets: [u8; 6]) -> Self {
        let mut out = octets;
        out.reverse();
        Self(out)
    }
}

impl FromStr for BtAddress {
    type Err = Error;

    /// Parse `"XX:XX:XX:XX:XX:XX"`; both hex cases are accepted
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut octets = [0u8; 6];
        let mut parts = s.trim().split(':');

        for octet in octets.iter_mut() {
            let part = parts
                .next()
                .ok_or_else(|| Error::InvalidAddress(s.to_string()))?;
            if part.len() != 2 {
                return Err(Error::InvalidAddress(s.to_string()));
            }
            *octet =
                u8::from_str_radix(part, 16).map_err(|_| Error::InvalidAddress(s.to_string()))?;
        }

        if parts.next().is_some() {
            return Err(Error::InvalidAddress(s.to_string()));
        }

        Ok(Self(octets))
    }
}

impl fmt::Display for BtAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(
            f,
            "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
            a, b, c, d, e, g
        )
    }
}

/// NDEF layout written to the tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TagFormat {
    /// Single MIME record carrying the OOB data
    #[default]
    Simplified,
    /// Handover Select record followed by the MIME carrier record
    Handover,
}

impl FromStr for TagFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "simplified" | "simple" => Ok(TagFormat::Simplified),
            "handover" => Ok(TagFormat::Handover),
            other => Err(Error::Config(format!("unknown tag format: {}", other))),
        }
    }
}

impl fmt::Display for TagFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TagFormat::Simplified => write!(f, "simplified"),
            TagFormat::Handover => write!(f, "handover"),
        }
    }
}

/// Everything written to a tag for one device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagInformation {
    address: BtAddress,
    name: String,
    device_class: u32,
    pin: String,
    read_only: bool,
    format: TagFormat,
}

impl TagInformation {
    /// Information for a device with the default class, no PIN, writable tag
    pub fn new(address: BtAddress, name: impl Into<String>) -> Self {
        Self {
            address,
            name: name.into(),
            device_class: DEFAULT_DEVICE_CLASS,
            pin: String::new(),
            read_only: false,
            format: TagFormat::default(),
        }
    }

    /// Replace the device address
    pub fn with_address(mut self, address: BtAddress) -> Self {
        self.address = address;
        self
    }

    /// Replace the display name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the 24-bit class of device (upper bits are discarded)
    pub fn with_device_class(mut self, device_class: u32) -> Self {
        self.device_class = device_class & DEVICE_CLASS_MASK;
        self
    }

    /// Set the legacy pairing PIN; empty means no PIN
    pub fn with_pin(mut self, pin: impl Into<String>) -> Self {
        self.pin = pin.into();
        self
    }

    /// Lock the tag after writing
    pub fn with_read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    /// Select the NDEF layout
    pub fn with_format(mut self, format: TagFormat) -> Self {
        self.format = format;
        self
    }

    /// Device address
    pub fn address(&self) -> BtAddress {
        self.address
    }

    /// Device display name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 24-bit class of device
    pub fn device_class(&self) -> u32 {
        self.device_class
    }

    /// Legacy pairing PIN, `None` when empty
    pub fn pin(&self) -> Option<&str> {
        if self.pin.is_empty() {
            None
        } else {
            Some(&self.pin)
        }
    }

    /// Whether the tag is locked after writing
    pub fn read_only(&self) -> bool {
        self.read_only
    }

    /// NDEF layout
    pub fn format(&self) -> TagFormat {
        self.format
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_address() {
        let addr: BtAddress = "aa:Bb:CC:dd:EE:ff".parse().unwrap();
        assert_eq!(addr.octets(), [0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF]);
        assert_eq!(addr.to_string(), "AA:BB:CC:DD:EE:FF");
        assert_eq!(addr.to_reversed(), [0xFF, 0xEE, 0xDD, 0xCC, 0xBB, 0xAA]);
        assert_eq!(BtAddress::from_reversed(addr.to_reversed()), addr);
    }

    #[test]
    fn test_parse_bad_address() {
        assert!("AA:BB:CC:DD:EE".parse::<BtAddress>().is_err());
        assert!("AA:BB:CC:DD:EE:FF:00".parse::<BtAddress>().is_err());
        assert!("AA:BB:CC:DD:EE:GG".parse::<BtAddress>().is_err());
        assert!("AABBCCDDEEFF".parse::<BtAddress>().is_err());
        assert!("A:BB:CC:DD:EE:FF".parse::<BtAddress>().is_err());
    }

    #[test]
    fn test_builder_defaults() {
        let info = TagInformation::new(BtAddress::default(), "Speaker");
        assert_eq!(info.device_class(), DEFAULT_DEVICE_CLASS);
        assert_eq!(info.pin(), None);
        assert!(!info.read_only());
        assert_eq!(info.format(), TagFormat::Simplified);

        let info = info
            .with_device_class(0xFF20_0404)
            .with_pin("1234")
            .with_read_only(true)
            .with_format(TagFormat::Handover);
        assert_eq!(info.device_class(), 0x20_0404);
        assert_eq!(info.pin(), Some("1234"));
        assert!(info.read_only());
        assert_eq!(info.format(), TagFormat::Handover);
    }

    #[test]
    fn test_tag_format_from_str() {
        assert_eq!("Handover".parse::<TagFormat>().unwrap(), TagFormat::Handover);
        assert_eq!(
            "simplified".parse::<TagFormat>().unwrap(),
            TagFormat::Simplified
        );
        assert!("nfc".parse::<TagFormat>().is_err());
    }
}
