//! Medium resolution
//!
//! When a tag is presented, [`resolve`] picks exactly one technology in
//! [`RESOLUTION_ORDER`] and captures the facts the writer needs in a
//! [`Medium`]. A medium describes one presentation and is not reused.

use core::fmt;

use crate::error::{Error, Result};
use crate::tech::{Tag, TagCapabilities, UltralightKind};
use crate::writer::{
    ClassicWriter, NdefFormatableWriter, NdefWriter, TechWriter, UltralightWriter,
};

/// Supported tag technologies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Technology {
    /// NDEF formatted tag
    Ndef,
    /// Blank tag formatted on write
    NdefFormatable,
    /// Mifare Ultralight, raw pages
    Ultralight,
    /// Mifare Classic, raw sectors
    Classic,
}

impl fmt::Display for Technology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Technology::Ndef => write!(f, "NDEF"),
            Technology::NdefFormatable => write!(f, "NDEF formatable"),
            Technology::Ultralight => write!(f, "Mifare Ultralight"),
            Technology::Classic => write!(f, "Mifare Classic"),
        }
    }
}

/// Order in which technologies are tried
pub const RESOLUTION_ORDER: [Technology; 4] = [
    Technology::Ndef,
    Technology::NdefFormatable,
    Technology::Ultralight,
    Technology::Classic,
];

/// Technology of a presented tag with its capacity facts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Medium {
    /// NDEF tag accepting messages up to `max_size` bytes
    Ndef {
        /// Largest NDEF message
        max_size: usize,
    },
    /// Blank tag, capacity decided by the format operation
    NdefFormatable,
    /// Ultralight with page layout given by its kind
    Ultralight {
        /// Tag variant
        kind: UltralightKind,
    },
    /// Classic with `sectors` 4-block sectors
    Classic {
        /// Number of sectors used
        sectors: usize,
    },
}

/// Highest sector count made of 4-block sectors (Classic 4K switches to
/// 16-block sectors after sector 31)
pub const CLASSIC_MAX_SMALL_SECTORS: usize = 32;

/// Resolve the technology to use for `tag`
pub fn resolve(tag: &mut dyn Tag) -> Result<Medium> {
    let caps = tag.capabilities();

    for technology in RESOLUTION_ORDER {
        let medium = match technology {
            Technology::Ndef if caps.contains(TagCapabilities::NDEF) => {
                tag.ndef().map(|t| Medium::Ndef {
                    max_size: t.max_size(),
                })
            }
            Technology::NdefFormatable if caps.contains(TagCapabilities::NDEF_FORMATABLE) => {
                tag.ndef_formatable().map(|_| Medium::NdefFormatable)
            }
            Technology::Ultralight if caps.contains(TagCapabilities::ULTRALIGHT) => {
                tag.ultralight().map(|t| Medium::Ultralight { kind: t.kind() })
            }
            Technology::Classic if caps.contains(TagCapabilities::CLASSIC) => {
                tag.classic().map(|t| Medium::Classic {
                    sectors: t.sector_count().min(CLASSIC_MAX_SMALL_SECTORS),
                })
            }
            _ => None,
        };

        if let Some(medium) = medium {
            log::debug!("Resolved tag as {:?}", medium);
            return Ok(medium);
        }
    }

    log::warn!("No supported technology in {:?}", caps);
    Err(Error::UnsupportedMedium)
}

impl Medium {
    /// Technology of this medium
    pub fn technology(&self) -> Technology {
        match self {
            Medium::Ndef { .. } => Technology::Ndef,
            Medium::NdefFormatable => Technology::NdefFormatable,
            Medium::Ultralight { .. } => Technology::Ultralight,
            Medium::Classic { .. } => Technology::Classic,
        }
    }

    /// Bytes available for the written payload, `None` if unknown
    pub fn capacity(&self) -> Option<usize> {
        match *self {
            Medium::Ndef { max_size } => Some(max_size),
            Medium::NdefFormatable => None,
            Medium::Ultralight { kind } => Some(UltralightWriter::new(kind).capacity()),
            Medium::Classic { sectors } => Some(ClassicWriter::new(sectors).capacity()),
        }
    }

    /// Writer for this medium
    pub fn writer(&self) -> Box<dyn TechWriter> {
        match *self {
            Medium::Ndef { max_size } => Box::new(NdefWriter::new(max_size)),
            Medium::NdefFormatable => Box::new(NdefFormatableWriter),
            Medium::Ultralight { kind } => Box::new(UltralightWriter::new(kind)),
            Medium::Classic { sectors } => Box::new(ClassicWriter::new(sectors)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capacity() {
        assert_eq!(Medium::Ndef { max_size: 137 }.capacity(), Some(137));
        assert_eq!(Medium::NdefFormatable.capacity(), None);
        assert_eq!(
            Medium::Ultralight {
                kind: UltralightKind::Ultralight
            }
            .capacity(),
            Some(48)
        );
        assert_eq!(
            Medium::Ultralight {
                kind: UltralightKind::UltralightC
            }
            .capacity(),
            Some(144)
        );
        assert_eq!(Medium::Classic { sectors: 16 }.capacity(), Some(720));
    }

    #[test]
    fn test_writer_matches_technology() {
        let media = [
            Medium::Ndef { max_size: 100 },
            Medium::NdefFormatable,
            Medium::Ultralight {
                kind: UltralightKind::UltralightC,
            },
            Medium::Classic { sectors: 16 },
        ];
        for medium in media {
            assert_eq!(medium.writer().technology(), medium.technology());
        }
    }
}
