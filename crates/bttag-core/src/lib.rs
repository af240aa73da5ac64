//! bttag-core - Bluetooth pairing data for NFC tags
//!
//! This crate encodes a Bluetooth device's out-of-band pairing data
//! (address, name, class of device) into an NDEF message and writes it to
//! NFC tags of several technologies:
//!
//! - tags already formatted for NDEF, and blank tags formatted on write
//! - Mifare Ultralight, written page by page with its capability container
//! - Mifare Classic, with sector keys, access bits and the MAD set up
//!
//! Tag access goes through the traits in [`tech`], so the same writers run
//! against real readers and the in-memory tags of `bttag-dummy`.
//!
//! # Example
//!
//! ```ignore
//! use bttag_core::{medium, writer::CancelToken, TagInformation};
//!
//! let info = TagInformation::new("00:11:22:33:44:55".parse()?, "Car Kit");
//! let medium = medium::resolve(&mut *tag)?;
//! let outcome = medium.writer().write_to_tag(&mut *tag, &info, &CancelToken::new())?;
//! println!("{} bytes written to {}", outcome.payload_len, outcome.technology);
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod bssp;
pub mod config;
pub mod decode;
pub mod error;
pub mod info;
pub mod medium;
pub mod ndef;
pub mod tech;
pub mod tlv;
pub mod writer;

pub use error::{Error, Result, Step};
pub use info::{BtAddress, TagFormat, TagInformation};
pub use medium::{Medium, Technology};
