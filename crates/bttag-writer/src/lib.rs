//! bttag-writer - Tag write orchestration
//!
//! This crate accepts presented tags and writes Bluetooth pairing data to
//! them on a background thread.
//!
//! # Architecture
//!
//! ```text
//!                    ┌──────────────────────┐
//!                    │ CLI / reader driver  │
//!                    └──────────┬───────────┘
//!                               │ open_tag("dummy-classic:sectors=16")
//!                               │ present(tag, &info)
//!                    ┌──────────▼───────────┐
//!                    │      TagWriter       │  Idle / TechResolved / Writing
//!                    └──────────┬───────────┘
//!                               │ medium::resolve()
//!         ┌──────────────┬──────┴───────┬──────────────┐
//!         ▼              ▼              ▼              ▼
//!    NdefWriter  NdefFormatable  UltralightWriter ClassicWriter
//!         └──────────────┴──────┬───────┴──────────────┘
//!                               │ WriteReport (status code)
//!                    ┌──────────▼───────────┐
//!                    │ completion channel   │
//!                    └──────────────────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use bttag_writer::{open_tag, TagWriter};
//!
//! let (tx, rx) = std::sync::mpsc::channel();
//! let mut writer = TagWriter::new(tx);
//! writer.present(open_tag("dummy-ultralight-c")?, &info)?;
//! let report = rx.recv()?;
//! println!("{} ({})", report.status, report.status.code());
//! ```

#![warn(missing_docs)]

pub mod orchestrator;
pub mod registry;

pub use orchestrator::{Rejection, TagWriter, WriteReport, WriteStatus, WriterState};
pub use registry::{available_tags, open_tag, parse_tag_params, tag_names_short, TagBackendInfo};
