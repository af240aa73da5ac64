//! Encode command implementation

use bttag_core::ndef::build_ndef_message;
use bttag_core::writer::generate_payload;
use bttag_core::{tlv, TagInformation};

/// Print the payload for `info` as hex
///
/// With a capacity the payload is fitted the way a writer would fit it,
/// dropping the name when needed.
pub fn run_encode(
    info: &TagInformation,
    capacity: Option<usize>,
    raw: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let bytes = match (raw, capacity) {
        (true, limit) => build_ndef_message(info, limit)?.to_bytes(),
        (false, Some(limit)) => generate_payload(info, limit)?,
        (false, None) => tlv::wrap(&build_ndef_message(info, None)?.to_bytes())?,
    };

    log::info!(
        "{} bytes ({})",
        bytes.len(),
        if raw { "NDEF message" } else { "TLV" }
    );
    println!("{}", hex::encode_upper(&bytes));
    Ok(())
}
