//! Decode command implementation

use bttag_core::decode::decode_tag_payload;
use std::path::Path;

/// Decode tag contents given as hex or read from a file
pub fn run_decode(
    hex_input: Option<&str>,
    input: Option<&Path>,
    as_toml: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let data = match (hex_input, input) {
        (Some(text), _) => {
            let digits: String = text
                .chars()
                .filter(|c| !c.is_whitespace() && *c != ':')
                .collect();
            hex::decode(digits)?
        }
        (None, Some(path)) => std::fs::read(path)?,
        (None, None) => return Err("either --hex or --input is required".into()),
    };
    log::debug!("Decoding {} bytes", data.len());

    let info = decode_tag_payload(&data)?;

    if as_toml {
        print!("{}", info.to_toml_string());
        return Ok(());
    }

    println!("Address:      {}", info.address());
    println!(
        "Name:         {}",
        if info.name().is_empty() {
            "(none)"
        } else {
            info.name()
        }
    );
    println!("Device class: 0x{:06X}", info.device_class());
    println!("Format:       {}", info.format());
    Ok(())
}
