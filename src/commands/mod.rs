//! CLI command implementations
//!
//! `write` drives a [`bttag_writer::TagWriter`] against a tag opened from
//! the registry. `encode` and `decode` work on bytes only and never touch a
//! tag.

mod decode;
mod encode;
mod list;
mod write;

pub use decode::run_decode;
pub use encode::run_encode;
pub use list::list_tags;
pub use write::run_write;

use crate::cli::InfoArgs;
use bttag_core::TagInformation;

/// Build tag information from `--info` and the override flags
pub fn load_info(args: &InfoArgs) -> Result<TagInformation, Box<dyn std::error::Error>> {
    let mut info = match (&args.info, args.address) {
        (Some(path), _) => {
            log::debug!("Loading tag information from {}", path.display());
            TagInformation::from_toml_file(path)?
        }
        (None, Some(address)) => TagInformation::new(address, ""),
        (None, None) => return Err("either --info or --address is required".into()),
    };

    if let Some(address) = args.address {
        info = info.with_address(address);
    }
    if let Some(name) = &args.name {
        info = info.with_name(name.as_str());
    }
    if let Some(class) = args.device_class {
        if class > 0x00FF_FFFF {
            return Err(format!("device class 0x{:X} is wider than 24 bits", class).into());
        }
        info = info.with_device_class(class);
    }
    if let Some(pin) = &args.pin {
        info = info.with_pin(pin.as_str());
    }
    if args.read_only {
        info = info.with_read_only(true);
    }
    if let Some(format) = args.format {
        info = info.with_format(format);
    }

    Ok(info)
}
