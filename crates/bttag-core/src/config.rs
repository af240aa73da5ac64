//! TOML tag information files
//!
//! ```toml
//! address = "AA:BB:CC:DD:EE:FF"
//! name = "Car Kit"
//! device_class = "0x200404"
//! pin = "0000"
//! read_only = false
//! format = "simplified"
//! ```
//!
//! Only `address` is required.

use std::fs;
use std::path::Path;

use crate::error::{Error, Result};
use crate::info::{BtAddress, TagFormat, TagInformation};

#[derive(Debug, serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct TomlTagInformation {
    address: String,
    #[serde(default)]
    name: String,
    device_class: Option<HexOrInt>,
    pin: Option<String>,
    #[serde(default)]
    read_only: bool,
    format: Option<String>,
}

/// Integer given either as a TOML integer or a `"0x..."` string
#[derive(Debug, serde::Deserialize)]
#[serde(untagged)]
enum HexOrInt {
    Int(u32),
    Str(String),
}

impl HexOrInt {
    fn value(&self) -> Result<u32> {
        match self {
            HexOrInt::Int(n) => Ok(*n),
            HexOrInt::Str(s) => parse_number(s).map_err(Error::Config),
        }
    }
}

/// Parse a number that can be hex (0x...) or decimal
pub fn parse_number(s: &str) -> core::result::Result<u32, String> {
    let s = s.trim();
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16).map_err(|e| format!("invalid hex: {}", e))
    } else {
        s.parse().map_err(|e| format!("invalid number: {}", e))
    }
}

impl TagInformation {
    /// Load tag information from a TOML file
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&content)
    }

    /// Parse tag information from a TOML string
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let file: TomlTagInformation =
            toml::from_str(content).map_err(|e| Error::Config(e.to_string()))?;

        let address: BtAddress = file.address.parse()?;
        let mut info = TagInformation::new(address, file.name).with_read_only(file.read_only);

        if let Some(class) = &file.device_class {
            let class = class.value()?;
            if class > 0x00FF_FFFF {
                return Err(Error::Config(format!(
                    "device class 0x{:X} is wider than 24 bits",
                    class
                )));
            }
            info = info.with_device_class(class);
        }
        if let Some(pin) = file.pin {
            info = info.with_pin(pin);
        }
        if let Some(format) = &file.format {
            info = info.with_format(format.parse()?);
        }

        Ok(info)
    }

    /// Render as a TOML document readable by [`TagInformation::from_toml_str`]
    pub fn to_toml_string(&self) -> String {
        let mut output = String::new();
        output.push_str(&format!("address = \"{}\"\n", self.address()));
        output.push_str(&format!("name = {}\n", toml_string(self.name())));
        output.push_str(&format!("device_class = \"0x{:06X}\"\n", self.device_class()));
        if let Some(pin) = self.pin() {
            output.push_str(&format!("pin = {}\n", toml_string(pin)));
        }
        if self.read_only() {
            output.push_str("read_only = true\n");
        }
        if self.format() != TagFormat::default() {
            output.push_str(&format!("format = \"{}\"\n", self.format()));
        }
        output
    }
}

fn toml_string(s: &str) -> String {
    toml::Value::String(s.to_string()).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::info::DEFAULT_DEVICE_CLASS;

    #[test]
    fn test_parse_number() {
        assert_eq!(parse_number("0x200404").unwrap(), 0x20_0404);
        assert_eq!(parse_number("0X1F").unwrap(), 0x1F);
        assert_eq!(parse_number("42").unwrap(), 42);
        assert!(parse_number("0xZZ").is_err());
    }

    #[test]
    fn test_parse_toml() {
        let toml = r#"
address = "00:11:22:33:44:55"
name = "Car Kit"
device_class = "0x200404"
pin = "0000"
read_only = true
format = "handover"
"#;
        let info = TagInformation::from_toml_str(toml).unwrap();
        assert_eq!(info.address().to_string(), "00:11:22:33:44:55");
        assert_eq!(info.name(), "Car Kit");
        assert_eq!(info.device_class(), 0x20_0404);
        assert_eq!(info.pin(), Some("0000"));
        assert!(info.read_only());
        assert_eq!(info.format(), TagFormat::Handover);
    }

    #[test]
    fn test_defaults() {
        let info = TagInformation::from_toml_str("address = \"00:11:22:33:44:55\"").unwrap();
        assert_eq!(info.name(), "");
        assert_eq!(info.device_class(), DEFAULT_DEVICE_CLASS);
        assert_eq!(info.pin(), None);
        assert!(!info.read_only());
        assert_eq!(info.format(), TagFormat::Simplified);

        let info = TagInformation::from_toml_str(
            "address = \"00:11:22:33:44:55\"\ndevice_class = 2098180",
        )
        .unwrap();
        assert_eq!(info.device_class(), 0x20_0404);
    }

    #[test]
    fn test_errors() {
        assert!(matches!(
            TagInformation::from_toml_str("name = \"x\""),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            TagInformation::from_toml_str("address = \"nope\""),
            Err(Error::InvalidAddress(_))
        ));
        assert!(matches!(
            TagInformation::from_toml_str(
                "address = \"00:11:22:33:44:55\"\ndevice_class = \"0x1000000\""
            ),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            TagInformation::from_toml_str("address = \"00:11:22:33:44:55\"\ncolour = 1"),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_to_toml_string() {
        let info = TagInformation::new("00:11:22:33:44:55".parse().unwrap(), "Say \"hi\"")
            .with_pin("1234")
            .with_format(TagFormat::Handover);
        let parsed = TagInformation::from_toml_str(&info.to_toml_string()).unwrap();
        assert_eq!(parsed, info);
    }
}
