//! Tag backend registry
//!
//! Opens tags by backend name. A backend string is `name` or
//! `name:key1=value1,key2=value2`.

use bttag_core::tech::Tag;
#[allow(unused_imports)] // Used in feature-gated code
use bttag_core::tech::UltralightKind;
use std::collections::HashMap;
use std::str::FromStr;

/// Parsed tag backend parameters
pub struct TagParams {
    /// Backend name
    pub name: String,
    /// Key-value parameters
    pub params: HashMap<String, String>,
}

impl TagParams {
    /// Typed parameter, `default` when absent
    pub fn get_or<T>(&self, key: &str, default: T) -> Result<T, Box<dyn std::error::Error>>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.params.get(key) {
            None => Ok(default),
            Some(value) => value
                .parse()
                .map_err(|e| format!("Invalid value '{}' for {}: {}", value, key, e).into()),
        }
    }
}

/// Parse a backend string into name and parameters
///
/// # Example
/// ```ignore
/// let params = parse_tag_params("dummy-classic:sectors=40")?;
/// assert_eq!(params.name, "dummy-classic");
/// assert_eq!(params.params.get("sectors"), Some(&"40".to_string()));
/// ```
pub fn parse_tag_params(s: &str) -> Result<TagParams, Box<dyn std::error::Error>> {
    let (name, opts_str) = s.split_once(':').unwrap_or((s, ""));
    if name.is_empty() {
        return Err("Empty tag backend name".into());
    }

    let mut params = HashMap::new();
    if !opts_str.is_empty() {
        for opt in opts_str.split(',') {
            match opt.split_once('=') {
                Some((key, value)) => {
                    params.insert(key.to_string(), value.to_string());
                }
                None => {
                    return Err(
                        format!("Invalid parameter format: '{}' (expected key=value)", opt).into(),
                    );
                }
            }
        }
    }

    Ok(TagParams {
        name: name.to_string(),
        params,
    })
}

/// Open a tag from a backend string
///
/// # Example
/// ```ignore
/// let tag = open_tag("dummy-ndef:max_size=137")?;
/// writer.present(tag, &info)?;
/// ```
pub fn open_tag(backend: &str) -> Result<Box<dyn Tag>, Box<dyn std::error::Error>> {
    let params = parse_tag_params(backend)?;
    log::debug!("Opening tag backend {}", params.name);

    match params.name.as_str() {
        #[cfg(feature = "dummy")]
        "dummy-ultralight" | "dummy-ul" => {
            open_dummy_ultralight(&params, UltralightKind::Ultralight)
        }

        #[cfg(feature = "dummy")]
        "dummy-ultralight-c" | "dummy-ulc" => {
            open_dummy_ultralight(&params, UltralightKind::UltralightC)
        }

        #[cfg(feature = "dummy")]
        "dummy-classic" | "dummy-mfc" => open_dummy_classic(&params),

        #[cfg(feature = "dummy")]
        "dummy-ndef" => open_dummy_ndef(&params),

        #[cfg(feature = "dummy")]
        "dummy-formatable" => open_dummy_formatable(&params),

        _ => Err(format!("Unknown tag backend: {}", params.name).into()),
    }
}

// Dummy backends share the fault parameters
#[cfg(feature = "dummy")]
fn dummy_faults(params: &TagParams) -> Result<bttag_dummy::Faults, Box<dyn std::error::Error>> {
    let lose_after_writes = match params.params.get("lose_after") {
        Some(_) => Some(params.get_or("lose_after", 0usize)?),
        None => None,
    };

    Ok(bttag_dummy::Faults {
        fail_connect: params.get_or("fail_connect", false)?,
        lose_after_writes,
        fail_wake: params.get_or("fail_wake", false)?,
    })
}

#[cfg(feature = "dummy")]
fn open_dummy_ultralight(
    params: &TagParams,
    kind: UltralightKind,
) -> Result<Box<dyn Tag>, Box<dyn std::error::Error>> {
    let tag = bttag_dummy::DummyTag::ultralight(kind).with_faults(dummy_faults(params)?);
    Ok(Box::new(tag))
}

#[cfg(feature = "dummy")]
fn open_dummy_classic(params: &TagParams) -> Result<Box<dyn Tag>, Box<dyn std::error::Error>> {
    let sectors = params.get_or("sectors", 16usize)?;
    if sectors == 0 {
        return Err("dummy-classic needs at least one sector".into());
    }

    let tag = bttag_dummy::DummyTag::classic(sectors).with_faults(dummy_faults(params)?);
    Ok(Box::new(tag))
}

#[cfg(feature = "dummy")]
fn open_dummy_ndef(params: &TagParams) -> Result<Box<dyn Tag>, Box<dyn std::error::Error>> {
    let max_size = params.get_or("max_size", 137usize)?;
    let tag = bttag_dummy::DummyTag::ndef(max_size).with_faults(dummy_faults(params)?);

    if params.get_or("readonly", false)? {
        if let Some(memory) = tag.ndef_memory() {
            memory.lock().set_read_only(true);
        }
    }

    Ok(Box::new(tag))
}

#[cfg(feature = "dummy")]
fn open_dummy_formatable(params: &TagParams) -> Result<Box<dyn Tag>, Box<dyn std::error::Error>> {
    let capacity = params.get_or("capacity", 496usize)?;
    let tag = bttag_dummy::DummyTag::formatable(capacity).with_faults(dummy_faults(params)?);
    Ok(Box::new(tag))
}

/// Information about a tag backend
pub struct TagBackendInfo {
    /// Primary name (used for matching)
    pub name: &'static str,
    /// Alternative names
    pub aliases: &'static [&'static str],
    /// Short description
    pub description: &'static str,
}

/// All tag backends enabled at compile time
#[allow(unused_mut, clippy::vec_init_then_push)]
pub fn available_tags() -> Vec<TagBackendInfo> {
    let mut tags = Vec::new();

    #[cfg(feature = "dummy")]
    tags.push(TagBackendInfo {
        name: "dummy-ndef",
        aliases: &[],
        description: "Emulated NDEF formatted tag (max_size=<bytes>,readonly=<bool>)",
    });

    #[cfg(feature = "dummy")]
    tags.push(TagBackendInfo {
        name: "dummy-formatable",
        aliases: &[],
        description: "Emulated blank NDEF formatable tag (capacity=<bytes>)",
    });

    #[cfg(feature = "dummy")]
    tags.push(TagBackendInfo {
        name: "dummy-ultralight",
        aliases: &["dummy-ul"],
        description: "Emulated Mifare Ultralight, 48 byte user area",
    });

    #[cfg(feature = "dummy")]
    tags.push(TagBackendInfo {
        name: "dummy-ultralight-c",
        aliases: &["dummy-ulc"],
        description: "Emulated Mifare Ultralight C, 144 byte user area",
    });

    #[cfg(feature = "dummy")]
    tags.push(TagBackendInfo {
        name: "dummy-classic",
        aliases: &["dummy-mfc"],
        description: "Emulated Mifare Classic (sectors=<n>, 16 for 1K)",
    });

    tags
}

/// Comma separated backend names for help text
pub fn tag_names_short() -> String {
    let tags = available_tags();
    if tags.is_empty() {
        return "none (recompile with features)".to_string();
    }
    let names: Vec<&str> = tags.iter().map(|t| t.name).collect();
    names.join(", ")
}
