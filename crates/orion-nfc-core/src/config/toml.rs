//! TOML controller profiles
//!
//! ```toml
//! [controller]
//! page_size = "4 KiB"
//! ecc = "bch8"
//! pages_per_block = 128
//! blocks = 0x800
//! transfer = "dma"
//! timeout_us = 50000
//! ```
//!
//! Every key is optional and falls back to [`ControllerConfig::default`].

use std::format;
use std::fs;
use std::path::Path;
use std::string::String;

use super::ControllerConfig;
use crate::geometry::EccMode;
use crate::transfer::TransferMode;

/// Errors loading a controller profile
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The profile could not be read
    #[error("failed to read profile: {0}")]
    Io(#[from] std::io::Error),
    /// The profile is not valid TOML or has the wrong shape
    #[error("invalid profile: {0}")]
    Parse(#[from] ::toml::de::Error),
    /// An ECC mode name nobody knows
    #[error("unknown ECC mode '{0}'")]
    UnknownEcc(String),
    /// A value that parses but makes no sense
    #[error("invalid {field}: {reason}")]
    Invalid {
        /// Offending key
        field: &'static str,
        /// What is wrong with it
        reason: String,
    },
}

#[derive(Debug, serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct TomlProfile {
    controller: Option<TomlController>,
}

#[derive(Debug, Default, serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct TomlController {
    #[serde(default, deserialize_with = "deserialize_size")]
    page_size: Option<u32>,
    ecc: Option<String>,
    #[serde(default, deserialize_with = "deserialize_number")]
    pages_per_block: Option<u32>,
    #[serde(default, deserialize_with = "deserialize_number")]
    blocks: Option<u32>,
    transfer: Option<TransferMode>,
    #[serde(default, deserialize_with = "deserialize_number")]
    timeout_us: Option<u32>,
}

#[derive(serde::Deserialize)]
#[serde(untagged)]
enum NumberOrStr {
    Int(u32),
    Str(String),
}

/// Deserialize a u32 that can be hex (0x...) or decimal
fn deserialize_number<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::Deserialize;

    match Option::<NumberOrStr>::deserialize(deserializer)? {
        None => Ok(None),
        Some(NumberOrStr::Int(n)) => Ok(Some(n)),
        Some(NumberOrStr::Str(s)) => parse_number(&s).map(Some).map_err(serde::de::Error::custom),
    }
}

/// Deserialize a byte size ("4096", "0x1000", "4 KiB")
fn deserialize_size<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::Deserialize;

    match Option::<NumberOrStr>::deserialize(deserializer)? {
        None => Ok(None),
        Some(NumberOrStr::Int(n)) => Ok(Some(n)),
        Some(NumberOrStr::Str(s)) => parse_size(&s).map(Some).map_err(serde::de::Error::custom),
    }
}

/// Parse a number that can be hex (0x...) or decimal
pub fn parse_number(s: &str) -> Result<u32, String> {
    let s = s.trim();
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16).map_err(|e| format!("invalid hex: {}", e))
    } else {
        s.parse().map_err(|e| format!("invalid number: {}", e))
    }
}

/// Parse a size string like "4 KiB", "0x800" or "512"
pub fn parse_size(s: &str) -> Result<u32, String> {
    let s = s.trim();
    if let Ok(n) = parse_number(s) {
        return Ok(n);
    }

    let lower = s.to_lowercase();
    let (num_str, multiplier) = if let Some(n) = lower.strip_suffix("kib") {
        (n.trim(), 1024)
    } else if let Some(n) = lower.strip_suffix("kb") {
        (n.trim(), 1024)
    } else if let Some(n) = lower.strip_suffix("mib") {
        (n.trim(), 1024 * 1024)
    } else if let Some(n) = lower.strip_suffix("mb") {
        (n.trim(), 1024 * 1024)
    } else if let Some(n) = lower.strip_suffix('b') {
        (n.trim(), 1)
    } else {
        return Err(format!("invalid size: {}", s));
    };

    let num: u32 = num_str.parse().map_err(|_| format!("invalid size: {}", s))?;
    num.checked_mul(multiplier)
        .ok_or_else(|| format!("size out of range: {}", s))
}

impl ControllerConfig {
    /// Load a profile from a TOML file
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse a profile from a TOML string
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let profile: TomlProfile = ::toml::from_str(content)?;
        let section = profile.controller.unwrap_or_default();
        let mut config = Self::default();

        if let Some(page_size) = section.page_size {
            config.page_size = page_size;
        }
        if let Some(name) = section.ecc {
            config.ecc = EccMode::from_name(&name).ok_or(ConfigError::UnknownEcc(name))?;
        }
        if let Some(pages) = section.pages_per_block {
            config.pages_per_block = pages;
        }
        if let Some(blocks) = section.blocks {
            config.block_count = blocks;
        }
        if let Some(transfer) = section.transfer {
            config.transfer = transfer;
        }
        if let Some(timeout) = section.timeout_us {
            config.timeout_us = timeout;
        }

        config.validate()?;
        Ok(config)
    }

    /// Check the array shape
    ///
    /// The geometry itself is not checked here; an unsupported page size /
    /// ECC pair is reported when the first page operation runs.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.page_size == 0 {
            return Err(ConfigError::Invalid {
                field: "page_size",
                reason: "must be non-zero".into(),
            });
        }
        if self.pages_per_block == 0 || !self.pages_per_block.is_power_of_two() {
            return Err(ConfigError::Invalid {
                field: "pages_per_block",
                reason: format!("{} is not a power of two", self.pages_per_block),
            });
        }
        if self.block_count == 0 {
            return Err(ConfigError::Invalid {
                field: "blocks",
                reason: "must be at least 1".into(),
            });
        }
        if self.timeout_us == 0 {
            return Err(ConfigError::Invalid {
                field: "timeout_us",
                reason: "must be non-zero".into(),
            });
        }
        Ok(())
    }
}
