//! CLI error type

use orion_nfc_core::config::ConfigError;
use orion_nfc_sim::SimError;

/// Anything that can make a command fail
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Controller or device error
    #[error(transparent)]
    Nand(#[from] orion_nfc_core::Error),
    /// Bad controller profile
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// Emulator image error
    #[error(transparent)]
    Sim(#[from] SimError),
    /// File I/O
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// Progress bar template
    #[error("progress bar: {0}")]
    Progress(#[from] indicatif::style::TemplateError),
    /// Argument outside the device
    #[error("{what} {value} out of range (device has {limit})")]
    OutOfRange {
        /// Page or block
        what: &'static str,
        /// Requested value
        value: u32,
        /// Number available
        limit: u32,
    },
}

pub type Result<T> = std::result::Result<T, CliError>;
