//! Controller configuration
//!
//! Describes the attached device (page size, ECC mode, array shape) and how
//! the controller moves data. With the `std` feature a configuration can be
//! loaded from a TOML profile.

#[cfg(feature = "std")]
mod toml;

#[cfg(feature = "std")]
pub use self::toml::{parse_number, parse_size, ConfigError};

use crate::error::Result;
use crate::geometry::{self, EccMode, PageGeometry};
use crate::sequencer::DEFAULT_EVENT_TIMEOUT_US;
use crate::transfer::TransferMode;

/// Static description of one controller and its device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControllerConfig {
    /// Page data size in bytes
    pub page_size: u32,
    /// ECC mode the engine runs in
    pub ecc: EccMode,
    /// Pages in one erase block
    pub pages_per_block: u32,
    /// Erase blocks in the array
    pub block_count: u32,
    /// PIO or DMA
    pub transfer: TransferMode,
    /// Bound on each controller event wait, and on each DMA completion
    pub timeout_us: u32,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            page_size: 2048,
            ecc: EccMode::Bch4,
            pages_per_block: 64,
            block_count: 1024,
            transfer: TransferMode::Pio,
            timeout_us: DEFAULT_EVENT_TIMEOUT_US,
        }
    }
}

impl ControllerConfig {
    /// Erase block size in bytes (page data only)
    pub fn block_size(&self) -> u64 {
        self.page_size as u64 * self.pages_per_block as u64
    }

    /// Number of pages in the array
    pub fn total_pages(&self) -> u32 {
        self.pages_per_block.saturating_mul(self.block_count)
    }

    /// Array capacity in bytes (page data only)
    pub fn total_size(&self) -> u64 {
        self.block_size() * self.block_count as u64
    }

    /// First page of `block`
    pub fn block_to_page(&self, block: u32) -> u32 {
        block.saturating_mul(self.pages_per_block)
    }

    /// Look up the page geometry for this configuration
    ///
    /// Fails with [`GeometryUnsupported`](crate::Error::GeometryUnsupported)
    /// if the page size / ECC pair has no table entry.
    pub fn geometry(&self) -> Result<&'static PageGeometry> {
        geometry::resolve(self.page_size, self.ecc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    #[test]
    fn test_defaults() {
        let config = ControllerConfig::default();
        assert_eq!(config.block_size(), 128 * 1024);
        assert_eq!(config.total_pages(), 64 * 1024);
        assert_eq!(config.total_size(), 128 * 1024 * 1024);
        assert_eq!(config.block_to_page(3), 192);
        assert_eq!(config.geometry().unwrap().oob_size, 64);
    }

    #[test]
    fn test_unsupported_geometry_is_reported_on_lookup() {
        let config = ControllerConfig {
            page_size: 512,
            ecc: EccMode::Bch8,
            ..Default::default()
        };
        assert_eq!(
            config.geometry(),
            Err(Error::GeometryUnsupported {
                page_size: 512,
                ecc: EccMode::Bch8
            })
        );
    }
}
