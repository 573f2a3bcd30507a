//! Page geometry type definitions

use core::fmt;

/// Erased NAND cells read back as all ones
pub const ERASED_BYTE: u8 = 0xFF;

/// ECC engine configuration
///
/// BCH modes are named by their correction strength; each one works on a
/// fixed step size, which is also the chunk granularity the controller
/// uses for that mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "std", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "std", serde(rename_all = "lowercase"))]
pub enum EccMode {
    /// ECC engine disabled (raw access)
    None,
    /// 1-bit Hamming code
    Hamming,
    /// BCH, 4 bits per 2 KiB
    #[default]
    Bch4,
    /// BCH, 8 bits per 1 KiB
    Bch8,
    /// BCH, 12 bits per 704 bytes
    Bch12,
    /// BCH, 16 bits per 512 bytes
    Bch16,
}

impl EccMode {
    /// Every mode, in table column order
    pub const ALL: [EccMode; 6] = [
        EccMode::None,
        EccMode::Hamming,
        EccMode::Bch4,
        EccMode::Bch8,
        EccMode::Bch12,
        EccMode::Bch16,
    ];

    /// Number of correctable bits per step
    pub const fn strength(self) -> u8 {
        match self {
            EccMode::None => 0,
            EccMode::Hamming => 1,
            EccMode::Bch4 => 4,
            EccMode::Bch8 => 8,
            EccMode::Bch12 => 12,
            EccMode::Bch16 => 16,
        }
    }

    /// Column index into the geometry table
    pub(crate) const fn index(self) -> usize {
        match self {
            EccMode::None => 0,
            EccMode::Hamming => 1,
            EccMode::Bch4 => 2,
            EccMode::Bch8 => 3,
            EccMode::Bch12 => 4,
            EccMode::Bch16 => 5,
        }
    }

    /// Parse a mode name as used in config files and on the command line
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim();
        if name.eq_ignore_ascii_case("off") || name.eq_ignore_ascii_case("raw") {
            return Some(EccMode::None);
        }
        Self::ALL
            .iter()
            .copied()
            .find(|mode| name.eq_ignore_ascii_case(mode.name()))
    }

    /// Lowercase mode name
    pub const fn name(self) -> &'static str {
        match self {
            EccMode::None => "none",
            EccMode::Hamming => "hamming",
            EccMode::Bch4 => "bch4",
            EccMode::Bch8 => "bch8",
            EccMode::Bch12 => "bch12",
            EccMode::Bch16 => "bch16",
        }
    }
}

impl fmt::Display for EccMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A contiguous free region of the spare pool
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OobRegion {
    /// Offset from the start of the spare pool
    pub offset: u16,
    /// Length in bytes
    pub length: u16,
}

impl OobRegion {
    /// Create a new OOB region
    pub const fn new(offset: u16, length: u16) -> Self {
        Self { offset, length }
    }
}

/// Maximum number of free OOB regions per geometry
pub const MAX_OOB_REGIONS: usize = 2;

/// Spare bytes the filesystem may use freely
///
/// Excludes the bad-block marker bytes. ECC bytes never appear in the
/// host-visible spare pool, so they need no exclusion here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OobFree {
    count: u8,
    regions: [OobRegion; MAX_OOB_REGIONS],
}

impl OobFree {
    /// Get the active regions
    pub fn regions(&self) -> &[OobRegion] {
        &self.regions[..self.count as usize]
    }

    /// Total number of free bytes
    pub fn total(&self) -> u32 {
        self.regions().iter().map(|r| r.length as u32).sum()
    }
}

/// ECC placement as seen by the upper layers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EccLayout {
    /// ECC engine mode
    pub mode: EccMode,
    /// Correctable bits per step
    pub strength: u8,
    /// Bytes covered by one ECC step (one chunk)
    pub step_size: u16,
    /// Hardware-owned ECC bytes per chunk
    pub bytes_per_chunk: u16,
    /// Hardware-owned ECC bytes per page
    pub total_bytes: u16,
}

/// Bad-block scan descriptor handed to the BBT layer
///
/// `offset` is relative to the start of the spare pool. A good block has
/// `pattern()` at that offset in the OOB of its scan page: the last page
/// of the block when `scan_last_page` is set, the first one otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BbScanPattern {
    /// Offset of the marker in the spare pool
    pub offset: u8,
    /// Marker length in bytes (1 or 2)
    pub len: u8,
    /// Marker lives in the last page of the block instead of the first
    pub scan_last_page: bool,
    pattern: [u8; 2],
}

impl BbScanPattern {
    const fn new(offset: u8, len: u8) -> Self {
        Self {
            offset,
            len,
            scan_last_page: true,
            pattern: [ERASED_BYTE; 2],
        }
    }

    /// The good-block pattern bytes
    pub fn pattern(&self) -> &[u8] {
        &self.pattern[..self.len as usize]
    }

    /// Index within a block of the page carrying the marker
    pub const fn scan_page(&self, pages_per_block: u32) -> u32 {
        if self.scan_last_page && pages_per_block > 0 {
            pages_per_block - 1
        } else {
            0
        }
    }

    /// Whether the spare area `oob` of a scan page marks its block bad
    ///
    /// A spare area too short to hold the marker counts as bad.
    pub fn is_bad(&self, oob: &[u8]) -> bool {
        let start = self.offset as usize;
        oob.get(start..start + self.len as usize)
            .map_or(true, |marker| marker != self.pattern())
    }
}

/// Data and spare placement of one data chunk inside the staging buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkLayout {
    /// Offset of the chunk's main data
    pub data_offset: u32,
    /// Main data length (may be zero for a spare-only trailing chunk)
    pub data_len: u32,
    /// Offset of the chunk's spare slice in the spare pool region
    pub spare_offset: u32,
    /// Spare length (may be zero)
    pub spare_len: u32,
}

/// Chunk decomposition of one (page size, ECC mode) pair
///
/// The staging buffer keeps all main-data chunks contiguous, followed by
/// all spare chunks contiguous: `[page data | spare pool]`. Chunk `i` data
/// sits at `i * chunk_size`, its spare at `page_size + i * chunk_spare`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageGeometry {
    /// Main data bytes per page
    pub page_size: u32,
    /// Host-visible spare bytes per page
    pub oob_size: u32,
    /// ECC engine mode
    pub ecc: EccMode,
    /// Data bytes per full chunk
    pub chunk_size: u32,
    /// Spare bytes per full chunk
    pub chunk_spare: u32,
    /// Number of full chunks
    pub chunk_count: u32,
    /// Data bytes of the trailing chunk (0 if none)
    pub last_chunk_size: u32,
    /// Spare bytes of the trailing chunk (0 if none)
    pub last_chunk_spare: u32,
    /// Hardware ECC bytes per chunk (not host-visible)
    pub ecc_bytes: u32,
    /// Staging buffer offset of the factory bad-block marker
    pub bad_block_byte_offset: u32,
    /// Free OOB regions
    pub oob_free: OobFree,
    /// Bad-block scan descriptor
    pub bb_scan: BbScanPattern,
}

impl PageGeometry {
    /// Build a geometry row, deriving the OOB size, marker position and
    /// OOB descriptors from the chunk decomposition.
    #[allow(clippy::too_many_arguments)]
    pub const fn new(
        page_size: u32,
        ecc: EccMode,
        chunk_size: u32,
        chunk_spare: u32,
        chunk_count: u32,
        last_chunk_size: u32,
        last_chunk_spare: u32,
        ecc_bytes: u32,
    ) -> Self {
        let oob_size = chunk_spare * chunk_count + last_chunk_spare;
        let small_page = page_size <= 512;

        // Small pages keep the factory marker at OOB byte 5, large pages at
        // OOB bytes 0-1.
        let (bb_scan, oob_free) = if small_page {
            let tail = if oob_size > 6 { oob_size - 6 } else { 0 };
            (
                BbScanPattern::new(5, 1),
                OobFree {
                    count: 2,
                    regions: [OobRegion::new(0, 5), OobRegion::new(6, tail as u16)],
                },
            )
        } else {
            let tail = if oob_size > 2 { oob_size - 2 } else { 0 };
            (
                BbScanPattern::new(0, 2),
                OobFree {
                    count: 1,
                    regions: [OobRegion::new(2, tail as u16), OobRegion::new(0, 0)],
                },
            )
        };

        let mut geo = Self {
            page_size,
            oob_size,
            ecc,
            chunk_size,
            chunk_spare,
            chunk_count,
            last_chunk_size,
            last_chunk_spare,
            ecc_bytes,
            bad_block_byte_offset: 0,
            oob_free,
            bb_scan,
        };
        let raw_marker = page_size + bb_scan.offset as u32;
        geo.bad_block_byte_offset = geo.raw_to_staging(raw_marker);
        geo
    }

    /// Whether a trailing partial chunk exists
    ///
    /// `(0, 0)` means the page is an exact multiple of the chunk
    /// granularity. A data-only or spare-only trailing chunk is still a
    /// trailing chunk.
    pub const fn has_trailing_chunk(&self) -> bool {
        self.last_chunk_size != 0 || self.last_chunk_spare != 0
    }

    /// Number of data-carrying chunks per page
    pub const fn data_chunks(&self) -> u32 {
        self.chunk_count + if self.has_trailing_chunk() { 1 } else { 0 }
    }

    /// Size of the staging buffer needed for one page (data + spare pool)
    pub const fn staging_len(&self) -> u32 {
        self.page_size + self.oob_size
    }

    /// Placement of data chunk `index` (`0..data_chunks()`)
    pub const fn chunk_layout(&self, index: u32) -> ChunkLayout {
        let (data_len, spare_len) = if index < self.chunk_count {
            (self.chunk_size, self.chunk_spare)
        } else {
            (self.last_chunk_size, self.last_chunk_spare)
        };
        ChunkLayout {
            data_offset: index * self.chunk_size,
            data_len,
            spare_offset: self.page_size + index * self.chunk_spare,
            spare_len,
        }
    }

    /// Host-visible ECC description
    pub const fn ecc_layout(&self) -> EccLayout {
        EccLayout {
            mode: self.ecc,
            strength: self.ecc.strength(),
            step_size: self.chunk_size as u16,
            bytes_per_chunk: self.ecc_bytes as u16,
            total_bytes: (self.ecc_bytes * self.data_chunks()) as u16,
        }
    }

    /// Translate an offset in the raw on-die page (chunks stored as
    /// `[data][spare][ecc]` back to back) to the staging buffer.
    ///
    /// Offsets that land in hardware ECC bytes map to the first spare byte.
    pub const fn raw_to_staging(&self, raw: u32) -> u32 {
        let stride = self.chunk_size + self.chunk_spare + self.ecc_bytes;
        let full = stride * self.chunk_count;

        let (index, off, data_len, spare_len) = if raw < full {
            (raw / stride, raw % stride, self.chunk_size, self.chunk_spare)
        } else {
            (
                self.chunk_count,
                raw - full,
                self.last_chunk_size,
                self.last_chunk_spare,
            )
        };

        let layout = self.chunk_layout(index);
        if off < data_len {
            layout.data_offset + off
        } else if off < data_len + spare_len {
            layout.spare_offset + (off - data_len)
        } else {
            self.page_size
        }
    }
}
