//! Chunk command structure

use core::fmt;

/// Role of one hardware transaction within a page access
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChunkKind {
    /// Opens the page access and reads the first chunk
    Monolithic,
    /// Continues an already open read access
    Naked,
    /// Reads the trailing chunk and closes the access
    LastNaked,
    /// Arms a multi-part program sequence, no data
    DispatchStart,
    /// Writes one chunk of an armed program sequence
    NakedWrite,
    /// Closes the program sequence and triggers the program pulse
    DispatchEnd,
    /// Block erase
    Erase,
    /// Read the device ID bytes
    ReadId,
    /// Read the device status
    ReadStatus,
    /// Device reset
    Reset,
}

impl ChunkKind {
    /// Whether the chunk reads page data through the ECC engine
    pub const fn is_page_read(self) -> bool {
        matches!(self, Self::Monolithic | Self::Naked | Self::LastNaked)
    }

    /// Direction of the chunk's data phase, if it has one
    pub const fn direction(self) -> Option<Direction> {
        match self {
            Self::Monolithic | Self::Naked | Self::LastNaked | Self::ReadId | Self::ReadStatus => {
                Some(Direction::FromDevice)
            }
            Self::NakedWrite => Some(Direction::ToDevice),
            Self::DispatchStart | Self::DispatchEnd | Self::Erase | Self::Reset => None,
        }
    }
}

impl fmt::Display for ChunkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Monolithic => "monolithic",
            Self::Naked => "naked",
            Self::LastNaked => "last-naked",
            Self::DispatchStart => "dispatch-start",
            Self::NakedWrite => "naked-write",
            Self::DispatchEnd => "dispatch-end",
            Self::Erase => "erase",
            Self::ReadId => "read-id",
            Self::ReadStatus => "read-status",
            Self::Reset => "reset",
        };
        f.write_str(name)
    }
}

/// Data movement direction, seen from the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Controller FIFO to staging buffer
    FromDevice,
    /// Staging buffer to controller FIFO
    ToDevice,
}

/// A contiguous region of the staging buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScatterSegment {
    /// Offset into the staging buffer
    pub offset: u32,
    /// Length in bytes
    pub len: u32,
}

impl ScatterSegment {
    /// Create a new segment
    pub const fn new(offset: u32, len: u32) -> Self {
        Self { offset, len }
    }

    /// One past the last byte
    pub const fn end(&self) -> u32 {
        self.offset + self.len
    }
}

/// Maximum scatter segments per chunk (data slice + spare slice)
pub const MAX_SEGMENTS: usize = 2;

/// A single controller transaction
///
/// Designed to avoid allocation - segments live in a fixed array.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkCommand {
    /// Role of this chunk
    pub kind: ChunkKind,
    /// Target page address (any page of the block for erase)
    pub page_addr: u32,
    segment_count: u8,
    segments: [ScatterSegment; MAX_SEGMENTS],
}

impl ChunkCommand {
    /// Create a control chunk with no data phase
    pub const fn control(kind: ChunkKind, page_addr: u32) -> Self {
        Self {
            kind,
            page_addr,
            segment_count: 0,
            segments: [ScatterSegment::new(0, 0); MAX_SEGMENTS],
        }
    }

    /// Create a chunk moving one contiguous region
    pub const fn single(kind: ChunkKind, page_addr: u32, segment: ScatterSegment) -> Self {
        Self {
            kind,
            page_addr,
            segment_count: 1,
            segments: [segment, ScatterSegment::new(0, 0)],
        }
    }

    /// Create a chunk for a data slice and a spare slice
    ///
    /// Empty slices are dropped and adjacent slices are merged, so the
    /// result carries one segment whenever one suffices.
    pub fn scatter(kind: ChunkKind, page_addr: u32, data: ScatterSegment, spare: ScatterSegment) -> Self {
        let mut cmd = Self::control(kind, page_addr);
        for seg in [data, spare] {
            if seg.len == 0 {
                continue;
            }
            if cmd.segment_count > 0 {
                let last = &mut cmd.segments[cmd.segment_count as usize - 1];
                if last.end() == seg.offset {
                    last.len += seg.len;
                    continue;
                }
            }
            cmd.segments[cmd.segment_count as usize] = seg;
            cmd.segment_count += 1;
        }
        cmd
    }

    /// Get the active segments, in transfer order
    pub fn segments(&self) -> &[ScatterSegment] {
        &self.segments[..self.segment_count as usize]
    }

    /// Total bytes moved by this chunk
    pub fn transfer_len(&self) -> u32 {
        self.segments().iter().map(|s| s.len).sum()
    }

    /// Returns true if this chunk has a data phase
    pub fn has_data(&self) -> bool {
        self.segment_count > 0
    }
}
