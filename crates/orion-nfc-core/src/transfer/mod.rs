//! Chunk data movement
//!
//! Two interchangeable strategies move a chunk's scatter segments between
//! the controller FIFO and the staging buffer:
//!
//! - [`ProcessorDriven`]: the CPU copies word by word through the data
//!   window. No external engine needed.
//! - [`BusMasterDriven`]: all segments go to a DMA engine as one
//!   descriptor, then the backend waits for its completion.
//!
//! The strategy is picked once when the controller is built. The sequencer
//! only sees the [`TransferBackend`] trait.

mod dma;
mod pio;

pub use dma::{BusMasterDriven, DEFAULT_DMA_TIMEOUT_US};
pub use pio::ProcessorDriven;

use core::fmt;

use maybe_async::maybe_async;

use crate::controller::{DataWindow, DmaEngine};
use crate::error::Error;
use crate::plan::{Direction, ScatterSegment};

/// A chunk's data phase failed on the bus
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusTransferError;

impl fmt::Display for BusTransferError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bus transfer error")
    }
}

impl From<BusTransferError> for Error {
    fn from(_: BusTransferError) -> Self {
        Error::BusTransfer
    }
}

/// How chunk data is moved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "std", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "std", serde(rename_all = "lowercase"))]
pub enum TransferMode {
    /// Processor-driven copies (PIO)
    #[default]
    Pio,
    /// Bus-master DMA
    Dma,
}

impl fmt::Display for TransferMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferMode::Pio => write!(f, "pio"),
            TransferMode::Dma => write!(f, "dma"),
        }
    }
}

/// Moves one chunk's segments between the controller and the staging buffer
#[maybe_async(AFIT)]
pub trait TransferBackend {
    /// Transfer every segment of `buf`, in order
    async fn submit(
        &mut self,
        segments: &[ScatterSegment],
        direction: Direction,
        buf: &mut [u8],
    ) -> Result<(), BusTransferError>;
}

/// A transfer strategy chosen at runtime
///
/// Wraps both backends so a controller can be configured for PIO or DMA
/// without changing its type.
pub enum SelectedBackend<W, D> {
    /// Processor-driven copies
    Pio(ProcessorDriven<W>),
    /// Bus-master DMA
    Dma(BusMasterDriven<D>),
}

impl<W: DataWindow, D: DmaEngine> SelectedBackend<W, D> {
    /// Build the backend `mode` selects
    ///
    /// The unused handle is dropped.
    pub fn select(mode: TransferMode, window: W, engine: D, dma_timeout_us: u32) -> Self {
        match mode {
            TransferMode::Pio => Self::Pio(ProcessorDriven::new(window)),
            TransferMode::Dma => {
                Self::Dma(BusMasterDriven::new(engine).with_timeout(dma_timeout_us))
            }
        }
    }

    /// The active strategy
    pub fn mode(&self) -> TransferMode {
        match self {
            Self::Pio(_) => TransferMode::Pio,
            Self::Dma(_) => TransferMode::Dma,
        }
    }
}

#[maybe_async(AFIT)]
impl<W: DataWindow, D: DmaEngine> TransferBackend for SelectedBackend<W, D> {
    async fn submit(
        &mut self,
        segments: &[ScatterSegment],
        direction: Direction,
        buf: &mut [u8],
    ) -> Result<(), BusTransferError> {
        match self {
            Self::Pio(pio) => pio.submit(segments, direction, buf).await,
            Self::Dma(dma) => dma.submit(segments, direction, buf).await,
        }
    }
}

/// Resolve a segment to its byte range in `buf`
fn segment_range(
    segment: &ScatterSegment,
    buf_len: usize,
) -> Result<core::ops::Range<usize>, BusTransferError> {
    let start = segment.offset as usize;
    let end = start + segment.len as usize;
    if end > buf_len {
        log::warn!(
            "segment 0x{:X}+0x{:X} exceeds staging buffer ({} bytes)",
            segment.offset,
            segment.len,
            buf_len
        );
        return Err(BusTransferError);
    }
    Ok(start..end)
}
