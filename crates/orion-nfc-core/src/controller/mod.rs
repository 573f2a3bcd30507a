//! Controller hardware seams
//!
//! The sequencer never touches registers directly. It talks to the
//! controller through these traits, which a platform port implements over
//! MMIO and its interrupt line, and which the emulator implements in
//! memory.
//!
//! These traits use `maybe_async` to support both sync and async modes.
//! - By default, waiting methods are async (suitable for Embassy, tokio)
//! - With the `is_sync` feature, they become blocking

use bitflags::bitflags;
use maybe_async::maybe_async;

use crate::plan::{ChunkCommand, Direction, ScatterSegment};

bitflags! {
    /// Controller status / event bits
    ///
    /// Bit positions follow the controller's status register. Event bits
    /// are write-one-to-clear.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct NfcStatus: u32 {
        /// Controller is ready to accept command buffer writes
        const WRCMDREQ = 1 << 0;
        /// Read data is available in the FIFO
        const RDDREQ   = 1 << 1;
        /// FIFO is ready to accept write data
        const WRDREQ   = 1 << 2;
        /// ECC engine corrected bit errors
        const CORERR   = 1 << 3;
        /// ECC engine found an uncorrectable error
        const UNCERR   = 1 << 4;
        /// Bad block detected (program/erase status fail)
        const BBD      = 1 << 6;
        /// Command done
        const CMDD     = 1 << 8;
        /// Page done
        const PAGED    = 1 << 10;
        /// Device ready
        const RDY      = 1 << 11;
        /// Corrected bit count of the last chunk
        const ERR_CNT  = 0x1F << 16;
    }
}

impl Default for NfcStatus {
    fn default() -> Self {
        NfcStatus::empty()
    }
}

impl NfcStatus {
    /// Number of bits the ECC engine corrected in the last chunk
    pub fn corrected_bits(&self) -> u32 {
        (self.bits() & Self::ERR_CNT.bits()) >> 16
    }

    /// Status value carrying a corrected bit count
    pub fn with_corrected_bits(self, count: u32) -> Self {
        let cnt = Self::from_bits_retain((count.min(0x1F)) << 16);
        (self - Self::ERR_CNT) | cnt
    }
}

/// Register-level access to one controller
#[maybe_async(AFIT)]
pub trait NfcRegisters {
    /// Load the command buffer for `chunk` and start it
    ///
    /// Covers the command/address phase: set the run bit, wait for
    /// `WRCMDREQ`, write the command words.
    fn issue(&mut self, chunk: &ChunkCommand);

    /// Read the status register
    fn read_status(&mut self) -> NfcStatus;

    /// Acknowledge (clear) status bits
    fn clear_status(&mut self, bits: NfcStatus);

    /// Stop the controller, leaving it idle for the next command
    fn clear_run_bit(&mut self);

    /// Block until any bit of `mask` is raised, or `timeout_us` elapses
    ///
    /// Returns `false` on timeout.
    async fn wait_for_event(&mut self, mask: NfcStatus, timeout_us: u32) -> bool;
}

/// The controller's data FIFO, accessed one 32-bit word at a time
pub trait DataWindow {
    /// Pop one word from the FIFO
    fn read_word(&mut self) -> u32;

    /// Push one word into the FIFO
    fn write_word(&mut self, word: u32);
}

/// Sequence number of a submitted DMA descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DmaTicket(pub u32);

/// Completion signal for one DMA descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DmaCompletion {
    /// The descriptor finished successfully
    Done(DmaTicket),
    /// The descriptor hit a bus fault
    BusError(DmaTicket),
    /// Nothing completed within the timeout
    TimedOut,
}

/// An external bus-master DMA engine wired to the controller FIFO
///
/// The engine signals exactly one completion or one bus error per
/// submitted descriptor, in submission order.
#[maybe_async(AFIT)]
pub trait DmaEngine {
    /// Queue one descriptor covering all `segments` of `buf`
    fn submit_scatter_transfer(
        &mut self,
        segments: &[ScatterSegment],
        direction: Direction,
        buf: &mut [u8],
    ) -> DmaTicket;

    /// Wait for the next descriptor completion
    async fn wait_completion(&mut self, timeout_us: u32) -> DmaCompletion;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_corrected_bit_count() {
        let status = NfcStatus::RDDREQ | NfcStatus::CORERR;
        let status = status.with_corrected_bits(3);
        assert_eq!(status.corrected_bits(), 3);
        assert!(status.contains(NfcStatus::RDDREQ | NfcStatus::CORERR));

        // Saturates at the field width
        assert_eq!(status.with_corrected_bits(100).corrected_bits(), 0x1F);
    }
}
