//! Hardware-seam handles onto a shared [`SimNand`]

use std::cell::RefCell;
use std::rc::Rc;

use maybe_async::maybe_async;
use orion_nfc_core::controller::{
    DataWindow, DmaCompletion, DmaEngine, DmaTicket, NfcRegisters, NfcStatus,
};
use orion_nfc_core::plan::{ChunkCommand, Direction, ScatterSegment};

use crate::array::SimNand;

/// A [`SimNand`] shared by the register, FIFO and DMA handles
pub type SharedNand = Rc<RefCell<SimNand>>;

/// Register interface of the emulated controller
#[derive(Clone)]
pub struct SimController {
    nand: SharedNand,
}

impl SimController {
    /// Create a register handle
    pub fn new(nand: SharedNand) -> Self {
        Self { nand }
    }
}

#[maybe_async(AFIT)]
impl NfcRegisters for SimController {
    fn issue(&mut self, chunk: &ChunkCommand) {
        self.nand.borrow_mut().issue(chunk);
    }

    fn read_status(&mut self) -> NfcStatus {
        self.nand.borrow().read_status()
    }

    fn clear_status(&mut self, bits: NfcStatus) {
        self.nand.borrow_mut().clear_status(bits);
    }

    fn clear_run_bit(&mut self) {
        self.nand.borrow_mut().clear_run_bit();
    }

    async fn wait_for_event(&mut self, mask: NfcStatus, _timeout_us: u32) -> bool {
        self.nand.borrow().wait_for_event(mask)
    }
}

/// Data FIFO of the emulated controller
#[derive(Clone)]
pub struct SimDataWindow {
    nand: SharedNand,
}

impl SimDataWindow {
    /// Create a FIFO handle
    pub fn new(nand: SharedNand) -> Self {
        Self { nand }
    }
}

impl DataWindow for SimDataWindow {
    fn read_word(&mut self) -> u32 {
        self.nand.borrow_mut().fifo_read()
    }

    fn write_word(&mut self, word: u32) {
        self.nand.borrow_mut().fifo_write(word);
    }
}

/// DMA engine wired to the emulated FIFO
///
/// Descriptors complete immediately; completions queue up in submission
/// order.
#[derive(Clone)]
pub struct SimDma {
    nand: SharedNand,
}

impl SimDma {
    /// Create a DMA handle
    pub fn new(nand: SharedNand) -> Self {
        Self { nand }
    }
}

#[maybe_async(AFIT)]
impl DmaEngine for SimDma {
    fn submit_scatter_transfer(
        &mut self,
        segments: &[ScatterSegment],
        direction: Direction,
        buf: &mut [u8],
    ) -> DmaTicket {
        self.nand
            .borrow_mut()
            .dma_submit(segments, direction == Direction::ToDevice, buf)
    }

    async fn wait_completion(&mut self, _timeout_us: u32) -> DmaCompletion {
        self.nand.borrow_mut().dma_completion()
    }
}
