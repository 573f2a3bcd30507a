//! orion-nfc-sim - In-memory NAND controller emulator for testing
//!
//! This crate emulates a NAND array sitting behind the controller, and
//! exposes it through the same register, FIFO and DMA seams a hardware port
//! implements. It's useful for testing and development without real
//! hardware.
//!
//! Faults (dead interrupts, ECC failures, bad blocks, DMA bus errors) can
//! be injected through [`SimNand::faults`].

mod array;
mod handles;
mod image;

pub use array::{Faults, SimNand, DEFAULT_ID};
pub use handles::{SharedNand, SimController, SimDataWindow, SimDma};

use std::cell::RefCell;
use std::rc::Rc;

use orion_nfc_core::nand::NandController;
use orion_nfc_core::transfer::SelectedBackend;

/// Errors from the emulator itself
#[derive(Debug, thiserror::Error)]
pub enum SimError {
    /// Image file I/O failed
    #[error("image I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// Image length does not fit the array
    #[error("image is {len} bytes; expected a multiple of {page_len} up to {capacity}")]
    ImageSize {
        /// Image length
        len: u64,
        /// Bytes per stored page
        page_len: usize,
        /// Array capacity in bytes
        capacity: u64,
    },
}

/// Transfer backend over the emulated FIFO / DMA engine
pub type SimBackend = SelectedBackend<SimDataWindow, SimDma>;

/// A NAND host interface driving the emulator
pub type SimNandController = NandController<SimController, SimBackend>;

/// Put a device behind a shared handle
pub fn shared(nand: SimNand) -> SharedNand {
    Rc::new(RefCell::new(nand))
}

/// Build a NAND host interface over an emulated device
///
/// The transfer mode and timeout come from the device's configuration.
pub fn attach(nand: &SharedNand) -> SimNandController {
    let config = *nand.borrow().config();
    let backend = SelectedBackend::select(
        config.transfer,
        SimDataWindow::new(nand.clone()),
        SimDma::new(nand.clone()),
        config.timeout_us,
    );
    log::debug!(
        "sim: attached {} byte pages, {} ECC, {}",
        config.page_size,
        config.ecc,
        config.transfer
    );
    NandController::new(SimController::new(nand.clone()), backend, config)
}
