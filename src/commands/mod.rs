//! CLI command implementations
//!
//! Every command works on a [`NandController`](orion_nfc_core::nand::NandController)
//! generic over its register and transfer seams, so the same code would
//! drive real hardware; the binary wires it to the emulator.

pub mod dump;
pub mod info;
pub mod page;
