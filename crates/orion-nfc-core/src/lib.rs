//! orion-nfc-core - NAND flash controller command sequencer
//!
//! This crate turns NAND page, erase, ID, status and reset requests into
//! the chunked command sequences a multi-chunk ECC NAND flash controller
//! needs, and runs them against the controller through small hardware
//! traits. It is `no_std` and allocation free on the execution path.
//!
//! # Features
//!
//! - `std` - Enable standard library support (includes `alloc`), TOML
//!   controller profiles and `std::error::Error`
//! - `alloc` - Enable heap allocation
//! - `is_sync` - Compile the async API as blocking calls
//!
//! # Example
//!
//! ```ignore
//! use orion_nfc_core::{config::ControllerConfig, nand::NandController};
//!
//! fn first_page<R: NfcRegisters, T: TransferBackend>(regs: R, backend: T) {
//!     let mut nand = NandController::new(regs, backend, ControllerConfig::default());
//!     let mut data = [0u8; 2048];
//!     match nand.read_page(0, &mut data, None) {
//!         Ok(()) => println!("first byte: {:02X}", data[0]),
//!         Err(e) => println!("read failed: {}", e),
//!     }
//! }
//! ```

#![no_std]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
// Allow async fn in traits - we use maybe-async for dual sync/async support
#![allow(async_fn_in_trait)]

#[cfg(feature = "alloc")]
extern crate alloc;

#[cfg(any(feature = "std", test))]
extern crate std;

pub mod config;
pub mod controller;
pub mod error;
pub mod geometry;
pub mod nand;
pub mod plan;
pub mod sequencer;
pub mod transfer;

pub use error::{Error, ErrorKind, Result};
