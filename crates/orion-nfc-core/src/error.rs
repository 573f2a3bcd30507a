//! Error types for orion-nfc-core
//!
//! This module provides a no_std compatible error type that can be used
//! throughout the crate.

use core::fmt;

use crate::geometry::EccMode;

/// Failure kinds a sequencer run can terminate with
///
/// This is the subset of [`Error`] that the command sequencer itself can
/// produce; it is what [`SequencerState::Failed`](crate::sequencer::SequencerState)
/// carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A required phase-1 or phase-2 event never arrived
    CommandTimeout,
    /// The ECC engine reported an uncorrectable error
    UncorrectableEcc,
    /// The controller flagged a bad block during program/erase verification
    BadBlockDetected,
    /// The DMA engine reported a bus fault
    BusTransfer,
}

/// Core error type - no_std compatible, Copy for efficiency
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    // Geometry errors
    /// No geometry table entry for the requested page size / ECC mode
    GeometryUnsupported {
        /// Requested page size in bytes
        page_size: u32,
        /// Requested ECC mode
        ecc: EccMode,
    },

    // Sequencer errors
    /// A required completion event was not raised within the timeout
    CommandTimeout,
    /// Uncorrectable ECC error on a non-blank page
    UncorrectableEcc,
    /// Bad block reported during program or erase
    BadBlockDetected,
    /// DMA bus error while moving chunk data
    BusTransfer,

    // Interface errors
    /// NAND command opcode not handled by this controller
    UnsupportedCommand(u8),
    /// Page, block or column is beyond the device
    AddressOutOfBounds,
    /// Provided buffer is too small for the operation
    BufferTooSmall,
    /// A plan would exceed the fixed chunk capacity
    PlanOverflow,
    /// Command issued out of sequence (e.g. PAGEPROG without SEQIN)
    InvalidSequence,
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        match kind {
            ErrorKind::CommandTimeout => Self::CommandTimeout,
            ErrorKind::UncorrectableEcc => Self::UncorrectableEcc,
            ErrorKind::BadBlockDetected => Self::BadBlockDetected,
            ErrorKind::BusTransfer => Self::BusTransfer,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&Error::from(*self), f)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::GeometryUnsupported { page_size, ecc } => {
                write!(f, "no geometry for {} byte pages with {} ECC", page_size, ecc)
            }
            Self::CommandTimeout => write!(f, "controller command timed out"),
            Self::UncorrectableEcc => write!(f, "uncorrectable ECC error"),
            Self::BadBlockDetected => write!(f, "bad block detected"),
            Self::BusTransfer => write!(f, "DMA bus transfer error"),
            Self::UnsupportedCommand(cmd) => {
                write!(f, "unsupported NAND command 0x{:02X}", cmd)
            }
            Self::AddressOutOfBounds => write!(f, "address out of bounds"),
            Self::BufferTooSmall => write!(f, "buffer too small"),
            Self::PlanOverflow => write!(f, "operation plan exceeds chunk capacity"),
            Self::InvalidSequence => write!(f, "command issued out of sequence"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

/// Result type alias using the core Error type
pub type Result<T> = core::result::Result<T, Error>;
