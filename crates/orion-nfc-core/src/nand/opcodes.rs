//! Standard NAND command opcodes and status bits
//!
//! The subset of ONFI / legacy NAND commands the controller's host
//! interface accepts.

use crate::error::Error;

// ============================================================================
// Page access
// ============================================================================

/// Read page (first cycle)
pub const NAND_CMD_READ0: u8 = 0x00;
/// Read spare area (small-page devices)
pub const NAND_CMD_READOOB: u8 = 0x50;
/// Serial data input, starts a program sequence
pub const NAND_CMD_SEQIN: u8 = 0x80;
/// Confirm page program
pub const NAND_CMD_PAGEPROG: u8 = 0x10;

// ============================================================================
// Block erase
// ============================================================================

/// Block erase setup
pub const NAND_CMD_ERASE1: u8 = 0x60;
/// Block erase confirm
pub const NAND_CMD_ERASE2: u8 = 0xD0;

// ============================================================================
// Identification and status
// ============================================================================

/// Read ID
pub const NAND_CMD_READID: u8 = 0x90;
/// Read status
pub const NAND_CMD_STATUS: u8 = 0x70;
/// Reset
pub const NAND_CMD_RESET: u8 = 0xFF;

// ============================================================================
// Status byte
// ============================================================================

/// Last program/erase failed
pub const NAND_STATUS_FAIL: u8 = 0x01;
/// Device ready
pub const NAND_STATUS_READY: u8 = 0x40;
/// Not write protected
pub const NAND_STATUS_WP: u8 = 0x80;

/// A decoded host command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NandCommand {
    /// `READ0`
    Read0,
    /// `READOOB`
    ReadOob,
    /// `SEQIN`
    SeqIn,
    /// `PAGEPROG`
    PageProg,
    /// `ERASE1`
    Erase1,
    /// `ERASE2`
    Erase2,
    /// `READID`
    ReadId,
    /// `STATUS`
    Status,
    /// `RESET`
    Reset,
}

impl NandCommand {
    /// The command's opcode
    pub const fn opcode(self) -> u8 {
        match self {
            Self::Read0 => NAND_CMD_READ0,
            Self::ReadOob => NAND_CMD_READOOB,
            Self::SeqIn => NAND_CMD_SEQIN,
            Self::PageProg => NAND_CMD_PAGEPROG,
            Self::Erase1 => NAND_CMD_ERASE1,
            Self::Erase2 => NAND_CMD_ERASE2,
            Self::ReadId => NAND_CMD_READID,
            Self::Status => NAND_CMD_STATUS,
            Self::Reset => NAND_CMD_RESET,
        }
    }
}

impl TryFrom<u8> for NandCommand {
    type Error = Error;

    fn try_from(opcode: u8) -> Result<Self, Error> {
        Ok(match opcode {
            NAND_CMD_READ0 => Self::Read0,
            NAND_CMD_READOOB => Self::ReadOob,
            NAND_CMD_SEQIN => Self::SeqIn,
            NAND_CMD_PAGEPROG => Self::PageProg,
            NAND_CMD_ERASE1 => Self::Erase1,
            NAND_CMD_ERASE2 => Self::Erase2,
            NAND_CMD_READID => Self::ReadId,
            NAND_CMD_STATUS => Self::Status,
            NAND_CMD_RESET => Self::Reset,
            other => return Err(Error::UnsupportedCommand(other)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_opcode_is_rejected() {
        assert_eq!(NandCommand::try_from(0x30), Err(Error::UnsupportedCommand(0x30)));
        assert_eq!(NandCommand::try_from(0xD0), Ok(NandCommand::Erase2));
        assert_eq!(NandCommand::Status.opcode(), 0x70);
    }
}
