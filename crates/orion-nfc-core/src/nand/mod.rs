//! NAND host interface
//!
//! [`NandController`] is what a NAND framework talks to: the classic
//! `cmdfunc` / cursor-read / cursor-write surface on top of the command
//! sequencer. It owns a staging buffer holding one page laid out as
//! `[page data | spare pool]`; reads fill it, SEQIN + `write_buf` stage a
//! page into it, PAGEPROG programs it.
//!
//! Uses `maybe_async` to support both sync and async modes.

pub mod opcodes;

pub use opcodes::NandCommand;

use maybe_async::maybe_async;

use crate::config::ControllerConfig;
use crate::controller::NfcRegisters;
use crate::error::{Error, Result};
use crate::geometry::{
    BbScanPattern, EccLayout, OobFree, PageGeometry, ERASED_BYTE, MAX_STAGING_LEN,
};
use crate::plan::{LogicalOp, READ_ID_LEN, READ_STATUS_LEN};
use crate::sequencer::{CommandSequencer, EccStats, SequencerState};
use crate::transfer::TransferBackend;
use opcodes::{NAND_STATUS_FAIL, NAND_STATUS_READY, NAND_STATUS_WP};

/// Byte written over the good-block pattern to mark a block bad
const BAD_BLOCK_MARKER: u8 = 0x00;

/// The NAND host interface of one controller
pub struct NandController<R, T> {
    seq: CommandSequencer<R, T>,
    config: ControllerConfig,
    geometry: Option<&'static PageGeometry>,
    buf: [u8; MAX_STAGING_LEN],
    buf_start: usize,
    buf_count: usize,
    seqin_page: Option<u32>,
    status_fail: bool,
}

impl<R: NfcRegisters, T: TransferBackend> NandController<R, T> {
    /// Create the interface over a controller and a transfer backend
    ///
    /// The geometry is not resolved here; an unsupported page size / ECC
    /// pair fails the first operation that needs it.
    pub fn new(regs: R, backend: T, config: ControllerConfig) -> Self {
        Self {
            seq: CommandSequencer::new(regs, backend).with_timeout(config.timeout_us),
            config,
            geometry: None,
            buf: [ERASED_BYTE; MAX_STAGING_LEN],
            buf_start: 0,
            buf_count: 0,
            seqin_page: None,
            status_fail: false,
        }
    }

    /// The controller configuration
    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    /// The underlying sequencer
    pub fn sequencer(&self) -> &CommandSequencer<R, T> {
        &self.seq
    }

    /// Current sequencer state
    pub fn state(&self) -> SequencerState {
        self.seq.state()
    }

    // ------------------------------------------------------------------
    // Attach-time queries
    // ------------------------------------------------------------------

    /// ECC counters accumulated since creation
    pub fn ecc_stats(&self) -> EccStats {
        self.seq.ecc_stats()
    }

    /// Page geometry of the attached device
    pub fn geometry(&self) -> Result<&'static PageGeometry> {
        match self.geometry {
            Some(geometry) => Ok(geometry),
            None => self.config.geometry(),
        }
    }

    /// Free OOB regions, relative to the start of the spare pool
    pub fn oob_free(&self) -> Result<OobFree> {
        Ok(self.geometry()?.oob_free)
    }

    /// Host-visible ECC layout
    pub fn ecc_layout(&self) -> Result<EccLayout> {
        Ok(self.geometry()?.ecc_layout())
    }

    /// Bad-block scan descriptor
    pub fn bbt_descriptor(&self) -> Result<BbScanPattern> {
        Ok(self.geometry()?.bb_scan)
    }

    /// Staging buffer offset of the factory bad-block marker
    pub fn bad_block_byte_offset(&self) -> Result<u32> {
        Ok(self.geometry()?.bad_block_byte_offset)
    }

    fn page_geometry(&mut self) -> Result<&'static PageGeometry> {
        if let Some(geometry) = self.geometry {
            return Ok(geometry);
        }
        let geometry = self.config.geometry()?;
        log::debug!(
            "geometry {}+{} bytes, {}: {} chunk(s) of {}+{}, trailing {}+{}",
            geometry.page_size,
            geometry.oob_size,
            geometry.ecc,
            geometry.chunk_count,
            geometry.chunk_size,
            geometry.chunk_spare,
            geometry.last_chunk_size,
            geometry.last_chunk_spare
        );
        self.geometry = Some(geometry);
        Ok(geometry)
    }

    fn check_page(&self, page: u32) -> Result<()> {
        if page >= self.config.total_pages() {
            log::warn!(
                "page {} beyond device ({} pages)",
                page,
                self.config.total_pages()
            );
            return Err(Error::AddressOutOfBounds);
        }
        Ok(())
    }

    /// Staging offset of `column` for a page command
    ///
    /// READOOB columns count from the start of the spare pool.
    fn cursor_column(geometry: &PageGeometry, command: NandCommand, column: u32) -> Result<u32> {
        let (base, limit) = match command {
            NandCommand::ReadOob => (geometry.page_size, geometry.oob_size),
            _ => (0, geometry.staging_len()),
        };
        if column > limit {
            log::warn!("{:?}: column {} beyond {} bytes", command, column, limit);
            return Err(Error::AddressOutOfBounds);
        }
        Ok(base + column)
    }

    fn set_cursor(&mut self, start: u32, count: u32) {
        self.buf_count = count as usize;
        self.buf_start = (start as usize).min(self.buf_count);
    }

    // ------------------------------------------------------------------
    // Command dispatch
    // ------------------------------------------------------------------

    /// Execute one host command
    ///
    /// `column` is a byte offset within the page (or the spare area for
    /// READOOB), `page` the absolute page number. Unknown opcodes fail with
    /// [`Error::UnsupportedCommand`].
    #[maybe_async]
    pub async fn cmdfunc(&mut self, command: u8, column: u32, page: u32) -> Result<()> {
        let command = NandCommand::try_from(command)?;
        log::trace!("cmdfunc {:?} column {} page {}", command, column, page);

        match command {
            NandCommand::Read0 | NandCommand::ReadOob => {
                let geometry = self.page_geometry()?;
                self.check_page(page)?;
                let start = Self::cursor_column(geometry, command, column)?;
                let len = geometry.staging_len();
                // The cursor is valid even if the read fails, so the caller
                // can look at the raw page.
                self.set_cursor(start, len);
                self.seq
                    .execute(
                        LogicalOp::ReadMonolithic,
                        page,
                        geometry,
                        &mut self.buf[..len as usize],
                    )
                    .await
            }
            NandCommand::SeqIn => {
                let geometry = self.page_geometry()?;
                self.check_page(page)?;
                let start = Self::cursor_column(geometry, command, column)?;
                let len = geometry.staging_len();
                self.buf[geometry.page_size as usize..len as usize].fill(ERASED_BYTE);
                self.seqin_page = Some(page);
                self.set_cursor(start, len);
                Ok(())
            }
            NandCommand::PageProg => {
                let page = self.seqin_page.take().ok_or(Error::InvalidSequence)?;
                let geometry = self.page_geometry()?;
                let len = geometry.staging_len() as usize;
                let result = self
                    .seq
                    .execute(
                        LogicalOp::WriteMonolithic,
                        page,
                        geometry,
                        &mut self.buf[..len],
                    )
                    .await;
                self.status_fail = result.is_err();
                result
            }
            NandCommand::Erase1 => {
                self.check_page(page)?;
                let result = self
                    .seq
                    .execute_control(LogicalOp::Erase, page, &mut [])
                    .await;
                self.status_fail = result.is_err();
                result
            }
            NandCommand::Erase2 => Ok(()),
            NandCommand::ReadId => {
                self.set_cursor(0, READ_ID_LEN);
                self.seq
                    .execute_control(
                        LogicalOp::ReadId,
                        column,
                        &mut self.buf[..READ_ID_LEN as usize],
                    )
                    .await
            }
            NandCommand::Status => {
                self.set_cursor(0, READ_STATUS_LEN);
                self.seq
                    .execute_control(
                        LogicalOp::ReadStatus,
                        0,
                        &mut self.buf[..READ_STATUS_LEN as usize],
                    )
                    .await
            }
            NandCommand::Reset => {
                self.seqin_page = None;
                self.status_fail = false;
                self.set_cursor(0, 0);
                self.seq.execute_control(LogicalOp::Reset, 0, &mut []).await
            }
        }
    }

    /// NAND status byte of the last program or erase
    ///
    /// Commands complete synchronously, so the device is always reported
    /// ready and never write protected.
    pub fn waitfunc(&self) -> u8 {
        let mut status = NAND_STATUS_READY | NAND_STATUS_WP;
        if self.status_fail {
            status |= NAND_STATUS_FAIL;
        }
        status
    }

    // ------------------------------------------------------------------
    // Cursor access
    // ------------------------------------------------------------------

    /// Read the byte at the cursor
    ///
    /// Returns `0xFF` once the cursor is past the end.
    pub fn read_byte(&mut self) -> u8 {
        if self.buf_start < self.buf_count {
            let byte = self.buf[self.buf_start];
            self.buf_start += 1;
            byte
        } else {
            ERASED_BYTE
        }
    }

    /// Read a little-endian 16-bit word at the cursor
    pub fn read_word(&mut self) -> u16 {
        let lo = self.read_byte();
        let hi = self.read_byte();
        u16::from_le_bytes([lo, hi])
    }

    /// Fill `out` from the cursor; bytes past the end read as `0xFF`
    pub fn read_buf(&mut self, out: &mut [u8]) {
        let available = self.buf_count - self.buf_start;
        let n = out.len().min(available);
        out[..n].copy_from_slice(&self.buf[self.buf_start..self.buf_start + n]);
        out[n..].fill(ERASED_BYTE);
        self.buf_start += n;
    }

    /// Copy `data` into the staging buffer at the cursor
    ///
    /// Bytes past the end of the staged page are dropped.
    pub fn write_buf(&mut self, data: &[u8]) {
        let room = self.buf_count - self.buf_start;
        let n = data.len().min(room);
        if n < data.len() {
            log::warn!("write_buf: dropping {} byte(s) past end of page", data.len() - n);
        }
        self.buf[self.buf_start..self.buf_start + n].copy_from_slice(&data[..n]);
        self.buf_start += n;
    }

    // ------------------------------------------------------------------
    // Page-level helpers
    // ------------------------------------------------------------------

    /// Mark the block containing byte `offset` bad
    ///
    /// Programs zero bytes over the good-block pattern in the spare area of
    /// the block's scan page (see [`BbScanPattern::scan_page`]), and over
    /// the factory marker position in the staged page.
    #[maybe_async]
    pub async fn block_markbad(&mut self, offset: u64) -> Result<()> {
        let geometry = self.page_geometry()?;
        let block = offset
            .checked_div(self.config.block_size())
            .ok_or(Error::AddressOutOfBounds)?;
        if block >= self.config.block_count as u64 {
            return Err(Error::AddressOutOfBounds);
        }
        let block = block as u32;
        let bb = geometry.bb_scan;
        let page = self.config.block_to_page(block) + bb.scan_page(self.config.pages_per_block);

        self.cmdfunc(opcodes::NAND_CMD_SEQIN, 0, page).await?;
        self.buf[..geometry.page_size as usize].fill(ERASED_BYTE);

        let scan = (geometry.page_size + bb.offset as u32) as usize;
        self.buf[scan..scan + bb.len as usize].fill(BAD_BLOCK_MARKER);
        let marker = geometry.bad_block_byte_offset as usize;
        self.buf[marker..marker + bb.len as usize].fill(BAD_BLOCK_MARKER);

        log::info!("marking block {} bad (page {})", block, page);
        self.cmdfunc(opcodes::NAND_CMD_PAGEPROG, 0, page).await
    }

    /// Read one page and, optionally, its spare area
    ///
    /// On an ECC failure the raw data is still copied out before the error
    /// is returned.
    #[maybe_async]
    pub async fn read_page(&mut self, page: u32, data: &mut [u8], oob: Option<&mut [u8]>) -> Result<()> {
        let result = self.cmdfunc(opcodes::NAND_CMD_READ0, 0, page).await;
        if matches!(result, Ok(()) | Err(Error::UncorrectableEcc)) {
            self.read_buf(data);
            if let Some(oob) = oob {
                let page_size = self.page_geometry()?.page_size;
                self.buf_start = page_size as usize;
                self.read_buf(oob);
            }
        }
        result
    }

    /// Program one page
    ///
    /// A short `data` is padded with `0xFF`; the spare area not covered by
    /// `oob` stays erased.
    #[maybe_async]
    pub async fn write_page(&mut self, page: u32, data: &[u8], oob: Option<&[u8]>) -> Result<()> {
        let geometry = self.page_geometry()?;
        if data.len() > geometry.page_size as usize
            || oob.map_or(0, <[u8]>::len) > geometry.oob_size as usize
        {
            return Err(Error::AddressOutOfBounds);
        }

        self.cmdfunc(opcodes::NAND_CMD_SEQIN, 0, page).await?;
        self.buf[..geometry.page_size as usize].fill(ERASED_BYTE);
        self.write_buf(data);
        if let Some(oob) = oob {
            self.buf_start = geometry.page_size as usize;
            self.write_buf(oob);
        }
        self.cmdfunc(opcodes::NAND_CMD_PAGEPROG, 0, page).await
    }

    /// Erase one block
    #[maybe_async]
    pub async fn erase_block(&mut self, block: u32) -> Result<()> {
        if block >= self.config.block_count {
            return Err(Error::AddressOutOfBounds);
        }
        let page = self.config.block_to_page(block);
        self.cmdfunc(opcodes::NAND_CMD_ERASE1, 0, page).await?;
        self.cmdfunc(opcodes::NAND_CMD_ERASE2, 0, page).await
    }

    /// Read the device ID into `buf` (up to 8 bytes are meaningful)
    #[maybe_async]
    pub async fn read_id(&mut self, buf: &mut [u8]) -> Result<()> {
        self.cmdfunc(opcodes::NAND_CMD_READID, 0, 0).await?;
        self.read_buf(buf);
        Ok(())
    }

    /// Read the device status byte
    #[maybe_async]
    pub async fn read_status(&mut self) -> Result<u8> {
        self.cmdfunc(opcodes::NAND_CMD_STATUS, 0, 0).await?;
        Ok(self.read_byte())
    }

    /// Reset the device and the controller
    #[maybe_async]
    pub async fn reset(&mut self) -> Result<()> {
        self.cmdfunc(opcodes::NAND_CMD_RESET, 0, 0).await
    }
}
