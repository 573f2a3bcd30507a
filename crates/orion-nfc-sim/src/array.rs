//! The emulated NAND array and controller core

use std::collections::{HashMap, HashSet, VecDeque};
use std::vec;
use std::vec::Vec;

use orion_nfc_core::config::ControllerConfig;
use orion_nfc_core::controller::{DmaCompletion, DmaTicket, NfcStatus};
use orion_nfc_core::geometry::{EccMode, PageGeometry, ERASED_BYTE};
use orion_nfc_core::nand::opcodes::{NAND_STATUS_FAIL, NAND_STATUS_READY, NAND_STATUS_WP};
use orion_nfc_core::plan::{ChunkCommand, ChunkKind, ScatterSegment};

/// Default ID: Samsung K9F2G08 style, padded to 8 bytes
pub const DEFAULT_ID: [u8; 8] = [0xEC, 0xDA, 0x10, 0x95, 0x44, 0x00, 0x00, 0x00];

/// Fault injection switches
#[derive(Debug, Clone, Default)]
pub struct Faults {
    /// No event ever fires; every wait times out
    pub fail_events: bool,
    /// Pages whose reads report an uncorrectable ECC error
    pub uncorrectable_pages: HashSet<u32>,
    /// Pages whose reads report this many corrected bits per chunk
    pub corrected_pages: HashMap<u32, u32>,
    /// Blocks whose program operations report a bad block
    pub bad_on_program: HashSet<u32>,
    /// Blocks whose erase operations report a bad block
    pub bad_on_erase: HashSet<u32>,
    /// Every DMA descriptor ends in a bus error
    pub dma_bus_error: bool,
}

/// An in-memory NAND device behind an emulated controller
///
/// Pages are stored in staging layout (`[page data | spare]`). Pages never
/// programmed since their last erase are not stored at all and read back
/// as `0xFF`.
pub struct SimNand {
    config: ControllerConfig,
    page_len: usize,
    ecc: EccMode,
    pages: HashMap<u32, Vec<u8>>,
    id: [u8; 8],

    /// Fault injection
    pub faults: Faults,

    // Controller state
    current: Option<ChunkCommand>,
    status: NfcStatus,
    latch: Vec<u8>,
    fifo_segment: usize,
    fifo_offset: usize,
    program_failed: bool,

    // DMA engine state
    next_ticket: u32,
    completions: VecDeque<DmaCompletion>,

    // Bookkeeping for tests
    issued: Vec<ChunkKind>,
    run_bit_clears: u32,
}

impl SimNand {
    /// Create an erased device shaped by `config`
    ///
    /// The array works for any page size; if the page size / ECC pair has
    /// no geometry the spare area is simply absent.
    pub fn new(config: ControllerConfig) -> Self {
        let page_size = config.page_size as usize;
        let page_len = config
            .geometry()
            .map_or(page_size, |g| g.staging_len() as usize);
        Self {
            config,
            page_len,
            ecc: config.ecc,
            pages: HashMap::new(),
            id: DEFAULT_ID,
            faults: Faults::default(),
            current: None,
            status: NfcStatus::empty(),
            latch: vec![ERASED_BYTE; page_len],
            fifo_segment: 0,
            fifo_offset: 0,
            program_failed: false,
            next_ticket: 0,
            completions: VecDeque::new(),
            issued: Vec::new(),
            run_bit_clears: 0,
        }
    }

    /// Replace the ID bytes
    pub fn with_id(mut self, id: [u8; 8]) -> Self {
        self.id = id;
        self
    }

    /// The device configuration
    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    /// Bytes stored per page (data followed by spare)
    pub fn page_len(&self) -> usize {
        self.page_len
    }

    /// Chunk kinds issued since creation
    pub fn issued(&self) -> &[ChunkKind] {
        &self.issued
    }

    /// How many times the run bit was cleared
    pub fn run_bit_clears(&self) -> u32 {
        self.run_bit_clears
    }

    /// Forget the issue log and run-bit counter
    pub fn clear_log(&mut self) {
        self.issued.clear();
        self.run_bit_clears = 0;
    }

    /// Raw content of one page (data followed by spare)
    pub fn page(&self, page: u32) -> Vec<u8> {
        self.pages
            .get(&page)
            .cloned()
            .unwrap_or_else(|| vec![ERASED_BYTE; self.page_len])
    }

    /// Overwrite one page directly, bypassing the controller
    pub fn set_page(&mut self, page: u32, content: &[u8]) {
        let mut stored = vec![ERASED_BYTE; self.page_len];
        let n = content.len().min(self.page_len);
        stored[..n].copy_from_slice(&content[..n]);
        self.store_page(page, stored);
    }

    /// Number of pages holding anything but `0xFF`
    pub fn programmed_pages(&self) -> usize {
        self.pages.len()
    }

    /// Write a factory bad-block marker into the scan page of `block`
    pub fn mark_factory_bad(&mut self, block: u32, geometry: &PageGeometry) {
        let bb = geometry.bb_scan;
        let page =
            self.config.block_to_page(block) + bb.scan_page(self.config.pages_per_block);
        let mut content = self.page(page);
        let scan = (geometry.page_size + bb.offset as u32) as usize;
        content[scan..scan + bb.len as usize].fill(0x00);
        self.store_page(page, content);
    }

    pub(crate) fn stored_page(&self, page: u32) -> Option<&[u8]> {
        self.pages.get(&page).map(Vec::as_slice)
    }

    pub(crate) fn erase_all(&mut self) {
        self.pages.clear();
    }

    pub(crate) fn store_page(&mut self, page: u32, content: Vec<u8>) {
        if content.iter().all(|&b| b == ERASED_BYTE) {
            self.pages.remove(&page);
        } else {
            self.pages.insert(page, content);
        }
    }

    fn block_of(&self, page: u32) -> u32 {
        page / self.config.pages_per_block
    }

    fn is_blank(&self, page: u32) -> bool {
        !self.pages.contains_key(&page)
    }

    // ------------------------------------------------------------------
    // Controller side
    // ------------------------------------------------------------------

    pub(crate) fn issue(&mut self, chunk: &ChunkCommand) {
        log::trace!("sim: issue {} page {}", chunk.kind, chunk.page_addr);
        self.issued.push(chunk.kind);
        self.current = Some(*chunk);
        self.fifo_segment = 0;
        self.fifo_offset = 0;
        self.status = match chunk.kind {
            ChunkKind::Monolithic | ChunkKind::Naked | ChunkKind::LastNaked => {
                NfcStatus::RDDREQ | self.ecc_status(chunk.page_addr)
            }
            ChunkKind::ReadId | ChunkKind::ReadStatus => NfcStatus::RDDREQ,
            ChunkKind::DispatchStart => {
                self.latch.fill(ERASED_BYTE);
                NfcStatus::CMDD
            }
            ChunkKind::NakedWrite => NfcStatus::WRDREQ,
            ChunkKind::DispatchEnd => self.program(chunk.page_addr),
            ChunkKind::Erase => self.erase(chunk.page_addr),
            ChunkKind::Reset => {
                self.latch.fill(ERASED_BYTE);
                self.program_failed = false;
                NfcStatus::RDY
            }
        };
    }

    fn ecc_status(&self, page: u32) -> NfcStatus {
        if self.ecc == EccMode::None {
            return NfcStatus::empty();
        }
        if self.faults.uncorrectable_pages.contains(&page) || self.is_blank(page) {
            // An erased page carries no valid ECC
            return NfcStatus::UNCERR;
        }
        match self.faults.corrected_pages.get(&page) {
            Some(&bits) => NfcStatus::CORERR.with_corrected_bits(bits),
            None => NfcStatus::empty(),
        }
    }

    fn program(&mut self, page: u32) -> NfcStatus {
        let block = self.block_of(page);
        if self.faults.bad_on_program.contains(&block) {
            log::debug!("sim: program of page {} failed (block {} bad)", page, block);
            self.program_failed = true;
            return NfcStatus::RDY | NfcStatus::BBD;
        }
        let mut content = self.page(page);
        // Programming only clears bits
        for (cell, &byte) in content.iter_mut().zip(&self.latch) {
            *cell &= byte;
        }
        self.store_page(page, content);
        self.program_failed = false;
        log::debug!("sim: programmed page {}", page);
        NfcStatus::RDY
    }

    fn erase(&mut self, page: u32) -> NfcStatus {
        let block = self.block_of(page);
        if self.faults.bad_on_erase.contains(&block) {
            log::debug!("sim: erase of block {} failed", block);
            self.program_failed = true;
            return NfcStatus::RDY | NfcStatus::BBD;
        }
        let first = self.config.block_to_page(block);
        let last = first + self.config.pages_per_block;
        self.pages.retain(|&p, _| p < first || p >= last);
        self.program_failed = false;
        log::debug!("sim: erased block {}", block);
        NfcStatus::RDY
    }

    pub(crate) fn read_status(&self) -> NfcStatus {
        self.status
    }

    pub(crate) fn clear_status(&mut self, bits: NfcStatus) {
        self.status.remove(bits);
        if bits.contains(NfcStatus::CORERR) {
            self.status.remove(NfcStatus::ERR_CNT);
        }
    }

    pub(crate) fn clear_run_bit(&mut self) {
        self.run_bit_clears += 1;
        self.current = None;
        self.status = NfcStatus::empty();
    }

    pub(crate) fn wait_for_event(&self, mask: NfcStatus) -> bool {
        !self.faults.fail_events && self.status.intersects(mask)
    }

    // ------------------------------------------------------------------
    // Data side
    // ------------------------------------------------------------------

    /// Byte the device presents at staging offset `offset` of the current
    /// read chunk
    fn source_byte(&self, chunk: &ChunkCommand, offset: usize) -> u8 {
        match chunk.kind {
            ChunkKind::ReadId => self.id.get(offset).copied().unwrap_or(0x00),
            ChunkKind::ReadStatus => {
                let mut status = NAND_STATUS_READY | NAND_STATUS_WP;
                if self.program_failed {
                    status |= NAND_STATUS_FAIL;
                }
                status
            }
            _ => self
                .pages
                .get(&chunk.page_addr)
                .and_then(|p| p.get(offset))
                .copied()
                .unwrap_or(ERASED_BYTE),
        }
    }

    /// Copy the current read chunk's bytes for `segment` into `out`
    pub(crate) fn fetch(&self, segment: &ScatterSegment, out: &mut [u8]) -> bool {
        let Some(chunk) = self.current else {
            return false;
        };
        for (i, byte) in out.iter_mut().enumerate() {
            *byte = self.source_byte(&chunk, segment.offset as usize + i);
        }
        true
    }

    /// Latch `data` for the current write chunk at `segment`
    pub(crate) fn store(&mut self, segment: &ScatterSegment, data: &[u8]) -> bool {
        if !matches!(self.current.map(|c| c.kind), Some(ChunkKind::NakedWrite)) {
            return false;
        }
        let start = segment.offset as usize;
        let Some(dst) = self.latch.get_mut(start..start + data.len()) else {
            return false;
        };
        dst.copy_from_slice(data);
        true
    }

    /// Pop one FIFO word of the current read chunk
    pub(crate) fn fifo_read(&mut self) -> u32 {
        let mut bytes = [ERASED_BYTE; 4];
        if let Some((segment, take)) = self.fifo_advance() {
            let window = ScatterSegment::new(segment.offset + self.fifo_offset as u32, take);
            self.fetch(&window, &mut bytes[..take as usize]);
            self.fifo_consume(&segment, take);
        }
        u32::from_le_bytes(bytes)
    }

    /// Push one FIFO word into the current write chunk
    pub(crate) fn fifo_write(&mut self, word: u32) {
        let bytes = word.to_le_bytes();
        if let Some((segment, take)) = self.fifo_advance() {
            let window = ScatterSegment::new(segment.offset + self.fifo_offset as u32, take);
            self.store(&window, &bytes[..take as usize]);
            self.fifo_consume(&segment, take);
        }
    }

    /// Current FIFO segment and how many of the next 4 bytes belong to it
    fn fifo_advance(&self) -> Option<(ScatterSegment, u32)> {
        let chunk = self.current?;
        let segment = *chunk.segments().get(self.fifo_segment)?;
        let left = segment.len - self.fifo_offset as u32;
        Some((segment, left.min(4)))
    }

    fn fifo_consume(&mut self, segment: &ScatterSegment, taken: u32) {
        self.fifo_offset += taken as usize;
        if self.fifo_offset >= segment.len as usize {
            self.fifo_segment += 1;
            self.fifo_offset = 0;
        }
    }

    pub(crate) fn dma_submit(&mut self, segments: &[ScatterSegment], to_device: bool, buf: &mut [u8]) -> DmaTicket {
        let ticket = DmaTicket(self.next_ticket);
        self.next_ticket = self.next_ticket.wrapping_add(1);

        if self.faults.dma_bus_error {
            log::debug!("sim: injecting DMA bus error on #{}", ticket.0);
            self.completions.push_back(DmaCompletion::BusError(ticket));
            return ticket;
        }

        let mut ok = true;
        for segment in segments {
            let range = segment.offset as usize..segment.end() as usize;
            ok &= match buf.get_mut(range) {
                Some(slice) if to_device => self.store(segment, slice),
                Some(slice) => self.fetch(segment, slice),
                None => false,
            };
        }
        self.completions.push_back(if ok {
            DmaCompletion::Done(ticket)
        } else {
            DmaCompletion::BusError(ticket)
        });
        ticket
    }

    pub(crate) fn dma_completion(&mut self) -> DmaCompletion {
        if self.faults.fail_events {
            return DmaCompletion::TimedOut;
        }
        self.completions.pop_front().unwrap_or(DmaCompletion::TimedOut)
    }
}
