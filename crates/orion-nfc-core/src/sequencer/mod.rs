//! Command sequencer
//!
//! Executes an operation plan chunk by chunk. Every chunk runs the same
//! six steps:
//!
//! 1. Issue the command/address phase.
//! 2. Wait for the phase-1 event (data ready, or command accepted).
//! 3. On page reads, check the ECC result.
//! 4. Move the chunk's data through the transfer backend.
//! 5. Wait for the phase-2 event (ready, or bad block) on program/erase.
//! 6. Advance.
//!
//! Any failure stops the controller (run bit cleared exactly once) before
//! the error is returned. An uncorrectable ECC result is held back until
//! the whole page is in the buffer: an erased page has no valid ECC and is
//! reported as a successful read.
//!
//! Uses `maybe_async` to support both sync and async modes.

mod state;

pub use state::*;

use maybe_async::maybe_async;

use crate::controller::{NfcRegisters, NfcStatus};
use crate::error::{Error, ErrorKind, Result};
use crate::geometry::{PageGeometry, ERASED_BYTE};
use crate::plan::{plan_control, plan_into, ChunkCommand, LogicalOp, OperationPlan};
use crate::transfer::TransferBackend;

/// Default bound on every phase-1 / phase-2 wait
pub const DEFAULT_EVENT_TIMEOUT_US: u32 = 100_000;

/// Drives operation plans against one controller
pub struct CommandSequencer<R, T> {
    regs: R,
    backend: T,
    plan: OperationPlan,
    ctx: SequencerContext,
    timeout_us: u32,
}

impl<R: NfcRegisters, T: TransferBackend> CommandSequencer<R, T> {
    /// Create a sequencer over a controller and a transfer backend
    pub fn new(regs: R, backend: T) -> Self {
        Self {
            regs,
            backend,
            plan: OperationPlan::new(),
            ctx: SequencerContext::default(),
            timeout_us: DEFAULT_EVENT_TIMEOUT_US,
        }
    }

    /// Set the bound on each event wait
    pub fn with_timeout(mut self, timeout_us: u32) -> Self {
        self.timeout_us = timeout_us;
        self
    }

    /// Current protocol state
    pub fn state(&self) -> SequencerState {
        self.ctx.state
    }

    /// Status register as sampled after the last completed wait
    pub fn last_status(&self) -> NfcStatus {
        self.ctx.last_status
    }

    /// ECC counters
    pub fn ecc_stats(&self) -> EccStats {
        self.ctx.ecc
    }

    /// The most recently executed plan
    pub fn last_plan(&self) -> &OperationPlan {
        &self.plan
    }

    /// Get a reference to the controller registers
    pub fn registers(&self) -> &R {
        &self.regs
    }

    /// Get a reference to the transfer backend
    pub fn backend(&self) -> &T {
        &self.backend
    }

    /// Plan `op` on `page_addr` and run it against `buf`
    ///
    /// `buf` is the staging buffer laid out as `[page data | spare pool]`.
    #[maybe_async]
    pub async fn execute(
        &mut self,
        op: LogicalOp,
        page_addr: u32,
        geometry: &PageGeometry,
        buf: &mut [u8],
    ) -> Result<()> {
        plan_into(op, page_addr, geometry, &mut self.plan)?;
        self.run_loaded(buf).await
    }

    /// Run an operation that needs no geometry (erase, ID, status, reset)
    #[maybe_async]
    pub async fn execute_control(
        &mut self,
        op: LogicalOp,
        page_addr: u32,
        buf: &mut [u8],
    ) -> Result<()> {
        plan_control(op, page_addr, &mut self.plan)?;
        self.run_loaded(buf).await
    }

    /// Run a plan built elsewhere
    ///
    /// The plan is copied into the sequencer's own buffer first.
    #[maybe_async]
    pub async fn execute_plan(&mut self, plan: &OperationPlan, buf: &mut [u8]) -> Result<()> {
        self.plan.clone_from(plan);
        self.run_loaded(buf).await
    }

    #[maybe_async]
    async fn run_loaded(&mut self, buf: &mut [u8]) -> Result<()> {
        debug_assert!(
            self.ctx.state.is_idle(),
            "plan started while sequencer is {}",
            self.ctx.state
        );

        let op = self.plan.op();
        let extent = self
            .plan
            .chunks()
            .iter()
            .flat_map(|c| c.segments())
            .map(|s| s.end() as usize)
            .max()
            .unwrap_or(0);
        if extent > buf.len() {
            return Err(Error::BufferTooSmall);
        }

        log::debug!(
            "{:?}: {} chunk(s), page {}",
            op,
            self.plan.len(),
            self.plan.chunks().first().map_or(0, |c| c.page_addr)
        );

        self.ctx.begin();
        let mut outcome = Ok(());
        for index in 0..self.plan.len() {
            let chunk = self.plan.chunks()[index];
            self.ctx.chunk_index = index;
            if let Err(kind) = self.run_chunk(&chunk, buf).await {
                outcome = Err(kind);
                break;
            }
        }

        let outcome = match (outcome, self.ctx.provisional.take()) {
            (Err(kind), _) => Err(kind),
            (Ok(()), None) => Ok(()),
            (Ok(()), Some(ErrorKind::UncorrectableEcc))
                if op == LogicalOp::ReadMonolithic && is_erased(&buf[..extent]) =>
            {
                log::debug!("page is blank, ignoring uncorrectable ECC");
                self.ctx.ecc.blank_pages += 1;
                Ok(())
            }
            (Ok(()), Some(kind)) => Err(kind),
        };

        match outcome {
            Ok(()) => {
                self.ctx.state = if op == LogicalOp::Reset {
                    SequencerState::Ready
                } else {
                    SequencerState::Done
                };
                Ok(())
            }
            Err(kind) => {
                self.regs.clear_run_bit();
                if kind == ErrorKind::UncorrectableEcc {
                    self.ctx.ecc.failed += 1;
                }
                log::warn!(
                    "{:?} failed at chunk {}/{}: {}",
                    op,
                    self.ctx.chunk_index + 1,
                    self.plan.len(),
                    kind
                );
                self.ctx.state = if op == LogicalOp::Reset {
                    SequencerState::Ready
                } else {
                    SequencerState::Failed(kind)
                };
                Err(kind.into())
            }
        }
    }

    #[maybe_async]
    async fn run_chunk(
        &mut self,
        chunk: &ChunkCommand,
        buf: &mut [u8],
    ) -> core::result::Result<(), ErrorKind> {
        let phases = ChunkPhases::for_kind(chunk.kind);

        self.ctx.state = SequencerState::Issuing;
        log::trace!("chunk {}: issue {}", self.ctx.chunk_index, chunk.kind);
        self.regs.issue(chunk);

        if let Some(mask) = phases.phase1 {
            self.ctx.state = SequencerState::AwaitingPhase1;
            let status = self.wait_event(mask).await?;
            if chunk.kind.is_page_read() {
                self.check_ecc(status);
            }
        }

        if let Some(direction) = chunk.kind.direction() {
            if chunk.has_data() {
                self.ctx.state = SequencerState::Transferring;
                self.backend
                    .submit(chunk.segments(), direction, buf)
                    .await
                    .map_err(|_| ErrorKind::BusTransfer)?;
            }
        }

        if let Some(mask) = phases.phase2 {
            self.ctx.state = SequencerState::AwaitingPhase2;
            let status = self.wait_event(mask).await?;
            if status.contains(NfcStatus::BBD) {
                return Err(ErrorKind::BadBlockDetected);
            }
        }

        Ok(())
    }

    /// Wait for `mask`, then sample and acknowledge the status register
    #[maybe_async]
    async fn wait_event(&mut self, mask: NfcStatus) -> core::result::Result<NfcStatus, ErrorKind> {
        if !self.regs.wait_for_event(mask, self.timeout_us).await {
            log::warn!(
                "timed out after {}us waiting for {:?}",
                self.timeout_us,
                mask
            );
            return Err(ErrorKind::CommandTimeout);
        }
        let status = self.regs.read_status();
        self.ctx.last_status = status;
        self.regs
            .clear_status(status & (mask | NfcStatus::CORERR | NfcStatus::UNCERR));
        Ok(status)
    }

    fn check_ecc(&mut self, status: NfcStatus) {
        if status.contains(NfcStatus::UNCERR) {
            log::trace!("chunk {}: uncorrectable ECC", self.ctx.chunk_index);
            self.ctx.provisional.get_or_insert(ErrorKind::UncorrectableEcc);
        } else if status.contains(NfcStatus::CORERR) {
            let bits = status.corrected_bits().max(1);
            log::debug!("chunk {}: corrected {} bit(s)", self.ctx.chunk_index, bits);
            self.ctx.ecc.corrected += bits;
        }
    }
}

/// Whether every byte reads back as erased
fn is_erased(data: &[u8]) -> bool {
    data.iter().all(|&b| b == ERASED_BYTE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{resolve, EccMode};
    use crate::plan::{ChunkKind, Direction, ScatterSegment};
    use crate::transfer::BusTransferError;
    use std::cell::RefCell;
    use std::vec;
    use std::vec::Vec;

    /// A mock controller that raises events on demand
    ///
    /// Every wait succeeds unless `events_fire` is false. Status flags are
    /// injected per chunk kind.
    struct MockRegs {
        events_fire: bool,
        uncorrectable: bool,
        corrected_bits: u32,
        bad_block_on: Option<ChunkKind>,
        current: Option<ChunkKind>,
        issued: RefCell<Vec<ChunkKind>>,
        run_bit_clears: u32,
    }

    impl MockRegs {
        fn new() -> Self {
            Self {
                events_fire: true,
                uncorrectable: false,
                corrected_bits: 0,
                bad_block_on: None,
                current: None,
                issued: RefCell::new(Vec::new()),
                run_bit_clears: 0,
            }
        }

        fn issued(&self) -> Vec<ChunkKind> {
            self.issued.borrow().clone()
        }
    }

    impl NfcRegisters for MockRegs {
        fn issue(&mut self, chunk: &ChunkCommand) {
            self.current = Some(chunk.kind);
            self.issued.borrow_mut().push(chunk.kind);
        }

        fn read_status(&mut self) -> NfcStatus {
            let kind = match self.current {
                Some(kind) => kind,
                None => return NfcStatus::empty(),
            };
            let mut status = NfcStatus::RDY | NfcStatus::CMDD;
            if kind.is_page_read() {
                status |= NfcStatus::RDDREQ;
                if self.uncorrectable {
                    status |= NfcStatus::UNCERR;
                } else if self.corrected_bits > 0 {
                    status = (status | NfcStatus::CORERR).with_corrected_bits(self.corrected_bits);
                }
            }
            if self.bad_block_on == Some(kind) {
                status |= NfcStatus::BBD;
            }
            status
        }

        fn clear_status(&mut self, _bits: NfcStatus) {}

        fn clear_run_bit(&mut self) {
            self.run_bit_clears += 1;
            self.current = None;
        }

        fn wait_for_event(&mut self, _mask: NfcStatus, _timeout_us: u32) -> bool {
            self.events_fire
        }
    }

    /// Transfer backend that fills reads with one byte and logs every submit
    struct MockBackend {
        fill: u8,
        fail: bool,
        submits: Vec<(Vec<ScatterSegment>, Direction)>,
    }

    impl MockBackend {
        fn new(fill: u8) -> Self {
            Self {
                fill,
                fail: false,
                submits: Vec::new(),
            }
        }
    }

    impl TransferBackend for MockBackend {
        fn submit(
            &mut self,
            segments: &[ScatterSegment],
            direction: Direction,
            buf: &mut [u8],
        ) -> core::result::Result<(), BusTransferError> {
            self.submits.push((segments.to_vec(), direction));
            if self.fail {
                return Err(BusTransferError);
            }
            if direction == Direction::FromDevice {
                for seg in segments {
                    buf[seg.offset as usize..seg.end() as usize].fill(self.fill);
                }
            }
            Ok(())
        }
    }

    fn sequencer(regs: MockRegs, backend: MockBackend) -> CommandSequencer<MockRegs, MockBackend> {
        CommandSequencer::new(regs, backend).with_timeout(1000)
    }

    #[test]
    fn test_read_8k_bch12_runs_every_chunk() {
        let g = resolve(8192, EccMode::Bch12).unwrap();
        let mut seq = sequencer(MockRegs::new(), MockBackend::new(0x5A));
        let mut buf = vec![0u8; g.staging_len() as usize];

        seq.execute(LogicalOp::ReadMonolithic, 10, g, &mut buf).unwrap();

        let issued = seq.registers().issued();
        assert_eq!(issued.len(), 12);
        assert_eq!(issued[0], ChunkKind::Monolithic);
        assert_eq!(issued[11], ChunkKind::LastNaked);
        assert_eq!(seq.backend().submits.len(), 12);
        assert!(buf.iter().all(|&b| b == 0x5A));
        assert_eq!(seq.state(), SequencerState::Done);
        assert_eq!(seq.registers().run_bit_clears, 0);
    }

    #[test]
    fn test_write_bad_block_at_dispatch_end() {
        let g = resolve(4096, EccMode::Bch4).unwrap();
        let mut regs = MockRegs::new();
        regs.bad_block_on = Some(ChunkKind::DispatchEnd);
        let mut seq = sequencer(regs, MockBackend::new(0));
        let mut buf = vec![0x33u8; g.staging_len() as usize];

        let result = seq.execute(LogicalOp::WriteMonolithic, 0, g, &mut buf);

        assert_eq!(result, Err(Error::BadBlockDetected));
        assert_eq!(
            seq.state(),
            SequencerState::Failed(ErrorKind::BadBlockDetected)
        );
        // Every data chunk went out before the failure
        let writes = seq
            .backend()
            .submits
            .iter()
            .filter(|(_, dir)| *dir == Direction::ToDevice)
            .count();
        assert_eq!(writes, 2);
        assert_eq!(
            seq.registers().issued(),
            [
                ChunkKind::DispatchStart,
                ChunkKind::NakedWrite,
                ChunkKind::NakedWrite,
                ChunkKind::DispatchEnd
            ]
        );
        assert_eq!(seq.registers().run_bit_clears, 1);
    }

    #[test]
    fn test_erase_bad_block() {
        let g = resolve(2048, EccMode::Bch4).unwrap();
        let mut regs = MockRegs::new();
        regs.bad_block_on = Some(ChunkKind::Erase);
        let mut seq = sequencer(regs, MockBackend::new(0));
        let mut buf = vec![0u8; g.staging_len() as usize];

        let result = seq.execute(LogicalOp::Erase, 64, g, &mut buf);
        assert_eq!(result, Err(Error::BadBlockDetected));
        assert!(seq.backend().submits.is_empty());
        assert!(seq.last_status().contains(NfcStatus::RDY | NfcStatus::BBD));
    }

    #[test]
    fn test_timeout_surfaces_once_and_clears_run_bit_once() {
        let g = resolve(8192, EccMode::Bch12).unwrap();
        let mut regs = MockRegs::new();
        regs.events_fire = false;
        let mut seq = sequencer(regs, MockBackend::new(0));
        let mut buf = vec![0u8; g.staging_len() as usize];

        let result = seq.execute(LogicalOp::ReadMonolithic, 0, g, &mut buf);

        assert_eq!(result, Err(Error::CommandTimeout));
        assert_eq!(seq.registers().run_bit_clears, 1);
        assert_eq!(seq.registers().issued(), [ChunkKind::Monolithic]);
        assert!(seq.backend().submits.is_empty());
        assert_eq!(
            seq.state(),
            SequencerState::Failed(ErrorKind::CommandTimeout)
        );
    }

    #[test]
    fn test_timeout_on_each_op_kind() {
        let g = resolve(2048, EccMode::Bch4).unwrap();
        for op in [
            LogicalOp::ReadMonolithic,
            LogicalOp::WriteMonolithic,
            LogicalOp::Erase,
            LogicalOp::ReadId,
            LogicalOp::ReadStatus,
        ] {
            let mut regs = MockRegs::new();
            regs.events_fire = false;
            let mut seq = sequencer(regs, MockBackend::new(0));
            let mut buf = vec![0u8; g.staging_len() as usize];
            assert_eq!(
                seq.execute(op, 0, g, &mut buf),
                Err(Error::CommandTimeout),
                "{:?}",
                op
            );
            assert_eq!(seq.registers().run_bit_clears, 1, "{:?}", op);
        }
    }

    #[test]
    fn test_blank_page_downgrade() {
        let g = resolve(4096, EccMode::Bch8).unwrap();
        let mut regs = MockRegs::new();
        regs.uncorrectable = true;
        let mut seq = sequencer(regs, MockBackend::new(0xFF));
        let mut buf = vec![0u8; g.staging_len() as usize];

        seq.execute(LogicalOp::ReadMonolithic, 0, g, &mut buf).unwrap();

        assert_eq!(seq.state(), SequencerState::Done);
        assert_eq!(seq.ecc_stats().blank_pages, 1);
        assert_eq!(seq.ecc_stats().failed, 0);
        assert_eq!(seq.registers().run_bit_clears, 0);
    }

    #[test]
    fn test_uncorrectable_on_written_page() {
        let g = resolve(4096, EccMode::Bch8).unwrap();
        let mut regs = MockRegs::new();
        regs.uncorrectable = true;
        let mut seq = sequencer(regs, MockBackend::new(0x00));
        let mut buf = vec![0u8; g.staging_len() as usize];

        let result = seq.execute(LogicalOp::ReadMonolithic, 0, g, &mut buf);

        assert_eq!(result, Err(Error::UncorrectableEcc));
        // The whole page is still assembled before the error is reported
        assert_eq!(seq.registers().issued().len(), 5);
        assert_eq!(seq.registers().run_bit_clears, 1);
        assert_eq!(seq.ecc_stats().failed, 1);
    }

    #[test]
    fn test_corrected_bits_are_counted() {
        let g = resolve(4096, EccMode::Bch4).unwrap();
        let mut regs = MockRegs::new();
        regs.corrected_bits = 2;
        let mut seq = sequencer(regs, MockBackend::new(0x12));
        let mut buf = vec![0u8; g.staging_len() as usize];

        seq.execute(LogicalOp::ReadMonolithic, 0, g, &mut buf).unwrap();
        assert_eq!(seq.ecc_stats().corrected, 4);
    }

    #[test]
    fn test_bus_error_stops_plan() {
        let g = resolve(4096, EccMode::Bch4).unwrap();
        let mut backend = MockBackend::new(0);
        backend.fail = true;
        let mut seq = sequencer(MockRegs::new(), backend);
        let mut buf = vec![0u8; g.staging_len() as usize];

        let result = seq.execute(LogicalOp::WriteMonolithic, 0, g, &mut buf);
        assert_eq!(result, Err(Error::BusTransfer));
        assert_eq!(
            seq.registers().issued(),
            [ChunkKind::DispatchStart, ChunkKind::NakedWrite]
        );
        assert_eq!(seq.registers().run_bit_clears, 1);
    }

    #[test]
    fn test_reset_returns_to_ready_from_failed() {
        let g = resolve(2048, EccMode::Bch4).unwrap();
        let mut regs = MockRegs::new();
        regs.bad_block_on = Some(ChunkKind::Erase);
        let mut seq = sequencer(regs, MockBackend::new(0));
        let mut buf = vec![0u8; g.staging_len() as usize];

        assert!(seq.execute(LogicalOp::Erase, 0, g, &mut buf).is_err());
        assert!(matches!(seq.state(), SequencerState::Failed(_)));

        seq.execute(LogicalOp::Reset, 0, g, &mut buf).unwrap();
        assert_eq!(seq.state(), SequencerState::Ready);
    }

    #[test]
    fn test_reset_timeout_still_ready() {
        let g = resolve(2048, EccMode::Bch4).unwrap();
        let mut regs = MockRegs::new();
        regs.events_fire = false;
        let mut seq = sequencer(regs, MockBackend::new(0));
        let mut buf = vec![0u8; g.staging_len() as usize];

        assert_eq!(
            seq.execute(LogicalOp::Reset, 0, g, &mut buf),
            Err(Error::CommandTimeout)
        );
        assert_eq!(seq.state(), SequencerState::Ready);
        assert_eq!(seq.registers().run_bit_clears, 1);
    }

    #[test]
    fn test_read_id_without_geometry() {
        let mut seq = sequencer(MockRegs::new(), MockBackend::new(0xEC));
        let mut buf = [0u8; 8];

        seq.execute_control(LogicalOp::ReadId, 0, &mut buf).unwrap();
        assert_eq!(buf, [0xEC; 8]);
        assert_eq!(seq.registers().issued(), [ChunkKind::ReadId]);
    }

    #[test]
    fn test_buffer_too_small_touches_nothing() {
        let g = resolve(2048, EccMode::Bch4).unwrap();
        let mut seq = sequencer(MockRegs::new(), MockBackend::new(0));
        let mut buf = vec![0u8; 2048];

        assert_eq!(
            seq.execute(LogicalOp::ReadMonolithic, 0, g, &mut buf),
            Err(Error::BufferTooSmall)
        );
        assert!(seq.registers().issued().is_empty());
        assert_eq!(seq.state(), SequencerState::Ready);
    }

    #[test]
    fn test_prebuilt_plan() {
        let g = resolve(2048, EccMode::Bch8).unwrap();
        let plan = OperationPlan::build(LogicalOp::WriteMonolithic, 5, g).unwrap();
        let mut seq = sequencer(MockRegs::new(), MockBackend::new(0));
        let mut buf = vec![0u8; g.staging_len() as usize];

        seq.execute_plan(&plan, &mut buf).unwrap();
        assert_eq!(seq.last_plan().len(), plan.len());
        assert_eq!(seq.registers().issued().len(), 5);
    }
}
