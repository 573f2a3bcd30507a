//! Chunk planner
//!
//! Decomposes a logical flash operation into the ordered chunk commands
//! the sequencer executes.

use heapless::Vec;

use super::chunk::{ChunkCommand, ChunkKind, ScatterSegment};
use crate::error::{Error, Result};
use crate::geometry::PageGeometry;

/// Fixed capacity of an operation plan
///
/// Checked at compile time against the geometry table, so a plan built
/// from a table geometry can never overflow.
pub const MAX_PLAN_CHUNKS: usize = 33;

/// Bytes moved by a READID chunk
pub const READ_ID_LEN: u32 = 8;

/// Bytes moved by a STATUS chunk
pub const READ_STATUS_LEN: u32 = 8;

/// A logical flash operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogicalOp {
    /// Read one page (data and spare) through the ECC engine
    ReadMonolithic,
    /// Program one page (data and spare)
    WriteMonolithic,
    /// Erase the block containing the page
    Erase,
    /// Read the device ID
    ReadId,
    /// Read the device status
    ReadStatus,
    /// Reset the device
    Reset,
}

/// Ordered chunk commands for one logical operation
///
/// Lives inside the sequencer and is rebuilt in place for every operation,
/// so the execution path never allocates.
#[derive(Debug, Clone)]
pub struct OperationPlan {
    op: LogicalOp,
    chunks: Vec<ChunkCommand, MAX_PLAN_CHUNKS>,
}

impl Default for OperationPlan {
    fn default() -> Self {
        Self::new()
    }
}

impl OperationPlan {
    /// Create an empty plan
    pub const fn new() -> Self {
        Self {
            op: LogicalOp::Reset,
            chunks: Vec::new(),
        }
    }

    /// Build a fresh plan
    pub fn build(op: LogicalOp, page_addr: u32, geometry: &PageGeometry) -> Result<Self> {
        let mut plan = Self::new();
        plan_into(op, page_addr, geometry, &mut plan)?;
        Ok(plan)
    }

    /// The operation this plan implements
    pub fn op(&self) -> LogicalOp {
        self.op
    }

    /// The chunks, in execution order
    pub fn chunks(&self) -> &[ChunkCommand] {
        &self.chunks
    }

    /// Number of chunks
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    /// Returns true if the plan holds no chunks
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    fn push(&mut self, chunk: ChunkCommand) -> Result<()> {
        self.chunks.push(chunk).map_err(|_| Error::PlanOverflow)
    }
}

impl LogicalOp {
    /// Whether the plan depends on the page geometry
    pub const fn needs_geometry(self) -> bool {
        matches!(self, Self::ReadMonolithic | Self::WriteMonolithic)
    }
}

/// Rebuild `plan` in place for `op` on `page_addr`
///
/// The previous contents of `plan` are discarded.
pub fn plan_into(
    op: LogicalOp,
    page_addr: u32,
    geometry: &PageGeometry,
    plan: &mut OperationPlan,
) -> Result<()> {
    if !op.needs_geometry() {
        return plan_control(op, page_addr, plan);
    }

    plan.chunks.clear();
    plan.op = op;
    if op == LogicalOp::ReadMonolithic {
        push_data_chunks(plan, page_addr, geometry, |index| {
            if index == 0 {
                ChunkKind::Monolithic
            } else if index >= geometry.chunk_count {
                ChunkKind::LastNaked
            } else {
                ChunkKind::Naked
            }
        })?;
    } else {
        plan.push(ChunkCommand::control(ChunkKind::DispatchStart, page_addr))?;
        push_data_chunks(plan, page_addr, geometry, |_| ChunkKind::NakedWrite)?;
        plan.push(ChunkCommand::control(ChunkKind::DispatchEnd, page_addr))?;
    }

    log::trace!("planned {:?} on page {}: {} chunk(s)", op, page_addr, plan.len());
    Ok(())
}

/// Rebuild `plan` for an operation that needs no geometry
///
/// Erase, ID, status and reset plans are single chunks whose shape does not
/// depend on the page layout, so they work before (or without) a
/// supported geometry. Page reads and writes are rejected.
pub fn plan_control(op: LogicalOp, page_addr: u32, plan: &mut OperationPlan) -> Result<()> {
    let chunk = match op {
        LogicalOp::Erase => ChunkCommand::control(ChunkKind::Erase, page_addr),
        LogicalOp::ReadId => ChunkCommand::single(
            ChunkKind::ReadId,
            page_addr,
            ScatterSegment::new(0, READ_ID_LEN),
        ),
        LogicalOp::ReadStatus => ChunkCommand::single(
            ChunkKind::ReadStatus,
            page_addr,
            ScatterSegment::new(0, READ_STATUS_LEN),
        ),
        LogicalOp::Reset => ChunkCommand::control(ChunkKind::Reset, page_addr),
        LogicalOp::ReadMonolithic | LogicalOp::WriteMonolithic => {
            return Err(Error::InvalidSequence)
        }
    };

    plan.chunks.clear();
    plan.op = op;
    plan.push(chunk)
}

fn push_data_chunks<F>(
    plan: &mut OperationPlan,
    page_addr: u32,
    geometry: &PageGeometry,
    kind_for: F,
) -> Result<()>
where
    F: Fn(u32) -> ChunkKind,
{
    for index in 0..geometry.data_chunks() {
        let layout = geometry.chunk_layout(index);
        plan.push(ChunkCommand::scatter(
            kind_for(index),
            page_addr,
            ScatterSegment::new(layout.data_offset, layout.data_len),
            ScatterSegment::new(layout.spare_offset, layout.spare_len),
        ))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{resolve, supported, EccMode};

    fn kinds(plan: &OperationPlan) -> std::vec::Vec<ChunkKind> {
        plan.chunks().iter().map(|c| c.kind).collect()
    }

    #[test]
    fn test_2k_bch4_read_is_one_monolithic_chunk() {
        let g = resolve(2048, EccMode::Bch4).unwrap();
        let plan = OperationPlan::build(LogicalOp::ReadMonolithic, 64, g).unwrap();
        assert_eq!(kinds(&plan), [ChunkKind::Monolithic]);

        // Data and spare are adjacent, so one segment covers both
        assert_eq!(plan.chunks()[0].segments(), &[ScatterSegment::new(0, 2080)]);
        assert_eq!(plan.chunks()[0].page_addr, 64);
    }

    #[test]
    fn test_2k_bch4_write_is_dispatch_bracketed() {
        let g = resolve(2048, EccMode::Bch4).unwrap();
        let plan = OperationPlan::build(LogicalOp::WriteMonolithic, 3, g).unwrap();
        assert_eq!(
            kinds(&plan),
            [
                ChunkKind::DispatchStart,
                ChunkKind::NakedWrite,
                ChunkKind::DispatchEnd
            ]
        );
        assert!(!plan.chunks()[0].has_data());
        assert_eq!(plan.chunks()[1].transfer_len(), 2080);
        assert!(!plan.chunks()[2].has_data());
    }

    #[test]
    fn test_8k_bch12_read_chunk_roles() {
        let g = resolve(8192, EccMode::Bch12).unwrap();
        let plan = OperationPlan::build(LogicalOp::ReadMonolithic, 0, g).unwrap();
        assert_eq!(plan.len(), 12);
        assert_eq!(plan.chunks()[0].kind, ChunkKind::Monolithic);
        for chunk in &plan.chunks()[1..11] {
            assert_eq!(chunk.kind, ChunkKind::Naked);
        }
        assert_eq!(plan.chunks()[11].kind, ChunkKind::LastNaked);

        // Full chunks carry no spare; the trailing chunk's data ends at the
        // page boundary where its spare begins, so it is one segment too.
        assert_eq!(
            plan.chunks()[3].segments(),
            &[ScatterSegment::new(3 * 704, 704)]
        );
        assert_eq!(
            plan.chunks()[11].segments(),
            &[ScatterSegment::new(7744, 448 + 64)]
        );
    }

    #[test]
    fn test_two_segments_when_spare_is_separate() {
        let g = resolve(4096, EccMode::Bch4).unwrap();
        let plan = OperationPlan::build(LogicalOp::ReadMonolithic, 0, g).unwrap();
        assert_eq!(kinds(&plan), [ChunkKind::Monolithic, ChunkKind::Naked]);
        assert_eq!(
            plan.chunks()[0].segments(),
            &[ScatterSegment::new(0, 2048), ScatterSegment::new(4096, 32)]
        );
        assert_eq!(
            plan.chunks()[1].segments(),
            &[ScatterSegment::new(2048, 2048), ScatterSegment::new(4128, 32)]
        );
    }

    #[test]
    fn test_spare_only_trailing_chunk_has_single_segment() {
        let g = resolve(2048, EccMode::Bch8).unwrap();
        let plan = OperationPlan::build(LogicalOp::ReadMonolithic, 0, g).unwrap();
        assert_eq!(
            kinds(&plan),
            [ChunkKind::Monolithic, ChunkKind::Naked, ChunkKind::LastNaked]
        );
        assert_eq!(
            plan.chunks()[2].segments(),
            &[ScatterSegment::new(2048, 32)]
        );
    }

    #[test]
    fn test_data_only_trailing_chunk_has_single_segment() {
        // Not in the table, but a valid decomposition
        let g = crate::geometry::PageGeometry::new(2048, EccMode::Bch12, 704, 16, 2, 640, 0, 20);
        let plan = OperationPlan::build(LogicalOp::ReadMonolithic, 0, &g).unwrap();
        assert_eq!(plan.len(), 3);
        assert_eq!(plan.chunks()[1].segments().len(), 2);
        assert_eq!(
            plan.chunks()[2].segments(),
            &[ScatterSegment::new(1408, 640)]
        );
    }

    #[test]
    fn test_plan_lengths_for_every_geometry() {
        for g in supported() {
            let read = OperationPlan::build(LogicalOp::ReadMonolithic, 0, g).unwrap();
            let write = OperationPlan::build(LogicalOp::WriteMonolithic, 0, g).unwrap();
            if g.has_trailing_chunk() {
                assert_eq!(read.len() as u32, g.chunk_count + 1);
                assert_eq!(write.len() as u32, g.chunk_count + 3);
            } else {
                assert_eq!(read.len() as u32, g.chunk_count);
                assert_eq!(write.len() as u32, g.chunk_count + 2);
            }
            assert!(write.len() <= MAX_PLAN_CHUNKS);

            // Segments exactly tile the staging buffer
            let total: u32 = read.chunks().iter().map(|c| c.transfer_len()).sum();
            assert_eq!(total, g.staging_len());
        }
    }

    #[test]
    fn test_control_plans() {
        let g = resolve(2048, EccMode::Bch4).unwrap();
        for (op, kind) in [
            (LogicalOp::Erase, ChunkKind::Erase),
            (LogicalOp::Reset, ChunkKind::Reset),
        ] {
            let plan = OperationPlan::build(op, 128, g).unwrap();
            assert_eq!(kinds(&plan), [kind]);
            assert!(!plan.chunks()[0].has_data());
        }

        let plan = OperationPlan::build(LogicalOp::ReadId, 0, g).unwrap();
        assert_eq!(kinds(&plan), [ChunkKind::ReadId]);
        assert_eq!(plan.chunks()[0].transfer_len(), READ_ID_LEN);
    }

    #[test]
    fn test_control_plans_need_no_geometry() {
        let mut plan = OperationPlan::new();
        plan_control(LogicalOp::ReadStatus, 0, &mut plan).unwrap();
        assert_eq!(kinds(&plan), [ChunkKind::ReadStatus]);
        assert_eq!(plan.chunks()[0].transfer_len(), READ_STATUS_LEN);
        assert_eq!(
            plan_control(LogicalOp::ReadMonolithic, 0, &mut plan),
            Err(Error::InvalidSequence)
        );
    }

    #[test]
    fn test_plan_is_rebuilt_in_place() {
        let g = resolve(8192, EccMode::Bch16).unwrap();
        let mut plan = OperationPlan::new();
        plan_into(LogicalOp::WriteMonolithic, 0, g, &mut plan).unwrap();
        assert_eq!(plan.len(), 19);
        plan_into(LogicalOp::Erase, 0, g, &mut plan).unwrap();
        assert_eq!(plan.len(), 1);
        assert_eq!(plan.op(), LogicalOp::Erase);
    }

    #[test]
    fn test_oversized_geometry_overflows() {
        let g = crate::geometry::PageGeometry::new(16384, EccMode::Bch16, 256, 0, 64, 0, 0, 26);
        assert_eq!(
            OperationPlan::build(LogicalOp::ReadMonolithic, 0, &g).unwrap_err(),
            Error::PlanOverflow
        );
    }
}
