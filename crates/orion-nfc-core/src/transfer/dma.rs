//! Bus-master (DMA) transfers

use maybe_async::maybe_async;

use super::{segment_range, BusTransferError, TransferBackend};
use crate::controller::{DmaCompletion, DmaEngine, DmaTicket};
use crate::plan::{Direction, ScatterSegment};

/// Default time to wait for a descriptor completion
pub const DEFAULT_DMA_TIMEOUT_US: u32 = 100_000;

/// Hands each chunk to a DMA engine as a single scatter descriptor
///
/// Exactly one completion is awaited per submitted descriptor. A
/// completion for any other descriptor, a bus error, or no completion at
/// all fails the transfer.
///
/// A descriptor that timed out may still complete later. Completions for
/// descriptors older than the one in flight are discarded, so a late
/// completion does not fail the transfers after it.
pub struct BusMasterDriven<D> {
    engine: D,
    timeout_us: u32,
}

impl<D: DmaEngine> BusMasterDriven<D> {
    /// Create a DMA backend over an engine
    pub fn new(engine: D) -> Self {
        Self {
            engine,
            timeout_us: DEFAULT_DMA_TIMEOUT_US,
        }
    }

    /// Set the per-descriptor completion timeout
    pub fn with_timeout(mut self, timeout_us: u32) -> Self {
        self.timeout_us = timeout_us;
        self
    }

    /// Get a reference to the DMA engine
    pub fn engine(&self) -> &D {
        &self.engine
    }
}

#[maybe_async(AFIT)]
impl<D: DmaEngine> TransferBackend for BusMasterDriven<D> {
    async fn submit(
        &mut self,
        segments: &[ScatterSegment],
        direction: Direction,
        buf: &mut [u8],
    ) -> Result<(), BusTransferError> {
        for segment in segments {
            segment_range(segment, buf.len())?;
        }

        let ticket = self.engine.submit_scatter_transfer(segments, direction, buf);
        loop {
            match self.engine.wait_completion(self.timeout_us).await {
                DmaCompletion::Done(stale) | DmaCompletion::BusError(stale)
                    if is_older(stale, ticket) =>
                {
                    log::debug!("DMA: discarding late completion of #{}", stale.0);
                }
                completion => return check_completion(completion, ticket),
            }
        }
    }
}

/// Whether `ticket` was submitted before `current`, allowing for wrap
fn is_older(ticket: DmaTicket, current: DmaTicket) -> bool {
    let distance = current.0.wrapping_sub(ticket.0);
    distance != 0 && distance < u32::MAX / 2
}

fn check_completion(completion: DmaCompletion, ticket: DmaTicket) -> Result<(), BusTransferError> {
    match completion {
        DmaCompletion::Done(done) if done == ticket => Ok(()),
        DmaCompletion::Done(other) => {
            log::warn!(
                "DMA completion out of order: expected #{}, got #{}",
                ticket.0,
                other.0
            );
            Err(BusTransferError)
        }
        DmaCompletion::BusError(failed) => {
            log::warn!("DMA bus error on descriptor #{}", failed.0);
            Err(BusTransferError)
        }
        DmaCompletion::TimedOut => {
            log::warn!("DMA descriptor #{} never completed", ticket.0);
            Err(BusTransferError)
        }
    }
}
