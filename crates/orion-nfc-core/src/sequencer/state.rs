//! Sequencer state and per-controller context

use core::fmt;

use crate::controller::NfcStatus;
use crate::error::ErrorKind;
use crate::plan::ChunkKind;

/// Where the sequencer is in the per-chunk protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SequencerState {
    /// Idle, nothing executed since init or reset
    #[default]
    Ready,
    /// Command/address phase of a chunk
    Issuing,
    /// Waiting for data-ready / command-accepted
    AwaitingPhase1,
    /// Moving chunk data
    Transferring,
    /// Waiting for completion / bad-block verification
    AwaitingPhase2,
    /// Last plan completed
    Done,
    /// Last plan failed
    Failed(ErrorKind),
}

impl SequencerState {
    /// Whether no plan is in flight
    ///
    /// `Done` and `Failed` are terminal states of the previous plan; the
    /// controller is idle in both.
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Ready | Self::Done | Self::Failed(_))
    }
}

impl fmt::Display for SequencerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ready => write!(f, "ready"),
            Self::Issuing => write!(f, "issuing"),
            Self::AwaitingPhase1 => write!(f, "awaiting phase 1"),
            Self::Transferring => write!(f, "transferring"),
            Self::AwaitingPhase2 => write!(f, "awaiting phase 2"),
            Self::Done => write!(f, "done"),
            Self::Failed(kind) => write!(f, "failed: {}", kind),
        }
    }
}

/// ECC event counters, accumulated across operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EccStats {
    /// Bit errors the engine corrected
    pub corrected: u32,
    /// Reads that ended with an uncorrectable error
    pub failed: u32,
    /// Uncorrectable reads downgraded because the page was erased
    pub blank_pages: u32,
}

/// Event masks of a chunk's two handshake phases
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ChunkPhases {
    /// Event to wait for after issuing, before the data phase
    pub phase1: Option<NfcStatus>,
    /// Event to wait for after the data phase
    pub phase2: Option<NfcStatus>,
}

impl ChunkPhases {
    /// Handshake required by a chunk kind
    pub(crate) fn for_kind(kind: ChunkKind) -> Self {
        let (phase1, phase2) = match kind {
            ChunkKind::Monolithic
            | ChunkKind::Naked
            | ChunkKind::LastNaked
            | ChunkKind::ReadId
            | ChunkKind::ReadStatus => (Some(NfcStatus::RDDREQ), None),
            ChunkKind::DispatchStart => (Some(NfcStatus::CMDD), None),
            ChunkKind::NakedWrite => (Some(NfcStatus::WRDREQ), None),
            ChunkKind::DispatchEnd | ChunkKind::Erase => {
                (None, Some(NfcStatus::RDY | NfcStatus::BBD))
            }
            ChunkKind::Reset => (None, Some(NfcStatus::RDY)),
        };
        Self { phase1, phase2 }
    }
}

/// Mutable per-controller sequencing state
///
/// Owned by one [`CommandSequencer`](super::CommandSequencer); nothing here
/// is global, so several controllers can run side by side.
#[derive(Debug, Clone, Default)]
pub(crate) struct SequencerContext {
    /// Current protocol state
    pub state: SequencerState,
    /// Index of the chunk being executed
    pub chunk_index: usize,
    /// Deferred failure, reported once the plan is exhausted
    pub provisional: Option<ErrorKind>,
    /// Status register as last sampled
    pub last_status: NfcStatus,
    /// ECC counters
    pub ecc: EccStats,
}

impl SequencerContext {
    pub(crate) fn begin(&mut self) {
        self.chunk_index = 0;
        self.provisional = None;
        self.last_status = NfcStatus::empty();
        self.state = SequencerState::Issuing;
    }
}
