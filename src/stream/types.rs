use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};

use tracing::Level;

/// Cooperative cancellation flag shared between a pump and its handles.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    /// Signal cancellation. Idempotent.
    ///
    /// Returns `true` only for the call that actually flipped the flag.
    pub fn cancel(&self) -> bool {
        !self.0.swap(true, Ordering::SeqCst)
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Lifecycle of a pump's worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PumpState {
    Idle,
    Running,
    Stopped,
}

impl PumpState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Self::Idle,
            1 => Self::Running,
            _ => Self::Stopped,
        }
    }
}

/// Lock-free cell holding a [`PumpState`]. Transitions only move forward.
#[derive(Debug, Default)]
pub(crate) struct StateCell(AtomicU8);

impl StateCell {
    pub(crate) fn get(&self) -> PumpState {
        PumpState::from_u8(self.0.load(Ordering::SeqCst))
    }

    pub(crate) fn advance(&self, to: PumpState) {
        self.0.fetch_max(to as u8, Ordering::SeqCst);
    }
}

/// Why a pump stopped.
#[derive(Debug)]
pub enum PumpOutcome {
    /// The source reported end-of-stream.
    Completed,
    /// `close()` stopped the pump.
    Cancelled,
    /// Reading failed for a reason unrelated to cancellation.
    Failed(io::Error),
}

impl PumpOutcome {
    /// The value handed to the completion sink.
    pub fn success(&self) -> bool {
        matches!(self, Self::Completed)
    }

    /// Level at which the outcome is reported.
    pub fn severity(&self) -> Level {
        match self {
            Self::Completed | Self::Cancelled => Level::DEBUG,
            Self::Failed(_) => Level::ERROR,
        }
    }
}

/// Items produced by [`pump_channel`](super::pump_channel).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PumpEvent {
    Chunk(Vec<u8>),
    Finished(bool),
}
