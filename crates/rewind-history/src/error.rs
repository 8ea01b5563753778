/// Errors returned by the undo/redo engine.
use thiserror::Error;

use crate::engine::Mode;

/// Contract violations by the caller. Never retried by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum StateViolation {
    /// A begin call while an undo or redo is already running.
    #[error("cannot {operation} while {mode} is in progress")]
    AlreadyBracketed {
        operation: &'static str,
        mode: Mode,
    },
    /// An end call with no matching begin.
    #[error("{operation} called without a matching begin")]
    NoMatchingBegin { operation: &'static str },
    /// Redo requested while an uncommitted operation is open.
    #[error("cannot redo while an operation is in progress")]
    OperationInProgress,
}

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("invalid history state: {0}")]
    InvalidState(#[from] StateViolation),
    /// A memento failed while being replayed. The rest of its group was
    /// not executed.
    #[error("memento replay failed: {0:#}")]
    Memento(anyhow::Error),
}

impl HistoryError {
    pub fn is_invalid_state(&self) -> bool {
        matches!(self, HistoryError::InvalidState(_))
    }
}
