//! Control-flow signals raised while running automation.
//!
//! Two disjoint kinds:
//!
//! - [`AutomationError`]: recoverable. Caught where sibling effects are
//!   aggregated (`run_children`), narrated as `**Error**: {message}`, and
//!   execution continues with the next sibling.
//! - [`StopExecution`]: hard stop. Propagates through every level and ends
//!   the run; narration already queued is kept.
//!
//! Every effect's `run` returns `Result<_, Signal>`, so both travel through
//! `?` until `run_children` sorts them out. Nothing else catches them.
//!
//! Decode errors are a third, earlier category and live with the
//! descriptor format (`effects::DecodeError`).

use thiserror::Error;

use crate::eval::{DiceError, EvalError};

/// A recoverable, user-facing automation failure.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum AutomationError {
    /// An invalid or unusable target selection.
    #[error("{0}")]
    Target(String),

    /// An expression or dice string failed to evaluate.
    #[error("{0}")]
    Evaluation(String),

    /// A counter could not be used.
    #[error("{0}")]
    Counter(String),

    /// A spell could not be found or cast.
    #[error("{0}")]
    Spell(String),

    /// An initiative effect operation had nothing to act on.
    #[error("{0}")]
    NoEffect(String),

    /// Automation nested too deeply.
    #[error("{0}")]
    Nesting(String),
}

impl From<EvalError> for AutomationError {
    fn from(e: EvalError) -> Self {
        AutomationError::Evaluation(format!("Error evaluating expression: {e}"))
    }
}

impl From<DiceError> for AutomationError {
    fn from(e: DiceError) -> Self {
        AutomationError::Evaluation(format!("Error rolling dice: {e}"))
    }
}

/// Hard stop: abort the whole run immediately.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("execution stopped: {reason}")]
pub struct StopExecution {
    /// Why execution stopped.
    pub reason: String,
}

impl StopExecution {
    /// Create a stop signal.
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// The error channel of every effect's `run`.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum Signal {
    /// Recoverable; narrated and skipped at the aggregation boundary.
    #[error(transparent)]
    Error(#[from] AutomationError),

    /// Abort the run.
    #[error(transparent)]
    Stop(#[from] StopExecution),
}

impl From<EvalError> for Signal {
    fn from(e: EvalError) -> Self {
        Signal::Error(e.into())
    }
}

impl From<DiceError> for Signal {
    fn from(e: DiceError) -> Self {
        Signal::Error(e.into())
    }
}
