//! Attempt state machine.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// Lifecycle state of one attempt.
///
/// ```text
/// Created -> Dispatched -> BodyReceived -> Drained -> Closed
///                 |              |
///                 +--> Failed <--+
/// ```
///
/// `BodyReceived` is also where an attempt stays when the body could not be
/// drained or was deliberately left unread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum AttemptState {
    Created,
    Dispatched,
    BodyReceived,
    Failed,
    Drained,
    Closed,
}

impl fmt::Display for AttemptState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AttemptState::Created => "created",
            AttemptState::Dispatched => "dispatched",
            AttemptState::BodyReceived => "body received",
            AttemptState::Failed => "failed",
            AttemptState::Drained => "drained",
            AttemptState::Closed => "closed",
        })
    }
}

/// Rejected state change.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("invalid attempt transition: {from} -> {to}")]
pub struct InvalidTransition {
    pub from: AttemptState,
    pub to: AttemptState,
}

impl AttemptState {
    pub fn can_advance_to(self, next: AttemptState) -> bool {
        use AttemptState::*;
        matches!(
            (self, next),
            (Created, Dispatched)
                | (Dispatched, BodyReceived)
                | (Dispatched, Failed)
                | (BodyReceived, Failed)
                | (BodyReceived, Drained)
                | (Drained, Closed)
        )
    }

    /// Moves to `next` if the transition is allowed.
    pub fn advance(&mut self, next: AttemptState) -> Result<(), InvalidTransition> {
        if !self.can_advance_to(next) {
            return Err(InvalidTransition {
                from: *self,
                to: next,
            });
        }
        *self = next;
        Ok(())
    }

    /// No transition leaves this state.
    pub fn is_terminal(self) -> bool {
        matches!(self, AttemptState::Failed | AttemptState::Closed)
    }
}
