//! Handle lifecycle tracking

use std::fmt;
use std::sync::{Mutex, PoisonError};

/// Where a handle is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandleState {
    /// Built, binding not started yet
    Created,
    /// Waiting for dependencies or for the binding to be acknowledged
    Resolving,
    /// The remote variable holds the value
    Bound,
    /// Forced at least once
    Evaluated,
    /// A dependency or the binding failed
    Failed,
    /// The session's channel was torn down
    Closed,
}

impl HandleState {
    /// Whether the remote variable is known to exist
    pub fn is_bound(self) -> bool {
        matches!(self, HandleState::Bound | HandleState::Evaluated)
    }
}

impl fmt::Display for HandleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HandleState::Created => "created",
            HandleState::Resolving => "resolving",
            HandleState::Bound => "bound",
            HandleState::Evaluated => "evaluated",
            HandleState::Failed => "failed",
            HandleState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// State shared between a handle and its resolution task
#[derive(Debug)]
pub(crate) struct StateCell(Mutex<HandleState>);

impl StateCell {
    pub(crate) fn new(state: HandleState) -> Self {
        Self(Mutex::new(state))
    }

    pub(crate) fn get(&self) -> HandleState {
        *self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn set(&self, state: HandleState) {
        *self.0.lock().unwrap_or_else(PoisonError::into_inner) = state;
    }

    /// Record a successful force; failed handles stay failed
    pub(crate) fn mark_evaluated(&self) {
        let mut state = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        if state.is_bound() {
            *state = HandleState::Evaluated;
        }
    }
}
