//! Actor lifecycle states
//!
//! Lifecycle follows `Starting -> Running <-> Suspended -> Stopping ->
//! Stopped`, with `Restarting` bridging back to `Running` when a supervisor
//! replaces the instance. A stopped actor is terminal.

use crate::error::{ActorError, ActorResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

/// Actor lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum LifeCycle {
    /// Created, `before_start` not yet completed
    Starting = 0,
    /// Accepting and delivering invocations
    Running = 1,
    /// Mailbox suspended pending a supervision decision
    Suspended = 2,
    /// Supervisor is swapping in a replacement instance
    Restarting = 3,
    /// Stop sequence in progress
    Stopping = 4,
    /// Terminal
    Stopped = 5,
}

impl LifeCycle {
    fn from_u8(value: u8) -> LifeCycle {
        match value {
            0 => LifeCycle::Starting,
            1 => LifeCycle::Running,
            2 => LifeCycle::Suspended,
            3 => LifeCycle::Restarting,
            4 => LifeCycle::Stopping,
            _ => LifeCycle::Stopped,
        }
    }

    /// Whether the actor has entered its stop sequence
    pub fn is_stopped(&self) -> bool {
        matches!(self, LifeCycle::Stopping | LifeCycle::Stopped)
    }

    fn can_transition_to(&self, next: LifeCycle) -> bool {
        use LifeCycle::*;
        matches!(
            (self, next),
            (Starting, Running)
                | (Starting, Suspended)
                | (Starting, Restarting)
                | (Starting, Stopping)
                | (Running, Suspended)
                | (Running, Restarting)
                | (Running, Stopping)
                | (Suspended, Running)
                | (Suspended, Restarting)
                | (Suspended, Stopping)
                | (Restarting, Running)
                | (Restarting, Stopping)
                | (Stopping, Stopped)
        )
    }
}

impl fmt::Display for LifeCycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LifeCycle::Starting => write!(f, "starting"),
            LifeCycle::Running => write!(f, "running"),
            LifeCycle::Suspended => write!(f, "suspended"),
            LifeCycle::Restarting => write!(f, "restarting"),
            LifeCycle::Stopping => write!(f, "stopping"),
            LifeCycle::Stopped => write!(f, "stopped"),
        }
    }
}

/// Shared lifecycle cell with validated transitions
///
/// One per environment; readable from any thread without locking.
#[derive(Debug)]
pub struct LifecycleState {
    state: AtomicU8,
}

impl LifecycleState {
    /// New cell in the `Starting` state
    pub fn new() -> Self {
        Self {
            state: AtomicU8::new(LifeCycle::Starting as u8),
        }
    }

    /// Current state
    pub fn current(&self) -> LifeCycle {
        LifeCycle::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Whether the actor has entered its stop sequence
    pub fn is_stopped(&self) -> bool {
        self.current().is_stopped()
    }

    /// Attempt a validated transition
    ///
    /// Internal callers ignore the result with a trace log when a transition
    /// races against stop; external misuse surfaces the error.
    pub fn transition(&self, next: LifeCycle) -> ActorResult<LifeCycle> {
        let mut current = self.state.load(Ordering::Acquire);
        loop {
            let from = LifeCycle::from_u8(current);
            if !from.can_transition_to(next) {
                return Err(ActorError::InvalidStateTransition {
                    from: from.to_string(),
                    to: next.to_string(),
                });
            }
            match self.state.compare_exchange(
                current,
                next as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return Ok(from),
                Err(observed) => current = observed,
            }
        }
    }
}

impl Default for LifecycleState {
    fn default() -> Self {
        Self::new()
    }
}
