//! Error types for the actor runtime

use std::time::Duration;
use thiserror::Error;

/// Result type for actor operations
pub type ActorResult<T> = Result<T, ActorError>;

/// Actor runtime error types
///
/// Errors are `Clone` because a single failure is delivered twice: once to
/// the caller through the invocation's completion handle, and once to the
/// supervisor through the failure route.
#[derive(Debug, Error, Clone)]
pub enum ActorError {
    /// Actor not found in the directory
    #[error("actor not found: {address}")]
    ActorNotFound { address: String },

    /// No supervisor registered under the given name
    #[error("supervisor not found: {name}")]
    SupervisorNotFound { name: String },

    /// Actor failed during instantiation or `before_start`
    #[error("actor startup failed: {type_name} - {reason}")]
    StartupFailed { type_name: String, reason: String },

    /// Actor failed to stop cleanly
    #[error("actor shutdown failed: {type_name} - {reason}")]
    ShutdownFailed { type_name: String, reason: String },

    /// Replacement instance could not be constructed
    #[error("actor restart failed: {type_name} - {reason}")]
    RestartFailed { type_name: String, reason: String },

    /// An invocation's closure raised
    #[error("invocation failed: {representation} - {reason}")]
    InvocationFailed {
        representation: String,
        reason: String,
    },

    /// Lifecycle state machine rejected a transition
    #[error("invalid state transition from {from} to {to}")]
    InvalidStateTransition { from: String, to: String },

    /// Bounded wait elapsed
    #[error("operation timed out: {operation} after {timeout:?}")]
    Timeout {
        operation: String,
        timeout: Duration,
    },

    /// Lookup in the value registry missed
    #[error("value not registered: {name}")]
    ValueNotRegistered { name: String },

    /// A reserved type name was used for a user registration
    #[error("type name is reserved: {name}")]
    ReservedName { name: String },

    /// Operation is not permitted in the current state
    #[error("invalid operation: {operation} - {reason}")]
    InvalidOperation { operation: String, reason: String },

    /// The completion handle was discarded before it was settled
    #[error("completion dropped for {representation}")]
    CompletionDropped { representation: String },

    /// A typed call received a reply of a different type
    #[error("reply type mismatch for {representation}: expected {expected}")]
    ReplyTypeMismatch {
        representation: String,
        expected: String,
    },

    /// The owning stage has been dropped
    #[error("stage is no longer available")]
    StageUnavailable,

    /// Free-form error raised by actor code
    #[error("{message}")]
    Custom { message: String },
}

impl ActorError {
    /// Wrap an arbitrary message as an actor error
    pub fn custom(message: impl Into<String>) -> Self {
        ActorError::Custom {
            message: message.into(),
        }
    }

    /// Classify the error for supervision decisions and logging
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            ActorError::ActorNotFound { .. }
            | ActorError::ValueNotRegistered { .. }
            | ActorError::ReservedName { .. }
            | ActorError::ReplyTypeMismatch { .. }
            | ActorError::InvalidOperation { .. }
            | ActorError::Custom { .. } => ErrorSeverity::Minor,

            ActorError::InvocationFailed { .. }
            | ActorError::Timeout { .. }
            | ActorError::CompletionDropped { .. }
            | ActorError::InvalidStateTransition { .. }
            | ActorError::SupervisorNotFound { .. } => ErrorSeverity::Major,

            ActorError::StartupFailed { .. }
            | ActorError::ShutdownFailed { .. }
            | ActorError::RestartFailed { .. }
            | ActorError::StageUnavailable => ErrorSeverity::Critical,
        }
    }

    /// Whether a supervisor would normally replace the actor for this error
    pub fn should_restart_actor(&self) -> bool {
        matches!(
            self.severity(),
            ErrorSeverity::Major | ErrorSeverity::Critical
        )
    }
}

/// Coarse error classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    /// Input-level problem; the actor's state is intact
    Minor,
    /// Delivery-level failure; state may be partially mutated
    Major,
    /// Lifecycle or runtime failure
    Critical,
}
