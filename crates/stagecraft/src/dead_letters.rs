//! Dead-letter reporting
//!
//! A dead letter describes an invocation that could not be delivered: the
//! target was stopped, or a bounded mailbox rejected or discarded it. Dead
//! letters are reports, not errors; the invocation's completion resolves to
//! the matching non-error sentinel.

use crate::address::Address;
use crate::error::ActorResult;
use parking_lot::RwLock;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::SystemTime;
use tracing::warn;

/// Why an invocation could not be delivered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeadLetterReason {
    /// The target actor was stopped
    ActorStopped,
    /// A bounded mailbox rejected the invocation
    MailboxFull,
    /// A bounded mailbox discarded the invocation to admit another
    DroppedOnOverflow,
}

impl fmt::Display for DeadLetterReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeadLetterReason::ActorStopped => write!(f, "actor stopped"),
            DeadLetterReason::MailboxFull => write!(f, "mailbox full"),
            DeadLetterReason::DroppedOnOverflow => write!(f, "dropped due to overflow"),
        }
    }
}

/// Record of one undeliverable invocation
#[derive(Debug, Clone)]
pub struct DeadLetter {
    /// Address of the target actor
    pub address: Address,
    /// Type name of the target actor
    pub type_name: String,
    /// The invocation's `method(args)` representation
    pub representation: String,
    /// Why delivery was impossible
    pub reason: DeadLetterReason,
    /// When the dead letter was recorded
    pub recorded_at: SystemTime,
}

impl DeadLetter {
    /// Build a record for the given target and invocation representation
    pub fn new(
        address: Address,
        type_name: impl Into<String>,
        representation: impl Into<String>,
        reason: DeadLetterReason,
    ) -> Self {
        Self {
            address,
            type_name: type_name.into(),
            representation: representation.into(),
            reason,
            recorded_at: SystemTime::now(),
        }
    }
}

/// Listener notified of every dead letter
///
/// Listener errors are caught and logged; they never disturb delivery.
pub trait DeadLetterListener: Send + Sync {
    /// Handle one dead-letter record
    fn handle(&self, dead_letter: &DeadLetter) -> ActorResult<()>;
}

/// Process-wide dead-letter sink
///
/// Logs each record, then notifies registered listeners.
#[derive(Default)]
pub struct DeadLetterSink {
    listeners: RwLock<Vec<Arc<dyn DeadLetterListener>>>,
    total: AtomicU64,
}

impl DeadLetterSink {
    /// Empty sink with no listeners
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an additional listener
    pub fn register_listener(&self, listener: Arc<dyn DeadLetterListener>) {
        self.listeners.write().push(listener);
    }

    /// Total records published so far
    pub fn count(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }

    /// Publish one record: log, then notify listeners
    pub fn publish(&self, dead_letter: DeadLetter) {
        self.total.fetch_add(1, Ordering::Relaxed);
        warn!(
            address = %dead_letter.address,
            type_name = %dead_letter.type_name,
            representation = %dead_letter.representation,
            reason = %dead_letter.reason,
            "Dead letter"
        );

        let listeners = self.listeners.read().clone();
        for listener in listeners {
            if let Err(error) = listener.handle(&dead_letter) {
                warn!(
                    representation = %dead_letter.representation,
                    error = %error,
                    "Dead-letter listener failed"
                );
            }
        }
    }
}

impl fmt::Debug for DeadLetterSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeadLetterSink")
            .field("listeners", &self.listeners.read().len())
            .field("total", &self.count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ActorError;
    use parking_lot::Mutex;

    struct Recording {
        seen: Mutex<Vec<String>>,
    }

    impl DeadLetterListener for Recording {
        fn handle(&self, dead_letter: &DeadLetter) -> ActorResult<()> {
            self.seen.lock().push(dead_letter.representation.clone());
            Ok(())
        }
    }

    struct Failing;

    impl DeadLetterListener for Failing {
        fn handle(&self, _dead_letter: &DeadLetter) -> ActorResult<()> {
            Err(ActorError::custom("listener broke"))
        }
    }

    #[test]
    fn test_reason_wording() {
        assert_eq!(DeadLetterReason::ActorStopped.to_string(), "actor stopped");
        assert_eq!(DeadLetterReason::MailboxFull.to_string(), "mailbox full");
        assert_eq!(
            DeadLetterReason::DroppedOnOverflow.to_string(),
            "dropped due to overflow"
        );
    }

    #[test]
    fn test_listeners_observe_records() {
        let sink = DeadLetterSink::new();
        let recording = Arc::new(Recording {
            seen: Mutex::new(Vec::new()),
        });
        sink.register_listener(recording.clone());

        sink.publish(DeadLetter::new(
            Address::sequential(),
            "Counter",
            "some_op()",
            DeadLetterReason::ActorStopped,
        ));

        assert_eq!(sink.count(), 1);
        assert_eq!(recording.seen.lock().as_slice(), ["some_op()"]);
    }

    #[test]
    fn test_listener_errors_do_not_block_others() {
        let sink = DeadLetterSink::new();
        let recording = Arc::new(Recording {
            seen: Mutex::new(Vec::new()),
        });
        sink.register_listener(Arc::new(Failing));
        sink.register_listener(recording.clone());

        sink.publish(DeadLetter::new(
            Address::sequential(),
            "Counter",
            "get()",
            DeadLetterReason::MailboxFull,
        ));

        assert_eq!(recording.seen.lock().len(), 1);
    }
}
