//! Per-actor mailboxes
//!
//! A mailbox is a FIFO queue in exactly one of three states: Open,
//! Suspended, or Closed. It drives one-at-a-time dispatch of invocations
//! against its owning actor: a delivery runs to completion, including any
//! awaits inside the closure, before the next invocation is popped. When a
//! delivery raises, the mailbox suspends itself before the failure is
//! reported, so no further invocation runs until a supervisor resumes or
//! closes it.

use crate::actor::ActorHandle;
use crate::dead_letters::{DeadLetter, DeadLetterReason, DeadLetterSink};
use crate::lifecycle::LifeCycle;
use crate::message::Invocation;
use crate::metrics::MailboxMetrics;
use crate::supervisor::Supervised;
use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use tracing::{debug, error};

const STATE_OPEN: u8 = 0;
const STATE_SUSPENDED: u8 = 1;
const STATE_CLOSED: u8 = 2;

/// Policy applied when a bounded mailbox is at capacity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OverflowPolicy {
    /// Discard the oldest queued invocation to admit the new one
    DropOldest,
    /// Discard the new invocation
    DropNewest,
    /// Refuse the new invocation and record a dead letter
    #[default]
    Reject,
}

/// Mailbox configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MailboxOptions {
    /// Maximum queued invocations; `None` means unbounded
    pub capacity: Option<usize>,
    /// Behavior at capacity; irrelevant while unbounded
    pub overflow: OverflowPolicy,
}

impl MailboxOptions {
    /// Unbounded mailbox (the default)
    pub fn unbounded() -> Self {
        Self::default()
    }

    /// Bounded mailbox with the given capacity and overflow policy
    pub fn bounded(capacity: usize, overflow: OverflowPolicy) -> Self {
        Self {
            capacity: Some(capacity),
            overflow,
        }
    }
}

/// FIFO invocation queue with Open/Suspended/Closed states
pub struct Mailbox {
    state: AtomicU8,
    queue: Mutex<VecDeque<Invocation>>,
    dispatching: AtomicBool,
    options: MailboxOptions,
    owner: OnceCell<ActorHandle>,
    dead_letters: Arc<DeadLetterSink>,
    metrics: MailboxMetrics,
}

impl Mailbox {
    /// New open mailbox publishing dead letters into `dead_letters`
    pub fn new(options: MailboxOptions, dead_letters: Arc<DeadLetterSink>) -> Arc<Self> {
        Arc::new(Self {
            state: AtomicU8::new(STATE_OPEN),
            queue: Mutex::new(VecDeque::new()),
            dispatching: AtomicBool::new(false),
            options,
            owner: OnceCell::new(),
            dead_letters,
            metrics: MailboxMetrics::new(),
        })
    }

    /// Bind the owning actor; called once when the actor cell is assembled
    pub(crate) fn bind(&self, owner: ActorHandle) {
        let _ = self.owner.set(owner);
    }

    /// Whether the mailbox is suspended
    pub fn is_suspended(&self) -> bool {
        self.state.load(Ordering::Acquire) == STATE_SUSPENDED
    }

    /// Whether the mailbox is closed
    pub fn is_closed(&self) -> bool {
        self.state.load(Ordering::Acquire) == STATE_CLOSED
    }

    /// Whether a dispatch would find work: open, not suspended, non-empty
    pub fn is_receivable(&self) -> bool {
        self.state.load(Ordering::Acquire) == STATE_OPEN && !self.queue.lock().is_empty()
    }

    /// Current queue depth
    pub fn len(&self) -> usize {
        self.queue.lock().len()
    }

    /// Whether the queue is empty
    pub fn is_empty(&self) -> bool {
        self.queue.lock().is_empty()
    }

    /// Mailbox counters
    pub fn metrics(&self) -> &MailboxMetrics {
        &self.metrics
    }

    /// Enqueue an invocation and trigger dispatch when receivable
    ///
    /// A closed mailbox records a dead letter and resolves the completion
    /// with the "actor stopped" sentinel. A bounded mailbox at capacity
    /// applies its overflow policy; the drop counter increments exactly once
    /// per overflow event.
    pub fn send(self: &Arc<Self>, mut invocation: Invocation) {
        if self.is_closed() {
            self.publish_dead_letter(&invocation, DeadLetterReason::ActorStopped);
            invocation.completion.settle_stopped();
            return;
        }

        // Decide under the queue lock, settle and report after releasing it.
        let mut displaced: Option<Invocation> = None;
        {
            let mut queue = self.queue.lock();
            let at_capacity = self
                .options
                .capacity
                .is_some_and(|capacity| queue.len() >= capacity);
            if at_capacity {
                match self.options.overflow {
                    OverflowPolicy::DropOldest => {
                        displaced = queue.pop_front();
                        queue.push_back(invocation);
                        self.metrics.record_enqueued(queue.len());
                    }
                    OverflowPolicy::DropNewest => {
                        drop(queue);
                        invocation.completion.settle_dropped();
                        self.metrics.record_dropped();
                        return;
                    }
                    OverflowPolicy::Reject => {
                        drop(queue);
                        self.publish_dead_letter(&invocation, DeadLetterReason::MailboxFull);
                        invocation.completion.settle_rejected();
                        self.metrics.record_dropped();
                        return;
                    }
                }
            } else {
                queue.push_back(invocation);
                self.metrics.record_enqueued(queue.len());
            }
        }

        if let Some(mut oldest) = displaced {
            oldest.completion.settle_dropped();
            self.metrics.record_dropped();
        }

        if !self.is_suspended() {
            self.dispatch();
        }
    }

    /// Suspend delivery; queued invocations are retained
    pub fn suspend(&self) {
        let _ = self.state.compare_exchange(
            STATE_OPEN,
            STATE_SUSPENDED,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
        self.metrics.record_suspension();
    }

    /// Resume delivery and trigger dispatch when work is queued
    pub fn resume(self: &Arc<Self>) {
        let resumed = self
            .state
            .compare_exchange(
                STATE_SUSPENDED,
                STATE_OPEN,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok();
        if resumed {
            self.dispatch();
        }
    }

    /// Close the mailbox; idempotent
    ///
    /// Queued invocations dead-letter and resolve with the "actor stopped"
    /// sentinel. Further sends dead-letter the same way.
    pub fn close(&self) {
        let previous = self.state.swap(STATE_CLOSED, Ordering::AcqRel);
        if previous == STATE_CLOSED {
            return;
        }

        let drained: Vec<Invocation> = self.queue.lock().drain(..).collect();
        for mut invocation in drained {
            self.publish_dead_letter(&invocation, DeadLetterReason::ActorStopped);
            invocation.completion.settle_stopped();
        }
        debug!(depth = 0usize, "Mailbox closed");
    }

    /// Trigger the cooperative drain task; at most one runs per mailbox
    pub(crate) fn dispatch(self: &Arc<Self>) {
        if self.dispatching.swap(true, Ordering::AcqRel) {
            return;
        }
        let mailbox = Arc::clone(self);
        tokio::spawn(async move {
            mailbox.drain().await;
        });
    }

    async fn drain(self: Arc<Self>) {
        loop {
            let next = if self.state.load(Ordering::Acquire) == STATE_OPEN {
                self.queue.lock().pop_front()
            } else {
                None
            };

            let Some(invocation) = next else {
                self.dispatching.store(false, Ordering::Release);
                // Re-check: an enqueue or resume may have raced the release.
                if self.is_receivable() && !self.dispatching.swap(true, Ordering::AcqRel) {
                    continue;
                }
                return;
            };

            self.deliver(invocation).await;
        }
    }

    /// Deliver one invocation against the owning actor
    async fn deliver(&self, invocation: Invocation) {
        let Some(owner) = self.owner.get() else {
            // Unbound mailboxes cannot occur through the stage; fail the
            // caller rather than losing the completion.
            let Invocation { mut completion, .. } = invocation;
            completion.settle_error(crate::error::ActorError::custom(
                "mailbox is not bound to an actor",
            ));
            return;
        };

        if owner.is_stopped() {
            self.publish_dead_letter(&invocation, DeadLetterReason::ActorStopped);
            let Invocation { mut completion, .. } = invocation;
            completion.settle_stopped();
            return;
        }

        let env = owner.env();
        env.set_current_message_context(invocation.context_snapshot.copy());
        invocation.context_snapshot.propagate();

        let Invocation {
            body,
            representation,
            mut completion,
            ..
        } = invocation;

        let outcome = (body)().await;
        self.metrics.record_delivered(self.queue.lock().len());

        match outcome {
            Ok(value) => {
                completion.settle_value(value);
            }
            Err(cause) => {
                error!(
                    address = %owner.address(),
                    type_name = %owner.type_name(),
                    representation = %representation,
                    error = %cause,
                    "Invocation failed"
                );
                completion.settle_error(cause.clone());

                // Suspend before the failure is routed so no further
                // invocation runs ahead of the supervision decision.
                self.suspend();
                let _ = env.life_cycle().transition(LifeCycle::Suspended);

                let supervised =
                    Supervised::new(owner.clone(), cause, env.current_message_context());
                if let Some(stage) = env.stage() {
                    tokio::spawn(async move {
                        stage.handle_failure_of(supervised).await;
                    });
                }
            }
        }

        env.clear_current_message_context();
    }

    fn publish_dead_letter(&self, invocation: &Invocation, reason: DeadLetterReason) {
        let Some(owner) = self.owner.get() else {
            return;
        };
        self.dead_letters.publish(DeadLetter::new(
            owner.address(),
            owner.type_name(),
            invocation.representation(),
            reason,
        ));
    }
}

impl std::fmt::Debug for Mailbox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match self.state.load(Ordering::Acquire) {
            STATE_OPEN => "open",
            STATE_SUSPENDED => "suspended",
            _ => "closed",
        };
        f.debug_struct("Mailbox")
            .field("state", &state)
            .field("depth", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ExecutionContext;
    use crate::error::ActorResult;
    use crate::message::{AnyValue, Completion, Delivery, Reply};
    use tokio::sync::oneshot;

    fn test_invocation(
        representation: &str,
    ) -> (Invocation, oneshot::Receiver<ActorResult<Reply>>) {
        let (completion, rx) = Completion::new();
        let invocation = Invocation::new(
            Box::new(|| Box::pin(async { Ok(Box::new(()) as AnyValue) })),
            representation.to_string(),
            completion,
            ExecutionContext::empty(),
        );
        (invocation, rx)
    }

    fn unbound_mailbox(options: MailboxOptions) -> Arc<Mailbox> {
        Mailbox::new(options, Arc::new(DeadLetterSink::new()))
    }

    #[tokio::test]
    async fn test_closed_mailbox_resolves_stopped() {
        let mailbox = unbound_mailbox(MailboxOptions::unbounded());
        mailbox.close();

        let (invocation, rx) = test_invocation("some_op()");
        mailbox.send(invocation);

        let reply = rx.await.unwrap().unwrap();
        assert!(matches!(reply, Delivery::Stopped));
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let mailbox = unbound_mailbox(MailboxOptions::unbounded());
        mailbox.close();
        mailbox.close();
        assert!(mailbox.is_closed());
    }

    #[tokio::test]
    async fn test_close_drains_queue_as_stopped() {
        let mailbox = unbound_mailbox(MailboxOptions::unbounded());
        mailbox.suspend();

        let (a, rx_a) = test_invocation("a()");
        let (b, rx_b) = test_invocation("b()");
        mailbox.send(a);
        mailbox.send(b);
        assert_eq!(mailbox.len(), 2);

        mailbox.close();
        assert!(matches!(rx_a.await.unwrap().unwrap(), Delivery::Stopped));
        assert!(matches!(rx_b.await.unwrap().unwrap(), Delivery::Stopped));
        assert!(mailbox.is_empty());
    }

    #[tokio::test]
    async fn test_drop_oldest_at_capacity() {
        let mailbox = unbound_mailbox(MailboxOptions::bounded(2, OverflowPolicy::DropOldest));
        mailbox.suspend();

        let (a, rx_a) = test_invocation("a()");
        let (b, _rx_b) = test_invocation("b()");
        let (c, _rx_c) = test_invocation("c()");
        mailbox.send(a);
        mailbox.send(b);
        mailbox.send(c);

        assert!(matches!(rx_a.await.unwrap().unwrap(), Delivery::Dropped));
        assert_eq!(mailbox.len(), 2);
        assert_eq!(mailbox.metrics().dropped_count(), 1);
    }

    #[tokio::test]
    async fn test_drop_newest_at_capacity() {
        let mailbox = unbound_mailbox(MailboxOptions::bounded(1, OverflowPolicy::DropNewest));
        mailbox.suspend();

        let (a, _rx_a) = test_invocation("a()");
        let (b, rx_b) = test_invocation("b()");
        mailbox.send(a);
        mailbox.send(b);

        assert!(matches!(rx_b.await.unwrap().unwrap(), Delivery::Dropped));
        assert_eq!(mailbox.len(), 1);
        assert_eq!(mailbox.metrics().dropped_count(), 1);
    }

    #[tokio::test]
    async fn test_reject_at_capacity() {
        let mailbox = unbound_mailbox(MailboxOptions::bounded(1, OverflowPolicy::Reject));
        mailbox.suspend();

        let (a, _rx_a) = test_invocation("a()");
        let (b, rx_b) = test_invocation("b()");
        mailbox.send(a);
        mailbox.send(b);

        assert!(matches!(rx_b.await.unwrap().unwrap(), Delivery::Rejected));
        assert_eq!(mailbox.len(), 1);
        assert_eq!(mailbox.metrics().dropped_count(), 1);
    }

    #[tokio::test]
    async fn test_suspended_mailbox_retains_queue() {
        let mailbox = unbound_mailbox(MailboxOptions::unbounded());
        mailbox.suspend();

        let (a, _rx) = test_invocation("a()");
        mailbox.send(a);

        assert!(mailbox.is_suspended());
        assert!(!mailbox.is_receivable());
        assert_eq!(mailbox.len(), 1);
    }
}
