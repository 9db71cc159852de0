//! Invocations and completion handles
//!
//! An [`Invocation`] is one queued unit of work: a type-erased closure over
//! the target actor, a human-readable representation used for dead letters
//! and logs, a one-shot [`Completion`] settled exactly once, and a snapshot
//! of the execution context taken at enqueue time.

use crate::context::ExecutionContext;
use crate::error::{ActorError, ActorResult};
use futures::future::BoxFuture;
use std::any::Any;
use std::fmt;
use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::oneshot;

/// Type-erased invocation result value
pub type AnyValue = Box<dyn Any + Send>;

pub(crate) type InvocationBody =
    Box<dyn FnOnce() -> BoxFuture<'static, ActorResult<AnyValue>> + Send>;

/// Outcome of an invocation as observed by the caller
///
/// The sentinels are reports, not errors: a send to a stopped actor or a
/// bounded-mailbox overflow resolves the completion without failing it.
#[derive(Debug)]
pub enum Delivery<T> {
    /// The closure ran and produced a value
    Value(T),
    /// The target was stopped before the invocation could run
    Stopped,
    /// A bounded mailbox discarded the invocation due to overflow
    Dropped,
    /// A bounded mailbox rejected the invocation outright
    Rejected,
}

impl<T> Delivery<T> {
    /// The produced value, if the invocation ran
    pub fn value(self) -> Option<T> {
        match self {
            Delivery::Value(value) => Some(value),
            _ => None,
        }
    }

    /// Whether the "actor stopped" sentinel was observed
    pub fn is_stopped(&self) -> bool {
        matches!(self, Delivery::Stopped)
    }

    /// Whether an overflow policy discarded the invocation
    pub fn is_dropped(&self) -> bool {
        matches!(self, Delivery::Dropped)
    }
}

pub(crate) type Reply = Delivery<AnyValue>;

/// One-shot result slot settled exactly once with a value, sentinel, or error
pub struct Completion {
    tx: Option<oneshot::Sender<ActorResult<Reply>>>,
}

impl fmt::Debug for Completion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Completion")
            .field("settled", &self.tx.is_none())
            .finish()
    }
}

impl Completion {
    /// Create a completion and the receiver its caller awaits
    pub(crate) fn new() -> (Self, oneshot::Receiver<ActorResult<Reply>>) {
        let (tx, rx) = oneshot::channel();
        (Self { tx: Some(tx) }, rx)
    }

    /// Settle the completion; later settles are ignored
    ///
    /// A dropped receiver is not an error: callers are free to discard the
    /// returned future without cancelling the invocation.
    pub(crate) fn settle(&mut self, result: ActorResult<Reply>) {
        if let Some(tx) = self.tx.take() {
            let _ = tx.send(result);
        }
    }

    pub(crate) fn settle_value(&mut self, value: AnyValue) {
        self.settle(Ok(Delivery::Value(value)));
    }

    pub(crate) fn settle_stopped(&mut self) {
        self.settle(Ok(Delivery::Stopped));
    }

    pub(crate) fn settle_dropped(&mut self) {
        self.settle(Ok(Delivery::Dropped));
    }

    pub(crate) fn settle_rejected(&mut self) {
        self.settle(Ok(Delivery::Rejected));
    }

    pub(crate) fn settle_error(&mut self, error: ActorError) {
        self.settle(Err(error));
    }
}

/// One queued unit of work against an actor
pub struct Invocation {
    pub(crate) body: InvocationBody,
    pub(crate) representation: String,
    pub(crate) completion: Completion,
    pub(crate) context_snapshot: ExecutionContext,
}

impl Invocation {
    pub(crate) fn new(
        body: InvocationBody,
        representation: String,
        completion: Completion,
        context_snapshot: ExecutionContext,
    ) -> Self {
        Self {
            body,
            representation,
            completion,
            context_snapshot,
        }
    }

    /// Human-readable `method(arg1,arg2)` form, used for dead letters
    pub fn representation(&self) -> &str {
        &self.representation
    }
}

impl fmt::Debug for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Invocation")
            .field("representation", &self.representation)
            .finish_non_exhaustive()
    }
}

/// Render the `method(arg1,arg2)` representation for an invocation
pub fn representation(method: &str, args: &[String]) -> String {
    format!("{}({})", method, args.join(","))
}

/// Future returned by a proxy call
///
/// Resolves to the typed [`Delivery`] for the invocation, or the error its
/// closure raised. Dropping the future does not cancel the invocation.
pub struct CallFuture<R> {
    rx: oneshot::Receiver<ActorResult<Reply>>,
    representation: String,
    _result: PhantomData<fn() -> R>,
}

impl<R> fmt::Debug for CallFuture<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallFuture")
            .field("representation", &self.representation)
            .finish_non_exhaustive()
    }
}

impl<R> CallFuture<R> {
    pub(crate) fn new(rx: oneshot::Receiver<ActorResult<Reply>>, representation: String) -> Self {
        Self {
            rx,
            representation,
            _result: PhantomData,
        }
    }

    /// The representation of the invocation this future belongs to
    pub fn representation(&self) -> &str {
        &self.representation
    }
}

impl<R: 'static> Future for CallFuture<R> {
    type Output = ActorResult<Delivery<R>>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        match Pin::new(&mut this.rx).poll(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(Err(_)) => Poll::Ready(Err(ActorError::CompletionDropped {
                representation: this.representation.clone(),
            })),
            Poll::Ready(Ok(Err(error))) => Poll::Ready(Err(error)),
            Poll::Ready(Ok(Ok(reply))) => Poll::Ready(match reply {
                Delivery::Value(any) => match any.downcast::<R>() {
                    Ok(value) => Ok(Delivery::Value(*value)),
                    Err(_) => Err(ActorError::ReplyTypeMismatch {
                        representation: this.representation.clone(),
                        expected: std::any::type_name::<R>().to_string(),
                    }),
                },
                Delivery::Stopped => Ok(Delivery::Stopped),
                Delivery::Dropped => Ok(Delivery::Dropped),
                Delivery::Rejected => Ok(Delivery::Rejected),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop_invocation(representation: &str) -> (Invocation, oneshot::Receiver<ActorResult<Reply>>) {
        let (completion, rx) = Completion::new();
        let invocation = Invocation::new(
            Box::new(|| Box::pin(async { Ok(Box::new(()) as AnyValue) })),
            representation.to_string(),
            completion,
            ExecutionContext::empty(),
        );
        (invocation, rx)
    }

    #[test]
    fn test_representation_rendering() {
        assert_eq!(representation("get", &[]), "get()");
        assert_eq!(
            representation("set", &["7".to_string(), "\"x\"".to_string()]),
            "set(7,\"x\")"
        );
    }

    #[tokio::test]
    async fn test_completion_settles_exactly_once() {
        let (mut invocation, rx) = noop_invocation("noop()");
        invocation.completion.settle_stopped();
        // second settle is a no-op
        invocation.completion.settle_error(ActorError::custom("late"));

        let reply = rx.await.unwrap().unwrap();
        assert!(matches!(reply, Delivery::Stopped));
    }

    #[tokio::test]
    async fn test_call_future_maps_value() {
        let (completion, rx) = Completion::new();
        let mut completion = completion;
        completion.settle_value(Box::new(41_i64));

        let future: CallFuture<i64> = CallFuture::new(rx, "get()".to_string());
        let delivery = future.await.unwrap();
        assert_eq!(delivery.value(), Some(41));
    }

    #[tokio::test]
    async fn test_call_future_rejects_wrong_type() {
        let (completion, rx) = Completion::new();
        let mut completion = completion;
        completion.settle_value(Box::new("text"));

        let future: CallFuture<i64> = CallFuture::new(rx, "get()".to_string());
        let err = future.await.unwrap_err();
        assert!(matches!(err, ActorError::ReplyTypeMismatch { .. }));
    }

    #[tokio::test]
    async fn test_call_future_reports_dropped_completion() {
        let (completion, rx) = Completion::new();
        drop(completion);

        let future: CallFuture<()> = CallFuture::new(rx, "lost()".to_string());
        let err = future.await.unwrap_err();
        assert!(matches!(err, ActorError::CompletionDropped { .. }));
    }
}
