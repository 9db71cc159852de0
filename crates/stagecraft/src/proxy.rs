//! Typed actor proxies
//!
//! A [`Proxy`] is the sole external reference to an actor. A small, fixed
//! set of metadata operations answers synchronously from the environment;
//! every other call packages a closure into an invocation, snapshots the
//! actor's execution context, enqueues it, and returns a [`CallFuture`] for
//! the completion.
//!
//! The synchronous set is normative: `address`, `definition`,
//! `execution_context`, `logger`, `life_cycle`, `is_stopped`, `stage`,
//! `type_name`, plus equality, hashing, and display. Nothing else bypasses
//! the mailbox.

use crate::actor::{Actor, ActorCell, ActorContext, ActorGuard, ActorHandle, Definition};
use crate::address::Address;
use crate::context::ExecutionContext;
use crate::error::ActorResult;
use crate::lifecycle::LifeCycle;
use crate::message::{AnyValue, CallFuture, Completion, Invocation, InvocationBody};
use crate::stage::Stage;
use crate::supervisor::{ActorSupervisor, Supervising, Supervisor};
use futures::future::BoxFuture;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::Duration;

/// Typed façade translating calls into mailbox invocations
pub struct Proxy<A: Actor> {
    cell: Arc<ActorCell<A>>,
}

impl<A: Actor> Clone for Proxy<A> {
    fn clone(&self) -> Self {
        Self {
            cell: Arc::clone(&self.cell),
        }
    }
}

impl<A: Actor> Proxy<A> {
    pub(crate) fn from_cell(cell: Arc<ActorCell<A>>) -> Self {
        Self { cell }
    }

    /// The actor's address
    pub fn address(&self) -> Address {
        self.cell.env.address().clone()
    }

    /// The actor's definition
    pub fn definition(&self) -> Definition {
        self.cell.env.definition().clone()
    }

    /// Copy of the actor's declarative execution context
    pub fn execution_context(&self) -> ExecutionContext {
        self.cell.env.execution_context()
    }

    /// The actor's logging span
    pub fn logger(&self) -> tracing::Span {
        self.cell.env.span().clone()
    }

    /// Current lifecycle state
    pub fn life_cycle(&self) -> LifeCycle {
        self.cell.env.life_cycle().current()
    }

    /// Whether the actor has entered its stop sequence
    pub fn is_stopped(&self) -> bool {
        self.cell.env.life_cycle().is_stopped()
    }

    /// The owning stage, when it is still alive
    pub fn stage(&self) -> Option<Arc<Stage>> {
        self.cell.env.stage()
    }

    /// The actor's type name
    pub fn type_name(&self) -> &'static str {
        A::type_name()
    }

    /// Type-erased handle to the same actor
    pub fn handle(&self) -> ActorHandle {
        self.cell.handle()
    }

    /// Enqueue an invocation and return its completion future
    ///
    /// `body` receives exclusive access to the actor's state and the
    /// delivery context. The execution-context snapshot is taken here, at
    /// enqueue time, so later failures surface the keys present when the
    /// call was made. Use the [`invoke!`](crate::invoke) macro for the
    /// common `method(args…)` shape.
    pub fn call<R, F>(&self, representation: impl Into<String>, body: F) -> CallFuture<R>
    where
        R: Send + 'static,
        F: FnOnce(ActorGuard<A>, ActorContext<A>) -> BoxFuture<'static, ActorResult<R>>
            + Send
            + 'static,
    {
        let representation = representation.into();
        let (completion, rx) = Completion::new();
        let snapshot = self.cell.env.snapshot_execution_context();

        let cell = self.cell.arc();
        let erased: InvocationBody = Box::new(move || {
            Box::pin(async move {
                let ctx = ActorContext::new(Arc::clone(&cell));
                let actor = cell.state.clone().lock_owned().await;
                let value = body(actor, ctx).await?;
                Ok(Box::new(value) as AnyValue)
            })
        });

        self.cell.env.mailbox().send(Invocation::new(
            erased,
            representation.clone(),
            completion,
            snapshot,
        ));
        CallFuture::new(rx, representation)
    }

    /// Run the stop sequence; a `timeout` bounds the wait
    pub async fn stop(&self, timeout: Option<Duration>) -> ActorResult<()> {
        self.handle().stop(timeout).await
    }
}

impl<A: Supervising> Proxy<A> {
    /// Adapt this actor into a supervisor handle
    ///
    /// The returned supervisor delivers `inform` through the actor's own
    /// mailbox, so supervision decisions serialize with its other messages.
    pub fn supervisor_ref(&self) -> Arc<dyn Supervisor> {
        Arc::new(ActorSupervisor::new(self.clone()))
    }
}

impl<A: Actor> fmt::Display for Proxy<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", A::type_name(), self.cell.env.address())
    }
}

impl<A: Actor> fmt::Debug for Proxy<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Proxy")
            .field("type_name", &A::type_name())
            .field("address", &self.cell.env.address())
            .field("life_cycle", &self.life_cycle())
            .finish()
    }
}

impl<A: Actor> PartialEq for Proxy<A> {
    fn eq(&self, other: &Self) -> bool {
        self.cell.env.address() == other.cell.env.address()
    }
}

impl<A: Actor> Eq for Proxy<A> {}

impl<A: Actor> Hash for Proxy<A> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.cell.env.address().hash(state);
    }
}
