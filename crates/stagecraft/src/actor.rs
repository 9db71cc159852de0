//! Actor contract, cells, handles, and delivery contexts
//!
//! The [`Actor`] trait is the protocol contract a user type implements: a
//! short type name, an instantiator that builds a fresh instance from a
//! [`Definition`], and seven lifecycle hooks, all defaultable. The runtime
//! wraps each instance in an [`ActorCell`] that owns the state slot; the
//! type-erased [`ActorHandle`] is what the directory, parents, and
//! supervisors hold. During a delivery the actor's methods receive an
//! [`ActorContext`] for self-sends, child creation, and context access.

use crate::address::Address;
use crate::context::ExecutionContext;
use crate::environment::Environment;
use crate::error::{ActorError, ActorResult};
use crate::lifecycle::LifeCycle;
use crate::message::{AnyValue, Completion, Invocation, InvocationBody};
use crate::proxy::Proxy;
use crate::stage::{SpawnOptions, Stage};
use crate::supervisors::PRIVATE_ROOT;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::OwnedMutexGuard;
use tracing::{trace, warn};

/// Exclusive access to an actor's state for the duration of one delivery
pub type ActorGuard<A> = OwnedMutexGuard<A>;

/// Immutable spawn record: type name, address, and construction parameters
#[derive(Debug, Clone)]
pub struct Definition {
    type_name: String,
    address: Address,
    parameters: Vec<Value>,
}

impl Definition {
    /// Build a definition
    pub fn new(type_name: impl Into<String>, address: Address, parameters: Vec<Value>) -> Self {
        Self {
            type_name: type_name.into(),
            address,
            parameters,
        }
    }

    /// Short type name used for directory lookup and supervisor resolution
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// The address the stage assigned at birth
    pub fn address(&self) -> &Address {
        &self.address
    }

    /// Opaque construction parameters
    pub fn parameters(&self) -> &[Value] {
        &self.parameters
    }

    /// Parameter at `index`, if present
    pub fn parameter(&self, index: usize) -> Option<&Value> {
        self.parameters.get(index)
    }
}

/// Protocol contract and lifecycle hooks for an actor type
///
/// Hook failures are logged; only `before_start` and `start` additionally
/// route to supervision, so shutdown and restart always run to completion.
#[async_trait]
pub trait Actor: Sized + Send + 'static {
    /// Short type name; unique type names are discoverable via the directory
    fn type_name() -> &'static str;

    /// Construct a fresh instance from a definition
    ///
    /// Called at spawn and again on every restart, with the same definition.
    fn instantiate(definition: &Definition) -> ActorResult<Self>;

    /// Runs synchronously before the mailbox accepts messages
    async fn before_start(&mut self, _ctx: &ActorContext<Self>) -> ActorResult<()> {
        Ok(())
    }

    /// First queued activity after the actor is registered
    async fn start(&mut self, _ctx: &ActorContext<Self>) -> ActorResult<()> {
        Ok(())
    }

    /// Runs on the failing instance before it is replaced
    async fn before_restart(
        &mut self,
        _ctx: &ActorContext<Self>,
        error: &ActorError,
    ) -> ActorResult<()> {
        trace!(error = %error, "before_restart");
        Ok(())
    }

    /// Runs on the replacement instance after the swap
    async fn after_restart(
        &mut self,
        _ctx: &ActorContext<Self>,
        error: &ActorError,
    ) -> ActorResult<()> {
        trace!(error = %error, "after_restart");
        Ok(())
    }

    /// Runs before a supervisor resumes the suspended mailbox
    async fn before_resume(
        &mut self,
        _ctx: &ActorContext<Self>,
        error: &ActorError,
    ) -> ActorResult<()> {
        trace!(error = %error, "before_resume");
        Ok(())
    }

    /// Runs at the head of the stop sequence; may await
    async fn before_stop(&mut self, _ctx: &ActorContext<Self>) -> ActorResult<()> {
        Ok(())
    }

    /// Runs after the actor left the directory and its mailbox closed
    async fn after_stop(&mut self, _ctx: &ActorContext<Self>) -> ActorResult<()> {
        Ok(())
    }
}

/// Runtime cell pairing an actor's state slot with its environment
pub struct ActorCell<A: Actor> {
    weak: Weak<ActorCell<A>>,
    pub(crate) env: Arc<Environment>,
    pub(crate) state: Arc<tokio::sync::Mutex<A>>,
}

impl<A: Actor> ActorCell<A> {
    /// Assemble the cell and bind it as the mailbox owner
    pub(crate) fn assemble(env: Arc<Environment>, actor: A) -> Arc<Self> {
        let cell = Arc::new_cyclic(|weak| Self {
            weak: weak.clone(),
            env,
            state: Arc::new(tokio::sync::Mutex::new(actor)),
        });
        cell.env.mailbox().bind(cell.handle());
        cell
    }

    pub(crate) fn arc(&self) -> Arc<Self> {
        self.weak.upgrade().expect("actor cell is alive while borrowed")
    }

    /// Type-erased handle to this cell
    pub fn handle(&self) -> ActorHandle {
        ActorHandle {
            ops: self.arc() as Arc<dyn CellOps>,
        }
    }

    pub(crate) fn context(&self) -> ActorContext<A> {
        ActorContext { cell: self.arc() }
    }

    async fn stop_sequence(&self) -> ActorResult<()> {
        let env = &self.env;
        if env.life_cycle().is_stopped() {
            return Ok(());
        }

        if env.definition().type_name() == PRIVATE_ROOT {
            if let Some(stage) = env.stage() {
                if !stage.is_closing() {
                    return Err(ActorError::InvalidOperation {
                        operation: "stop".to_string(),
                        reason: "the private root cannot be stopped".to_string(),
                    });
                }
            }
        }

        if env.life_cycle().transition(LifeCycle::Stopping).is_err() {
            // Raced against another stop; the first one wins.
            return Ok(());
        }

        let ctx = self.context();
        {
            let mut actor = self.state.lock().await;
            if let Err(error) = actor.before_stop(&ctx).await {
                warn!(
                    address = %env.address(),
                    type_name = %env.definition().type_name(),
                    error = %error,
                    "before_stop hook failed"
                );
            }
        }

        let children = env.children();
        for child in children.iter().rev() {
            if let Err(error) = child.stop(None).await {
                warn!(
                    address = %child.address(),
                    error = %error,
                    "Failed to stop child actor"
                );
            }
        }

        if let Some(parent) = env.parent() {
            parent.env().remove_child(env.address());
        }

        env.mailbox().close();

        if let Some(stage) = env.stage() {
            stage.remove_from_directory(env.address());
            stage.metrics().record_actor_stopped();
        }

        let _ = env.life_cycle().transition(LifeCycle::Stopped);

        {
            let mut actor = self.state.lock().await;
            if let Err(error) = actor.after_stop(&ctx).await {
                warn!(
                    address = %env.address(),
                    type_name = %env.definition().type_name(),
                    error = %error,
                    "after_stop hook failed"
                );
            }
        }

        Ok(())
    }

    async fn restart_sequence(&self, error: &ActorError) -> ActorResult<()> {
        let env = &self.env;
        let type_name = env.definition().type_name().to_string();
        let _ = env.life_cycle().transition(LifeCycle::Restarting);

        let ctx = self.context();
        {
            let mut actor = self.state.lock().await;
            if let Err(hook_error) = actor.before_restart(&ctx, error).await {
                warn!(
                    address = %env.address(),
                    type_name = %type_name,
                    error = %hook_error,
                    "before_restart hook failed"
                );
            }
        }

        let fresh = match A::instantiate(env.definition()) {
            Ok(fresh) => fresh,
            Err(cause) => {
                let _ = env.life_cycle().transition(LifeCycle::Running);
                return Err(ActorError::RestartFailed {
                    type_name,
                    reason: cause.to_string(),
                });
            }
        };

        {
            let mut actor = self.state.lock().await;
            *actor = fresh;
            if let Err(hook_error) = actor.after_restart(&ctx, error).await {
                warn!(
                    address = %env.address(),
                    type_name = %type_name,
                    error = %hook_error,
                    "after_restart hook failed"
                );
            }
        }

        env.clear_supervisor_cache();
        let _ = env.life_cycle().transition(LifeCycle::Running);

        if let Some(stage) = env.stage() {
            stage.metrics().record_actor_restarted();
        }
        Ok(())
    }
}

/// Type-erased operations the runtime needs against any cell
#[async_trait]
pub(crate) trait CellOps: Send + Sync + 'static {
    fn env(&self) -> &Arc<Environment>;
    async fn run_before_start(&self) -> ActorResult<()>;
    fn enqueue_start(&self);
    async fn run_before_resume(&self, error: &ActorError);
    async fn restart(&self, error: &ActorError) -> ActorResult<()>;
    async fn stop(&self, timeout: Option<Duration>) -> ActorResult<()>;
}

#[async_trait]
impl<A: Actor> CellOps for ActorCell<A> {
    fn env(&self) -> &Arc<Environment> {
        &self.env
    }

    async fn run_before_start(&self) -> ActorResult<()> {
        let ctx = self.context();
        let mut actor = self.state.lock().await;
        actor.before_start(&ctx).await?;
        let _ = self.env.life_cycle().transition(LifeCycle::Running);
        Ok(())
    }

    fn enqueue_start(&self) {
        let cell = self.arc();
        let (completion, _rx) = Completion::new();
        let body: InvocationBody = Box::new(move || {
            Box::pin(async move {
                let ctx = cell.context();
                let mut actor = cell.state.clone().lock_owned().await;
                actor.start(&ctx).await?;
                Ok(Box::new(()) as AnyValue)
            })
        });
        self.env.mailbox().send(Invocation::new(
            body,
            "start()".to_string(),
            completion,
            ExecutionContext::empty(),
        ));
    }

    async fn run_before_resume(&self, error: &ActorError) {
        let ctx = self.context();
        let mut actor = self.state.lock().await;
        if let Err(hook_error) = actor.before_resume(&ctx, error).await {
            warn!(
                address = %self.env.address(),
                type_name = %self.env.definition().type_name(),
                error = %hook_error,
                "before_resume hook failed"
            );
        }
    }

    async fn restart(&self, error: &ActorError) -> ActorResult<()> {
        self.restart_sequence(error).await
    }

    async fn stop(&self, timeout: Option<Duration>) -> ActorResult<()> {
        match timeout {
            None => self.stop_sequence().await,
            Some(limit) => {
                let cell = self.arc();
                let task = tokio::spawn(async move { cell.stop_sequence().await });
                match tokio::time::timeout(limit, task).await {
                    Ok(Ok(result)) => result,
                    Ok(Err(_)) => Err(ActorError::ShutdownFailed {
                        type_name: self.env.definition().type_name().to_string(),
                        reason: "stop task aborted".to_string(),
                    }),
                    Err(_) => {
                        // The sequence keeps running in the background; the
                        // caller's bounded wait is over.
                        self.env.mailbox().close();
                        Err(ActorError::Timeout {
                            operation: format!(
                                "stop {}",
                                self.env.definition().type_name()
                            ),
                            timeout: limit,
                        })
                    }
                }
            }
        }
    }
}

/// Type-erased reference to a live actor
///
/// Handles are what the directory, parent/child lists, and supervision carry;
/// they compare and hash by address.
#[derive(Clone)]
pub struct ActorHandle {
    ops: Arc<dyn CellOps>,
}

impl ActorHandle {
    /// The actor's address
    pub fn address(&self) -> Address {
        self.ops.env().address().clone()
    }

    /// The actor's type name
    pub fn type_name(&self) -> String {
        self.ops.env().definition().type_name().to_string()
    }

    /// Current lifecycle state
    pub fn life_cycle(&self) -> LifeCycle {
        self.ops.env().life_cycle().current()
    }

    /// Whether the actor has entered its stop sequence
    pub fn is_stopped(&self) -> bool {
        self.ops.env().life_cycle().is_stopped()
    }

    /// Run the stop sequence; a `timeout` bounds the wait
    ///
    /// On timeout the mailbox is force-closed and the in-flight sequence
    /// completes in the background.
    pub async fn stop(&self, timeout: Option<Duration>) -> ActorResult<()> {
        self.ops.stop(timeout).await
    }

    pub(crate) fn env(&self) -> &Arc<Environment> {
        self.ops.env()
    }

    pub(crate) async fn run_before_start(&self) -> ActorResult<()> {
        self.ops.run_before_start().await
    }

    pub(crate) fn enqueue_start(&self) {
        self.ops.enqueue_start();
    }

    pub(crate) async fn run_before_resume(&self, error: &ActorError) {
        self.ops.run_before_resume(error).await;
    }

    pub(crate) async fn restart(&self, error: &ActorError) -> ActorResult<()> {
        self.ops.restart(error).await
    }

    /// Transition back to running and re-trigger dispatch
    pub(crate) fn resume_mailbox(&self) {
        let env = self.ops.env();
        let _ = env.life_cycle().transition(LifeCycle::Running);
        env.mailbox().resume();
    }

    pub(crate) fn replace_execution_context(&self, entries: BTreeMap<String, Value>) {
        self.ops.env().replace_execution_context_entries(entries);
    }
}

impl fmt::Debug for ActorHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActorHandle")
            .field("address", &self.address())
            .field("type_name", &self.type_name())
            .finish()
    }
}

impl PartialEq for ActorHandle {
    fn eq(&self, other: &Self) -> bool {
        self.ops.env().address() == other.ops.env().address()
    }
}

impl Eq for ActorHandle {}

impl Hash for ActorHandle {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.ops.env().address().hash(state);
    }
}

/// Per-delivery context handed to actor methods
///
/// Grants access to the actor's identity, its stage, a self-proxy for
/// deferred self-sends, child creation, and the execution context of the
/// invocation currently being delivered.
pub struct ActorContext<A: Actor> {
    cell: Arc<ActorCell<A>>,
}

impl<A: Actor> Clone for ActorContext<A> {
    fn clone(&self) -> Self {
        Self {
            cell: Arc::clone(&self.cell),
        }
    }
}

impl<A: Actor> ActorContext<A> {
    pub(crate) fn new(cell: Arc<ActorCell<A>>) -> Self {
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

    /// The owning stage
    pub fn stage(&self) -> ActorResult<Arc<Stage>> {
        self.cell.env.stage().ok_or(ActorError::StageUnavailable)
    }

    /// Type-erased handle to this actor
    pub fn handle(&self) -> ActorHandle {
        self.cell.handle()
    }

    /// Proxy wired to this actor's own mailbox for deferred self-sends
    ///
    /// A self-send enqueues like any other invocation: it is delivered only
    /// after the current delivery frame ends.
    pub fn self_proxy(&self) -> Proxy<A> {
        Proxy::from_cell(self.cell.arc())
    }

    /// The actor's logging span
    pub fn span(&self) -> tracing::Span {
        self.cell.env.span().clone()
    }

    /// Current lifecycle state
    pub fn life_cycle(&self) -> LifeCycle {
        self.cell.env.life_cycle().current()
    }

    /// Context of the invocation currently being delivered
    pub fn execution_context(&self) -> ExecutionContext {
        self.cell.env.current_message_context()
    }

    /// Store a key in the actor's declarative context for outgoing calls
    pub fn set_context_value(&self, key: impl Into<String>, value: Value) {
        self.cell
            .env
            .with_execution_context(|context| context.set(key, value));
    }

    /// Declare collaborators the declarative context propagates to
    pub fn declare_collaborators(&self, handles: Vec<ActorHandle>) {
        self.cell
            .env
            .with_execution_context(|context| context.collaborators(handles));
    }

    /// Create a child actor parented to this one
    ///
    /// The child's address is always newly generated; its supervisor
    /// defaults to this actor's supervisor when unspecified.
    pub async fn child_actor_for<C: Actor>(
        &self,
        parameters: Vec<Value>,
        options: SpawnOptions,
    ) -> ActorResult<Proxy<C>> {
        let stage = self.stage()?;
        let mut options = options;
        options.parent = Some(self.handle());
        if options.supervisor.is_none() {
            options.supervisor = Some(self.cell.env.supervisor_name().to_string());
        }
        stage.actor_for::<C>(parameters, options).await
    }

    /// Schedule this actor's stop after the current delivery frame
    ///
    /// Stopping inline would deadlock on the state slot the running delivery
    /// holds, so the sequence runs on a detached task.
    pub fn stop_self(&self) {
        let handle = self.handle();
        tokio::spawn(async move {
            if let Err(error) = handle.stop(None).await {
                warn!(
                    address = %handle.address(),
                    error = %error,
                    "Deferred self-stop failed"
                );
            }
        });
    }
}

impl<A: Actor> fmt::Debug for ActorContext<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActorContext")
            .field("address", &self.cell.env.address())
            .finish_non_exhaustive()
    }
}
