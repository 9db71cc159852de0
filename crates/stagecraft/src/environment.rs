//! Per-actor runtime environment
//!
//! The [`Environment`] aggregates everything the runtime knows about one
//! actor: its address and definition, its parent and children, its mailbox,
//! its logging span, the name of its supervisor, its own declarative
//! execution context for outgoing invocations, and the slot holding the
//! execution context of the invocation currently being delivered.

use crate::actor::{ActorHandle, Definition};
use crate::address::Address;
use crate::context::ExecutionContext;
use crate::lifecycle::LifecycleState;
use crate::mailbox::Mailbox;
use crate::stage::Stage;
use crate::supervisor::SupervisorEntry;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::{Arc, Weak};
use tracing::{info_span, Span};

/// Runtime context owned by exactly one actor
pub struct Environment {
    stage: Weak<Stage>,
    address: Address,
    definition: Definition,
    parent: Option<ActorHandle>,
    children: Mutex<Vec<ActorHandle>>,
    mailbox: Arc<Mailbox>,
    span: Span,
    supervisor_name: String,
    supervisor_cache: Mutex<Option<Arc<SupervisorEntry>>>,
    execution_context: Mutex<ExecutionContext>,
    current_message_context: Mutex<ExecutionContext>,
    life_cycle: LifecycleState,
}

impl Environment {
    pub(crate) fn new(
        stage: Weak<Stage>,
        definition: Definition,
        parent: Option<ActorHandle>,
        mailbox: Arc<Mailbox>,
        supervisor_name: String,
    ) -> Arc<Self> {
        let address = definition.address().clone();
        let span = info_span!(
            "actor",
            address = %address,
            type_name = %definition.type_name()
        );
        Arc::new(Self {
            stage,
            address,
            definition,
            parent,
            children: Mutex::new(Vec::new()),
            mailbox,
            span,
            supervisor_name,
            supervisor_cache: Mutex::new(None),
            execution_context: Mutex::new(ExecutionContext::new()),
            current_message_context: Mutex::new(ExecutionContext::empty()),
            life_cycle: LifecycleState::new(),
        })
    }

    /// The owning stage, when it is still alive
    pub fn stage(&self) -> Option<Arc<Stage>> {
        self.stage.upgrade()
    }

    /// The actor's address
    pub fn address(&self) -> &Address {
        &self.address
    }

    /// The definition the actor was (and will be re-)instantiated from
    pub fn definition(&self) -> &Definition {
        &self.definition
    }

    /// The parent handle; absent only for the ultimate root
    pub fn parent(&self) -> Option<&ActorHandle> {
        self.parent.as_ref()
    }

    /// The actor's mailbox
    pub fn mailbox(&self) -> &Arc<Mailbox> {
        &self.mailbox
    }

    /// The actor's logging span
    pub fn span(&self) -> &Span {
        &self.span
    }

    /// Name the actor's supervisor is registered under
    pub fn supervisor_name(&self) -> &str {
        &self.supervisor_name
    }

    /// The actor's lifecycle cell
    pub fn life_cycle(&self) -> &LifecycleState {
        &self.life_cycle
    }

    /// Snapshot of the current children, in creation order
    pub fn children(&self) -> Vec<ActorHandle> {
        self.children.lock().clone()
    }

    pub(crate) fn add_child(&self, child: ActorHandle) {
        self.children.lock().push(child);
    }

    pub(crate) fn remove_child(&self, address: &Address) {
        self.children.lock().retain(|child| child.address() != *address);
    }

    /// Copy of the actor's declarative execution context
    pub fn execution_context(&self) -> ExecutionContext {
        self.execution_context.lock().copy()
    }

    /// Mutate the declarative execution context in place
    pub fn with_execution_context<R>(&self, f: impl FnOnce(&mut ExecutionContext) -> R) -> R {
        f(&mut self.execution_context.lock())
    }

    /// Context snapshot a proxy attaches at enqueue time
    ///
    /// A copy when the declarative context holds keys, otherwise the
    /// distinguished empty context.
    pub(crate) fn snapshot_execution_context(&self) -> ExecutionContext {
        let context = self.execution_context.lock();
        if context.has_context() {
            context.copy()
        } else {
            ExecutionContext::empty()
        }
    }

    pub(crate) fn replace_execution_context_entries(&self, entries: BTreeMap<String, Value>) {
        self.execution_context.lock().replace_entries(entries);
    }

    /// Copy of the context of the invocation currently being delivered
    ///
    /// Outside a delivery frame this is the empty context.
    pub fn current_message_context(&self) -> ExecutionContext {
        self.current_message_context.lock().copy()
    }

    pub(crate) fn set_current_message_context(&self, context: ExecutionContext) {
        *self.current_message_context.lock() = context;
    }

    pub(crate) fn clear_current_message_context(&self) {
        *self.current_message_context.lock() = ExecutionContext::empty();
    }

    pub(crate) fn cached_supervisor(&self) -> Option<Arc<SupervisorEntry>> {
        self.supervisor_cache.lock().clone()
    }

    pub(crate) fn cache_supervisor(&self, entry: Arc<SupervisorEntry>) {
        *self.supervisor_cache.lock() = Some(entry);
    }

    /// Drop the cached supervisor so the name re-resolves
    pub(crate) fn clear_supervisor_cache(&self) {
        *self.supervisor_cache.lock() = None;
    }
}

impl std::fmt::Debug for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Environment")
            .field("address", &self.address)
            .field("type_name", &self.definition.type_name())
            .field("supervisor", &self.supervisor_name)
            .field("life_cycle", &self.life_cycle.current())
            .finish_non_exhaustive()
    }
}
