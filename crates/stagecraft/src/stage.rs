//! The stage: runtime facade over actors, supervision, and shared state
//!
//! The [`Stage`] creates actors, registers them in the sharded directory,
//! wires parents, children, and supervisors, routes failures to supervision,
//! runs the three-phase shutdown, and owns the process-wide value registry.
//! Root initialization is lazy: the first spawn that needs the default
//! parent creates the private root, then the public root.

use crate::actor::{Actor, ActorContext, ActorHandle, Definition};
use crate::address::Address;
use crate::context::ExecutionContext;
use crate::dead_letters::DeadLetterSink;
use crate::directory::{Directory, DirectoryConfig};
use crate::environment::Environment;
use crate::error::{ActorError, ActorResult};
use crate::mailbox::{Mailbox, MailboxOptions};
use crate::metrics::StageMetrics;
use crate::proxy::Proxy;
use crate::scheduler::Scheduler;
use crate::supervisor::{
    Directive, RestartWindows, Supervised, SupervisionScope, Supervisor, SupervisorEntry,
};
use crate::supervisors::{
    is_reserved_type_name, BootstrapSupervisor, PrivateRoot, PublicRoot, DEFAULT_SUPERVISOR,
    PRIVATE_ROOT, PUBLIC_ROOT,
};
use once_cell::sync::{Lazy, OnceCell};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{error, info, info_span, warn, Span};

/// Stage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageConfig {
    /// Name used in the stage's logging span
    pub name: String,
    /// Directory shard configuration
    pub directory: DirectoryConfig,
}

impl Default for StageConfig {
    fn default() -> Self {
        Self {
            name: "stagecraft".to_string(),
            directory: DirectoryConfig::default(),
        }
    }
}

/// Options for one actor spawn
#[derive(Debug, Default, Clone)]
pub struct SpawnOptions {
    /// Parent handle; the public root when unset
    pub parent: Option<ActorHandle>,
    /// Supervisor name; `default` when unset
    pub supervisor: Option<String>,
    /// Mailbox configuration; unbounded when unset
    pub mailbox: MailboxOptions,
}

impl SpawnOptions {
    /// Spawn under the named supervisor
    pub fn with_supervisor(mut self, name: impl Into<String>) -> Self {
        self.supervisor = Some(name.into());
        self
    }

    /// Spawn with the given mailbox configuration
    pub fn with_mailbox(mut self, mailbox: MailboxOptions) -> Self {
        self.mailbox = mailbox;
        self
    }
}

struct Roots {
    private: ActorHandle,
    public: ActorHandle,
}

/// Process-wide actor runtime
pub struct Stage {
    config: StageConfig,
    directory: Directory,
    dead_letters: Arc<DeadLetterSink>,
    scheduler: Scheduler,
    supervisors: RwLock<HashMap<String, Arc<SupervisorEntry>>>,
    restart_windows: RestartWindows,
    values: RwLock<HashMap<String, Arc<dyn Any + Send + Sync>>>,
    roots: OnceCell<Roots>,
    root_init: tokio::sync::Mutex<()>,
    closing: AtomicBool,
    metrics: StageMetrics,
    span: Span,
}

static GLOBAL_STAGE: Lazy<Arc<Stage>> = Lazy::new(|| Stage::new(StageConfig::default()));

/// The process-wide stage, created lazily on first access
pub fn stage() -> Arc<Stage> {
    Arc::clone(&GLOBAL_STAGE)
}

impl Stage {
    /// Build an isolated stage; most applications use [`stage()`]
    pub fn new(config: StageConfig) -> Arc<Self> {
        let span = info_span!("stage", name = %config.name);
        let directory = Directory::new(config.directory.clone());
        Arc::new(Self {
            config,
            directory,
            dead_letters: Arc::new(DeadLetterSink::new()),
            scheduler: Scheduler::new(),
            supervisors: RwLock::new(HashMap::new()),
            restart_windows: RestartWindows::new(),
            values: RwLock::new(HashMap::new()),
            roots: OnceCell::new(),
            root_init: tokio::sync::Mutex::new(()),
            closing: AtomicBool::new(false),
            metrics: StageMetrics::new(),
            span,
        })
    }

    /// Stage configuration
    pub fn config(&self) -> &StageConfig {
        &self.config
    }

    /// The stage's logging span
    pub fn logger(&self) -> Span {
        self.span.clone()
    }

    /// The stage's timer facade
    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// The process-wide dead-letter sink
    pub fn dead_letters(&self) -> &Arc<DeadLetterSink> {
        &self.dead_letters
    }

    /// Stage-wide counters
    pub fn metrics(&self) -> &StageMetrics {
        &self.metrics
    }

    /// A fresh time-ordered address
    pub fn address(&self) -> Address {
        Address::new()
    }

    /// A fresh mutable execution context
    pub fn execution_context(&self) -> ExecutionContext {
        ExecutionContext::new()
    }

    /// Whether shutdown has begun
    pub fn is_closing(&self) -> bool {
        self.closing.load(Ordering::SeqCst)
    }

    /// Create an actor and return its typed proxy
    ///
    /// Generates a fresh address, resolves the parent (public root when
    /// unspecified), instantiates the actor from its definition, registers
    /// it in the directory, runs `before_start` inline, and enqueues the
    /// `start` hook as the first mailbox activity. Failures of either hook
    /// route to supervision.
    pub async fn actor_for<A: Actor>(
        self: &Arc<Self>,
        parameters: Vec<Value>,
        options: SpawnOptions,
    ) -> ActorResult<Proxy<A>> {
        let parent = match options.parent {
            Some(parent) => parent,
            None => self.default_parent().await?,
        };
        let supervisor = options
            .supervisor
            .unwrap_or_else(|| DEFAULT_SUPERVISOR.to_string());
        self.spawn_actor::<A>(parameters, Some(parent), supervisor, options.mailbox)
            .await
    }

    /// Directory lookup by address
    pub fn actor_of(&self, address: &Address) -> Option<ActorHandle> {
        self.directory.get(address)
    }

    /// Alternate proxy construction for self-sends; no directory mutation
    pub fn actor_proxy_for<A: Actor>(&self, ctx: &ActorContext<A>) -> Proxy<A> {
        ctx.self_proxy()
    }

    /// Register a named supervisor; its own supervisor defaults to `default`
    pub fn register_supervisor(
        &self,
        name: impl Into<String>,
        supervisor: Arc<dyn Supervisor>,
    ) -> ActorResult<()> {
        self.register_supervisor_with_parent(name, DEFAULT_SUPERVISOR, supervisor)
    }

    /// Register a named supervisor with an explicit parent supervisor name
    pub fn register_supervisor_with_parent(
        &self,
        name: impl Into<String>,
        parent: impl Into<String>,
        supervisor: Arc<dyn Supervisor>,
    ) -> ActorResult<()> {
        let name = name.into();
        if is_reserved_type_name(&name) {
            return Err(ActorError::ReservedName { name });
        }
        self.put_supervisor_entry(&name, &parent.into(), supervisor);
        Ok(())
    }

    /// Supervisor registered under `name`
    pub fn supervisor(&self, name: &str) -> ActorResult<Arc<dyn Supervisor>> {
        self.supervisor_entry(name)
            .map(|entry| Arc::clone(&entry.supervisor))
            .ok_or_else(|| ActorError::SupervisorNotFound {
                name: name.to_string(),
            })
    }

    /// Store a value in the process-wide registry, overwriting any previous
    pub fn register_value<T: Any + Send + Sync>(&self, name: impl Into<String>, value: T) {
        self.values.write().insert(name.into(), Arc::new(value));
    }

    /// Look up a registered value; errors when absent
    pub fn registered_value<T: Any + Send + Sync>(&self, name: &str) -> ActorResult<Arc<T>> {
        let value = self
            .values
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| ActorError::ValueNotRegistered {
                name: name.to_string(),
            })?;
        value.downcast::<T>().map_err(|_| {
            ActorError::custom(format!("registered value {name} has a different type"))
        })
    }

    /// Remove a registered value, returning the prior one if any
    pub fn deregister_value(&self, name: &str) -> Option<Arc<dyn Any + Send + Sync>> {
        self.values.write().remove(name)
    }

    /// Stop every actor in three phases and shut the stage down
    ///
    /// Phase one stops user actors, phase two registered supervisor actors,
    /// phase three the public root and finally the private root. Within each
    /// phase, errors are logged and iteration continues. Idempotent.
    pub async fn close(self: &Arc<Self>) {
        if self.closing.swap(true, Ordering::SeqCst) {
            return;
        }
        info!(name = %self.config.name, "Stage closing");

        let supervisor_addresses: HashSet<Address> = self
            .supervisors
            .read()
            .values()
            .filter_map(|entry| entry.supervisor.address())
            .collect();
        let is_root = |handle: &ActorHandle| {
            let type_name = handle.type_name();
            type_name == PRIVATE_ROOT || type_name == PUBLIC_ROOT
        };

        for handle in self
            .directory
            .all()
            .into_iter()
            .filter(|h| !is_root(h) && !supervisor_addresses.contains(&h.address()))
        {
            if let Err(cause) = handle.stop(None).await {
                warn!(address = %handle.address(), error = %cause, "Failed to stop actor");
            }
        }

        for handle in self.directory.all().into_iter().filter(|h| !is_root(h)) {
            if let Err(cause) = handle.stop(None).await {
                warn!(address = %handle.address(), error = %cause, "Failed to stop supervisor");
            }
        }

        if let Some(roots) = self.roots.get() {
            if let Err(cause) = roots.public.stop(None).await {
                warn!(error = %cause, "Failed to stop public root");
            }
            if let Err(cause) = roots.private.stop(None).await {
                warn!(error = %cause, "Failed to stop private root");
            }
        }

        info!(name = %self.config.name, "Stage closed");
    }

    /// Route one failure to the failed actor's supervisor
    ///
    /// Resolves the supervisor by name, asks for a directive, coerces
    /// Restart into Escalate when the restart budget is exhausted, and
    /// applies the result across the strategy's scope. A failure while
    /// informing a supervisor is logged and terminal for the notification.
    pub async fn handle_failure_of(self: &Arc<Self>, supervised: Supervised) {
        self.metrics.record_failure_routed();

        let env = supervised.handle().env();
        let Some(mut entry) = self.supervisor_entry_for(env) else {
            error!(
                address = %supervised.address(),
                supervisor = %env.supervisor_name(),
                "No supervisor resolvable for failed actor"
            );
            return;
        };
        let error = supervised.error().clone();

        loop {
            let directive = match entry.supervisor.inform(&error, &supervised).await {
                Ok(directive) => directive,
                Err(inform_error) => {
                    error!(
                        supervisor = %entry.name,
                        address = %supervised.address(),
                        error = %inform_error,
                        "Supervisor could not be informed"
                    );
                    return;
                }
            };

            let strategy = entry.supervisor.strategy();
            let directive = if directive == Directive::Restart {
                let key = format!("{}:{}", entry.name, supervised.address());
                if self.restart_windows.record(key, &strategy) {
                    Directive::Restart
                } else {
                    warn!(
                        supervisor = %entry.name,
                        address = %supervised.address(),
                        intensity = strategy.intensity,
                        "Restart intensity exceeded; escalating"
                    );
                    Directive::Escalate
                }
            } else {
                directive
            };

            match directive {
                Directive::Resume => {
                    for target in self.scope_targets(&strategy, &supervised) {
                        target.run_before_resume(&error).await;
                        target.resume_mailbox();
                    }
                    return;
                }
                Directive::Restart => {
                    for target in self.scope_targets(&strategy, &supervised) {
                        if let Err(restart_error) = target.restart(&error).await {
                            // The next bad message will re-trigger supervision.
                            error!(
                                address = %target.address(),
                                error = %restart_error,
                                "Restart failed; resuming anyway"
                            );
                        }
                        target.resume_mailbox();
                    }
                    return;
                }
                Directive::Stop => {
                    for target in self.scope_targets(&strategy, &supervised) {
                        if let Err(stop_error) = target.stop(None).await {
                            warn!(
                                address = %target.address(),
                                error = %stop_error,
                                "Failed to stop actor after directive"
                            );
                        }
                    }
                    return;
                }
                Directive::Escalate => {
                    self.metrics.record_escalation();
                    if entry.parent == entry.name {
                        error!(
                            address = %supervised.address(),
                            "Escalation reached the root; stopping the actor"
                        );
                        if let Err(stop_error) = supervised.handle().stop(None).await {
                            warn!(error = %stop_error, "Failed to stop escalated actor");
                        }
                        return;
                    }
                    match self.supervisor_entry(&entry.parent) {
                        Some(parent_entry) => {
                            entry = parent_entry;
                        }
                        None => {
                            error!(
                                supervisor = %entry.parent,
                                "No parent supervisor to escalate to"
                            );
                            return;
                        }
                    }
                }
            }
        }
    }

    pub(crate) fn remove_from_directory(&self, address: &Address) {
        self.directory.remove(address);
    }

    /// Live-actor directory
    pub fn directory(&self) -> &Directory {
        &self.directory
    }

    fn scope_targets(
        &self,
        strategy: &crate::supervisor::SupervisionStrategy,
        supervised: &Supervised,
    ) -> Vec<ActorHandle> {
        match strategy.scope {
            SupervisionScope::One => vec![supervised.handle().clone()],
            SupervisionScope::All => supervised
                .handle()
                .env()
                .parent()
                .map(|parent| parent.env().children())
                .unwrap_or_else(|| vec![supervised.handle().clone()]),
        }
    }

    fn put_supervisor_entry(&self, name: &str, parent: &str, supervisor: Arc<dyn Supervisor>) {
        let entry = Arc::new(SupervisorEntry {
            name: name.to_string(),
            parent: parent.to_string(),
            supervisor,
        });
        self.supervisors.write().insert(name.to_string(), entry);
    }

    pub(crate) fn supervisor_entry(&self, name: &str) -> Option<Arc<SupervisorEntry>> {
        self.supervisors.read().get(name).cloned()
    }

    fn supervisor_entry_for(&self, env: &Arc<Environment>) -> Option<Arc<SupervisorEntry>> {
        if let Some(cached) = env.cached_supervisor() {
            return Some(cached);
        }
        let entry = self.supervisor_entry(env.supervisor_name())?;
        env.cache_supervisor(Arc::clone(&entry));
        Some(entry)
    }

    async fn default_parent(self: &Arc<Self>) -> ActorResult<ActorHandle> {
        self.ensure_roots().await?;
        if let Some(handle) = self.directory.find_by_type(PUBLIC_ROOT) {
            return Ok(handle);
        }
        self.roots
            .get()
            .map(|roots| roots.public.clone())
            .ok_or_else(|| ActorError::custom("public root unavailable"))
    }

    async fn ensure_roots(self: &Arc<Self>) -> ActorResult<()> {
        if self.roots.get().is_some() {
            return Ok(());
        }
        let _guard = self.root_init.lock().await;
        if self.roots.get().is_some() {
            return Ok(());
        }

        // Two-phase bootstrap: a non-actor fallback holds the private
        // root's supervisor slot until the private root exists.
        self.put_supervisor_entry(PRIVATE_ROOT, PRIVATE_ROOT, Arc::new(BootstrapSupervisor));

        let private = self
            .spawn_actor::<PrivateRoot>(
                Vec::new(),
                None,
                PRIVATE_ROOT.to_string(),
                MailboxOptions::default(),
            )
            .await?;
        self.put_supervisor_entry(PRIVATE_ROOT, PRIVATE_ROOT, private.supervisor_ref());

        let public = self
            .spawn_actor::<PublicRoot>(
                Vec::new(),
                Some(private.handle()),
                PRIVATE_ROOT.to_string(),
                MailboxOptions::default(),
            )
            .await?;
        self.put_supervisor_entry(PUBLIC_ROOT, PRIVATE_ROOT, public.supervisor_ref());
        self.put_supervisor_entry(DEFAULT_SUPERVISOR, PRIVATE_ROOT, public.supervisor_ref());

        let _ = self.roots.set(Roots {
            private: private.handle(),
            public: public.handle(),
        });
        info!("Root hierarchy initialized");
        Ok(())
    }

    async fn spawn_actor<A: Actor>(
        self: &Arc<Self>,
        parameters: Vec<Value>,
        parent: Option<ActorHandle>,
        supervisor: String,
        mailbox_options: MailboxOptions,
    ) -> ActorResult<Proxy<A>> {
        let address = Address::new();
        let definition = Definition::new(A::type_name(), address.clone(), parameters);

        let actor = A::instantiate(&definition).map_err(|cause| ActorError::StartupFailed {
            type_name: A::type_name().to_string(),
            reason: cause.to_string(),
        })?;

        let mailbox = Mailbox::new(mailbox_options, Arc::clone(&self.dead_letters));
        let env = Environment::new(
            Arc::downgrade(self),
            definition,
            parent.clone(),
            mailbox,
            supervisor,
        );
        let cell = crate::actor::ActorCell::assemble(env, actor);
        let handle = cell.handle();

        self.directory.set(handle.clone());
        if let Some(parent) = &parent {
            parent.env().add_child(handle.clone());
        }
        self.metrics.record_actor_created();
        info!(
            address = %address,
            type_name = %A::type_name(),
            "Actor created"
        );

        if let Err(cause) = handle.run_before_start().await {
            error!(
                address = %address,
                type_name = %A::type_name(),
                error = %cause,
                "before_start hook failed"
            );
            let supervised =
                Supervised::new(handle.clone(), cause, ExecutionContext::empty());
            let stage = Arc::clone(self);
            tokio::spawn(async move {
                stage.handle_failure_of(supervised).await;
            });
        }

        handle.enqueue_start();
        Ok(Proxy::from_cell(cell))
    }
}

impl std::fmt::Debug for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stage")
            .field("name", &self.config.name)
            .field("actors", &self.directory.len())
            .field("closing", &self.is_closing())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_registry_round_trip() {
        let stage = Stage::new(StageConfig::default());

        stage.register_value("limit", 42_u32);
        let value = stage.registered_value::<u32>("limit").unwrap();
        assert_eq!(*value, 42);

        // overwrite-on-insert
        stage.register_value("limit", 7_u32);
        let value = stage.registered_value::<u32>("limit").unwrap();
        assert_eq!(*value, 7);
    }

    #[test]
    fn test_registered_value_errors_when_absent() {
        let stage = Stage::new(StageConfig::default());
        let err = stage.registered_value::<u32>("missing").unwrap_err();
        assert!(matches!(err, ActorError::ValueNotRegistered { .. }));
    }

    #[test]
    fn test_deregister_value_returns_prior() {
        let stage = Stage::new(StageConfig::default());
        stage.register_value("token", "abc".to_string());

        assert!(stage.deregister_value("token").is_some());
        assert!(stage.deregister_value("token").is_none());
        assert!(stage.registered_value::<String>("token").is_err());
    }

    #[test]
    fn test_reserved_supervisor_names_rejected() {
        let stage = Stage::new(StageConfig::default());
        let err = stage
            .register_supervisor("default", Arc::new(BootstrapSupervisor))
            .unwrap_err();
        assert!(matches!(err, ActorError::ReservedName { .. }));
    }

    #[test]
    fn test_fresh_addresses_differ() {
        let stage = Stage::new(StageConfig::default());
        assert_ne!(stage.address(), stage.address());
    }
}
