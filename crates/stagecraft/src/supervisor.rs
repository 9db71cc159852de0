//! Supervision contracts
//!
//! A supervisor receives `(error, supervised)` for a failed actor and
//! answers with a [`Directive`]. The stage applies the directive: resume or
//! restart the actor, stop it, or escalate the same failure to the
//! supervisor's own supervisor. Each supervisor carries a
//! [`SupervisionStrategy`] bounding how many restarts it grants within a
//! rolling time window; a breach coerces Restart into Escalate.

use crate::actor::{ActorContext, ActorHandle};
use crate::address::Address;
use crate::context::ExecutionContext;
use crate::error::{ActorError, ActorResult};
use crate::message::Delivery;
use crate::proxy::Proxy;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::error;

/// Supervisor's decision for one failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Directive {
    /// Keep the instance and its state; resume the mailbox
    Resume,
    /// Replace the instance from its definition; resume the mailbox
    Restart,
    /// Run the stop sequence
    Stop,
    /// Forward the same failure to the supervisor's own supervisor
    Escalate,
}

/// Whether a directive applies to the failed actor alone or to its siblings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SupervisionScope {
    /// The failed actor only
    #[default]
    One,
    /// The failed actor and its siblings: co-children of the same parent
    All,
}

/// Restart budget and scope for one supervisor
///
/// `intensity < 0` denotes unlimited restarts; `period` is the rolling
/// window restart attempts are counted in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupervisionStrategy {
    /// Maximum restarts within the window; negative means unlimited
    pub intensity: i32,
    /// Rolling window restart attempts are counted in
    pub period: Duration,
    /// Whether directives apply to one actor or all siblings
    pub scope: SupervisionScope,
}

impl Default for SupervisionStrategy {
    fn default() -> Self {
        Self {
            intensity: 5,
            period: Duration::from_secs(60),
            scope: SupervisionScope::One,
        }
    }
}

impl SupervisionStrategy {
    /// Unlimited restarts
    pub fn restart_forever() -> Self {
        Self {
            intensity: -1,
            period: Duration::ZERO,
            scope: SupervisionScope::One,
        }
    }

    /// No restarts at all; every Restart coerces into Escalate
    pub fn never_restart() -> Self {
        Self {
            intensity: 0,
            period: Duration::ZERO,
            scope: SupervisionScope::One,
        }
    }

    /// Builder for custom strategies
    pub fn builder() -> SupervisionStrategyBuilder {
        SupervisionStrategyBuilder::default()
    }
}

/// Builder for [`SupervisionStrategy`]
#[derive(Debug, Default)]
pub struct SupervisionStrategyBuilder {
    strategy: SupervisionStrategy,
}

impl SupervisionStrategyBuilder {
    /// Maximum restarts within the window; negative means unlimited
    pub fn intensity(mut self, intensity: i32) -> Self {
        self.strategy.intensity = intensity;
        self
    }

    /// Rolling window restart attempts are counted in
    pub fn period(mut self, period: Duration) -> Self {
        self.strategy.period = period;
        self
    }

    /// Whether directives apply to one actor or all siblings
    pub fn scope(mut self, scope: SupervisionScope) -> Self {
        self.strategy.scope = scope;
        self
    }

    /// Finish the strategy
    pub fn build(self) -> SupervisionStrategy {
        self.strategy
    }
}

/// Transient snapshot of a failed actor handed to its supervisor
///
/// Carries the execution context that was live when the failing invocation
/// began delivery, captured before the delivery frame exits.
#[derive(Debug, Clone)]
pub struct Supervised {
    handle: ActorHandle,
    error: ActorError,
    context: ExecutionContext,
}

impl Supervised {
    pub(crate) fn new(handle: ActorHandle, error: ActorError, context: ExecutionContext) -> Self {
        Self {
            handle,
            error,
            context,
        }
    }

    /// Handle to the failed actor
    pub fn handle(&self) -> &ActorHandle {
        &self.handle
    }

    /// Address of the failed actor
    pub fn address(&self) -> Address {
        self.handle.address()
    }

    /// Type name of the failed actor
    pub fn type_name(&self) -> String {
        self.handle.type_name()
    }

    /// The error that triggered supervision
    pub fn error(&self) -> &ActorError {
        &self.error
    }

    /// Request-scoped context captured when the failing delivery began
    pub fn execution_context(&self) -> &ExecutionContext {
        &self.context
    }
}

/// Decision-maker for failures of the actors it supervises
#[async_trait]
pub trait Supervisor: Send + Sync + 'static {
    /// Restart budget and scope
    fn strategy(&self) -> SupervisionStrategy {
        SupervisionStrategy::default()
    }

    /// Address backing this supervisor when it is an actor
    fn address(&self) -> Option<Address> {
        None
    }

    /// Decide the directive for one failure
    ///
    /// An error here is terminal for the notification: the stage logs it and
    /// applies nothing.
    async fn inform(&self, error: &ActorError, supervised: &Supervised) -> ActorResult<Directive>;
}

/// Capability an actor implements to serve as a named supervisor
#[async_trait]
pub trait Supervising: crate::actor::Actor {
    /// Restart budget and scope for actors supervised by this type
    fn strategy() -> SupervisionStrategy {
        SupervisionStrategy::default()
    }

    /// Decide the directive for one failure
    async fn decide(
        &mut self,
        ctx: &ActorContext<Self>,
        error: &ActorError,
        supervised: &Supervised,
    ) -> Directive;
}

/// Adapter delivering `inform` through a supervising actor's own mailbox
pub(crate) struct ActorSupervisor<A: Supervising> {
    proxy: Proxy<A>,
}

impl<A: Supervising> ActorSupervisor<A> {
    pub(crate) fn new(proxy: Proxy<A>) -> Self {
        Self { proxy }
    }
}

#[async_trait]
impl<A: Supervising> Supervisor for ActorSupervisor<A> {
    fn strategy(&self) -> SupervisionStrategy {
        A::strategy()
    }

    fn address(&self) -> Option<Address> {
        Some(self.proxy.address())
    }

    async fn inform(&self, error: &ActorError, supervised: &Supervised) -> ActorResult<Directive> {
        let error_for_call = error.clone();
        let supervised_for_call = supervised.clone();
        let representation = format!("inform({})", supervised.address());

        let call = self
            .proxy
            .call::<Directive, _>(representation, move |mut actor, ctx| {
                Box::pin(async move {
                    Ok(actor
                        .decide(&ctx, &error_for_call, &supervised_for_call)
                        .await)
                })
            });

        match call.await? {
            Delivery::Value(directive) => Ok(directive),
            other => {
                error!(
                    supervisor = %self.proxy.address(),
                    stopped = other.is_stopped(),
                    "Supervisor could not be informed"
                );
                Err(ActorError::SupervisorNotFound {
                    name: A::type_name().to_string(),
                })
            }
        }
    }
}

/// Registered supervisor: decision-maker plus the name of its own supervisor
pub(crate) struct SupervisorEntry {
    pub(crate) name: String,
    pub(crate) parent: String,
    pub(crate) supervisor: Arc<dyn Supervisor>,
}

/// Rolling per-supervised restart accounting
///
/// `record` answers whether a restart is still within the supervisor's
/// budget; a refused restart is the stage's cue to escalate instead.
#[derive(Debug, Default)]
pub struct RestartWindows {
    windows: Mutex<HashMap<String, VecDeque<Instant>>>,
}

impl RestartWindows {
    /// Fresh accounting with no recorded restarts
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a restart attempt; `true` when the budget allows it
    pub fn record(&self, key: impl Into<String>, strategy: &SupervisionStrategy) -> bool {
        if strategy.intensity < 0 {
            return true;
        }
        if strategy.intensity == 0 {
            return false;
        }

        let now = Instant::now();
        let mut windows = self.windows.lock();
        let window = windows.entry(key.into()).or_default();
        while let Some(oldest) = window.front() {
            if now.duration_since(*oldest) > strategy.period {
                window.pop_front();
            } else {
                break;
            }
        }

        if (window.len() as i32) < strategy.intensity {
            window.push_back(now);
            true
        } else {
            false
        }
    }

    /// Forget accounting for one supervised actor
    pub fn forget(&self, key: &str) {
        self.windows.lock().remove(key);
    }
}
