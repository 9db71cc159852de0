//! Prelude for convenient imports
//!
//! Pulls in the actor contract, proxies, supervision types, and the async
//! primitives actor implementations routinely need.

pub use crate::actor::{Actor, ActorContext, ActorGuard, ActorHandle, Definition};
pub use crate::address::Address;
pub use crate::context::ExecutionContext;
pub use crate::dead_letters::{DeadLetter, DeadLetterListener, DeadLetterReason};
pub use crate::error::{ActorError, ActorResult, ErrorSeverity};
pub use crate::invoke;
pub use crate::lifecycle::LifeCycle;
pub use crate::mailbox::{MailboxOptions, OverflowPolicy};
pub use crate::message::{CallFuture, Delivery};
pub use crate::proxy::Proxy;
pub use crate::stage::{stage, SpawnOptions, Stage, StageConfig};
pub use crate::supervisor::{
    Directive, Supervised, SupervisionScope, SupervisionStrategy, Supervising, Supervisor,
};
pub use crate::supervisors::{DEFAULT_SUPERVISOR, PRIVATE_ROOT, PUBLIC_ROOT};

// Async and serialization essentials actor implementations lean on
pub use async_trait::async_trait;
pub use serde_json::{json, Value};
pub use std::sync::Arc;
pub use std::time::Duration;
