//! In-process actor runtime
//!
//! Stagecraft lets applications compose programs out of independently
//! addressable, message-driven actors. Each actor owns private state,
//! processes one invocation at a time from a private mailbox, may spawn
//! children, and is protected by a supervisor that decides how to recover
//! from its failures.
//!
//! The [`stage::Stage`] is the runtime facade: it creates actors behind
//! typed [`proxy::Proxy`] handles, indexes them in a sharded directory,
//! routes failures through the supervision hierarchy rooted in the private
//! and public root actors, and runs the three-phase shutdown.
//!
//! ```ignore
//! use stagecraft::prelude::*;
//!
//! struct Counter { count: i64 }
//!
//! #[async_trait]
//! impl Actor for Counter {
//!     fn type_name() -> &'static str { "Counter" }
//!     fn instantiate(_definition: &Definition) -> ActorResult<Self> {
//!         Ok(Self { count: 0 })
//!     }
//! }
//!
//! impl Counter {
//!     async fn increment(&mut self, _ctx: &ActorContext<Self>) -> ActorResult<()> {
//!         self.count += 1;
//!         Ok(())
//!     }
//!     async fn get(&mut self, _ctx: &ActorContext<Self>) -> ActorResult<i64> {
//!         Ok(self.count)
//!     }
//! }
//!
//! # async fn example() -> ActorResult<()> {
//! let counter = stage().actor_for::<Counter>(vec![], SpawnOptions::default()).await?;
//! invoke!(counter, increment());
//! let value = invoke!(counter, get()).await?.value();
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod actor;
pub mod actor_macros;
pub mod address;
pub mod context;
pub mod dead_letters;
pub mod directory;
pub mod environment;
pub mod error;
pub mod lifecycle;
pub mod mailbox;
pub mod message;
pub mod metrics;
pub mod prelude;
pub mod proxy;
pub mod scheduler;
pub mod stage;
pub mod supervisor;
pub mod supervisors;
pub mod testing;

#[cfg(test)]
mod supervision_tests;

// Re-exports
pub use actor::{Actor, ActorContext, ActorGuard, ActorHandle, Definition};
pub use address::Address;
pub use context::ExecutionContext;
pub use dead_letters::{DeadLetter, DeadLetterListener, DeadLetterReason, DeadLetterSink};
pub use directory::{Directory, DirectoryConfig};
pub use environment::Environment;
pub use error::{ActorError, ActorResult, ErrorSeverity};
pub use lifecycle::{LifeCycle, LifecycleState};
pub use mailbox::{Mailbox, MailboxOptions, OverflowPolicy};
pub use message::{CallFuture, Delivery, Invocation};
pub use metrics::{MailboxMetrics, MailboxMetricsSnapshot, StageMetrics, StageMetricsSnapshot};
pub use proxy::Proxy;
pub use scheduler::{ScheduledTask, Scheduler};
pub use stage::{stage, SpawnOptions, Stage, StageConfig};
pub use supervisor::{
    Directive, Supervised, SupervisionScope, SupervisionStrategy, Supervising, Supervisor,
};
pub use supervisors::{
    is_reserved_type_name, PrivateRoot, PublicRoot, DEFAULT_SUPERVISOR, PRIVATE_ROOT, PUBLIC_ROOT,
};

/// Crate version
pub const STAGECRAFT_VERSION: &str = env!("CARGO_PKG_VERSION");
