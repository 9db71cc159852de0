//! Root actors and the bootstrap supervisor
//!
//! The supervision hierarchy bottoms out in two fixed actors. The private
//! root is the ultimate ancestor: it is its own supervisor, never restarts
//! anything, and stops any child whose failure reaches it. The public root
//! is the default parent for user actors and restarts its children forever.
//! Root initialization is two-phase: a non-actor bootstrap supervisor holds
//! the private root's slot while the private root itself is being created.

use crate::actor::{Actor, ActorContext, Definition};
use crate::error::{ActorError, ActorResult};
use crate::supervisor::{
    Directive, Supervised, SupervisionStrategy, Supervising, Supervisor,
};
use async_trait::async_trait;
use tracing::{error, warn};

/// Reserved type name of the ultimate root
pub const PRIVATE_ROOT: &str = "__privateRoot";

/// Reserved type name of the default user-actor parent
pub const PUBLIC_ROOT: &str = "__publicRoot";

/// Reserved supervisor name user actors default to
pub const DEFAULT_SUPERVISOR: &str = "default";

/// Reserved type names user registrations must not reuse
pub const RESERVED_TYPE_NAMES: [&str; 3] = [PRIVATE_ROOT, PUBLIC_ROOT, DEFAULT_SUPERVISOR];

/// The ultimate ancestor; stops failing children without retry
pub struct PrivateRoot;

#[async_trait]
impl Actor for PrivateRoot {
    fn type_name() -> &'static str {
        PRIVATE_ROOT
    }

    fn instantiate(_definition: &Definition) -> ActorResult<Self> {
        Ok(Self)
    }
}

#[async_trait]
impl Supervising for PrivateRoot {
    fn strategy() -> SupervisionStrategy {
        SupervisionStrategy::never_restart()
    }

    async fn decide(
        &mut self,
        _ctx: &ActorContext<Self>,
        error: &ActorError,
        supervised: &Supervised,
    ) -> Directive {
        error!(
            address = %supervised.address(),
            type_name = %supervised.type_name(),
            error = %error,
            "Failure reached the private root; stopping the actor"
        );
        Directive::Stop
    }
}

/// Default parent for user actors; restarts failing children indefinitely
pub struct PublicRoot;

#[async_trait]
impl Actor for PublicRoot {
    fn type_name() -> &'static str {
        PUBLIC_ROOT
    }

    fn instantiate(_definition: &Definition) -> ActorResult<Self> {
        Ok(Self)
    }
}

#[async_trait]
impl Supervising for PublicRoot {
    fn strategy() -> SupervisionStrategy {
        SupervisionStrategy::restart_forever()
    }

    async fn decide(
        &mut self,
        _ctx: &ActorContext<Self>,
        error: &ActorError,
        supervised: &Supervised,
    ) -> Directive {
        warn!(
            address = %supervised.address(),
            type_name = %supervised.type_name(),
            error = %error,
            "Restarting failed actor"
        );
        Directive::Restart
    }
}

/// Non-actor fallback holding the private root's slot during bootstrap
///
/// Only consulted if something fails while the roots themselves are being
/// created; like the private root, it only stops.
pub(crate) struct BootstrapSupervisor;

#[async_trait]
impl Supervisor for BootstrapSupervisor {
    fn strategy(&self) -> SupervisionStrategy {
        SupervisionStrategy::never_restart()
    }

    async fn inform(
        &self,
        error: &ActorError,
        supervised: &Supervised,
    ) -> ActorResult<Directive> {
        error!(
            address = %supervised.address(),
            error = %error,
            "Failure during root bootstrap; stopping the actor"
        );
        Ok(Directive::Stop)
    }
}

/// Whether `name` is reserved for the runtime
pub fn is_reserved_type_name(name: &str) -> bool {
    RESERVED_TYPE_NAMES.contains(&name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reserved_names() {
        assert!(is_reserved_type_name("__privateRoot"));
        assert!(is_reserved_type_name("__publicRoot"));
        assert!(is_reserved_type_name("default"));
        assert!(!is_reserved_type_name("Counter"));
    }

    #[test]
    fn test_root_strategies() {
        let private = <PrivateRoot as Supervising>::strategy();
        assert_eq!(private.intensity, 0);

        let public = <PublicRoot as Supervising>::strategy();
        assert!(public.intensity < 0);
    }
}
