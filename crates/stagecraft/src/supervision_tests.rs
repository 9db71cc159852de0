//! Supervision scenario suite
//!
//! End-to-end coverage of directives, restart budgets, escalation chains,
//! sibling scope, and the execution context supervisors observe at failure
//! time. The probe actors here are shared with the integration suite.

use crate::actor::{Actor, ActorContext, Definition};
use crate::error::{ActorError, ActorResult};
use crate::invoke;
use crate::stage::SpawnOptions;
use crate::supervisor::{
    Directive, Supervised, SupervisionScope, SupervisionStrategy, Supervising,
};
use crate::testing::{settle, test_stage};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::time::Duration;

/// Counter probe used across the scenario suites
pub(crate) struct Counter {
    count: i64,
}

#[async_trait]
impl Actor for Counter {
    fn type_name() -> &'static str {
        "Counter"
    }

    fn instantiate(definition: &Definition) -> ActorResult<Self> {
        let count = definition
            .parameter(0)
            .and_then(Value::as_i64)
            .unwrap_or(0);
        Ok(Self { count })
    }
}

impl Counter {
    pub(crate) async fn increment(&mut self, _ctx: &ActorContext<Self>) -> ActorResult<()> {
        self.count += 1;
        Ok(())
    }

    pub(crate) async fn set(&mut self, _ctx: &ActorContext<Self>, value: i64) -> ActorResult<()> {
        self.count = value;
        Ok(())
    }

    pub(crate) async fn get(&mut self, _ctx: &ActorContext<Self>) -> ActorResult<i64> {
        Ok(self.count)
    }

    pub(crate) async fn fail(&mut self, _ctx: &ActorContext<Self>) -> ActorResult<()> {
        Err(ActorError::custom("bad"))
    }

    pub(crate) async fn some_op(&mut self, _ctx: &ActorContext<Self>) -> ActorResult<()> {
        Ok(())
    }

    pub(crate) async fn read_tag(
        &mut self,
        ctx: &ActorContext<Self>,
    ) -> ActorResult<Option<String>> {
        Ok(ctx
            .execution_context()
            .get("tag")
            .and_then(Value::as_str)
            .map(str::to_string))
    }
}

/// Supervisor probe answering with a fixed directive
macro_rules! fixed_directive_overseer {
    ($name:ident, $type_name:literal, $directive:expr, $strategy:expr) => {
        pub(crate) struct $name;

        #[async_trait]
        impl Actor for $name {
            fn type_name() -> &'static str {
                $type_name
            }

            fn instantiate(_definition: &Definition) -> ActorResult<Self> {
                Ok(Self)
            }
        }

        #[async_trait]
        impl Supervising for $name {
            fn strategy() -> SupervisionStrategy {
                $strategy
            }

            async fn decide(
                &mut self,
                _ctx: &ActorContext<Self>,
                _error: &ActorError,
                _supervised: &Supervised,
            ) -> Directive {
                $directive
            }
        }
    };
}

fixed_directive_overseer!(
    RestartOverseer,
    "RestartOverseer",
    Directive::Restart,
    SupervisionStrategy::builder()
        .intensity(5)
        .period(Duration::from_secs(60))
        .build()
);

fixed_directive_overseer!(
    ResumeOverseer,
    "ResumeOverseer",
    Directive::Resume,
    SupervisionStrategy::default()
);

fixed_directive_overseer!(
    StopOverseer,
    "StopOverseer",
    Directive::Stop,
    SupervisionStrategy::never_restart()
);

fixed_directive_overseer!(
    TightOverseer,
    "TightOverseer",
    Directive::Restart,
    SupervisionStrategy::builder()
        .intensity(1)
        .period(Duration::from_secs(60))
        .build()
);

fixed_directive_overseer!(
    BroadOverseer,
    "BroadOverseer",
    Directive::Restart,
    SupervisionStrategy::builder()
        .intensity(10)
        .period(Duration::from_secs(60))
        .scope(SupervisionScope::All)
        .build()
);

/// Parent probe spawning counter children under a chosen supervisor
pub(crate) struct Parent;

#[async_trait]
impl Actor for Parent {
    fn type_name() -> &'static str {
        "Parent"
    }

    fn instantiate(_definition: &Definition) -> ActorResult<Self> {
        Ok(Self)
    }
}

impl Parent {
    pub(crate) async fn spawn_child(
        &mut self,
        ctx: &ActorContext<Self>,
        supervisor: String,
        initial: i64,
    ) -> ActorResult<crate::proxy::Proxy<Counter>> {
        ctx.child_actor_for::<Counter>(
            vec![json!(initial)],
            SpawnOptions::default().with_supervisor(supervisor),
        )
        .await
    }
}

/// Supervisor probe recording the failure context it observes
pub(crate) struct RecordingOverseer;

#[async_trait]
impl Actor for RecordingOverseer {
    fn type_name() -> &'static str {
        "RecordingOverseer"
    }

    fn instantiate(_definition: &Definition) -> ActorResult<Self> {
        Ok(Self)
    }
}

#[async_trait]
impl Supervising for RecordingOverseer {
    async fn decide(
        &mut self,
        ctx: &ActorContext<Self>,
        _error: &ActorError,
        supervised: &Supervised,
    ) -> Directive {
        let observed = supervised
            .execution_context()
            .get("tag")
            .and_then(Value::as_str)
            .map(str::to_string);
        if let Ok(stage) = ctx.stage() {
            if let Ok(slot) = stage.registered_value::<Mutex<Option<String>>>("observed-tag") {
                *slot.lock() = observed;
            }
        }
        Directive::Resume
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_restart_directive_replaces_state_and_resumes() {
        // Scenario: a supervisor answers Restart for errors of kind "bad".
        let stage = test_stage();
        let overseer = stage
            .actor_for::<RestartOverseer>(vec![], SpawnOptions::default())
            .await
            .unwrap();
        stage
            .register_supervisor("restart-overseer", overseer.supervisor_ref())
            .unwrap();

        let counter = stage
            .actor_for::<Counter>(
                vec![json!(5)],
                SpawnOptions::default().with_supervisor("restart-overseer"),
            )
            .await
            .unwrap();

        invoke!(counter, set(9)).await.unwrap();

        // The caller observes the raised error on its completion.
        let err = invoke!(counter, fail()).await.unwrap_err();
        assert_eq!(err.to_string(), "bad");

        // The replacement instance runs with a fresh state vector built
        // from the stored definition, and the mailbox resumed.
        let value = invoke!(counter, get()).await.unwrap().value();
        assert_eq!(value, Some(5));
        assert!(!counter.is_stopped());
    }

    #[tokio::test]
    async fn test_resume_directive_preserves_state() {
        let stage = test_stage();
        let overseer = stage
            .actor_for::<ResumeOverseer>(vec![], SpawnOptions::default())
            .await
            .unwrap();
        stage
            .register_supervisor("resume-overseer", overseer.supervisor_ref())
            .unwrap();

        let counter = stage
            .actor_for::<Counter>(
                vec![],
                SpawnOptions::default().with_supervisor("resume-overseer"),
            )
            .await
            .unwrap();

        invoke!(counter, set(7)).await.unwrap();
        let _ = invoke!(counter, fail()).await.unwrap_err();

        let value = invoke!(counter, get()).await.unwrap().value();
        assert_eq!(value, Some(7));
    }

    #[tokio::test]
    async fn test_default_supervision_restarts_forever() {
        // User actors default to the public root, which always restarts.
        let stage = test_stage();
        let counter = stage
            .actor_for::<Counter>(vec![json!(1)], SpawnOptions::default())
            .await
            .unwrap();

        for _ in 0..3 {
            invoke!(counter, set(99)).await.unwrap();
            let _ = invoke!(counter, fail()).await.unwrap_err();
            let value = invoke!(counter, get()).await.unwrap().value();
            assert_eq!(value, Some(1));
        }
    }

    #[tokio::test]
    async fn test_intensity_breach_escalates() {
        // intensity 1 allows exactly one restart within the window; the
        // second failure escalates to the stopping parent supervisor.
        let stage = test_stage();

        let stopper = stage
            .actor_for::<StopOverseer>(vec![], SpawnOptions::default())
            .await
            .unwrap();
        stage
            .register_supervisor("stopper", stopper.supervisor_ref())
            .unwrap();

        let tight = stage
            .actor_for::<TightOverseer>(vec![], SpawnOptions::default())
            .await
            .unwrap();
        stage
            .register_supervisor_with_parent("tight", "stopper", tight.supervisor_ref())
            .unwrap();

        let counter = stage
            .actor_for::<Counter>(vec![], SpawnOptions::default().with_supervisor("tight"))
            .await
            .unwrap();

        // First failure: restarted within budget.
        let _ = invoke!(counter, fail()).await.unwrap_err();
        settle().await;
        assert!(!counter.is_stopped());

        // Second failure within the window: coerced into Escalate -> Stop.
        let _ = invoke!(counter, fail()).await.unwrap_err();
        settle().await;
        assert!(counter.is_stopped());

        let outcome = invoke!(counter, get()).await.unwrap();
        assert!(outcome.is_stopped());
    }

    #[tokio::test]
    async fn test_scope_all_restarts_siblings() {
        let stage = test_stage();
        let overseer = stage
            .actor_for::<BroadOverseer>(vec![], SpawnOptions::default())
            .await
            .unwrap();
        stage
            .register_supervisor("broad", overseer.supervisor_ref())
            .unwrap();

        let parent = stage
            .actor_for::<Parent>(vec![], SpawnOptions::default())
            .await
            .unwrap();

        let child_a = invoke!(parent, spawn_child("broad".to_string(), 0))
            .await
            .unwrap()
            .value()
            .unwrap();
        let child_b = invoke!(parent, spawn_child("broad".to_string(), 0))
            .await
            .unwrap()
            .value()
            .unwrap();

        invoke!(child_a, set(1)).await.unwrap();
        invoke!(child_b, set(2)).await.unwrap();

        let _ = invoke!(child_a, fail()).await.unwrap_err();
        settle().await;

        // Both co-children of the same parent were restarted.
        assert_eq!(invoke!(child_a, get()).await.unwrap().value(), Some(0));
        assert_eq!(invoke!(child_b, get()).await.unwrap().value(), Some(0));
    }

    #[tokio::test]
    async fn test_supervisor_observes_enqueue_time_context() {
        let stage = test_stage();
        stage.register_value("observed-tag", Mutex::<Option<String>>::new(None));

        let overseer = stage
            .actor_for::<RecordingOverseer>(vec![], SpawnOptions::default())
            .await
            .unwrap();
        stage
            .register_supervisor("recording", overseer.supervisor_ref())
            .unwrap();

        let counter = stage
            .actor_for::<Counter>(vec![], SpawnOptions::default().with_supervisor("recording"))
            .await
            .unwrap();
        settle().await;

        // Keys present at enqueue time are what the supervisor reads later.
        counter
            .handle()
            .env()
            .with_execution_context(|context| context.set("tag", json!("request-9")));

        let _ = invoke!(counter, fail()).await.unwrap_err();
        settle().await;

        let slot = stage
            .registered_value::<Mutex<Option<String>>>("observed-tag")
            .unwrap();
        assert_eq!(slot.lock().as_deref(), Some("request-9"));
    }

    #[tokio::test]
    async fn test_queued_invocations_survive_restart() {
        // An invocation enqueued while the mailbox is suspended by a failure
        // is delivered once the replacement instance resumes.
        let stage = test_stage();
        let counter = stage
            .actor_for::<Counter>(vec![json!(4)], SpawnOptions::default())
            .await
            .unwrap();
        settle().await;

        let fail_future = invoke!(counter, fail());
        let get_future = invoke!(counter, get());

        let err = fail_future.await.unwrap_err();
        assert_eq!(err.to_string(), "bad");

        let value = get_future.await.unwrap().value();
        assert_eq!(value, Some(4));
    }

    #[tokio::test]
    async fn test_private_root_refuses_normal_stop() {
        let stage = test_stage();
        // Force root initialization.
        let _ = stage
            .actor_for::<Counter>(vec![], SpawnOptions::default())
            .await
            .unwrap();

        let private_root = stage
            .directory()
            .find_by_type(crate::supervisors::PRIVATE_ROOT)
            .unwrap();
        let err = private_root.stop(None).await.unwrap_err();
        assert!(matches!(err, ActorError::InvalidOperation { .. }));
        assert!(!private_root.is_stopped());
    }

    #[tokio::test]
    async fn test_before_start_failure_routes_to_supervision() {
        use std::sync::atomic::{AtomicU32, Ordering};

        static INSTANTIATIONS: AtomicU32 = AtomicU32::new(0);

        struct FlakyStarter;

        #[async_trait]
        impl Actor for FlakyStarter {
            fn type_name() -> &'static str {
                "FlakyStarter"
            }

            fn instantiate(_definition: &Definition) -> ActorResult<Self> {
                INSTANTIATIONS.fetch_add(1, Ordering::SeqCst);
                Ok(Self)
            }

            async fn before_start(&mut self, _ctx: &ActorContext<Self>) -> ActorResult<()> {
                if INSTANTIATIONS.load(Ordering::SeqCst) == 1 {
                    return Err(ActorError::custom("cold start"));
                }
                Ok(())
            }
        }

        impl FlakyStarter {
            async fn ping(&mut self, _ctx: &ActorContext<Self>) -> ActorResult<bool> {
                Ok(true)
            }
        }

        let stage = test_stage();
        let flaky = stage
            .actor_for::<FlakyStarter>(vec![], SpawnOptions::default())
            .await
            .unwrap();
        settle().await;

        // The default supervisor replaced the instance after the hook
        // failure; the actor is usable.
        assert_eq!(INSTANTIATIONS.load(Ordering::SeqCst), 2);
        let outcome = invoke!(flaky, ping()).await.unwrap();
        assert_eq!(outcome.value(), Some(true));
    }
}
