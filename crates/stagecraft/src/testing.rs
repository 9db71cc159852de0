//! Test utilities
//!
//! Helpers shared by the scenario suites: a dead-letter listener that
//! records what it sees, and a quiescence helper for letting queued
//! deliveries drain before asserting.

use crate::dead_letters::{DeadLetter, DeadLetterListener};
use crate::error::ActorResult;
use parking_lot::Mutex;
use std::time::Duration;

/// Dead-letter listener recording every representation it observes
#[derive(Debug, Default)]
pub struct CountingDeadLetters {
    seen: Mutex<Vec<DeadLetter>>,
}

impl CountingDeadLetters {
    /// New listener with nothing recorded
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records observed
    pub fn count(&self) -> usize {
        self.seen.lock().len()
    }

    /// Representations observed, in arrival order
    pub fn representations(&self) -> Vec<String> {
        self.seen
            .lock()
            .iter()
            .map(|dead_letter| dead_letter.representation.clone())
            .collect()
    }

    /// Copies of all observed records
    pub fn records(&self) -> Vec<DeadLetter> {
        self.seen.lock().clone()
    }
}

impl DeadLetterListener for CountingDeadLetters {
    fn handle(&self, dead_letter: &DeadLetter) -> ActorResult<()> {
        self.seen.lock().push(dead_letter.clone());
        Ok(())
    }
}

/// Let queued deliveries and spawned supervision tasks drain
pub async fn settle() {
    settle_for(Duration::from_millis(100)).await;
}

/// Let the runtime idle for `duration` before asserting
pub async fn settle_for(duration: Duration) {
    tokio::time::sleep(duration).await;
}

/// Initialize test logging once per process
///
/// Respects `RUST_LOG`; later calls are no-ops. Output goes through the
/// test writer so it interleaves with the harness's captured output.
#[cfg(test)]
pub(crate) fn init_tracing() {
    use std::sync::Once;

    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// Fresh isolated stage for a scenario test, with logging initialized
#[cfg(test)]
pub(crate) fn test_stage() -> std::sync::Arc<crate::stage::Stage> {
    init_tracing();
    crate::stage::Stage::new(crate::stage::StageConfig::default())
}
