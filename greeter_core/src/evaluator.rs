//! Condition evaluator: uniform, failure-absorbing predicate invocation.
//!
//! Whatever a predicate does (return an error, panic, or hang on an external
//! lookup) the evaluator reports a plain `bool`. Anything other than a timely
//! `Ok(true)` counts as ineligible and is logged.

use crate::{GreetingContext, Predicate};
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::time::Duration;

/// Deadline applied to each predicate evaluation unless configured otherwise
pub const DEFAULT_PREDICATE_TIMEOUT: Duration = Duration::from_secs(3);

/// Runs predicates under a per-call deadline
#[derive(Clone, Copy, Debug)]
pub struct ConditionEvaluator {
    timeout: Duration,
}

impl Default for ConditionEvaluator {
    fn default() -> Self {
        Self::new(DEFAULT_PREDICATE_TIMEOUT)
    }
}

impl ConditionEvaluator {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Evaluate an optional predicate against the context
    ///
    /// A missing predicate is always satisfied; the weight gate is applied by
    /// the caller. `label` identifies the entry in log output.
    pub async fn evaluate(
        &self,
        predicate: Option<&dyn Predicate>,
        ctx: &GreetingContext,
        label: &str,
    ) -> bool {
        let Some(predicate) = predicate else {
            return true;
        };

        let guarded = AssertUnwindSafe(predicate.evaluate(ctx)).catch_unwind();

        match tokio::time::timeout(self.timeout, guarded).await {
            Ok(Ok(Ok(eligible))) => {
                tracing::trace!("Predicate for {} evaluated to {}", label, eligible);
                eligible
            }
            Ok(Ok(Err(e))) => {
                tracing::warn!("Predicate for {} failed: {}. Treating as ineligible.", label, e);
                false
            }
            Ok(Err(_)) => {
                tracing::warn!("Predicate for {} panicked. Treating as ineligible.", label);
                false
            }
            Err(_) => {
                tracing::warn!(
                    "Predicate for {} timed out after {:?}. Treating as ineligible.",
                    label,
                    self.timeout
                );
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Error, FnPredicate, Result};
    use async_trait::async_trait;

    struct Failing;

    #[async_trait]
    impl Predicate for Failing {
        async fn evaluate(&self, _ctx: &GreetingContext) -> Result<bool> {
            Err(Error::Other("history lookup unavailable".into()))
        }
    }

    struct Slow(Duration);

    #[async_trait]
    impl Predicate for Slow {
        async fn evaluate(&self, _ctx: &GreetingContext) -> Result<bool> {
            tokio::time::sleep(self.0).await;
            Ok(true)
        }
    }

    struct Panicking;

    #[async_trait]
    impl Predicate for Panicking {
        async fn evaluate(&self, _ctx: &GreetingContext) -> Result<bool> {
            panic!("predicate bug");
        }
    }

    fn ctx() -> GreetingContext {
        GreetingContext::default()
    }

    #[tokio::test]
    async fn test_missing_predicate_is_eligible() {
        let evaluator = ConditionEvaluator::default();
        assert!(evaluator.evaluate(None, &ctx(), "entry").await);
    }

    #[tokio::test]
    async fn test_passes_through_result() {
        let evaluator = ConditionEvaluator::default();
        let yes = FnPredicate::new(|_: &GreetingContext| true);
        let no = FnPredicate::new(|_: &GreetingContext| false);

        assert!(evaluator.evaluate(Some(&yes), &ctx(), "yes").await);
        assert!(!evaluator.evaluate(Some(&no), &ctx(), "no").await);
    }

    #[tokio::test]
    async fn test_error_becomes_false() {
        crate::logging::init_test();
        let evaluator = ConditionEvaluator::default();
        assert!(!evaluator.evaluate(Some(&Failing), &ctx(), "failing").await);
    }

    #[tokio::test]
    async fn test_panic_becomes_false() {
        let evaluator = ConditionEvaluator::default();
        assert!(!evaluator.evaluate(Some(&Panicking), &ctx(), "panicking").await);
    }

    #[tokio::test]
    async fn test_panicking_closure_becomes_false() {
        let evaluator = ConditionEvaluator::default();
        let broken = FnPredicate::new(|ctx: &GreetingContext| {
            if ctx.streak_days.is_none() {
                panic!("streak missing");
            }
            true
        });
        assert!(!evaluator.evaluate(Some(&broken), &ctx(), "broken").await);
    }

    #[tokio::test]
    async fn test_blocking_closure_cut_off_at_deadline() {
        let evaluator = ConditionEvaluator::new(Duration::from_millis(100));
        let blocking = FnPredicate::new(|_: &GreetingContext| {
            std::thread::sleep(Duration::from_millis(1500));
            true
        });

        let started = std::time::Instant::now();
        let eligible = evaluator.evaluate(Some(&blocking), &ctx(), "blocking").await;

        assert!(!eligible);
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_becomes_false() {
        let evaluator = ConditionEvaluator::new(Duration::from_secs(2));
        let slow = Slow(Duration::from_secs(10));
        assert!(!evaluator.evaluate(Some(&slow), &ctx(), "slow").await);

        let quick = Slow(Duration::from_millis(500));
        assert!(evaluator.evaluate(Some(&quick), &ctx(), "quick").await);
    }
}
