//! Eligibility predicates and the named registry they are looked up in.
//!
//! Registry tables never hold closures. A subcase row names a predicate by
//! reference (e.g. `"morning"`) and the [`PredicateRegistry`] maps that name
//! to an object implementing [`Predicate`]. Synchronous checks are wrapped
//! in [`FnPredicate`]; anything that needs an external lookup implements the
//! trait directly.

use crate::{Error, GreetingContext, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Trait for deciding whether an entry is eligible for a given context.
///
/// Implementations must be side-effect free. Errors are absorbed by the
/// condition evaluator and count as "not eligible".
#[async_trait]
pub trait Predicate: Send + Sync {
    async fn evaluate(&self, ctx: &GreetingContext) -> Result<bool>;
}

/// Adapter turning a plain synchronous closure into a [`Predicate`]
///
/// The closure runs on tokio's blocking pool, so a closure that blocks
/// past the evaluator deadline is abandoned instead of stalling its tier.
pub struct FnPredicate<F> {
    f: Arc<F>,
}

impl<F> FnPredicate<F>
where
    F: Fn(&GreetingContext) -> bool + Send + Sync + 'static,
{
    pub fn new(f: F) -> Self {
        Self { f: Arc::new(f) }
    }
}

#[async_trait]
impl<F> Predicate for FnPredicate<F>
where
    F: Fn(&GreetingContext) -> bool + Send + Sync + 'static,
{
    async fn evaluate(&self, ctx: &GreetingContext) -> Result<bool> {
        let f = Arc::clone(&self.f);
        let ctx = ctx.clone();
        match tokio::task::spawn_blocking(move || (*f)(&ctx)).await {
            Ok(eligible) => Ok(eligible),
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Err(e) => Err(Error::Other(format!("predicate task failed: {}", e))),
        }
    }
}

// ============================================================================
// External milestone lookup
// ============================================================================

/// Source of milestone state kept outside this crate (e.g. a rewards store)
#[async_trait]
pub trait MilestoneProvider: Send + Sync {
    /// Whether the user has reached a milestone that has not been celebrated yet
    async fn has_unclaimed_milestone(&self, user_id: Option<&str>) -> Result<bool>;
}

/// Predicate backed by a [`MilestoneProvider`]
pub struct MilestonePredicate<P: ?Sized> {
    provider: Arc<P>,
}

impl<P: MilestoneProvider + ?Sized> MilestonePredicate<P> {
    pub fn new(provider: Arc<P>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl<P: MilestoneProvider + ?Sized> Predicate for MilestonePredicate<P> {
    async fn evaluate(&self, ctx: &GreetingContext) -> Result<bool> {
        self.provider
            .has_unclaimed_milestone(ctx.user_id.as_deref())
            .await
    }
}

// ============================================================================
// Registry
// ============================================================================

/// Named predicates that registry rows refer to
#[derive(Clone, Default)]
pub struct PredicateRegistry {
    predicates: HashMap<String, Arc<dyn Predicate>>,
}

impl PredicateRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-populated with the built-in context predicates
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        crate::builtin::register_builtins(&mut registry);
        registry
    }

    /// Register (or replace) a predicate under `name`
    pub fn register(&mut self, name: impl Into<String>, predicate: Arc<dyn Predicate>) {
        let name = name.into();
        if self.predicates.insert(name.clone(), predicate).is_some() {
            tracing::debug!("Replaced predicate '{}'", name);
        }
    }

    /// Register a synchronous closure under `name`
    pub fn register_fn<F>(&mut self, name: impl Into<String>, f: F)
    where
        F: Fn(&GreetingContext) -> bool + Send + Sync + 'static,
    {
        self.register(name, Arc::new(FnPredicate::new(f)));
    }

    /// Register a milestone lookup as the `milestone_unclaimed` predicate
    pub fn register_milestone_provider<P>(&mut self, provider: Arc<P>)
    where
        P: MilestoneProvider + ?Sized + 'static,
    {
        self.register("milestone_unclaimed", Arc::new(MilestonePredicate::new(provider)));
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Predicate>> {
        self.predicates.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.predicates.contains_key(name)
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.predicates.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.predicates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }
}

impl fmt::Debug for PredicateRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PredicateRegistry")
            .field("names", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedMilestones(bool);

    #[async_trait]
    impl MilestoneProvider for FixedMilestones {
        async fn has_unclaimed_milestone(&self, user_id: Option<&str>) -> Result<bool> {
            match user_id {
                Some(_) => Ok(self.0),
                None => Err(Error::Other("no user".into())),
            }
        }
    }

    #[tokio::test]
    async fn test_fn_predicate_evaluates_closure() {
        let predicate = FnPredicate::new(|ctx: &GreetingContext| ctx.streak() > 2);
        let ctx = GreetingContext {
            streak_days: Some(3),
            ..Default::default()
        };

        assert!(predicate.evaluate(&ctx).await.unwrap());
        assert!(!predicate.evaluate(&GreetingContext::default()).await.unwrap());
    }

    #[tokio::test]
    async fn test_register_and_lookup() {
        let mut registry = PredicateRegistry::new();
        registry.register_fn("always", |_| true);

        let predicate = registry.get("always").unwrap();
        assert!(predicate.evaluate(&GreetingContext::default()).await.unwrap());
        assert!(registry.get("missing").is_none());
        assert_eq!(registry.names(), vec!["always"]);
    }

    #[tokio::test]
    async fn test_milestone_provider_predicate() {
        let mut registry = PredicateRegistry::new();
        registry.register_milestone_provider(Arc::new(FixedMilestones(true)));

        let predicate = registry.get("milestone_unclaimed").unwrap();
        let ctx = GreetingContext {
            user_id: Some("u-1".into()),
            ..Default::default()
        };
        assert!(predicate.evaluate(&ctx).await.unwrap());
        assert!(predicate
            .evaluate(&GreetingContext::default())
            .await
            .is_err());
    }

    #[test]
    fn test_builtins_registered() {
        let registry = PredicateRegistry::with_builtins();
        for name in ["morning", "weekday", "streak_broken", "never"] {
            assert!(registry.contains(name), "missing builtin {}", name);
        }
    }
}
