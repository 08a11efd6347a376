//! Weight calculator for the category, subcase and sub-condition tiers.
//!
//! Every tier uses the same pattern: entries with a positive weight have
//! their predicates evaluated concurrently, and an entry's effective weight
//! is its declared weight if eligible, otherwise zero. No evaluation is
//! short-circuited; the full tier is joined before any weight is reported.

use crate::registry::{Category, Subcase, WeightedEntry};
use crate::{ConditionEvaluator, GreetingContext};
use futures::future::join_all;

/// Effective weight of one entry within a tier
#[derive(Clone, Debug, PartialEq)]
pub struct ScoredEntry {
    pub id: String,
    pub weight: f64,
}

impl ScoredEntry {
    pub fn is_eligible(&self) -> bool {
        self.weight > 0.0
    }
}

/// Scores of one category and of every subcase in it
#[derive(Clone, Debug, PartialEq)]
pub struct CategoryScore {
    pub id: String,
    /// `base_weight` times the sum of eligible subcase weights
    pub weight: f64,
    pub subcases: Vec<ScoredEntry>,
}

/// Shared weight calculation for all tiers
#[derive(Clone, Copy, Debug, Default)]
pub struct WeightCalculator {
    evaluator: ConditionEvaluator,
}

impl WeightCalculator {
    pub fn new(evaluator: ConditionEvaluator) -> Self {
        Self { evaluator }
    }

    /// Score a tier of entries, in declaration order
    ///
    /// `scope` prefixes entry ids in log output (e.g. the category id).
    pub async fn score_entries<E: WeightedEntry>(
        &self,
        entries: &[E],
        ctx: &GreetingContext,
        scope: &str,
    ) -> Vec<ScoredEntry> {
        let evaluations = entries.iter().map(|entry| async move {
            let weight = entry.weight();
            if weight <= 0.0 || !weight.is_finite() {
                return 0.0;
            }

            let label = format!("{}.{}", scope, entry.id());
            if self.evaluator.evaluate(entry.predicate(), ctx, &label).await {
                weight
            } else {
                0.0
            }
        });

        let weights = join_all(evaluations).await;

        entries
            .iter()
            .zip(weights)
            .map(|(entry, weight)| ScoredEntry {
                id: entry.id().to_string(),
                weight,
            })
            .collect()
    }

    /// Per-subcase effective weights of one category (no base multiplier)
    pub async fn subcase_weights(
        &self,
        category: &Category,
        ctx: &GreetingContext,
    ) -> Vec<ScoredEntry> {
        self.score_entries(&category.subcases, ctx, &category.id)
            .await
    }

    /// Per-sub-condition effective weights of one subcase
    pub async fn sub_condition_weights(
        &self,
        category_id: &str,
        subcase: &Subcase,
        ctx: &GreetingContext,
    ) -> Vec<ScoredEntry> {
        let scope = format!("{}.{}", category_id, subcase.id);
        self.score_entries(&subcase.sub_conditions, ctx, &scope)
            .await
    }

    /// Score a category together with its subcases
    ///
    /// A category with `base_weight <= 0` is ineligible and its predicates
    /// are not evaluated.
    pub async fn score_category(&self, category: &Category, ctx: &GreetingContext) -> CategoryScore {
        if category.base_weight <= 0.0 || !category.base_weight.is_finite() {
            tracing::debug!("Category {} disabled (base weight {})", category.id, category.base_weight);
            return CategoryScore {
                id: category.id.clone(),
                weight: 0.0,
                subcases: category
                    .subcases
                    .iter()
                    .map(|s| ScoredEntry {
                        id: s.id.clone(),
                        weight: 0.0,
                    })
                    .collect(),
            };
        }

        let subcases = self.subcase_weights(category, ctx).await;
        let eligible_sum: f64 = subcases.iter().map(|s| s.weight).sum();
        // Saturate so a huge but valid weight stays sampleable
        let weight = (eligible_sum * category.base_weight).min(f64::MAX);

        tracing::debug!(
            "Category {} weight {} ({} eligible subcases)",
            category.id,
            weight,
            subcases.iter().filter(|s| s.is_eligible()).count()
        );

        CategoryScore {
            id: category.id.clone(),
            weight,
            subcases,
        }
    }

    /// Effective weight of a single category
    pub async fn category_weight(&self, category: &Category, ctx: &GreetingContext) -> f64 {
        self.score_category(category, ctx).await.weight
    }

    /// Score every category concurrently, in registry order
    pub async fn score_categories(
        &self,
        categories: &[Category],
        ctx: &GreetingContext,
    ) -> Vec<CategoryScore> {
        join_all(categories.iter().map(|c| self.score_category(c, ctx))).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::SubCondition;
    use crate::{FnPredicate, Predicate, Result};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    fn constant(value: bool) -> Arc<dyn Predicate> {
        Arc::new(FnPredicate::new(move |_: &GreetingContext| value))
    }

    struct Counting {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Predicate for Counting {
        async fn evaluate(&self, _ctx: &GreetingContext) -> Result<bool> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(true)
        }
    }

    struct Delayed(Duration);

    #[async_trait]
    impl Predicate for Delayed {
        async fn evaluate(&self, _ctx: &GreetingContext) -> Result<bool> {
            tokio::time::sleep(self.0).await;
            Ok(true)
        }
    }

    fn time_of_day(base_weight: f64) -> Category {
        Category::new("time_of_day", base_weight)
            .with_subcase(Subcase::new("morning", 1.0).with_predicate("t", constant(true)))
            .with_subcase(Subcase::new("weekday", 1.0).with_predicate("t", constant(true)))
            .with_subcase(Subcase::new("evening", 1.0).with_predicate("f", constant(false)))
    }

    #[tokio::test]
    async fn test_category_weight_sums_eligible_subcases() {
        let calc = WeightCalculator::default();
        let ctx = GreetingContext::default();

        assert_eq!(calc.category_weight(&time_of_day(1.5), &ctx).await, 3.0);
    }

    #[tokio::test]
    async fn test_zero_base_weight_skips_evaluation() {
        let counting = Arc::new(Counting {
            calls: AtomicUsize::new(0),
        });
        let category = Category::new("off", 0.0)
            .with_subcase(Subcase::new("a", 5.0).with_predicate("count", counting.clone()));

        let calc = WeightCalculator::default();
        let score = calc.score_category(&category, &GreetingContext::default()).await;

        assert_eq!(score.weight, 0.0);
        assert_eq!(counting.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_zero_weight_subcase_not_evaluated() {
        let counting = Arc::new(Counting {
            calls: AtomicUsize::new(0),
        });
        let category = Category::new("c", 1.0)
            .with_subcase(Subcase::new("placeholder", 0.0).with_predicate("count", counting.clone()))
            .with_subcase(Subcase::new("live", 2.0).with_predicate("count", counting.clone()));

        let calc = WeightCalculator::default();
        let scores = calc.subcase_weights(&category, &GreetingContext::default()).await;

        assert_eq!(scores[0].weight, 0.0);
        assert_eq!(scores[1].weight, 2.0);
        assert_eq!(counting.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_all_subcases_evaluated_without_short_circuit() {
        let counting = Arc::new(Counting {
            calls: AtomicUsize::new(0),
        });
        let mut category = Category::new("c", 1.0);
        for i in 0..4 {
            category = category.with_subcase(
                Subcase::new(format!("s{}", i), 1.0).with_predicate("count", counting.clone()),
            );
        }

        let calc = WeightCalculator::default();
        calc.category_weight(&category, &GreetingContext::default()).await;
        assert_eq!(counting.calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_sub_condition_weights() {
        let subcase = Subcase::new("milestone", 1.0)
            .with_sub_condition(SubCondition::new("week", 2.0).with_predicate("t", constant(true)))
            .with_sub_condition(SubCondition::new("month", 3.0).with_predicate("f", constant(false)))
            .with_sub_condition(SubCondition::new("any", 1.0));

        let calc = WeightCalculator::default();
        let scores = calc
            .sub_condition_weights("streak", &subcase, &GreetingContext::default())
            .await;

        let weights: Vec<f64> = scores.iter().map(|s| s.weight).collect();
        assert_eq!(weights, vec![2.0, 0.0, 1.0]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tier_latency_bounded_by_slowest_predicate() {
        let category = Category::new("slow", 1.0)
            .with_subcase(Subcase::new("a", 1.0).with_predicate("d", Arc::new(Delayed(Duration::from_secs(1)))))
            .with_subcase(Subcase::new("b", 1.0).with_predicate("d", Arc::new(Delayed(Duration::from_secs(1)))))
            .with_subcase(Subcase::new("c", 1.0).with_predicate("d", Arc::new(Delayed(Duration::from_secs(1)))));

        let calc = WeightCalculator::default();
        let start = tokio::time::Instant::now();
        let weight = calc.category_weight(&category, &GreetingContext::default()).await;

        assert_eq!(weight, 3.0);
        assert!(start.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_huge_weights_saturate_instead_of_overflowing() {
        let category = Category::new("special", 1e308)
            .with_subcase(Subcase::new("a", 1e308).with_predicate("t", constant(true)))
            .with_subcase(Subcase::new("b", 1e308).with_predicate("t", constant(true)));

        let weight = WeightCalculator::default()
            .category_weight(&category, &GreetingContext::default())
            .await;
        assert_eq!(weight, f64::MAX);
    }

    #[tokio::test]
    async fn test_score_categories_keeps_order() {
        let categories = vec![time_of_day(1.0), time_of_day(0.0), time_of_day(2.0)];
        let calc = WeightCalculator::default();
        let scores = calc
            .score_categories(&categories, &GreetingContext::default())
            .await;

        let weights: Vec<f64> = scores.iter().map(|s| s.weight).collect();
        assert_eq!(weights, vec![2.0, 0.0, 4.0]);
    }
}
