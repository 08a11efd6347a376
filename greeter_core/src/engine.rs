//! Selection orchestrator: picks one greeting for a context.
//!
//! A call moves through these states:
//!
//! `Init → CategoriesScored → CategoryChosen → SubcasesScored →
//! SubcaseChosen → [SubConditionsScored → SubConditionChosen] → Resolved`
//!
//! with `Fallback` reachable whenever a scoring step leaves nothing eligible.
//! Predicate failures never abort a call; only an empty registry is an error.

use crate::sampler::sample_index;
use crate::weights::{CategoryScore, ScoredEntry, WeightCalculator};
use crate::{
    ConditionEvaluator, Config, ContentTable, Error, GreetingContext, Leaf, PredicateRegistry,
    Registry, RegistryTable, Result, SelectionResult,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::{BTreeMap, HashMap};

pub const FALLBACK_CATEGORY_ID: &str = "fallback";
pub const FALLBACK_SUBCASE_ID: &str = "default";

/// Progress of a single selection call
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SelectionState {
    Init,
    CategoriesScored,
    CategoryChosen,
    SubcasesScored,
    SubcaseChosen,
    SubConditionsScored,
    SubConditionChosen,
    Resolved,
    Fallback,
}

fn advance(state: &mut SelectionState, next: SelectionState) {
    tracing::debug!("Selection {:?} -> {:?}", state, next);
    *state = next;
}

/// Sub-condition scores keyed by (category index, subcase index)
type SubConditionCache = HashMap<(usize, usize), Vec<ScoredEntry>>;

/// Leaf frequencies from repeated draws over one context
#[derive(Clone, Debug, Default)]
pub struct Simulation {
    pub trials: usize,
    pub counts: BTreeMap<String, usize>,
    pub fallbacks: usize,
}

impl Simulation {
    /// Observed share of `leaf_key` across all trials
    pub fn frequency(&self, leaf_key: &str) -> f64 {
        if self.trials == 0 {
            return 0.0;
        }
        self.counts.get(leaf_key).copied().unwrap_or(0) as f64 / self.trials as f64
    }
}

/// Weighted, predicate-gated greeting selector
///
/// Holds only read-only configuration, so one engine can serve concurrent
/// calls behind an `Arc`.
#[derive(Clone, Debug)]
pub struct GreetingEngine {
    registry: Registry,
    content: ContentTable,
    calculator: WeightCalculator,
}

impl GreetingEngine {
    pub fn new(registry: Registry, content: ContentTable) -> Self {
        Self {
            registry,
            content,
            calculator: WeightCalculator::default(),
        }
    }

    /// Replace the default condition evaluator (e.g. to change the deadline)
    pub fn with_evaluator(mut self, evaluator: ConditionEvaluator) -> Self {
        self.calculator = WeightCalculator::new(evaluator);
        self
    }

    /// Build an engine from a declarative table
    pub fn from_tables(
        table: &RegistryTable,
        predicates: &PredicateRegistry,
        content: ContentTable,
    ) -> Result<Self> {
        let registry = table.resolve(predicates)?;
        Ok(Self::new(registry, content))
    }

    /// Build an engine from application configuration
    pub fn from_config(config: &Config, predicates: &PredicateRegistry) -> Result<Self> {
        config.validate()?;
        let engine = Self::from_tables(&config.registry_table()?, predicates, config.content_table()?)?
            .with_evaluator(ConditionEvaluator::new(config.engine.predicate_timeout()));
        tracing::info!(
            "Greeting engine ready with {} categories",
            engine.registry.len()
        );
        Ok(engine)
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn content(&self) -> &ContentTable {
        &self.content
    }

    /// The fixed result returned when nothing is eligible
    pub fn fallback_result(&self) -> SelectionResult {
        SelectionResult {
            category_id: FALLBACK_CATEGORY_ID.to_string(),
            subcase_id: FALLBACK_SUBCASE_ID.to_string(),
            sub_condition_id: None,
            content_key: self.content.fallback.content_key.clone(),
            visual_variant_key: self.content.fallback.visual_variant_key.clone(),
            fallback: true,
        }
    }

    /// Select one greeting using the caller's random source
    pub async fn select<R: Rng>(&self, ctx: &GreetingContext, rng: &mut R) -> Result<SelectionResult> {
        let mut state = SelectionState::Init;
        if self.registry.is_empty() {
            tracing::error!("Selection attempted with an empty greeting registry");
            return Err(Error::EmptyRegistry);
        }

        let scores = self.score(ctx).await;
        advance(&mut state, SelectionState::CategoriesScored);

        let mut cache = SubConditionCache::new();
        let result = match self.draw(&scores, ctx, rng, &mut cache, &mut state).await {
            Some(leaf) => {
                let content = self.content.resolve(&leaf);
                advance(&mut state, SelectionState::Resolved);
                SelectionResult::from_leaf(leaf, content)
            }
            None => {
                advance(&mut state, SelectionState::Fallback);
                tracing::info!("No eligible greeting, returning fallback");
                self.fallback_result()
            }
        };

        tracing::info!(
            "Selected greeting {}.{}{} -> {}",
            result.category_id,
            result.subcase_id,
            result
                .sub_condition_id
                .as_deref()
                .map(|c| format!(".{}", c))
                .unwrap_or_default(),
            result.content_key
        );
        Ok(result)
    }

    /// Deterministic selection: same context and seed, same result
    pub async fn select_seeded(&self, ctx: &GreetingContext, seed: u64) -> Result<SelectionResult> {
        let mut rng = StdRng::seed_from_u64(seed);
        self.select(ctx, &mut rng).await
    }

    /// Selection with a freshly OS-seeded random source
    pub async fn select_random(&self, ctx: &GreetingContext) -> Result<SelectionResult> {
        let mut rng = StdRng::from_os_rng();
        self.select(ctx, &mut rng).await
    }

    /// Repeat the draw `trials` times over a single scoring pass
    ///
    /// Predicates are evaluated once per entry, so the counts reflect the
    /// weights alone.
    pub async fn simulate(&self, ctx: &GreetingContext, trials: usize, seed: u64) -> Result<Simulation> {
        if self.registry.is_empty() {
            return Err(Error::EmptyRegistry);
        }

        let scores = self.score(ctx).await;
        let mut rng = StdRng::seed_from_u64(seed);
        let mut cache = SubConditionCache::new();
        let mut simulation = Simulation {
            trials,
            ..Default::default()
        };

        for _ in 0..trials {
            let mut state = SelectionState::CategoriesScored;
            match self.draw(&scores, ctx, &mut rng, &mut cache, &mut state).await {
                Some(leaf) => *simulation.counts.entry(leaf.key()).or_default() += 1,
                None => simulation.fallbacks += 1,
            }
        }

        tracing::info!(
            "Simulated {} draws: {} distinct leaves, {} fallbacks",
            trials,
            simulation.counts.len(),
            simulation.fallbacks
        );
        Ok(simulation)
    }

    async fn score(&self, ctx: &GreetingContext) -> Vec<CategoryScore> {
        self.calculator
            .score_categories(self.registry.categories(), ctx)
            .await
    }

    /// Walk the tiers from scored categories down to a leaf
    ///
    /// Subcase scores come from the category scoring pass. Sub-conditions are
    /// scored on first use and cached for repeated draws.
    async fn draw<R: Rng>(
        &self,
        scores: &[CategoryScore],
        ctx: &GreetingContext,
        rng: &mut R,
        cache: &mut SubConditionCache,
        state: &mut SelectionState,
    ) -> Option<Leaf> {
        let category_entries: Vec<ScoredEntry> = scores
            .iter()
            .map(|s| ScoredEntry {
                id: s.id.clone(),
                weight: s.weight,
            })
            .collect();

        let category_index = sample_index(&category_entries, rng)?;
        advance(state, SelectionState::CategoryChosen);

        let category = &self.registry.categories()[category_index];
        let subcase_scores = &scores[category_index].subcases;
        advance(state, SelectionState::SubcasesScored);

        let subcase_index = sample_index(subcase_scores, rng)?;
        advance(state, SelectionState::SubcaseChosen);

        let subcase = &category.subcases[subcase_index];
        let leaf = Leaf::new(&category.id, &subcase.id);
        if subcase.sub_conditions.is_empty() {
            return Some(leaf);
        }

        let key = (category_index, subcase_index);
        if !cache.contains_key(&key) {
            let scored = self
                .calculator
                .sub_condition_weights(&category.id, subcase, ctx)
                .await;
            cache.insert(key, scored);
        }
        advance(state, SelectionState::SubConditionsScored);

        match cache.get(&key).and_then(|conditions| {
            sample_index(conditions, rng).map(|i| &subcase.sub_conditions[i])
        }) {
            Some(condition) => {
                advance(state, SelectionState::SubConditionChosen);
                Some(leaf.with_sub_condition(&condition.id))
            }
            None => {
                tracing::debug!("No eligible sub-condition under {}, resolving at subcase level", leaf);
                Some(leaf)
            }
        }
    }
}
