//! Greeting registry: declarative table and its resolved runtime form.
//!
//! A [`RegistryTable`] is plain data (ids, weights, predicate reference
//! names) that can be versioned as TOML and retuned without touching the
//! selection logic. [`RegistryTable::resolve`] validates it and binds every
//! reference against a [`PredicateRegistry`], producing the read-only
//! [`Registry`] the engine evaluates.

use crate::{Error, Leaf, Predicate, PredicateRegistry, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

// ============================================================================
// Declarative table
// ============================================================================

/// Serializable category/subcase table
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RegistryTable {
    #[serde(default)]
    pub categories: Vec<CategoryRow>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CategoryRow {
    pub id: String,
    pub base_weight: f64,
    #[serde(default)]
    pub subcases: Vec<SubcaseRow>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SubcaseRow {
    pub id: String,
    pub weight: f64,
    /// Name of a predicate in the predicate registry; none means "always"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub predicate: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sub_conditions: Vec<SubConditionRow>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SubConditionRow {
    pub id: String,
    pub weight: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub predicate: Option<String>,
}

impl CategoryRow {
    pub fn new(id: impl Into<String>, base_weight: f64) -> Self {
        Self {
            id: id.into(),
            base_weight,
            subcases: Vec::new(),
        }
    }

    pub fn subcase(mut self, row: SubcaseRow) -> Self {
        self.subcases.push(row);
        self
    }
}

impl SubcaseRow {
    pub fn new(id: impl Into<String>, weight: f64, predicate: &str) -> Self {
        Self {
            id: id.into(),
            weight,
            predicate: Some(predicate.to_string()),
            sub_conditions: Vec::new(),
        }
    }

    pub fn sub_condition(mut self, id: impl Into<String>, weight: f64, predicate: &str) -> Self {
        self.sub_conditions.push(SubConditionRow {
            id: id.into(),
            weight,
            predicate: Some(predicate.to_string()),
        });
        self
    }
}

impl RegistryTable {
    /// Load a table from a TOML file
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let table: RegistryTable = toml::from_str(&contents)?;
        tracing::info!(
            "Loaded registry table with {} categories from {:?}",
            table.categories.len(),
            path
        );
        Ok(table)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize registry table: {}", e)))
    }

    /// Save the table as TOML, creating parent directories as needed
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_toml_string()?)?;
        tracing::info!("Saved registry table to {:?}", path);
        Ok(())
    }

    /// Every leaf the engine can resolve to, in table order
    ///
    /// A subcase with sub-conditions contributes one leaf per sub-condition
    /// plus its own subcase-level leaf, used when no sub-condition is eligible.
    pub fn leaves(&self) -> Vec<Leaf> {
        let mut leaves = Vec::new();
        for category in &self.categories {
            for subcase in &category.subcases {
                let leaf = Leaf::new(&category.id, &subcase.id);
                for condition in &subcase.sub_conditions {
                    leaves.push(leaf.clone().with_sub_condition(&condition.id));
                }
                leaves.push(leaf);
            }
        }
        leaves
    }

    /// Validate the table against the available predicates
    ///
    /// Returns a list of human-readable problems (empty if valid).
    pub fn validate(&self, predicates: &PredicateRegistry) -> Vec<String> {
        let mut errors = Vec::new();
        let mut category_ids = HashSet::new();

        for category in &self.categories {
            check_id(&category.id, "Category", &mut errors);
            if !category_ids.insert(category.id.as_str()) {
                errors.push(format!("Duplicate category id '{}'", category.id));
            }
            check_weight(category.base_weight, &category.id, "base weight", &mut errors);

            let mut subcase_ids = HashSet::new();
            for subcase in &category.subcases {
                let path = format!("{}.{}", category.id, subcase.id);
                check_id(&subcase.id, "Subcase", &mut errors);
                if !subcase_ids.insert(subcase.id.as_str()) {
                    errors.push(format!("Duplicate subcase id '{}'", path));
                }
                check_weight(subcase.weight, &path, "weight", &mut errors);
                check_reference(subcase.predicate.as_deref(), &path, predicates, &mut errors);

                let mut condition_ids = HashSet::new();
                for condition in &subcase.sub_conditions {
                    let path = format!("{}.{}", path, condition.id);
                    check_id(&condition.id, "Sub-condition", &mut errors);
                    if !condition_ids.insert(condition.id.as_str()) {
                        errors.push(format!("Duplicate sub-condition id '{}'", path));
                    }
                    check_weight(condition.weight, &path, "weight", &mut errors);
                    check_reference(condition.predicate.as_deref(), &path, predicates, &mut errors);
                }
            }
        }

        errors
    }

    /// Bind predicate references and validate into a runtime [`Registry`]
    ///
    /// The first unbound reference is reported as
    /// [`Error::UnknownPredicate`]; ids and weights are checked once every
    /// reference binds.
    pub fn resolve(&self, predicates: &PredicateRegistry) -> Result<Registry> {
        let categories = self
            .categories
            .iter()
            .map(|row| {
                let subcases = row
                    .subcases
                    .iter()
                    .map(|sub| {
                        let path = format!("{}.{}", row.id, sub.id);
                        let sub_conditions = sub
                            .sub_conditions
                            .iter()
                            .map(|cond| {
                                Ok(SubCondition {
                                    id: cond.id.clone(),
                                    weight: cond.weight,
                                    predicate: bind(cond.predicate.as_deref(), &path, predicates)?,
                                })
                            })
                            .collect::<Result<Vec<_>>>()?;

                        Ok(Subcase {
                            id: sub.id.clone(),
                            weight: sub.weight,
                            predicate: bind(sub.predicate.as_deref(), &path, predicates)?,
                            sub_conditions,
                        })
                    })
                    .collect::<Result<Vec<_>>>()?;

                Ok(Category {
                    id: row.id.clone(),
                    base_weight: row.base_weight,
                    subcases,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let errors = self.validate(predicates);
        if !errors.is_empty() {
            for error in &errors {
                tracing::error!("Registry table: {}", error);
            }
            return Err(Error::RegistryValidation(errors.join("; ")));
        }

        Ok(Registry::new(categories))
    }
}

fn check_id(id: &str, kind: &str, errors: &mut Vec<String>) {
    if id.is_empty() {
        errors.push(format!("{} has an empty id", kind));
    } else if id.contains('.') {
        errors.push(format!("{} id '{}' must not contain '.'", kind, id));
    }
}

fn check_weight(weight: f64, path: &str, what: &str, errors: &mut Vec<String>) {
    if !weight.is_finite() || weight < 0.0 {
        errors.push(format!("'{}': {} {} must be a finite number >= 0", path, what, weight));
    }
}

fn check_reference(
    reference: Option<&str>,
    path: &str,
    predicates: &PredicateRegistry,
    errors: &mut Vec<String>,
) {
    if let Some(name) = reference {
        if !predicates.contains(name) {
            errors.push(format!("'{}': unknown predicate '{}'", path, name));
        }
    }
}

fn bind(
    reference: Option<&str>,
    path: &str,
    predicates: &PredicateRegistry,
) -> Result<Option<PredicateRef>> {
    reference
        .map(|name| {
            predicates
                .get(name)
                .map(|predicate| PredicateRef::new(name, predicate))
                .ok_or_else(|| Error::UnknownPredicate {
                    reference: name.to_string(),
                    path: path.to_string(),
                })
        })
        .transpose()
}

// ============================================================================
// Runtime registry
// ============================================================================

/// A predicate bound to the name it was referenced by
#[derive(Clone)]
pub struct PredicateRef {
    name: String,
    predicate: Arc<dyn Predicate>,
}

impl PredicateRef {
    pub fn new(name: impl Into<String>, predicate: Arc<dyn Predicate>) -> Self {
        Self {
            name: name.into(),
            predicate,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn predicate(&self) -> &dyn Predicate {
        self.predicate.as_ref()
    }
}

impl fmt::Debug for PredicateRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PredicateRef({})", self.name)
    }
}

/// Anything the weight calculator can score: an id, a weight and an
/// optional eligibility predicate
pub trait WeightedEntry {
    fn id(&self) -> &str;
    fn weight(&self) -> f64;
    fn predicate(&self) -> Option<&dyn Predicate>;
}

#[derive(Clone, Debug)]
pub struct Category {
    pub id: String,
    /// Zero disables the category regardless of its subcases
    pub base_weight: f64,
    pub subcases: Vec<Subcase>,
}

#[derive(Clone, Debug)]
pub struct Subcase {
    pub id: String,
    pub weight: f64,
    pub predicate: Option<PredicateRef>,
    pub sub_conditions: Vec<SubCondition>,
}

#[derive(Clone, Debug)]
pub struct SubCondition {
    pub id: String,
    pub weight: f64,
    pub predicate: Option<PredicateRef>,
}

impl Category {
    pub fn new(id: impl Into<String>, base_weight: f64) -> Self {
        Self {
            id: id.into(),
            base_weight,
            subcases: Vec::new(),
        }
    }

    pub fn with_subcase(mut self, subcase: Subcase) -> Self {
        self.subcases.push(subcase);
        self
    }

    pub fn subcase(&self, id: &str) -> Option<&Subcase> {
        self.subcases.iter().find(|s| s.id == id)
    }
}

impl Subcase {
    pub fn new(id: impl Into<String>, weight: f64) -> Self {
        Self {
            id: id.into(),
            weight,
            predicate: None,
            sub_conditions: Vec::new(),
        }
    }

    pub fn with_predicate(mut self, name: &str, predicate: Arc<dyn Predicate>) -> Self {
        self.predicate = Some(PredicateRef::new(name, predicate));
        self
    }

    pub fn with_sub_condition(mut self, condition: SubCondition) -> Self {
        self.sub_conditions.push(condition);
        self
    }
}

impl SubCondition {
    pub fn new(id: impl Into<String>, weight: f64) -> Self {
        Self {
            id: id.into(),
            weight,
            predicate: None,
        }
    }

    pub fn with_predicate(mut self, name: &str, predicate: Arc<dyn Predicate>) -> Self {
        self.predicate = Some(PredicateRef::new(name, predicate));
        self
    }
}

impl WeightedEntry for Subcase {
    fn id(&self) -> &str {
        &self.id
    }

    fn weight(&self) -> f64 {
        self.weight
    }

    fn predicate(&self) -> Option<&dyn Predicate> {
        self.predicate.as_ref().map(PredicateRef::predicate)
    }
}

impl WeightedEntry for SubCondition {
    fn id(&self) -> &str {
        &self.id
    }

    fn weight(&self) -> f64 {
        self.weight
    }

    fn predicate(&self) -> Option<&dyn Predicate> {
        self.predicate.as_ref().map(PredicateRef::predicate)
    }
}

/// Resolved, read-only set of categories in declaration order
#[derive(Clone, Debug, Default)]
pub struct Registry {
    categories: Vec<Category>,
}

impl Registry {
    pub fn new(categories: Vec<Category>) -> Self {
        Self { categories }
    }

    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    pub fn category(&self, id: &str) -> Option<&Category> {
        self.categories.iter().find(|c| c.id == id)
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    pub fn len(&self) -> usize {
        self.categories.len()
    }
}
