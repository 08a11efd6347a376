#![forbid(unsafe_code)]

//! Core domain model and selection logic for the companion greeting engine.
//!
//! This crate provides:
//! - Domain types (context, leaves, selection results)
//! - Predicates and the named predicate registry
//! - Registry tables and the default catalog
//! - Weight calculation, sampling and the selection orchestrator
//! - Content key lookup

pub mod types;
pub mod error;
pub mod predicate;
pub mod builtin;
pub mod evaluator;
pub mod registry;
pub mod weights;
pub mod sampler;
pub mod content;
pub mod catalog;
pub mod config;
pub mod logging;
pub mod engine;

// Re-export commonly used types
pub use error::{Error, Result};
pub use types::*;
pub use predicate::{FnPredicate, MilestoneProvider, MilestonePredicate, Predicate, PredicateRegistry};
pub use evaluator::ConditionEvaluator;
pub use registry::{Registry, RegistryTable};
pub use content::ContentTable;
pub use catalog::{get_default_content_table, get_default_registry_table};
pub use config::Config;
pub use engine::{GreetingEngine, SelectionState, Simulation};
