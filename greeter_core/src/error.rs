//! Error types for the greeter_core library.

use std::io;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for greeter_core operations
///
/// Predicate failures never show up here: the condition evaluator turns them
/// into an ineligible entry. Only configuration defects reach the caller.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// IO error occurred
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Configuration validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Registry table failed validation
    #[error("Registry validation error: {0}")]
    RegistryValidation(String),

    /// A registry row names a predicate that was never registered
    #[error("Unknown predicate reference '{reference}' in {path}")]
    UnknownPredicate { reference: String, path: String },

    /// No category is registered at all, so not even a fallback can be chosen
    #[error("Greeting registry has no categories")]
    EmptyRegistry,

    /// Generic error
    #[error("{0}")]
    Other(String),
}
