//! Error types for the Marketing Insight Agent.
//!
//! This module defines a unified error enum that covers all error categories
//! in the application: configuration, I/O, LLM, knowledge retrieval, dataset
//! loading, prompt rendering and generation.

use thiserror::Error;

/// Unified error type for the Marketing Insight Agent.
///
/// All functions in the application return `Result<T, AppError>`.
/// We never panic; errors must be represented and propagated.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O and filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// LLM provider errors (transport, status, parsing)
    #[error("LLM error: {0}")]
    Llm(String),

    /// Graph store, vector store and embedding errors
    #[error("Knowledge error: {0}")]
    Knowledge(String),

    /// Campaign dataset loading and summarizing errors
    #[error("Dataset error: {0}")]
    Dataset(String),

    /// Prompt template errors
    #[error("Prompt error: {0}")]
    Prompt(String),

    /// The initial answer could not be produced at all.
    ///
    /// This is the only back-end failure that crosses the orchestrator boundary.
    #[error("Generation unavailable: {0}")]
    Generation(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors
    #[error("{0}")]
    Other(String),
}

impl AppError {
    /// Stable machine-readable tag for the error category.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Config(_) => "config",
            AppError::Io(_) => "io",
            AppError::Llm(_) => "llm",
            AppError::Knowledge(_) => "knowledge",
            AppError::Dataset(_) => "dataset",
            AppError::Prompt(_) => "prompt",
            AppError::Generation(_) => "generation_unavailable",
            AppError::Serialization(_) => "serialization",
            AppError::Other(_) => "other",
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for AppError {
    fn from(err: serde_yaml::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;
