//! Error types for the reckit engine crate.

use reckit_core::AlgorithmError;
use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A shared train/test matrix file is missing. Fatal for the whole
    /// pipeline invocation: no model can be tested without it.
    #[error("Dataset unavailable: {path}")]
    DatasetUnavailable { path: PathBuf },

    #[error("Algorithm error: {0}")]
    Algorithm(#[from] AlgorithmError),

    #[error("Run error: {0}")]
    Run(#[from] RunError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl EngineError {
    pub fn dataset_unavailable(path: impl Into<PathBuf>) -> Self {
        Self::DatasetUnavailable { path: path.into() }
    }
}

/// Errors from the background run manager.
#[derive(Debug, Error)]
pub enum RunError {
    /// A run with this name is already active. Surfaced synchronously,
    /// before any background work begins.
    #[error("Run already active: {name}")]
    AlreadyActive { name: String },

    #[error("Failed to spawn worker for run '{name}': {message}")]
    Spawn { name: String, message: String },
}

/// A type alias for results using the top-level `EngineError`.
pub type Result<T> = std::result::Result<T, EngineError>;
