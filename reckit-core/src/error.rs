//! Error types for the reckit core library.
//!
//! Uses `thiserror` for public API error types with structured variants
//! covering the registry, configuration, and algorithm-capability domains.

use std::path::PathBuf;

/// Top-level error type for the reckit core library.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Algorithm error: {0}")]
    Algorithm(#[from] AlgorithmError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors from component registration and registry construction.
///
/// All of these indicate programmer errors in registry bootstrap code, not
/// runtime conditions; they are surfaced at construction time so a misbuilt
/// tree never reaches an experiment run.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Component already registered: {name}")]
    DuplicateComponent { name: String },

    #[error("Branch already mounted: {name}")]
    DuplicateBranch { name: String },

    #[error("Expected a leaf node at '{name}', found a branch")]
    LeafExpected { name: String },

    #[error("Expected a branch node at '{name}', found a leaf")]
    BranchExpected { name: String },
}

/// Errors from experiment configuration files.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("Configuration parse error: {message}")]
    Parse { message: String },

    #[error("Invalid configuration: {message}")]
    Invalid { message: String },
}

/// Errors raised by an algorithm capability behind the registry.
///
/// Construction errors propagate out of `RegistryNode::create` untouched;
/// training and testing errors are isolated per model by the pipeline that
/// owns the instance.
#[derive(Debug, thiserror::Error)]
pub enum AlgorithmError {
    #[error("Failed to construct algorithm '{name}': {message}")]
    Construction { name: String, message: String },

    #[error("Training failed for '{name}': {message}")]
    Training { name: String, message: String },

    #[error("Prediction failed for '{name}': {message}")]
    Prediction { name: String, message: String },

    #[error("Recommendation failed for '{name}': {message}")]
    Recommendation { name: String, message: String },
}

impl AlgorithmError {
    pub fn construction(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Construction {
            name: name.into(),
            message: message.into(),
        }
    }

    pub fn training(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Training {
            name: name.into(),
            message: message.into(),
        }
    }

    pub fn prediction(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Prediction {
            name: name.into(),
            message: message.into(),
        }
    }

    pub fn recommendation(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Recommendation {
            name: name.into(),
            message: message.into(),
        }
    }
}

/// A type alias for results using the top-level `CoreError`.
pub type Result<T> = std::result::Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_registry() {
        let err = CoreError::Registry(RegistryError::DuplicateComponent {
            name: "Random".into(),
        });
        assert_eq!(
            err.to_string(),
            "Registry error: Component already registered: Random"
        );
    }

    #[test]
    fn test_error_display_config() {
        let err = CoreError::Config(ConfigError::FileNotFound {
            path: PathBuf::from("/tmp/missing.yml"),
        });
        assert_eq!(
            err.to_string(),
            "Configuration error: Configuration file not found: /tmp/missing.yml"
        );
    }

    #[test]
    fn test_error_display_algorithm() {
        let err = AlgorithmError::training("BiasedMF", "singular matrix");
        assert_eq!(
            err.to_string(),
            "Training failed for 'BiasedMF': singular matrix"
        );
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: CoreError = io_err.into();
        assert!(matches!(err, CoreError::Io(_)));
    }

    #[test]
    fn test_error_from_serde() {
        let serde_err = serde_json::from_str::<serde_json::Value>("not json").unwrap_err();
        let err: CoreError = serde_err.into();
        assert!(matches!(err, CoreError::Serialization(_)));
    }
}
