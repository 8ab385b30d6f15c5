//! Experiment configuration types.
//!
//! The declarative input to a run: which datasets, which models per
//! provider, which evaluation entries. Model and evaluation entries stay
//! raw (`serde_json::Value`) here — the resolver validates them against
//! the registry later.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// The kind of experiment a configuration describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExperimentKind {
    Prediction,
    #[default]
    Recommendation,
}

impl ExperimentKind {
    /// The registry namespace this kind of experiment resolves against.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Prediction => "prediction",
            Self::Recommendation => "recommendation",
        }
    }
}

/// One dataset-matrix pair an experiment runs against.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetConfig {
    /// Dataset name, used in the output directory layout.
    pub name: String,
    /// Matrix name within the dataset.
    #[serde(default = "default_matrix")]
    pub matrix: String,
    /// Path to the train-set matrix file.
    pub train_path: PathBuf,
    /// Path to the test-set matrix file.
    pub test_path: PathBuf,
    /// (min, max) rating scale; derived from the train set when absent.
    #[serde(default)]
    pub rating_scale: Option<(f64, f64)>,
}

/// A declarative experiment: datasets x models x evaluation entries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperimentConfig {
    /// Experiment name; doubles as the run identifier prefix.
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: ExperimentKind,
    /// Ranked recommendations requested per user (recommendation runs).
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// Thread-count hint passed to constructed algorithms. Zero leaves
    /// the choice to the algorithm.
    #[serde(default)]
    pub max_threads: usize,
    pub datasets: Vec<DatasetConfig>,
    /// Raw model entries, grouped by provider namespace.
    pub models: BTreeMap<String, Vec<Value>>,
    /// Raw evaluation entries; carried into the run overview, never
    /// computed here.
    #[serde(default)]
    pub evaluation: Vec<Value>,
}

fn default_matrix() -> String {
    "user-item-rating".to_string()
}

fn default_top_k() -> usize {
    10
}

impl ExperimentConfig {
    /// Load an experiment configuration from a YAML file.
    pub fn from_yaml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = read_config_file(path)?;
        let config: Self = serde_yaml::from_str(&content).map_err(|e| ConfigError::Parse {
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load an experiment configuration from a JSON file.
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let content = read_config_file(path)?;
        let config: Self = serde_json::from_str(&content).map_err(|e| ConfigError::Parse {
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Structural checks that do not need the registry.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::Invalid {
                message: "experiment name must not be empty".to_string(),
            });
        }
        if self.datasets.is_empty() {
            return Err(ConfigError::Invalid {
                message: "experiment needs at least one dataset".to_string(),
            });
        }
        if self.models.values().all(|entries| entries.is_empty()) {
            return Err(ConfigError::Invalid {
                message: "experiment needs at least one model".to_string(),
            });
        }
        if self.kind == ExperimentKind::Recommendation && self.top_k == 0 {
            return Err(ConfigError::Invalid {
                message: "top_k must be positive for recommendation experiments".to_string(),
            });
        }
        Ok(())
    }
}

fn read_config_file(path: &Path) -> Result<String, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::FileNotFound {
            path: path.to_path_buf(),
        });
    }
    std::fs::read_to_string(path).map_err(|e| ConfigError::Parse {
        message: format!("failed to read {}: {e}", path.display()),
    })
}
