//! On-disk layout of experiment results.
//!
//! ```text
//! <result_dir>/<experiment>/run_<N>/<dataset>/<matrix>/<model>/
//!     ratings.tsv     # tab-separated predictions or recommendations
//!     settings.json   # resolved ObjectConfig for this model
//! <result_dir>/<experiment>/run_<N>/overview.json
//! ```

use crate::algorithms::ScoredItem;
use crate::error::EngineError;
use chrono::{DateTime, Utc};
use reckit_core::persistence::atomic_write_json;
use reckit_core::{ExperimentKind, ObjectConfig};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Allocate the output directory for one model within a pipeline
/// invocation.
///
/// Duplicate model names in one invocation (and leftovers on disk) get
/// `_2`, `_3`, ... suffixes so each configured model writes to its own
/// directory.
pub fn allocate_model_dir(
    root: &Path,
    name: &str,
    taken: &mut HashSet<String>,
) -> Result<PathBuf, EngineError> {
    let mut candidate = name.to_string();
    let mut counter = 1usize;
    while taken.contains(&candidate) || root.join(&candidate).exists() {
        counter += 1;
        candidate = format!("{name}_{counter}");
    }
    taken.insert(candidate.clone());
    let dir = root.join(&candidate);
    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}

/// Write the resolved configuration of a model next to its ratings.
pub fn write_settings(dir: &Path, config: &ObjectConfig) -> Result<(), EngineError> {
    atomic_write_json(&dir.join("settings.json"), config)?;
    Ok(())
}

/// Buffered writer for a model's `ratings.tsv`.
pub struct RatingsWriter {
    inner: std::io::BufWriter<std::fs::File>,
}

impl RatingsWriter {
    /// Open a prediction ratings file (`user  item  score`).
    pub fn predictions(path: &Path) -> Result<Self, EngineError> {
        Self::with_header(path, "user\titem\tscore")
    }

    /// Open a recommendation ratings file (`user  item  rank  score`).
    pub fn recommendations(path: &Path) -> Result<Self, EngineError> {
        Self::with_header(path, "user\titem\trank\tscore")
    }

    fn with_header(path: &Path, header: &str) -> Result<Self, EngineError> {
        let file = std::fs::File::create(path)?;
        let mut inner = std::io::BufWriter::new(file);
        writeln!(inner, "{header}")?;
        Ok(Self { inner })
    }

    /// Append one batch of scored (user, item) pairs.
    pub fn append_predictions(
        &mut self,
        pairs: &[(u64, u64)],
        scores: &[f64],
    ) -> Result<(), EngineError> {
        for (&(user, item), score) in pairs.iter().zip(scores) {
            writeln!(self.inner, "{user}\t{item}\t{score}")?;
        }
        Ok(())
    }

    /// Append one batch of per-user top-k lists.
    pub fn append_recommendations(
        &mut self,
        batch: &[(u64, Vec<ScoredItem>)],
    ) -> Result<(), EngineError> {
        for (user, items) in batch {
            for (rank, scored) in items.iter().enumerate() {
                writeln!(
                    self.inner,
                    "{user}\t{}\t{}\t{}",
                    scored.item,
                    rank + 1,
                    scored.score
                )?;
            }
        }
        Ok(())
    }

    pub fn finish(mut self) -> Result<(), EngineError> {
        self.inner.flush()?;
        Ok(())
    }
}

/// Index entry for one produced model output directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelOutputRecord {
    pub dataset: String,
    pub matrix: String,
    /// Directory name, suffixed when the model name was duplicated.
    pub model: String,
    pub dir: PathBuf,
}

/// The `overview.json` record of one experiment run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunOverview {
    pub id: uuid::Uuid,
    pub experiment: String,
    pub kind: ExperimentKind,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub models: Vec<ModelOutputRecord>,
    /// Raw evaluation entries from the configuration, for downstream
    /// metric tooling.
    pub evaluation: Vec<Value>,
}

impl RunOverview {
    pub fn new(experiment: &str, kind: ExperimentKind, evaluation: Vec<Value>) -> Self {
        Self {
            id: uuid::Uuid::new_v4(),
            experiment: experiment.to_string(),
            kind,
            started_at: Utc::now(),
            finished_at: None,
            models: Vec::new(),
            evaluation,
        }
    }

    pub fn push(&mut self, record: ModelOutputRecord) {
        self.models.push(record);
    }

    /// Stamp completion and write the overview into `run_dir`.
    pub fn save(&mut self, run_dir: &Path) -> Result<(), EngineError> {
        self.finished_at = Some(Utc::now());
        atomic_write_json(&run_dir.join("overview.json"), self)?;
        Ok(())
    }
}

/// Allocate the next `run_<N>` directory under an experiment's result
/// root, starting at `run_0`.
pub fn allocate_run_dir(experiment_dir: &Path) -> Result<PathBuf, EngineError> {
    std::fs::create_dir_all(experiment_dir)?;
    let mut next = 0usize;
    for entry in std::fs::read_dir(experiment_dir)? {
        let entry = entry?;
        let name = entry.file_name();
        if let Some(index) = name
            .to_str()
            .and_then(|n| n.strip_prefix("run_"))
            .and_then(|n| n.parse::<usize>().ok())
        {
            next = next.max(index + 1);
        }
    }
    let run_dir = experiment_dir.join(format!("run_{next}"));
    std::fs::create_dir(&run_dir)?;
    Ok(run_dir)
}
