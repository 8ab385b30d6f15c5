//! Dataset matrix access.
//!
//! The engine only needs a stream of `(user, item, rating[, timestamp])`
//! rows reachable by file path; everything richer (dataset registries,
//! table formats) lives with external collaborators. A [`DataProvider`]
//! hands the pipeline one train/test pair per dataset-matrix combination.

use crate::error::EngineError;
use serde::{Deserialize, Serialize};
use std::io::BufRead;
use std::path::{Path, PathBuf};
use tracing::debug;

/// One interaction row of a dataset matrix.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rating {
    pub user: u64,
    pub item: u64,
    pub rating: f64,
    pub timestamp: Option<i64>,
}

/// An in-memory train or test matrix.
///
/// Loaded once per pipeline invocation and shared read-only across every
/// model tested in that invocation.
#[derive(Debug, Clone)]
pub struct RatingMatrix {
    rows: Vec<Rating>,
    scale: (f64, f64),
}

impl RatingMatrix {
    /// Build a matrix from rows, deriving the rating scale from the data
    /// when none is supplied. An empty matrix defaults to (1, 5).
    pub fn from_rows(rows: Vec<Rating>, scale: Option<(f64, f64)>) -> Self {
        let scale = scale.unwrap_or_else(|| {
            rows.iter().fold(None, |acc: Option<(f64, f64)>, r| {
                Some(match acc {
                    None => (r.rating, r.rating),
                    Some((lo, hi)) => (lo.min(r.rating), hi.max(r.rating)),
                })
            })
            .unwrap_or((1.0, 5.0))
        });
        Self { rows, scale }
    }

    /// Load a matrix from a tab- or whitespace-separated file.
    ///
    /// A leading header line is skipped; other unparseable lines are
    /// dropped with a debug log. A missing file is the caller's fatal
    /// [`EngineError::DatasetUnavailable`].
    pub fn load(path: &Path, scale: Option<(f64, f64)>) -> Result<Self, EngineError> {
        if !path.exists() {
            return Err(EngineError::dataset_unavailable(path));
        }
        let file = std::fs::File::open(path)?;
        let reader = std::io::BufReader::new(file);

        let mut rows = Vec::new();
        let mut skipped = 0usize;
        for (index, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match parse_row(&line) {
                Some(row) => rows.push(row),
                // First line is commonly a header; anything else malformed
                // is dropped rather than failing the load.
                None => {
                    if index > 0 {
                        skipped += 1;
                    }
                }
            }
        }
        if skipped > 0 {
            debug!(path = %path.display(), skipped, "dropped malformed matrix rows");
        }
        Ok(Self::from_rows(rows, scale))
    }

    pub fn rows(&self) -> &[Rating] {
        &self.rows
    }

    pub fn scale(&self) -> (f64, f64) {
        self.scale
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Unique users, in first-seen order.
    pub fn users(&self) -> Vec<u64> {
        let mut seen = std::collections::HashSet::new();
        self.rows
            .iter()
            .filter(|r| seen.insert(r.user))
            .map(|r| r.user)
            .collect()
    }

    /// Unique items, in first-seen order.
    pub fn items(&self) -> Vec<u64> {
        let mut seen = std::collections::HashSet::new();
        self.rows
            .iter()
            .filter(|r| seen.insert(r.item))
            .map(|r| r.item)
            .collect()
    }

    /// (user, item) pairs in row order — the test pairs of a prediction
    /// experiment.
    pub fn pairs(&self) -> Vec<(u64, u64)> {
        self.rows.iter().map(|r| (r.user, r.item)).collect()
    }

    /// Mean of all ratings; zero for an empty matrix.
    pub fn global_mean(&self) -> f64 {
        if self.rows.is_empty() {
            return 0.0;
        }
        self.rows.iter().map(|r| r.rating).sum::<f64>() / self.rows.len() as f64
    }
}

fn parse_row(line: &str) -> Option<Rating> {
    let mut fields = line.split_whitespace();
    let user = fields.next()?.parse().ok()?;
    let item = fields.next()?.parse().ok()?;
    let rating = fields.next()?.parse().ok()?;
    let timestamp = fields.next().and_then(|f| f.parse().ok());
    Some(Rating {
        user,
        item,
        rating,
        timestamp,
    })
}

/// Collaborator supplying the matrix files of one dataset-matrix pair.
pub trait DataProvider: Send + Sync {
    fn train_path(&self) -> &Path;
    fn test_path(&self) -> &Path;
    /// Configured rating scale, if the dataset declares one.
    fn rating_scale(&self) -> Option<(f64, f64)>;
}

/// File-backed matrix source built from a dataset configuration entry.
#[derive(Debug, Clone)]
pub struct MatrixSource {
    pub dataset: String,
    pub matrix: String,
    pub train_path: PathBuf,
    pub test_path: PathBuf,
    pub rating_scale: Option<(f64, f64)>,
}

impl MatrixSource {
    pub fn from_config(config: &reckit_core::DatasetConfig) -> Self {
        Self {
            dataset: config.name.clone(),
            matrix: config.matrix.clone(),
            train_path: config.train_path.clone(),
            test_path: config.test_path.clone(),
            rating_scale: config.rating_scale,
        }
    }
}

impl DataProvider for MatrixSource {
    fn train_path(&self) -> &Path {
        &self.train_path
    }

    fn test_path(&self) -> &Path {
        &self.test_path
    }

    fn rating_scale(&self) -> Option<(f64, f64)> {
        self.rating_scale
    }
}
