//! # reckit-engine — model pipelines and background experiment runs
//!
//! Consumes the generic registry/resolution core and adds everything an
//! experiment run needs at execution time:
//!
//! - **Data** — `(user, item, rating[, timestamp])` matrix loading and the
//!   per-dataset provider collaborator.
//! - **Algorithms** — the predictor/recommender capability seam plus the
//!   baseline implementations behind the registry bootstrap.
//! - **Pipeline** — per-model train/test with fault isolation, batched
//!   testing, and cooperative cancellation.
//! - **Runs** — one background OS thread per experiment, tracked and
//!   stoppable by name, with per-run `run_<N>` output directories.

pub mod algorithms;
pub mod data;
pub mod error;
pub mod experiment;
pub mod output;
pub mod pipeline;
pub mod run;

pub use algorithms::{algorithm_registry, AlgorithmInstance, Predictor, Recommender, ScoredItem};
pub use data::{DataProvider, MatrixSource, Rating, RatingMatrix};
pub use error::{EngineError, Result, RunError};
pub use experiment::Experiment;
pub use output::{ModelOutputRecord, RunOverview};
pub use pipeline::{ModelPipeline, ResolvedModel, TEST_BATCH_SIZE};
pub use run::{RunManager, RunSignal, RunStatus};
