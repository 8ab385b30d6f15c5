//! Algorithm capability contracts and the baseline implementations.
//!
//! The engine treats an algorithm as an opaque instance behind one of two
//! capability traits: predictors score (user, item) pairs, recommenders
//! produce ranked top-k lists. An instance is owned exclusively by the
//! pipeline invocation that created it and discarded after its test phase.

pub mod baselines;

pub use baselines::algorithm_registry;

use crate::data::RatingMatrix;
use reckit_core::AlgorithmError;
use reckit_core::ExperimentKind;
use serde::Serialize;

/// A ranked recommendation entry.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScoredItem {
    pub item: u64,
    pub score: f64,
}

/// Rating-prediction capability.
pub trait Predictor: Send {
    fn train(&mut self, matrix: &RatingMatrix) -> Result<(), AlgorithmError>;

    fn predict(&self, user: u64, item: u64) -> Result<f64, AlgorithmError>;

    fn predict_batch(&self, pairs: &[(u64, u64)]) -> Result<Vec<f64>, AlgorithmError> {
        pairs.iter().map(|&(u, i)| self.predict(u, i)).collect()
    }
}

/// Top-k recommendation capability.
pub trait Recommender: Send {
    fn train(&mut self, matrix: &RatingMatrix) -> Result<(), AlgorithmError>;

    fn recommend(&self, user: u64, k: usize) -> Result<Vec<ScoredItem>, AlgorithmError>;

    fn recommend_batch(
        &self,
        users: &[u64],
        k: usize,
    ) -> Result<Vec<(u64, Vec<ScoredItem>)>, AlgorithmError> {
        users
            .iter()
            .map(|&u| self.recommend(u, k).map(|items| (u, items)))
            .collect()
    }
}

/// A constructed algorithm, tagged by capability.
pub enum AlgorithmInstance {
    Predictor(Box<dyn Predictor>),
    Recommender(Box<dyn Recommender>),
}

impl AlgorithmInstance {
    pub fn train(&mut self, matrix: &RatingMatrix) -> Result<(), AlgorithmError> {
        match self {
            Self::Predictor(p) => p.train(matrix),
            Self::Recommender(r) => r.train(matrix),
        }
    }

    /// The experiment kind this instance serves.
    pub fn kind(&self) -> ExperimentKind {
        match self {
            Self::Predictor(_) => ExperimentKind::Prediction,
            Self::Recommender(_) => ExperimentKind::Recommendation,
        }
    }
}
