//! Baseline algorithms and the registry bootstrap.
//!
//! These are the non-statistical reference points every experiment can
//! include: random scoring, per-user/per-item averages, and popularity
//! ranking. Real recommenders come from external provider adapters
//! registered into the same tree.

use crate::algorithms::{AlgorithmInstance, Predictor, Recommender, ScoredItem};
use crate::data::RatingMatrix;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use reckit_core::registry::{ComponentFactory, CreateContext, RegistryNode};
use reckit_core::{AlgorithmError, ParamSpec, ParameterSet, RegistryError};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

/// Splitmix64 gamma, used to decorrelate per-pair seeds.
const SEED_GAMMA: u64 = 0x9E37_79B9_7F4A_7C15;

fn seed_from_params(params: &BTreeMap<String, Value>) -> u64 {
    params
        .get("seed")
        .and_then(Value::as_u64)
        .unwrap_or_else(rand::random)
}

/// Uniform random rating predictor.
pub struct RandomPredictor {
    seed: u64,
    scale: (f64, f64),
}

impl RandomPredictor {
    pub fn new(seed: u64, scale: (f64, f64)) -> Self {
        Self { seed, scale }
    }
}

impl Predictor for RandomPredictor {
    fn train(&mut self, matrix: &RatingMatrix) -> Result<(), AlgorithmError> {
        self.scale = matrix.scale();
        Ok(())
    }

    fn predict(&self, user: u64, item: u64) -> Result<f64, AlgorithmError> {
        // Deterministic per (seed, user, item) so repeated runs agree.
        let mix = self
            .seed
            ^ user.wrapping_mul(SEED_GAMMA)
            ^ item.rotate_left(17).wrapping_mul(0xD1B5_4A32_D192_ED03);
        let mut rng = StdRng::seed_from_u64(mix);
        let (lo, hi) = self.scale;
        Ok(rng.gen_range(lo..=hi))
    }
}

/// Predicts each user's mean training rating, falling back to the global
/// mean for unseen users.
#[derive(Default)]
pub struct UserAvgPredictor {
    means: HashMap<u64, f64>,
    global: f64,
}

impl Predictor for UserAvgPredictor {
    fn train(&mut self, matrix: &RatingMatrix) -> Result<(), AlgorithmError> {
        let mut sums: HashMap<u64, (f64, usize)> = HashMap::new();
        for row in matrix.rows() {
            let entry = sums.entry(row.user).or_insert((0.0, 0));
            entry.0 += row.rating;
            entry.1 += 1;
        }
        self.means = sums
            .into_iter()
            .map(|(user, (sum, count))| (user, sum / count as f64))
            .collect();
        self.global = matrix.global_mean();
        Ok(())
    }

    fn predict(&self, user: u64, _item: u64) -> Result<f64, AlgorithmError> {
        Ok(self.means.get(&user).copied().unwrap_or(self.global))
    }
}

/// Predicts each item's mean training rating, falling back to the global
/// mean for unseen items.
#[derive(Default)]
pub struct ItemAvgPredictor {
    means: HashMap<u64, f64>,
    global: f64,
}

impl Predictor for ItemAvgPredictor {
    fn train(&mut self, matrix: &RatingMatrix) -> Result<(), AlgorithmError> {
        let mut sums: HashMap<u64, (f64, usize)> = HashMap::new();
        for row in matrix.rows() {
            let entry = sums.entry(row.item).or_insert((0.0, 0));
            entry.0 += row.rating;
            entry.1 += 1;
        }
        self.means = sums
            .into_iter()
            .map(|(item, (sum, count))| (item, sum / count as f64))
            .collect();
        self.global = matrix.global_mean();
        Ok(())
    }

    fn predict(&self, _user: u64, item: u64) -> Result<f64, AlgorithmError> {
        Ok(self.means.get(&item).copied().unwrap_or(self.global))
    }
}

/// Recommends uniformly random unseen items.
pub struct RandomRecommender {
    seed: u64,
    items: Vec<u64>,
    seen: HashMap<u64, HashSet<u64>>,
}

impl RandomRecommender {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            items: Vec::new(),
            seen: HashMap::new(),
        }
    }
}

impl Recommender for RandomRecommender {
    fn train(&mut self, matrix: &RatingMatrix) -> Result<(), AlgorithmError> {
        self.items = matrix.items();
        self.seen.clear();
        for row in matrix.rows() {
            self.seen.entry(row.user).or_default().insert(row.item);
        }
        Ok(())
    }

    fn recommend(&self, user: u64, k: usize) -> Result<Vec<ScoredItem>, AlgorithmError> {
        let seen = self.seen.get(&user);
        let candidates: Vec<u64> = self
            .items
            .iter()
            .copied()
            .filter(|item| seen.is_none_or(|s| !s.contains(item)))
            .collect();
        let mut rng = StdRng::seed_from_u64(self.seed ^ user.wrapping_mul(SEED_GAMMA));
        let picked: Vec<u64> = candidates.choose_multiple(&mut rng, k).copied().collect();
        Ok(picked
            .into_iter()
            .enumerate()
            .map(|(rank, item)| ScoredItem {
                item,
                score: 1.0 - rank as f64 / k.max(1) as f64,
            })
            .collect())
    }
}

/// Recommends the most-rated unseen items, scored by interaction count.
#[derive(Default)]
pub struct MostPopRecommender {
    ranked: Vec<(u64, usize)>,
    seen: HashMap<u64, HashSet<u64>>,
}

impl Recommender for MostPopRecommender {
    fn train(&mut self, matrix: &RatingMatrix) -> Result<(), AlgorithmError> {
        let mut counts: HashMap<u64, usize> = HashMap::new();
        self.seen.clear();
        for row in matrix.rows() {
            *counts.entry(row.item).or_insert(0) += 1;
            self.seen.entry(row.user).or_default().insert(row.item);
        }
        let mut ranked: Vec<(u64, usize)> = counts.into_iter().collect();
        // Count descending, item ascending for a stable ranking.
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        self.ranked = ranked;
        Ok(())
    }

    fn recommend(&self, user: u64, k: usize) -> Result<Vec<ScoredItem>, AlgorithmError> {
        let seen = self.seen.get(&user);
        Ok(self
            .ranked
            .iter()
            .filter(|(item, _)| seen.is_none_or(|s| !s.contains(item)))
            .take(k)
            .map(|&(item, count)| ScoredItem {
                item,
                score: count as f64,
            })
            .collect())
    }
}

struct RandomPredictorFactory;

impl ComponentFactory<AlgorithmInstance> for RandomPredictorFactory {
    fn name(&self) -> &str {
        "Random"
    }

    fn default_params(&self) -> ParameterSet {
        ParameterSet::new().with(ParamSpec::random_seed("seed"))
    }

    fn create(
        &self,
        params: &BTreeMap<String, Value>,
        ctx: &CreateContext,
    ) -> Result<AlgorithmInstance, AlgorithmError> {
        Ok(AlgorithmInstance::Predictor(Box::new(RandomPredictor::new(
            seed_from_params(params),
            ctx.rating_scale,
        ))))
    }
}

struct UserAvgFactory;

impl ComponentFactory<AlgorithmInstance> for UserAvgFactory {
    fn name(&self) -> &str {
        "UserAvg"
    }

    fn create(
        &self,
        _params: &BTreeMap<String, Value>,
        _ctx: &CreateContext,
    ) -> Result<AlgorithmInstance, AlgorithmError> {
        Ok(AlgorithmInstance::Predictor(Box::new(
            UserAvgPredictor::default(),
        )))
    }
}

struct ItemAvgFactory;

impl ComponentFactory<AlgorithmInstance> for ItemAvgFactory {
    fn name(&self) -> &str {
        "ItemAvg"
    }

    fn create(
        &self,
        _params: &BTreeMap<String, Value>,
        _ctx: &CreateContext,
    ) -> Result<AlgorithmInstance, AlgorithmError> {
        Ok(AlgorithmInstance::Predictor(Box::new(
            ItemAvgPredictor::default(),
        )))
    }
}

struct RandomRecommenderFactory;

impl ComponentFactory<AlgorithmInstance> for RandomRecommenderFactory {
    fn name(&self) -> &str {
        "Random"
    }

    fn default_params(&self) -> ParameterSet {
        ParameterSet::new().with(ParamSpec::random_seed("seed"))
    }

    fn create(
        &self,
        params: &BTreeMap<String, Value>,
        _ctx: &CreateContext,
    ) -> Result<AlgorithmInstance, AlgorithmError> {
        Ok(AlgorithmInstance::Recommender(Box::new(
            RandomRecommender::new(seed_from_params(params)),
        )))
    }
}

struct MostPopFactory;

impl ComponentFactory<AlgorithmInstance> for MostPopFactory {
    fn name(&self) -> &str {
        "MostPop"
    }

    fn create(
        &self,
        _params: &BTreeMap<String, Value>,
        _ctx: &CreateContext,
    ) -> Result<AlgorithmInstance, AlgorithmError> {
        Ok(AlgorithmInstance::Recommender(Box::new(
            MostPopRecommender::default(),
        )))
    }
}

/// Build the registry tree with every built-in algorithm registered:
/// experiment kind -> provider -> algorithms.
pub fn algorithm_registry() -> Result<RegistryNode<AlgorithmInstance>, RegistryError> {
    let mut root = RegistryNode::branch();
    root.register_at(&["prediction", "baseline"], Arc::new(RandomPredictorFactory))?;
    root.register_at(&["prediction", "baseline"], Arc::new(UserAvgFactory))?;
    root.register_at(&["prediction", "baseline"], Arc::new(ItemAvgFactory))?;
    root.register_at(
        &["recommendation", "baseline"],
        Arc::new(RandomRecommenderFactory),
    )?;
    root.register_at(&["recommendation", "baseline"], Arc::new(MostPopFactory))?;
    Ok(root)
}
