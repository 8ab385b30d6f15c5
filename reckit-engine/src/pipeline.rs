//! The model pipeline: train and test every configured model against one
//! train/test matrix pair.
//!
//! Fault isolation contract: a missing dataset kills the whole invocation
//! (nothing can be tested), but any single model's construction, training,
//! or testing failure only removes that model's partial output and moves
//! on to the next configuration.

use crate::algorithms::AlgorithmInstance;
use crate::data::{DataProvider, RatingMatrix};
use crate::error::EngineError;
use crate::output::{self, RatingsWriter};
use reckit_core::events::{EventContext, EventSink, Severity};
use reckit_core::registry::{CreateContext, RegistryNode};
use reckit_core::ObjectConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Test users/pairs processed per batch between cancellation checks.
pub const TEST_BATCH_SIZE: usize = 10_000;

/// A model configuration resolved within a provider namespace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedModel {
    pub provider: String,
    pub config: ObjectConfig,
}

enum ModelRun {
    Completed,
    Cancelled,
}

/// Drives training and batched testing of resolved models against one
/// dataset-matrix pair.
pub struct ModelPipeline<'a> {
    registry: &'a RegistryNode<AlgorithmInstance>,
    data: &'a dyn DataProvider,
    events: &'a dyn EventSink,
    top_k: usize,
    batch_size: usize,
    max_threads: usize,
}

impl<'a> ModelPipeline<'a> {
    /// `registry` is the node scoped to the experiment kind, with one
    /// child branch per provider.
    pub fn new(
        registry: &'a RegistryNode<AlgorithmInstance>,
        data: &'a dyn DataProvider,
        events: &'a dyn EventSink,
    ) -> Self {
        Self {
            registry,
            data,
            events,
            top_k: 10,
            batch_size: TEST_BATCH_SIZE,
            max_threads: 0,
        }
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_max_threads(mut self, max_threads: usize) -> Self {
        self.max_threads = max_threads;
        self
    }

    /// Train and test each model in configuration order.
    ///
    /// Returns the output directories of the models that completed, in
    /// that same order. `is_running` is polled before each model and
    /// between test batches; when it turns false the pipeline removes any
    /// half-written model output and returns what was finished so far.
    pub fn run(
        &self,
        output_root: &Path,
        models: &[ResolvedModel],
        is_running: &dyn Fn() -> bool,
    ) -> Result<Vec<PathBuf>, EngineError> {
        let train = RatingMatrix::load(self.data.train_path(), self.data.rating_scale())?;
        let test = RatingMatrix::load(self.data.test_path(), self.data.rating_scale())?;
        info!(
            train_rows = train.len(),
            test_rows = test.len(),
            "loaded train/test matrices"
        );
        let test_users = test.users();
        let test_pairs = test.pairs();
        let ctx = CreateContext {
            max_threads: self.max_threads,
            rating_scale: train.scale(),
        };

        let mut produced = Vec::new();
        let mut taken = HashSet::new();
        for model in models {
            if !is_running() {
                info!("pipeline stopped before next model");
                break;
            }
            let name = model.config.name.as_str();

            let Some(node) = self.registry.resolve(&[model.provider.as_str()]) else {
                self.events.emit(
                    Severity::Warning,
                    &format!("unknown provider '{}'; skipping '{name}'", model.provider),
                    &EventContext::component("model", name),
                );
                continue;
            };
            let instance = match node.create(name, &model.config.params, &ctx) {
                None => {
                    self.events.emit(
                        Severity::Warning,
                        &format!(
                            "unknown model '{name}' in provider '{}'; skipping",
                            model.provider
                        ),
                        &EventContext::component("model", name),
                    );
                    continue;
                }
                Some(Err(e)) => {
                    self.events.emit(
                        Severity::Error,
                        &format!("failed to construct '{name}': {e}"),
                        &EventContext::component("model", name),
                    );
                    continue;
                }
                Some(Ok(instance)) => instance,
            };

            let dir = output::allocate_model_dir(output_root, name, &mut taken)?;
            match self.run_model(&dir, model, instance, &train, &test_users, &test_pairs, is_running)
            {
                Ok(ModelRun::Completed) => produced.push(dir),
                Ok(ModelRun::Cancelled) => {
                    remove_model_output(&dir);
                    break;
                }
                Err(e) => {
                    self.events.emit(
                        Severity::Error,
                        &format!("model '{name}' failed: {e}"),
                        &EventContext::component("model", name),
                    );
                    remove_model_output(&dir);
                }
            }
        }
        Ok(produced)
    }

    #[allow(clippy::too_many_arguments)]
    fn run_model(
        &self,
        dir: &Path,
        model: &ResolvedModel,
        mut instance: AlgorithmInstance,
        train: &RatingMatrix,
        test_users: &[u64],
        test_pairs: &[(u64, u64)],
        is_running: &dyn Fn() -> bool,
    ) -> Result<ModelRun, EngineError> {
        info!(model = %model.config.name, "training model");
        instance.train(train)?;
        output::write_settings(dir, &model.config)?;

        let ratings_path = dir.join("ratings.tsv");
        match &instance {
            AlgorithmInstance::Predictor(predictor) => {
                let mut writer = RatingsWriter::predictions(&ratings_path)?;
                for batch in test_pairs.chunks(self.batch_size) {
                    if !is_running() {
                        return Ok(ModelRun::Cancelled);
                    }
                    debug!(model = %model.config.name, batch = batch.len(), "scoring batch");
                    let scores = predictor.predict_batch(batch)?;
                    writer.append_predictions(batch, &scores)?;
                }
                writer.finish()?;
            }
            AlgorithmInstance::Recommender(recommender) => {
                let mut writer = RatingsWriter::recommendations(&ratings_path)?;
                for batch in test_users.chunks(self.batch_size) {
                    if !is_running() {
                        return Ok(ModelRun::Cancelled);
                    }
                    debug!(model = %model.config.name, batch = batch.len(), "recommending batch");
                    let recs = recommender.recommend_batch(batch, self.top_k)?;
                    writer.append_recommendations(&recs)?;
                }
                writer.finish()?;
            }
        }
        info!(model = %model.config.name, dir = %dir.display(), "model output complete");
        Ok(ModelRun::Completed)
    }
}

/// Best-effort removal of a failed or cancelled model's partial output.
fn remove_model_output(dir: &Path) {
    if let Err(e) = std::fs::remove_dir_all(dir) {
        warn!(dir = %dir.display(), error = %e, "failed to remove partial model output");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithms::{baselines, Predictor};
    use crate::data::MatrixSource;
    use reckit_core::error::AlgorithmError;
    use reckit_core::events::MemorySink;
    use reckit_core::registry::ComponentFactory;
    use serde_json::Value;
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// A predictor whose training always fails.
    struct ExplodingPredictor;

    impl Predictor for ExplodingPredictor {
        fn train(&mut self, _matrix: &RatingMatrix) -> Result<(), AlgorithmError> {
            Err(AlgorithmError::training("Exploding", "numerical overflow"))
        }

        fn predict(&self, _user: u64, _item: u64) -> Result<f64, AlgorithmError> {
            Ok(0.0)
        }
    }

    struct ExplodingFactory;

    impl ComponentFactory<AlgorithmInstance> for ExplodingFactory {
        fn name(&self) -> &str {
            "Exploding"
        }

        fn create(
            &self,
            _params: &BTreeMap<String, Value>,
            _ctx: &CreateContext,
        ) -> Result<AlgorithmInstance, AlgorithmError> {
            Ok(AlgorithmInstance::Predictor(Box::new(ExplodingPredictor)))
        }
    }

    fn test_registry() -> RegistryNode<AlgorithmInstance> {
        let mut root = baselines::algorithm_registry().unwrap();
        root.register_at(&["prediction", "test"], Arc::new(ExplodingFactory))
            .unwrap();
        root
    }

    fn write_dataset(dir: &Path) -> MatrixSource {
        let train_path = dir.join("train.tsv");
        let test_path = dir.join("test.tsv");
        std::fs::write(
            &train_path,
            "1\t10\t4.0\n1\t20\t2.0\n2\t10\t5.0\n2\t30\t3.0\n3\t10\t1.0\n",
        )
        .unwrap();
        std::fs::write(&test_path, "1\t30\t3.0\n2\t20\t4.0\n3\t20\t2.0\n").unwrap();
        MatrixSource {
            dataset: "tiny".into(),
            matrix: "user-item-rating".into(),
            train_path,
            test_path,
            rating_scale: Some((1.0, 5.0)),
        }
    }

    fn model(provider: &str, name: &str) -> ResolvedModel {
        ResolvedModel {
            provider: provider.into(),
            config: ObjectConfig::new(name),
        }
    }

    #[test]
    fn test_prediction_models_produce_ordered_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let source = write_dataset(dir.path());
        let registry = test_registry();
        let node = registry.resolve(&["prediction"]).unwrap();
        let sink = MemorySink::new();
        let pipeline = ModelPipeline::new(node, &source, &sink);

        let models = vec![model("baseline", "UserAvg"), model("baseline", "ItemAvg")];
        let out = dir.path().join("out");
        let produced = pipeline.run(&out, &models, &|| true).unwrap();

        assert_eq!(produced.len(), 2);
        assert_eq!(produced[0].file_name().unwrap(), "UserAvg");
        assert_eq!(produced[1].file_name().unwrap(), "ItemAvg");
        for dir in &produced {
            assert!(dir.join("ratings.tsv").exists());
            assert!(dir.join("settings.json").exists());
        }
        // Header plus one row per test pair.
        let ratings = std::fs::read_to_string(produced[0].join("ratings.tsv")).unwrap();
        assert_eq!(ratings.lines().count(), 4);
    }

    #[test]
    fn test_failing_model_is_isolated() {
        let dir = tempfile::tempdir().unwrap();
        let source = write_dataset(dir.path());
        let registry = test_registry();
        let node = registry.resolve(&["prediction"]).unwrap();
        let sink = MemorySink::new();
        let pipeline = ModelPipeline::new(node, &source, &sink);

        let models = vec![
            model("baseline", "UserAvg"),
            model("test", "Exploding"),
            model("baseline", "ItemAvg"),
        ];
        let out = dir.path().join("out");
        let produced = pipeline.run(&out, &models, &|| true).unwrap();

        assert_eq!(produced.len(), 2);
        assert_eq!(produced[0].file_name().unwrap(), "UserAvg");
        assert_eq!(produced[1].file_name().unwrap(), "ItemAvg");
        // The failed model's directory is gone.
        assert!(!out.join("Exploding").exists());
        assert_eq!(sink.count_at_least(Severity::Error), 1);
    }

    #[test]
    fn test_unknown_model_is_skipped_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let source = write_dataset(dir.path());
        let registry = test_registry();
        let node = registry.resolve(&["prediction"]).unwrap();
        let sink = MemorySink::new();
        let pipeline = ModelPipeline::new(node, &source, &sink);

        let models = vec![model("baseline", "Nope"), model("baseline", "UserAvg")];
        let out = dir.path().join("out");
        let produced = pipeline.run(&out, &models, &|| true).unwrap();

        assert_eq!(produced.len(), 1);
        assert!(sink.events()[0].message.contains("unknown model 'Nope'"));
    }

    #[test]
    fn test_duplicate_model_names_get_separate_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let source = write_dataset(dir.path());
        let registry = test_registry();
        let node = registry.resolve(&["prediction"]).unwrap();
        let sink = MemorySink::new();
        let pipeline = ModelPipeline::new(node, &source, &sink);

        let models = vec![model("baseline", "UserAvg"), model("baseline", "UserAvg")];
        let out = dir.path().join("out");
        let produced = pipeline.run(&out, &models, &|| true).unwrap();

        assert_eq!(produced.len(), 2);
        assert_eq!(produced[0].file_name().unwrap(), "UserAvg");
        assert_eq!(produced[1].file_name().unwrap(), "UserAvg_2");
    }

    #[test]
    fn test_missing_train_set_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let mut source = write_dataset(dir.path());
        source.train_path = dir.path().join("gone.tsv");
        let registry = test_registry();
        let node = registry.resolve(&["prediction"]).unwrap();
        let sink = MemorySink::new();
        let pipeline = ModelPipeline::new(node, &source, &sink);

        let err = pipeline
            .run(&dir.path().join("out"), &[model("baseline", "UserAvg")], &|| true)
            .unwrap_err();
        assert!(matches!(err, EngineError::DatasetUnavailable { .. }));
    }

    #[test]
    fn test_cancellation_before_third_model() {
        let dir = tempfile::tempdir().unwrap();
        let source = write_dataset(dir.path());
        let registry = test_registry();
        let node = registry.resolve(&["prediction"]).unwrap();
        let sink = MemorySink::new();
        let pipeline = ModelPipeline::new(node, &source, &sink).with_batch_size(1000);

        // Each model sees one pre-model check and one batch check (the
        // test set fits a single batch), so the fifth poll is the
        // pre-model check of model index 2.
        let polls = AtomicUsize::new(0);
        let is_running = || polls.fetch_add(1, Ordering::SeqCst) + 1 < 5;

        let models = vec![
            model("baseline", "UserAvg"),
            model("baseline", "ItemAvg"),
            model("baseline", "Random"),
        ];
        let out = dir.path().join("out");
        let produced = pipeline.run(&out, &models, &is_running).unwrap();

        assert_eq!(produced.len(), 2);
        assert!(!out.join("Random").exists());
    }

    #[test]
    fn test_cancelled_mid_model_removes_partial_output() {
        let dir = tempfile::tempdir().unwrap();
        let source = write_dataset(dir.path());
        let registry = test_registry();
        let node = registry.resolve(&["prediction"]).unwrap();
        let sink = MemorySink::new();
        let pipeline = ModelPipeline::new(node, &source, &sink);

        // True for the pre-model check, false for the first batch check.
        let polls = AtomicUsize::new(0);
        let is_running = || polls.fetch_add(1, Ordering::SeqCst) == 0;

        let out = dir.path().join("out");
        let produced = pipeline
            .run(&out, &[model("baseline", "UserAvg")], &is_running)
            .unwrap();

        assert!(produced.is_empty());
        assert!(!out.join("UserAvg").exists());
    }

    #[test]
    fn test_recommendation_models_write_topk_lists() {
        let dir = tempfile::tempdir().unwrap();
        let source = write_dataset(dir.path());
        let registry = test_registry();
        let node = registry.resolve(&["recommendation"]).unwrap();
        let sink = MemorySink::new();
        let pipeline = ModelPipeline::new(node, &source, &sink).with_top_k(2);

        let out = dir.path().join("out");
        let produced = pipeline
            .run(&out, &[model("baseline", "MostPop")], &|| true)
            .unwrap();

        assert_eq!(produced.len(), 1);
        let ratings = std::fs::read_to_string(produced[0].join("ratings.tsv")).unwrap();
        let mut lines = ratings.lines();
        assert_eq!(lines.next(), Some("user\titem\trank\tscore"));
        // Three test users, up to two recommendations each.
        assert!(ratings.lines().count() > 1);
    }
}
