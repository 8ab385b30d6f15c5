//! Experiment orchestration.
//!
//! Resolves the configured models against the registry, then drives one
//! [`ModelPipeline`] per dataset-matrix pair inside a background run,
//! collecting every produced model output into the run's `overview.json`.

use crate::algorithms::AlgorithmInstance;
use crate::data::MatrixSource;
use crate::error::{EngineError, RunError};
use crate::output::{self, ModelOutputRecord, RunOverview};
use crate::pipeline::{ModelPipeline, ResolvedModel};
use crate::run::{RunManager, RunSignal};
use reckit_core::events::{EventContext, EventSink, Severity};
use reckit_core::registry::RegistryNode;
use reckit_core::resolve::resolve_object_list;
use reckit_core::ExperimentConfig;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info};

/// A fully wired experiment, ready to execute or to spawn as a
/// background run.
pub struct Experiment {
    config: ExperimentConfig,
    registry: Arc<RegistryNode<AlgorithmInstance>>,
    events: Arc<dyn EventSink>,
}

impl Experiment {
    pub fn new(
        config: ExperimentConfig,
        registry: Arc<RegistryNode<AlgorithmInstance>>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            config,
            registry,
            events,
        }
    }

    pub fn config(&self) -> &ExperimentConfig {
        &self.config
    }

    /// Resolve every configured model entry against its provider branch.
    ///
    /// Unknown providers and unresolvable entries are skipped with
    /// diagnostics; the returned list preserves configuration order
    /// within each provider.
    pub fn resolve_models(&self) -> Vec<ResolvedModel> {
        let kind = self.config.kind.as_str();
        let Some(kind_node) = self.registry.resolve(&[kind]) else {
            self.events.emit(
                Severity::Error,
                &format!("registry has no '{kind}' namespace"),
                &EventContext::category("model"),
            );
            return Vec::new();
        };

        let mut models = Vec::new();
        for (provider, entries) in &self.config.models {
            let Some(node) = kind_node.resolve(&[provider.as_str()]) else {
                self.events.emit(
                    Severity::Warning,
                    &format!(
                        "unknown provider '{provider}' for {kind} experiments, available: {:?}",
                        kind_node.list_names()
                    ),
                    &EventContext::category("model"),
                );
                continue;
            };
            for (config, _raw) in
                resolve_object_list("model", provider, entries, node, self.events.as_ref())
            {
                models.push(ResolvedModel {
                    provider: provider.clone(),
                    config,
                });
            }
        }
        if models.is_empty() {
            self.events.emit(
                Severity::Error,
                "no models could be resolved from the configuration",
                &EventContext::category("model"),
            );
        }
        models
    }

    /// Execute the experiment in the calling thread.
    ///
    /// Allocates the next `run_<N>` directory under
    /// `<result_dir>/<experiment>`, runs every dataset-matrix pair that
    /// the signal allows, and writes `overview.json`. A dataset whose
    /// matrices are unreadable is reported and skipped; the run itself
    /// always completes with whatever was produced.
    pub fn execute(&self, result_dir: &Path, signal: &RunSignal) -> Result<RunOverview, EngineError> {
        let models = self.resolve_models();
        let run_dir = output::allocate_run_dir(&result_dir.join(&self.config.name))?;
        info!(run_dir = %run_dir.display(), models = models.len(), "starting experiment run");

        let mut overview = RunOverview::new(
            &self.config.name,
            self.config.kind,
            self.config.evaluation.clone(),
        );

        let kind_node = self.registry.resolve(&[self.config.kind.as_str()]);
        if let Some(kind_node) = kind_node.filter(|_| !models.is_empty()) {
            for dataset in &self.config.datasets {
                if !signal.is_running() {
                    info!(run = %self.config.name, "experiment stopped before next dataset");
                    break;
                }
                let source = MatrixSource::from_config(dataset);
                let matrix_root = run_dir.join(&dataset.name).join(&dataset.matrix);
                let pipeline = ModelPipeline::new(kind_node, &source, self.events.as_ref())
                    .with_top_k(self.config.top_k)
                    .with_max_threads(self.config.max_threads);

                match pipeline.run(&matrix_root, &models, &|| signal.is_running()) {
                    Ok(dirs) => {
                        for dir in dirs {
                            let model = dir
                                .file_name()
                                .map(|n| n.to_string_lossy().into_owned())
                                .unwrap_or_default();
                            overview.push(ModelOutputRecord {
                                dataset: dataset.name.clone(),
                                matrix: dataset.matrix.clone(),
                                model,
                                dir,
                            });
                        }
                    }
                    Err(e) => {
                        // Fatal for this dataset-matrix pair only.
                        self.events.emit(
                            Severity::Error,
                            &format!(
                                "dataset '{}/{}' failed: {e}",
                                dataset.name, dataset.matrix
                            ),
                            &EventContext::run(&self.config.name),
                        );
                    }
                }
            }
        }

        overview.save(&run_dir)?;
        info!(
            run = %self.config.name,
            produced = overview.models.len(),
            "experiment run complete"
        );
        Ok(overview)
    }

    /// Spawn this experiment as a background run named after it.
    pub fn spawn(self, manager: &RunManager, result_dir: PathBuf) -> Result<(), RunError> {
        self.spawn_with_callback(manager, result_dir, |_| {})
    }

    /// Spawn as a background run, with a completion callback.
    pub fn spawn_with_callback<C>(
        self,
        manager: &RunManager,
        result_dir: PathBuf,
        on_done: C,
    ) -> Result<(), RunError>
    where
        C: FnOnce(&str) + Send + 'static,
    {
        let name = self.config.name.clone();
        manager.start_with_callback(
            &name,
            move |signal| {
                if let Err(e) = self.execute(&result_dir, &signal) {
                    error!(run = %self.config.name, error = %e, "experiment run failed");
                }
            },
            on_done,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithms::baselines::algorithm_registry;
    use pretty_assertions::assert_eq;
    use reckit_core::events::MemorySink;
    use serde_json::json;
    use std::sync::mpsc;
    use std::time::Duration;

    fn sample_config(dir: &Path) -> ExperimentConfig {
        let train_path = dir.join("train.tsv");
        let test_path = dir.join("test.tsv");
        std::fs::write(
            &train_path,
            "1\t10\t4.0\n1\t20\t2.0\n2\t10\t5.0\n2\t30\t3.0\n3\t10\t1.0\n",
        )
        .unwrap();
        std::fs::write(&test_path, "1\t30\t3.0\n2\t20\t4.0\n3\t20\t2.0\n").unwrap();

        serde_json::from_value(json!({
            "name": "baseline-check",
            "type": "recommendation",
            "top_k": 2,
            "datasets": [{
                "name": "tiny",
                "train_path": train_path,
                "test_path": test_path,
                "rating_scale": [1.0, 5.0]
            }],
            "models": {
                "baseline": [
                    {"name": "Random", "params": {"seed": 42}},
                    {"name": "MostPop"}
                ]
            },
            "evaluation": [{"name": "NDCG", "params": {"k": 2}}]
        }))
        .unwrap()
    }

    fn experiment(config: ExperimentConfig, sink: Arc<MemorySink>) -> Experiment {
        Experiment::new(config, Arc::new(algorithm_registry().unwrap()), sink)
    }

    #[test]
    fn test_resolve_models_validates_params() {
        let dir = tempfile::tempdir().unwrap();
        let sink = Arc::new(MemorySink::new());
        let exp = experiment(sample_config(dir.path()), Arc::clone(&sink));

        let models = exp.resolve_models();
        assert_eq!(models.len(), 2);
        assert_eq!(models[0].config.name, "Random");
        assert_eq!(models[0].config.params["seed"], json!(42));
        assert_eq!(models[1].config.name, "MostPop");
        assert!(models[1].config.params.is_empty());
    }

    #[test]
    fn test_unknown_provider_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = sample_config(dir.path());
        config
            .models
            .insert("lenskit".into(), vec![json!({"name": "ImplicitMF"})]);
        let sink = Arc::new(MemorySink::new());
        let exp = experiment(config, Arc::clone(&sink));

        let models = exp.resolve_models();
        assert_eq!(models.len(), 2);
        assert!(sink
            .events()
            .iter()
            .any(|e| e.message.contains("unknown provider 'lenskit'")));
    }

    #[test]
    fn test_execute_produces_run_layout() {
        let dir = tempfile::tempdir().unwrap();
        let sink = Arc::new(MemorySink::new());
        let exp = experiment(sample_config(dir.path()), Arc::clone(&sink));
        let results = dir.path().join("results");

        let overview = exp.execute(&results, &RunSignal::new()).unwrap();

        let run_dir = results.join("baseline-check").join("run_0");
        assert!(run_dir.join("overview.json").exists());
        assert_eq!(overview.models.len(), 2);
        assert_eq!(overview.models[0].model, "Random");
        assert_eq!(overview.models[1].model, "MostPop");
        let model_dir = run_dir.join("tiny").join("user-item-rating").join("MostPop");
        assert!(model_dir.join("ratings.tsv").exists());
        assert!(model_dir.join("settings.json").exists());
        assert_eq!(overview.evaluation.len(), 1);
    }

    #[test]
    fn test_repeated_execution_allocates_new_run_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let sink = Arc::new(MemorySink::new());
        let exp = experiment(sample_config(dir.path()), Arc::clone(&sink));
        let results = dir.path().join("results");

        exp.execute(&results, &RunSignal::new()).unwrap();
        exp.execute(&results, &RunSignal::new()).unwrap();

        assert!(results.join("baseline-check").join("run_0").exists());
        assert!(results.join("baseline-check").join("run_1").exists());
    }

    #[test]
    fn test_unreadable_dataset_is_reported_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = sample_config(dir.path());
        config.datasets[0].train_path = dir.path().join("gone.tsv");
        let sink = Arc::new(MemorySink::new());
        let exp = experiment(config, Arc::clone(&sink));

        let overview = exp
            .execute(&dir.path().join("results"), &RunSignal::new())
            .unwrap();
        assert!(overview.models.is_empty());
        assert!(sink
            .events()
            .iter()
            .any(|e| e.message.contains("Dataset unavailable")));
    }

    #[test]
    fn test_spawned_experiment_completes_in_background() {
        let dir = tempfile::tempdir().unwrap();
        let sink = Arc::new(MemorySink::new());
        let exp = experiment(sample_config(dir.path()), sink);
        let results = dir.path().join("results");
        let manager = RunManager::new();
        let (tx, rx) = mpsc::channel();

        exp.spawn_with_callback(&manager, results.clone(), move |name| {
            tx.send(name.to_string()).unwrap();
        })
        .unwrap();

        assert_eq!(
            rx.recv_timeout(Duration::from_secs(5)).unwrap(),
            "baseline-check"
        );
        assert!(results.join("baseline-check").join("run_0").exists());
        assert!(!manager.is_active("baseline-check"));
    }
}
