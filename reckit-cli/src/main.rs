//! reckit CLI — run, validate, and introspect recommender experiments.

use anyhow::Context;
use clap::Parser;
use reckit_core::events::{EventSink, MemorySink, TracingSink};
use reckit_core::{ExperimentConfig, Severity};
use reckit_engine::{algorithm_registry, Experiment, RunManager};
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// reckit: recommender-system experimentation harness
#[derive(Parser, Debug)]
#[command(name = "reckit", version, about, long_about = None)]
struct Cli {
    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Execute an experiment configuration as a background run
    Run {
        /// Experiment configuration file (YAML or JSON)
        config: PathBuf,

        /// Directory experiment results are written under
        #[arg(short, long, default_value = "results")]
        result_dir: PathBuf,
    },
    /// Resolve an experiment configuration and report its diagnostics
    Validate {
        /// Experiment configuration file (YAML or JSON)
        config: PathBuf,
    },
    /// List the available algorithms per experiment kind and provider
    List,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Run { config, result_dir } => run(&config, result_dir),
        Commands::Validate { config } => validate(&config),
        Commands::List => list(),
    }
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("reckit={default_level}")));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn load_config(path: &Path) -> anyhow::Result<ExperimentConfig> {
    let config = if path.extension().is_some_and(|ext| ext == "json") {
        ExperimentConfig::from_json_file(path)
    } else {
        ExperimentConfig::from_yaml_file(path)
    };
    config.with_context(|| format!("failed to load experiment config {}", path.display()))
}

fn run(config_path: &Path, result_dir: PathBuf) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let name = config.name.clone();
    let registry = Arc::new(algorithm_registry()?);
    let experiment = Experiment::new(config, registry, Arc::new(TracingSink));

    let manager = RunManager::new();
    let (tx, rx) = mpsc::channel();
    experiment
        .spawn_with_callback(&manager, result_dir.clone(), move |done| {
            let _ = tx.send(done.to_string());
        })
        .context("failed to start experiment run")?;

    println!("started run '{name}'");
    let finished = rx.recv().context("run worker disappeared")?;
    println!(
        "run '{finished}' complete; results under {}",
        result_dir.join(&finished).display()
    );
    Ok(())
}

fn validate(config_path: &Path) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let registry = Arc::new(algorithm_registry()?);
    let sink = Arc::new(MemorySink::new());
    let experiment =
        Experiment::new(config, registry, Arc::clone(&sink) as Arc<dyn EventSink>);

    let models = experiment.resolve_models();
    println!("resolved {} model(s):", models.len());
    for model in &models {
        println!(
            "  {}/{}  {}",
            model.provider,
            model.config.name,
            serde_json::to_string(&model.config.params)?
        );
    }

    let events = sink.events();
    if events.is_empty() {
        println!("no diagnostics");
    } else {
        println!("{} diagnostic(s):", events.len());
        for event in &events {
            println!("  [{:?}] {}", event.severity, event.message);
        }
    }
    if models.is_empty() || sink.count_at_least(Severity::Error) > 0 {
        anyhow::bail!("configuration did not validate cleanly");
    }
    Ok(())
}

fn list() -> anyhow::Result<()> {
    let registry = algorithm_registry()?;
    println!("{}", serde_json::to_string_pretty(&registry.available())?);
    Ok(())
}
