//! Run a scenario ensemble with the reference emulator
//!
//! # Usage
//!
//! ```bash
//! RUST_LOG=info cargo run --release --bin run-ensemble -- \
//!   --config ensemble.toml \
//!   --scenarios 2 --configs 10 --front-serial 1
//! ```

use clap::Parser;
use ensmip::inputs::EnsembleInputs;
use ensmip::manifest::Manifest;
use ensmip::run_ensemble;
use ensmip::scenario_run::ScenarioRunner;
use ensmip_components::ReferenceEmulator;
use ensmip_core::config::EnsembleConfig;
use ensmip_core::datasets::DatasetRegistry;
use ensmip_core::errors::EnsembleError;
use std::error::Error;
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Run every (model, scenario base) job of a scenario ensemble
#[derive(Parser, Debug)]
#[command(name = "run-ensemble")]
#[command(about = "Run a climate emulator over an ensemble of emissions scenarios")]
struct Args {
    /// TOML configuration file, defaults are used when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Number of worker threads
    #[arg(short, long)]
    workers: Option<usize>,

    /// Maximum number of (model, scenario base) jobs
    #[arg(long)]
    scenarios: Option<usize>,

    /// Number of calibrated configurations per scenario
    #[arg(long)]
    configs: Option<usize>,

    /// Jobs run on the calling thread before the pool is used
    #[arg(long)]
    front_serial: Option<usize>,

    /// Jobs run on the pool one at a time after the serial front
    #[arg(long)]
    front_parallel: Option<usize>,

    /// Directory the result archives are written to
    #[arg(long)]
    results_dir: Option<PathBuf>,

    /// Do not verify the checksums of the input datasets
    #[arg(long)]
    skip_verify: bool,
}

impl Args {
    fn apply(&self, config: &mut EnsembleConfig) {
        let ensemble = &mut config.ensemble;
        if let Some(workers) = self.workers {
            ensemble.n_workers = workers;
        }
        if let Some(scenarios) = self.scenarios {
            ensemble.n_scenarios = scenarios;
        }
        if let Some(configs) = self.configs {
            ensemble.n_configs = configs;
        }
        if let Some(front_serial) = self.front_serial {
            ensemble.front_serial = front_serial;
        }
        if let Some(front_parallel) = self.front_parallel {
            ensemble.front_parallel = front_parallel;
        }
        if let Some(results_dir) = &self.results_dir {
            config.paths.results_dir = results_dir.clone();
        }
    }
}

/// Log an error and every error that caused it
fn report(err: &dyn Error) {
    error!("{}", err);
    let mut source = err.source();
    while let Some(cause) = source {
        error!("  caused by: {}", cause);
        source = cause.source();
    }
}

fn load_config(args: &Args) -> Result<EnsembleConfig, EnsembleError> {
    let mut config = match &args.config {
        Some(path) => EnsembleConfig::from_file(path)?,
        None => EnsembleConfig::default(),
    };
    args.apply(&mut config);
    config.validate()?;
    Ok(config)
}

fn run(args: &Args) -> Result<(), Box<dyn Error>> {
    let config = load_config(args)?;

    if args.skip_verify {
        warn!("skipping dataset verification");
    } else {
        DatasetRegistry::new(&config.paths.data_dir, config.datasets.clone()).verify_all()?;
    }

    let inputs = Arc::new(EnsembleInputs::load(&config)?);
    let jobs = inputs.jobs();
    let results_dir = config.paths.results_dir.clone();
    fs::create_dir_all(&results_dir).map_err(|e| EnsembleError::io(&results_dir, e))?;

    info!(
        jobs = jobs.len(),
        workers = config.ensemble.n_workers,
        results_dir = %results_dir.display(),
        "running ensemble"
    );

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.ensemble.n_workers)
        .thread_name(|i| format!("ensmip-worker-{}", i))
        .build()?;
    let runner = ScenarioRunner::new(Arc::clone(&inputs), ReferenceEmulator::new(), &results_dir);
    let result = run_ensemble(&runner, &jobs, &pool);
    drop(pool);

    let archives = result?;
    let manifest = Manifest::new(
        inputs.calibration().len(),
        config.scenario.variants.clone(),
        &jobs,
        &archives,
    )
    .write(&results_dir)?;
    info!(manifest = %manifest.display(), "ensemble complete");
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            report(e.as_ref());
            ExitCode::FAILURE
        }
    }
}
