//! Scenario ensembles for reduced-complexity climate emulators
//!
//! Each job runs every variant of one (model, scenario base) pair against the full set
//! of calibrated configurations and writes one result archive. Jobs are distributed over
//! a caller-owned thread pool by [`ensmip_core::dispatch::dispatch`].
//!
//! - `inputs`: tables shared by every job
//! - `forcing`: prescribed volcanic and solar forcing
//! - `scenario_run`: the per-job worker
//! - `manifest`: summary of a completed ensemble

pub mod forcing;
pub mod inputs;
pub mod manifest;
pub mod scenario_run;

use ensmip_core::dispatch::{dispatch, DispatchError};
use ensmip_core::errors::EnsembleError;
use ensmip_core::job::ScenarioJob;
use ensmip_core::model::ClimateModel;
use rayon::ThreadPool;
use scenario_run::ScenarioRunner;
use std::path::PathBuf;

/// Run every job of an ensemble on `pool`, returning the archive paths in job order
pub fn run_ensemble<M: ClimateModel>(
    runner: &ScenarioRunner<M>,
    jobs: &[ScenarioJob],
    pool: &ThreadPool,
) -> Result<Vec<PathBuf>, DispatchError<EnsembleError>> {
    let options = runner.inputs().config().ensemble.dispatch_options();
    dispatch(jobs, |job| runner.run(job), pool, options)
}
