//! Inputs shared by every job of an ensemble
//!
//! Everything is read once up front and then shared read-only between the workers,
//! usually behind an `Arc`.

use crate::forcing::{prescribed_forcing, solar_forcing, solar_trend_shape, volcanic_forcing};
use ensmip_core::config::EnsembleConfig;
use ensmip_core::errors::EnsembleResult;
use ensmip_core::job::{ScenarioJob, ScenarioTable};
use ensmip_core::model::TimeAxis;
use ensmip_core::tabular::{AnnualSeries, CalibrationSet, EmissionsTable};
use indexmap::IndexMap;
use ndarray::Array2;
use tracing::info;

/// Column names of the forcing records
const YEAR_COLUMN: &str = "year";
const ERF_COLUMN: &str = "erf";

#[derive(Debug, Clone)]
pub struct EnsembleInputs {
    config: EnsembleConfig,
    calibration: CalibrationSet,
    scenarios: ScenarioTable,
    baseline_emissions: EmissionsTable,
    /// Volcanic and solar forcing per configuration, shape (timebounds, configs)
    forcing: IndexMap<String, Array2<f64>>,
}

impl EnsembleInputs {
    /// Read every input table named in the configuration
    pub fn load(config: &EnsembleConfig) -> EnsembleResult<Self> {
        let paths = &config.paths;

        let calibration = CalibrationSet::load(paths.resolve(&paths.calibration))?;
        let scenarios = ScenarioTable::load(paths.resolve(&paths.scenarios))?;
        let baseline_emissions = EmissionsTable::load(paths.resolve(&paths.baseline_emissions))?;
        let solar = AnnualSeries::load(paths.resolve(&paths.solar), YEAR_COLUMN, ERF_COLUMN)?;
        let volcanic =
            AnnualSeries::load(paths.resolve(&paths.volcanic), YEAR_COLUMN, ERF_COLUMN)?;

        Self::from_parts(
            config.clone(),
            calibration,
            scenarios,
            baseline_emissions,
            &solar,
            &volcanic,
        )
    }

    /// Assemble the inputs from tables that are already loaded.
    ///
    /// The configuration is validated first. The calibration set is truncated to
    /// `n_configs` configurations.
    pub fn from_parts(
        config: EnsembleConfig,
        calibration: CalibrationSet,
        scenarios: ScenarioTable,
        baseline_emissions: EmissionsTable,
        solar: &AnnualSeries,
        volcanic: &AnnualSeries,
    ) -> EnsembleResult<Self> {
        config.validate()?;
        let axis = config.time.axis();
        baseline_emissions.check_axis(&axis)?;

        let calibration = calibration.take(config.ensemble.n_configs);
        let forcing = prescribed_forcing(
            &volcanic_forcing(volcanic, &axis)?,
            &solar_forcing(solar, &axis)?,
            &solar_trend_shape(&axis),
            &calibration,
        )?;

        info!(
            configs = calibration.len(),
            scenario_rows = scenarios.len(),
            start = axis.start(),
            end = axis.end(),
            "loaded ensemble inputs"
        );

        Ok(Self {
            config,
            calibration,
            scenarios,
            baseline_emissions,
            forcing,
        })
    }

    pub fn config(&self) -> &EnsembleConfig {
        &self.config
    }

    pub fn time_axis(&self) -> TimeAxis {
        self.config.time.axis()
    }

    pub fn calibration(&self) -> &CalibrationSet {
        &self.calibration
    }

    pub fn scenarios(&self) -> &ScenarioTable {
        &self.scenarios
    }

    pub fn baseline_emissions(&self) -> &EmissionsTable {
        &self.baseline_emissions
    }

    pub fn forcing(&self) -> &IndexMap<String, Array2<f64>> {
        &self.forcing
    }

    /// The jobs of the ensemble, capped at `n_scenarios`
    pub fn jobs(&self) -> Vec<ScenarioJob> {
        self.scenarios.jobs(self.config.ensemble.n_scenarios)
    }
}
