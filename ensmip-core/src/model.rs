//! The interface between the ensemble harness and a climate model.
//!
//! The harness treats a model as a black box that is configured once per job and then
//! run. Anything implementing [`ClimateModel`] can be driven by the harness, which
//! allows tests to substitute a cheap stand-in for the real emulator.

use crate::errors::{EnsembleError, EnsembleResult};
use indexmap::IndexMap;
use ndarray::{Array1, Array2, Array3};
use serde::{Deserialize, Serialize};

/// Name of the surface temperature output
pub const OUTPUT_TEMPERATURE: &str = "temperature";
/// Name of the total effective radiative forcing output
pub const OUTPUT_ERF: &str = "effective_radiative_forcing";
/// Name of the ocean heat content change output
pub const OUTPUT_OHC: &str = "ocean_heat_content_change";
/// Name of the atmospheric CH4 concentration output
pub const OUTPUT_CH4_CONCENTRATION: &str = "ch4_concentration";

/// Name of the prescribed volcanic forcing
pub const FORCING_VOLCANIC: &str = "Volcanic";
/// Name of the prescribed solar forcing
pub const FORCING_SOLAR: &str = "Solar";

/// Outputs every model has to provide
pub const REQUIRED_OUTPUTS: [&str; 4] = [
    OUTPUT_TEMPERATURE,
    OUTPUT_ERF,
    OUTPUT_OHC,
    OUTPUT_CH4_CONCENTRATION,
];

/// Annual time axis of a model run.
///
/// State variables (temperature, concentrations, forcing) are defined on the
/// `n + 1` timebounds `start..=end`, while fluxes such as emissions are defined on the
/// `n` mid-year timepoints `start + 0.5 .. end - 0.5`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeAxis {
    start: i32,
    end: i32,
}

impl TimeAxis {
    /// # Panics
    ///
    /// Panics if `end` is not after `start`
    pub fn new(start: i32, end: i32) -> Self {
        assert!(end > start, "time axis must span at least one year");
        Self { start, end }
    }

    pub fn start(&self) -> i32 {
        self.start
    }

    pub fn end(&self) -> i32 {
        self.end
    }

    pub fn n_timepoints(&self) -> usize {
        (self.end - self.start) as usize
    }

    pub fn n_timebounds(&self) -> usize {
        self.n_timepoints() + 1
    }

    pub fn timebounds(&self) -> Array1<f64> {
        Array1::range(self.start as f64, self.end as f64 + 0.5, 1.0)
    }

    pub fn timepoints(&self) -> Array1<f64> {
        Array1::range(self.start as f64 + 0.5, self.end as f64, 1.0)
    }

    /// Years of the timebounds from `year` onwards
    pub fn years_from(&self, year: i32) -> Vec<i32> {
        (year.max(self.start)..=self.end).collect()
    }

    /// Index of the timebound for `year`
    pub fn timebound_index(&self, year: i32) -> Option<usize> {
        (self.start..=self.end)
            .contains(&year)
            .then(|| (year - self.start) as usize)
    }

    /// Index of the timepoint in the middle of `year`
    pub fn timepoint_index(&self, year: i32) -> Option<usize> {
        (self.start..self.end)
            .contains(&year)
            .then(|| (year - self.start) as usize)
    }
}

/// Everything a model needs for one run: a set of scenarios crossed with a set of
/// parameter configurations.
#[derive(Debug, Clone)]
pub struct RunSetup {
    pub time_axis: TimeAxis,
    /// Scenario names, the second dimension of every emissions array
    pub scenarios: Vec<String>,
    /// Configuration identifiers
    pub configs: Vec<String>,
    /// Emissions per specie, shape (timepoints, scenarios)
    pub emissions: IndexMap<String, Array2<f64>>,
    /// Prescribed forcing per agent, shape (timebounds, configs)
    pub forcing: IndexMap<String, Array2<f64>>,
    /// Calibrated parameters, one value per configuration
    pub parameters: IndexMap<String, Array1<f64>>,
}

impl RunSetup {
    pub fn n_scenarios(&self) -> usize {
        self.scenarios.len()
    }

    pub fn n_configs(&self) -> usize {
        self.configs.len()
    }

    /// Emissions of a specie, shape (timepoints, scenarios)
    pub fn emissions_of(&self, specie: &str) -> EnsembleResult<&Array2<f64>> {
        self.emissions
            .get(specie)
            .ok_or_else(|| EnsembleError::MissingColumn {
                table: "emissions".to_string(),
                column: specie.to_string(),
            })
    }

    /// Prescribed forcing of an agent, zero if none was provided
    pub fn forcing_of(&self, agent: &str) -> Array2<f64> {
        self.forcing.get(agent).cloned().unwrap_or_else(|| {
            Array2::zeros((self.time_axis.n_timebounds(), self.n_configs()))
        })
    }

    /// Calibrated values of a parameter
    pub fn parameter(&self, name: &str) -> EnsembleResult<&Array1<f64>> {
        self.parameters
            .get(name)
            .ok_or_else(|| EnsembleError::MissingParameter(name.to_string()))
    }

    /// Check every array agrees with the axis, scenario and configuration counts
    pub fn validate(&self) -> EnsembleResult<()> {
        let emissions_shape = (self.time_axis.n_timepoints(), self.n_scenarios());
        for (specie, values) in &self.emissions {
            if values.dim() != emissions_shape {
                return Err(EnsembleError::Shape(format!(
                    "emissions of {} have shape {:?}, expected {:?}",
                    specie,
                    values.dim(),
                    emissions_shape
                )));
            }
        }

        let forcing_shape = (self.time_axis.n_timebounds(), self.n_configs());
        for (agent, values) in &self.forcing {
            if values.dim() != forcing_shape {
                return Err(EnsembleError::Shape(format!(
                    "forcing of {} has shape {:?}, expected {:?}",
                    agent,
                    values.dim(),
                    forcing_shape
                )));
            }
        }

        for (name, values) in &self.parameters {
            if values.len() != self.n_configs() {
                return Err(EnsembleError::Shape(format!(
                    "parameter {} has {} values for {} configurations",
                    name,
                    values.len(),
                    self.n_configs()
                )));
            }
        }
        Ok(())
    }
}

/// Named outputs of a model run, each of shape (timebounds, scenarios, configs).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelOutputs {
    variables: IndexMap<String, Array3<f64>>,
}

impl ModelOutputs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: &str, values: Array3<f64>) {
        self.variables.insert(name.to_string(), values);
    }

    pub fn get(&self, name: &str) -> EnsembleResult<&Array3<f64>> {
        self.variables
            .get(name)
            .ok_or_else(|| EnsembleError::MissingOutput(name.to_string()))
    }

    pub fn names(&self) -> impl Iterator<Item = &String> {
        self.variables.keys()
    }

    /// Fail if any of [`REQUIRED_OUTPUTS`] is missing
    pub fn check_required(&self) -> EnsembleResult<()> {
        for name in REQUIRED_OUTPUTS {
            self.get(name)?;
        }
        Ok(())
    }
}

/// A climate model that can be driven by the ensemble harness.
///
/// Implementations must not keep mutable state between runs: the same model value is
/// shared by every worker thread.
pub trait ClimateModel: Send + Sync {
    /// A configured, ready-to-run model instance
    type Handle;

    /// Prepare a run, validating inputs and resolving calibrated parameters
    fn configure(&self, setup: RunSetup) -> EnsembleResult<Self::Handle>;

    /// Run a configured instance to completion
    fn run(&self, handle: Self::Handle) -> EnsembleResult<ModelOutputs>;

    /// Configure and run in one go
    fn configure_and_run(&self, setup: RunSetup) -> EnsembleResult<ModelOutputs> {
        let handle = self.configure(setup)?;
        self.run(handle)
    }
}
