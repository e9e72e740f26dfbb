//! Ensemble configuration
//!
//! Everything that used to be a module-level constant (ensemble sizes, pool size,
//! debug front sizes, file locations, scenario variants) is collected in an
//! [`EnsembleConfig`] that is read from a TOML file once and passed around explicitly.
//!
//! Every field has a default, so an empty file yields the full production ensemble.

use crate::datasets::DatasetSpec;
use crate::dispatch::DispatchOptions;
use crate::errors::{EnsembleError, EnsembleResult};
use crate::model::TimeAxis;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnsembleConfig {
    pub ensemble: EnsembleSettings,
    pub time: TimeSettings,
    pub paths: PathSettings,
    pub scenario: ScenarioSettings,
    /// Input files whose checksums are verified before anything runs
    pub datasets: Vec<DatasetSpec>,
}

/// Sizes of the ensemble and of the worker pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnsembleSettings {
    /// Maximum number of (model, scenario base) jobs.
    /// Default: 113
    pub n_scenarios: usize,
    /// Number of calibrated configurations run for every scenario.
    /// Default: 1001
    pub n_configs: usize,
    /// Worker threads in the pool.
    /// Default: 19
    pub n_workers: usize,
    /// Jobs run on the calling thread before anything is parallelised
    pub front_serial: usize,
    /// Jobs run on the pool one at a time after the serial front
    pub front_parallel: usize,
}

impl Default for EnsembleSettings {
    fn default() -> Self {
        Self {
            n_scenarios: 113,
            n_configs: 1001,
            n_workers: 19,
            front_serial: 0,
            front_parallel: 0,
        }
    }
}

impl EnsembleSettings {
    pub fn dispatch_options(&self) -> DispatchOptions {
        DispatchOptions::new(self.front_serial, self.front_parallel)
    }
}

/// Model time axis and the windows used when post-processing results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeSettings {
    /// First timebound of the model run.
    /// Default: 1750
    pub start: i32,
    /// Last timebound of the model run.
    /// Default: 2101
    pub end: i32,
    /// First stored year for every job but the first one, which stores the full history.
    /// Default: 2015
    pub scenario_start: i32,
    /// First year of the temperature reference period.
    /// Default: 1850
    pub reference_start: i32,
    /// Last year (inclusive) of the temperature reference period.
    /// Default: 1901
    pub reference_end: i32,
}

impl Default for TimeSettings {
    fn default() -> Self {
        Self {
            start: 1750,
            end: 2101,
            scenario_start: 2015,
            reference_start: 1850,
            reference_end: 1901,
        }
    }
}

impl TimeSettings {
    pub fn axis(&self) -> TimeAxis {
        TimeAxis::new(self.start, self.end)
    }
}

/// Locations of the input tables and of the results directory.
///
/// Table paths are relative to `data_dir` unless absolute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathSettings {
    pub data_dir: PathBuf,
    pub results_dir: PathBuf,
    pub scenarios: PathBuf,
    pub calibration: PathBuf,
    pub solar: PathBuf,
    pub volcanic: PathBuf,
    pub baseline_emissions: PathBuf,
}

impl Default for PathSettings {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            results_dir: PathBuf::from("results"),
            scenarios: PathBuf::from("gains_scenarios_harmonized.csv"),
            calibration: PathBuf::from("calibrated_constrained_parameters.csv"),
            solar: PathBuf::from("solar_erf_timebounds.csv"),
            volcanic: PathBuf::from("volcanic_ERF_monthly.csv"),
            baseline_emissions: PathBuf::from("ssp126_emissions_1750-2100.csv"),
        }
    }
}

impl PathSettings {
    /// Resolve a table path against the data directory
    pub fn resolve(&self, file: &Path) -> PathBuf {
        if file.is_absolute() {
            file.to_path_buf()
        } else {
            self.data_dir.join(file)
        }
    }
}

/// Where a model specie is found in the scenario table and how to convert it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpecieMapping {
    /// Variable name in the scenario table
    pub variable: String,
    /// Multiplier converting the table unit to the model unit
    #[serde(default = "unit_scale")]
    pub scale: f64,
}

fn unit_scale() -> f64 {
    1.0
}

/// Scenario variants and the harmonised emissions period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScenarioSettings {
    /// Variants run for every scenario base, as `"{base}|{variant}"`
    pub variants: Vec<String>,
    /// First year column taken from the scenario table.
    /// Default: 2014
    pub harmonised_start: i32,
    /// Last year column taken from the scenario table.
    /// Default: 2100
    pub harmonised_end: i32,
    /// Model species overwritten from the scenario table
    pub species: IndexMap<String, SpecieMapping>,
}

impl Default for ScenarioSettings {
    fn default() -> Self {
        let variants = [
            "Baseline_CLE",
            "MFR_tech",
            "MFR_explore",
            "MFR_struc",
            "MFR_behavior",
            "MFR_develop",
        ];

        // CO2 and N2O are reported in Mt, the model expects Gt and Mt N2
        let species = [
            ("CO2 FFI", "Emissions|CO2|Energy and Industrial Processes", 0.001),
            ("CO2 AFOLU", "Emissions|CO2|AFOLU", 0.001),
            ("CH4", "Emissions|CH4", 1.0),
            ("N2O", "Emissions|N2O", 0.001),
            ("Sulfur", "Emissions|Sulfur", 1.0),
            ("CO", "Emissions|CO", 1.0),
            ("VOC", "Emissions|VOC", 1.0),
            ("NOx", "Emissions|NOx", 1.0),
            ("BC", "Emissions|BC", 1.0),
            ("OC", "Emissions|OC", 1.0),
            ("NH3", "Emissions|NH3", 1.0),
        ];

        Self {
            variants: variants.iter().map(|v| v.to_string()).collect(),
            harmonised_start: 2014,
            harmonised_end: 2100,
            species: species
                .iter()
                .map(|(specie, variable, scale)| {
                    (
                        specie.to_string(),
                        SpecieMapping {
                            variable: variable.to_string(),
                            scale: *scale,
                        },
                    )
                })
                .collect(),
        }
    }
}

impl ScenarioSettings {
    /// Full scenario names for a scenario base
    pub fn scenario_names(&self, scenario_base: &str) -> Vec<String> {
        self.variants
            .iter()
            .map(|variant| format!("{}|{}", scenario_base, variant))
            .collect()
    }
}

impl EnsembleConfig {
    /// Read and validate a configuration file
    pub fn from_file<P: AsRef<Path>>(path: P) -> EnsembleResult<Self> {
        let path = path.as_ref();
        let contents =
            std::fs::read_to_string(path).map_err(|e| EnsembleError::io(path, e))?;
        Self::from_toml_str(&contents)
    }

    /// Parse and validate a configuration from TOML
    pub fn from_toml_str(contents: &str) -> EnsembleResult<Self> {
        let config: EnsembleConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Check the settings are consistent with each other
    pub fn validate(&self) -> EnsembleResult<()> {
        let time = &self.time;

        if self.ensemble.n_workers == 0 {
            return Err(EnsembleError::Config(
                "n_workers must be at least 1".to_string(),
            ));
        }
        if time.end <= time.start {
            return Err(EnsembleError::Config(format!(
                "time axis end ({}) must be after its start ({})",
                time.end, time.start
            )));
        }
        if time.scenario_start < time.start || time.scenario_start > time.end {
            return Err(EnsembleError::Config(format!(
                "scenario_start ({}) is outside the time axis {}-{}",
                time.scenario_start, time.start, time.end
            )));
        }
        if time.reference_start < time.start
            || time.reference_end > time.end
            || time.reference_end <= time.reference_start
        {
            return Err(EnsembleError::Config(format!(
                "reference period {}-{} is not a valid window of the time axis {}-{}",
                time.reference_start, time.reference_end, time.start, time.end
            )));
        }
        if self.scenario.variants.is_empty() {
            return Err(EnsembleError::Config(
                "at least one scenario variant is required".to_string(),
            ));
        }
        // Harmonised years are written to mid-year timepoints
        if self.scenario.harmonised_start < time.start
            || self.scenario.harmonised_end >= time.end
            || self.scenario.harmonised_end < self.scenario.harmonised_start
        {
            return Err(EnsembleError::Config(format!(
                "harmonised period {}-{} does not fit the time axis {}-{}",
                self.scenario.harmonised_start, self.scenario.harmonised_end, time.start, time.end
            )));
        }
        Ok(())
    }
}
