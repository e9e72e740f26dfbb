//! Per-job result archives.
//!
//! Each job writes one [`ScenarioOutput`] containing a set of named series indexed by
//! (year, scenario variant, run). Archives are serialised with bincode and written
//! atomically: the data goes to a `.partial` file that is only renamed into place once
//! it has been fully written, so a failed job never leaves a truncated archive behind.

use crate::errors::{EnsembleError, EnsembleResult};
use indexmap::IndexMap;
use ndarray::Array3;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use tracing::debug;

/// File extension of result archives
pub const ARCHIVE_EXTENSION: &str = "bin";

/// Results of one (model, scenario base) job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioOutput {
    pub model: String,
    pub scenario_base: String,
    /// Year coordinate (first dimension)
    pub years: Vec<i32>,
    /// Scenario variant coordinate (second dimension)
    pub scenarios: Vec<String>,
    /// Run/configuration coordinate (third dimension)
    pub runs: Vec<String>,
    variables: IndexMap<String, Array3<f64>>,
}

impl ScenarioOutput {
    pub fn new(
        model: &str,
        scenario_base: &str,
        years: Vec<i32>,
        scenarios: Vec<String>,
        runs: Vec<String>,
    ) -> Self {
        Self {
            model: model.to_string(),
            scenario_base: scenario_base.to_string(),
            years,
            scenarios,
            runs,
            variables: IndexMap::new(),
        }
    }

    /// Expected shape of every variable
    pub fn shape(&self) -> (usize, usize, usize) {
        (self.years.len(), self.scenarios.len(), self.runs.len())
    }

    /// Add a variable, which must match the coordinates
    pub fn with_variable(mut self, name: &str, values: Array3<f64>) -> EnsembleResult<Self> {
        if values.dim() != self.shape() {
            return Err(EnsembleError::Shape(format!(
                "variable {} has shape {:?}, expected (year, scenario, run) = {:?}",
                name,
                values.dim(),
                self.shape()
            )));
        }
        self.variables.insert(name.to_string(), values);
        Ok(self)
    }

    pub fn variable(&self, name: &str) -> Option<&Array3<f64>> {
        self.variables.get(name)
    }

    pub fn variable_names(&self) -> impl Iterator<Item = &String> {
        self.variables.keys()
    }

    /// `{model}_{scenario_base}.bin`
    pub fn file_name(&self) -> String {
        archive_file_name(&self.model, &self.scenario_base)
    }

    /// Write the archive into `dir`, returning the final path.
    ///
    /// Nothing is left at the final path (or at the temporary path) if writing fails.
    pub fn write_atomic<P: AsRef<Path>>(&self, dir: P) -> EnsembleResult<PathBuf> {
        let path = dir.as_ref().join(self.file_name());
        let partial = path.with_extension(format!("{}.partial", ARCHIVE_EXTENSION));

        let result = self
            .write_to(&partial)
            .and_then(|_| fs::rename(&partial, &path).map_err(|e| EnsembleError::io(&path, e)));

        if let Err(e) = result {
            // Best effort, the partial file may not have been created at all
            let _ = fs::remove_file(&partial);
            return Err(e);
        }

        debug!(path = %path.display(), "wrote result archive");
        Ok(path)
    }

    fn write_to(&self, path: &Path) -> EnsembleResult<()> {
        let file = File::create(path).map_err(|e| EnsembleError::io(path, e))?;
        let mut writer = BufWriter::new(file);

        bincode::serialize_into(&mut writer, self).map_err(|source| EnsembleError::Archive {
            path: path.to_path_buf(),
            source,
        })?;

        let file = writer
            .into_inner()
            .map_err(|e| EnsembleError::io(path, e.into_error()))?;
        file.sync_all().map_err(|e| EnsembleError::io(path, e))?;
        Ok(())
    }

    /// Load an archive written by [`ScenarioOutput::write_atomic`]
    pub fn read<P: AsRef<Path>>(path: P) -> EnsembleResult<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| EnsembleError::io(path, e))?;
        let mut reader = BufReader::new(file);

        bincode::deserialize_from(&mut reader).map_err(|source| EnsembleError::Archive {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Archive file name for a (model, scenario base) pair
pub fn archive_file_name(model: &str, scenario_base: &str) -> String {
    format!("{}_{}.{}", model, scenario_base, ARCHIVE_EXTENSION)
}
