//! Running the model for one (model, scenario base) job
//!
//! A job runs every scenario variant against every calibrated configuration in a
//! single model run, then stores the post-processed results as one archive.

use crate::inputs::EnsembleInputs;
use ensmip_core::errors::{EnsembleError, EnsembleResult};
use ensmip_core::job::ScenarioJob;
use ensmip_core::model::{
    ClimateModel, ModelOutputs, RunSetup, TimeAxis, OUTPUT_CH4_CONCENTRATION, OUTPUT_ERF,
    OUTPUT_OHC, OUTPUT_TEMPERATURE,
};
use ensmip_core::output::ScenarioOutput;
use indexmap::IndexMap;
use ndarray::{s, Array1, Array2, Array3, Axis};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, info_span};

/// Weights of a trapezoidal mean over `n` timebounds: half weight at both ends
pub fn reference_weights(n: usize) -> Array1<f64> {
    let mut weights = Array1::ones(n);
    if n > 1 {
        weights[0] = 0.5;
        weights[n - 1] = 0.5;
    }
    weights
}

/// Temperature relative to its weighted mean over the timebounds `start..=end`
pub fn temperature_anomaly(
    temperature: &Array3<f64>,
    axis: &TimeAxis,
    start: i32,
    end: i32,
) -> EnsembleResult<Array3<f64>> {
    let (first, last) = match (axis.timebound_index(start), axis.timebound_index(end)) {
        (Some(first), Some(last)) if last >= first => (first, last),
        _ => {
            return Err(EnsembleError::Config(format!(
                "reference period {}-{} is outside the time axis {}-{}",
                start,
                end,
                axis.start(),
                axis.end()
            )))
        }
    };

    let (_, n_scenarios, n_configs) = temperature.dim();
    let weights = reference_weights(last - first + 1);
    let mean = temperature
        .slice(s![first..=last, .., ..])
        .axis_iter(Axis(0))
        .zip(weights.iter())
        .fold(Array2::<f64>::zeros((n_scenarios, n_configs)), |acc, (t, w)| acc + &t * *w)
        / weights.sum();

    Ok(temperature - &mean.insert_axis(Axis(0)))
}

/// The per-job worker: builds the inputs of a model run, runs it and writes the archive.
#[derive(Debug)]
pub struct ScenarioRunner<M: ClimateModel> {
    inputs: Arc<EnsembleInputs>,
    model: M,
    results_dir: PathBuf,
}

impl<M: ClimateModel> ScenarioRunner<M> {
    pub fn new(inputs: Arc<EnsembleInputs>, model: M, results_dir: impl Into<PathBuf>) -> Self {
        Self {
            inputs,
            model,
            results_dir: results_dir.into(),
        }
    }

    pub fn inputs(&self) -> &EnsembleInputs {
        &self.inputs
    }

    pub fn results_dir(&self) -> &Path {
        &self.results_dir
    }

    /// Emissions of every specie for every variant of the job, shape (timepoints, scenarios).
    ///
    /// Each specie starts from the baseline emissions, then the harmonised years are
    /// overwritten by the scenario table, converted to model units.
    fn emissions(
        &self,
        job: &ScenarioJob,
        scenarios: &[String],
    ) -> EnsembleResult<IndexMap<String, Array2<f64>>> {
        let settings = &self.inputs.config().scenario;
        let axis = self.inputs.time_axis();
        let baseline = self.inputs.baseline_emissions();

        let mut emissions = IndexMap::new();
        for specie in baseline.species() {
            let values = baseline.specie(specie)?;
            let broadcast = values
                .broadcast((scenarios.len(), values.len()))
                .ok_or_else(|| EnsembleError::Shape(format!("cannot broadcast {}", specie)))?
                .t()
                .to_owned();
            emissions.insert(specie.clone(), broadcast);
        }

        let first = axis
            .timepoint_index(settings.harmonised_start)
            .ok_or_else(|| {
                EnsembleError::Config(format!(
                    "harmonised start {} is outside the time axis",
                    settings.harmonised_start
                ))
            })?;
        let n_years = (settings.harmonised_end - settings.harmonised_start + 1) as usize;

        for (specie, mapping) in &settings.species {
            let values = emissions
                .get_mut(specie)
                .ok_or_else(|| EnsembleError::MissingColumn {
                    table: "baseline emissions".to_string(),
                    column: specie.clone(),
                })?;
            if first + n_years > values.nrows() {
                return Err(EnsembleError::Shape(format!(
                    "harmonised period {}-{} does not fit {} timepoints",
                    settings.harmonised_start,
                    settings.harmonised_end,
                    values.nrows()
                )));
            }

            for (idx, scenario) in scenarios.iter().enumerate() {
                let series = self.inputs.scenarios().series(
                    &job.model,
                    scenario,
                    &mapping.variable,
                    settings.harmonised_start,
                    settings.harmonised_end,
                )?;
                values
                    .slice_mut(s![first..first + n_years, idx])
                    .assign(&(series * mapping.scale));
            }
        }
        Ok(emissions)
    }

    /// Everything the model needs to run `job`
    pub fn run_setup(&self, job: &ScenarioJob) -> EnsembleResult<RunSetup> {
        let scenarios = self.inputs.config().scenario.scenario_names(&job.scenario_base);
        let calibration = self.inputs.calibration();

        Ok(RunSetup {
            time_axis: self.inputs.time_axis(),
            emissions: self.emissions(job, &scenarios)?,
            scenarios,
            configs: calibration.ids().to_vec(),
            forcing: self.inputs.forcing().clone(),
            parameters: calibration.parameters().clone(),
        })
    }

    /// Post-process the model outputs into the archive of `job`
    pub fn to_output(&self, job: &ScenarioJob, outputs: &ModelOutputs) -> EnsembleResult<ScenarioOutput> {
        let config = self.inputs.config();
        let axis = self.inputs.time_axis();

        let first_year = if job.is_first() {
            axis.start()
        } else {
            config.time.scenario_start
        };
        let first = axis.timebound_index(first_year).ok_or_else(|| {
            EnsembleError::Config(format!("first stored year {} is outside the time axis", first_year))
        })?;

        let temperature = temperature_anomaly(
            outputs.get(OUTPUT_TEMPERATURE)?,
            &axis,
            config.time.reference_start,
            config.time.reference_end,
        )?;
        let trim = |values: &Array3<f64>| values.slice(s![first.., .., ..]).to_owned();

        ScenarioOutput::new(
            &job.model,
            &job.scenario_base,
            axis.years_from(first_year),
            config.scenario.variants.clone(),
            self.inputs.calibration().ids().to_vec(),
        )
        .with_variable(OUTPUT_TEMPERATURE, trim(&temperature))?
        .with_variable(OUTPUT_ERF, trim(outputs.get(OUTPUT_ERF)?))?
        .with_variable(OUTPUT_OHC, trim(outputs.get(OUTPUT_OHC)?))?
        .with_variable(OUTPUT_CH4_CONCENTRATION, trim(outputs.get(OUTPUT_CH4_CONCENTRATION)?))
    }

    /// Run `job` and write its archive, returning the archive path
    pub fn run(&self, job: &ScenarioJob) -> EnsembleResult<PathBuf> {
        let span = info_span!("job", job = %job.label(), index = job.index);
        let _guard = span.enter();
        let started = Instant::now();

        let setup = self.run_setup(job)?;
        debug!(
            scenarios = setup.n_scenarios(),
            configs = setup.n_configs(),
            "configuring model"
        );
        let outputs = self.model.configure_and_run(setup)?;
        outputs.check_required()?;

        let path = self.to_output(job, &outputs)?.write_atomic(&self.results_dir)?;
        info!(
            path = %path.display(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "job complete"
        );
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    fn test_reference_weights() {
        let weights = reference_weights(52);
        assert_eq!(weights.len(), 52);
        assert_eq!(weights[0], 0.5);
        assert_eq!(weights[1], 1.0);
        assert_eq!(weights[50], 1.0);
        assert_eq!(weights[51], 0.5);
        assert_eq!(weights.sum(), 51.0);

        assert_eq!(reference_weights(1), array![1.0]);
    }

    #[test]
    fn test_temperature_anomaly() {
        let axis = TimeAxis::new(2000, 2004);
        // Two scenarios, one config: a ramp and a constant
        let temperature = Array3::from_shape_fn((5, 2, 1), |(t, s, _)| {
            if s == 0 {
                t as f64
            } else {
                3.0
            }
        });

        let anomaly = temperature_anomaly(&temperature, &axis, 2000, 2002).unwrap();

        // Weighted mean of 0, 1, 2 with weights 0.5, 1, 0.5 is 1
        assert_relative_eq!(anomaly[[0, 0, 0]], -1.0);
        assert_relative_eq!(anomaly[[4, 0, 0]], 3.0);
        assert!(anomaly.slice(s![.., 1, 0]).iter().all(|v| v.abs() < 1e-12));
    }

    #[test]
    fn test_temperature_anomaly_outside_axis() {
        let axis = TimeAxis::new(2000, 2004);
        let temperature = Array3::zeros((5, 1, 1));

        assert!(matches!(
            temperature_anomaly(&temperature, &axis, 1990, 2002),
            Err(EnsembleError::Config(_))
        ));
        assert!(matches!(
            temperature_anomaly(&temperature, &axis, 2003, 2002),
            Err(EnsembleError::Config(_))
        ));
    }
}
