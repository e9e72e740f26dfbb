//! Scenario jobs and the harmonised scenario table they are derived from.
//!
//! The scenario table holds one row per (model, scenario, variable) with the
//! emissions of every year in its own column. Scenario names are of the form
//! `"{scenario_base}|{variant}"`; a job covers every variant of one
//! (model, scenario base) pair.

use crate::errors::{EnsembleError, EnsembleResult};
use crate::output::archive_file_name;
use crate::tabular::Table;
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::path::Path;

/// Separator between the scenario base and the variant
pub const VARIANT_SEPARATOR: char = '|';

/// One unit of ensemble work: every variant of one scenario base of one model.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScenarioJob {
    pub model: String,
    pub scenario_base: String,
    /// Position of the job in the ensemble
    pub index: usize,
}

impl ScenarioJob {
    pub fn new(model: &str, scenario_base: &str, index: usize) -> Self {
        Self {
            model: model.to_string(),
            scenario_base: scenario_base.to_string(),
            index,
        }
    }

    /// `"{model}_{scenario_base}"`
    pub fn label(&self) -> String {
        format!("{}_{}", self.model, self.scenario_base)
    }

    /// The first job of an ensemble keeps the historical period in its output
    pub fn is_first(&self) -> bool {
        self.index == 0
    }

    /// Name of the archive this job writes
    pub fn archive_name(&self) -> String {
        archive_file_name(&self.model, &self.scenario_base)
    }
}

impl fmt::Display for ScenarioJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} {}", self.index, self.label())
    }
}

/// Split `"{base}|{variant}"` into its parts
pub fn split_scenario(scenario: &str) -> Option<(&str, &str)> {
    let (base, variant) = scenario.split_once(VARIANT_SEPARATOR)?;
    if base.is_empty() || variant.is_empty() {
        None
    } else {
        Some((base, variant))
    }
}

/// The harmonised emissions scenarios.
#[derive(Debug, Clone)]
pub struct ScenarioTable {
    table: Table,
    rows: HashMap<(String, String, String), usize>,
}

impl ScenarioTable {
    pub fn load<P: AsRef<Path>>(path: P) -> EnsembleResult<Self> {
        Self::from_table(Table::from_path(path)?)
    }

    /// Index the rows of a table with `model`, `scenario` and `variable` columns.
    ///
    /// Scenarios without a variant and duplicated rows are rejected.
    pub fn from_table(table: Table) -> EnsembleResult<Self> {
        let model = table.column_index("model")?;
        let scenario = table.column_index("scenario")?;
        let variable = table.column_index("variable")?;

        let mut rows = HashMap::with_capacity(table.len());
        for row in 0..table.len() {
            let key = (
                table.cell(row, model).to_string(),
                table.cell(row, scenario).to_string(),
                table.cell(row, variable).to_string(),
            );

            if split_scenario(&key.1).is_none() {
                return Err(EnsembleError::MalformedRow {
                    table: table.name().to_string(),
                    row,
                    reason: format!(
                        "scenario {:?} is not of the form \"base{}variant\"",
                        key.1, VARIANT_SEPARATOR
                    ),
                });
            }
            if let Some(previous) = rows.insert(key, row) {
                return Err(EnsembleError::MalformedRow {
                    table: table.name().to_string(),
                    row,
                    reason: format!("duplicates row {}", previous),
                });
            }
        }

        Ok(Self { table, rows })
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Distinct (model, scenario base) pairs, sorted by model and then scenario base
    pub fn scenario_bases(&self) -> Vec<(String, String)> {
        self.rows
            .keys()
            .filter_map(|(model, scenario, _)| {
                split_scenario(scenario).map(|(base, _)| (model.clone(), base.to_string()))
            })
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// The ensemble jobs, at most `limit` of them
    pub fn jobs(&self, limit: usize) -> Vec<ScenarioJob> {
        self.scenario_bases()
            .into_iter()
            .take(limit)
            .enumerate()
            .map(|(index, (model, base))| ScenarioJob::new(&model, &base, index))
            .collect()
    }

    /// Values of one row for the year columns `first_year..=last_year`
    pub fn series(
        &self,
        model: &str,
        scenario: &str,
        variable: &str,
        first_year: i32,
        last_year: i32,
    ) -> EnsembleResult<Array1<f64>> {
        let key = (model.to_string(), scenario.to_string(), variable.to_string());
        let row = *self.rows.get(&key).ok_or_else(|| EnsembleError::MissingRow {
            model: model.to_string(),
            scenario: scenario.to_string(),
            variable: variable.to_string(),
        })?;

        (first_year..=last_year)
            .map(|year| {
                let column = self.table.column_index(&year.to_string())?;
                self.table.parse_f64(self.table.cell(row, column))
            })
            .collect::<EnsembleResult<Vec<_>>>()
            .map(Array1::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    const SCENARIOS: &str = "\
model,scenario,variable,unit,2014,2015,2016
GAINS,SSP2|Baseline_CLE,Emissions|CH4,Mt CH4/yr,300,310,320
GAINS,SSP2|MFR_tech,Emissions|CH4,Mt CH4/yr,300,290,280
GAINS,SSP1|Baseline_CLE,Emissions|CH4,Mt CH4/yr,280,281,282
AIM,SSP3|Baseline_CLE,Emissions|CH4,Mt CH4/yr,350,,370
";

    fn table() -> ScenarioTable {
        ScenarioTable::from_table(Table::from_reader("scenarios", SCENARIOS.as_bytes()).unwrap())
            .unwrap()
    }

    #[test]
    fn test_split_scenario() {
        assert_eq!(split_scenario("SSP2|MFR_tech"), Some(("SSP2", "MFR_tech")));
        assert_eq!(split_scenario("SSP2"), None);
        assert_eq!(split_scenario("|MFR_tech"), None);
        assert_eq!(split_scenario("SSP2|"), None);
    }

    #[test]
    fn test_jobs_are_sorted_and_indexed() {
        let jobs = table().jobs(usize::MAX);

        assert_eq!(
            jobs,
            vec![
                ScenarioJob::new("AIM", "SSP3", 0),
                ScenarioJob::new("GAINS", "SSP1", 1),
                ScenarioJob::new("GAINS", "SSP2", 2),
            ]
        );
        assert!(jobs[0].is_first());
        assert!(!jobs[1].is_first());
        assert_eq!(jobs[2].label(), "GAINS_SSP2");
        assert_eq!(jobs[2].archive_name(), "GAINS_SSP2.bin");
        assert_eq!(jobs[2].to_string(), "#2 GAINS_SSP2");
    }

    #[test]
    fn test_jobs_limit() {
        let jobs = table().jobs(2);
        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[1], ScenarioJob::new("GAINS", "SSP1", 1));

        assert!(table().jobs(0).is_empty());
    }

    #[test]
    fn test_series() {
        let table = table();

        let series = table
            .series("GAINS", "SSP2|MFR_tech", "Emissions|CH4", 2014, 2016)
            .unwrap();
        assert_eq!(series, array![300.0, 290.0, 280.0]);

        let series = table
            .series("GAINS", "SSP2|MFR_tech", "Emissions|CH4", 2015, 2015)
            .unwrap();
        assert_eq!(series, array![290.0]);
    }

    #[test]
    fn test_series_errors() {
        let table = table();

        assert!(matches!(
            table.series("GAINS", "SSP2|MFR_struc", "Emissions|CH4", 2014, 2016),
            Err(EnsembleError::MissingRow { .. })
        ));
        assert!(matches!(
            table.series("GAINS", "SSP2|MFR_tech", "Emissions|CH4", 2014, 2017),
            Err(EnsembleError::MissingColumn { .. })
        ));
        // Empty cell
        assert!(matches!(
            table.series("AIM", "SSP3|Baseline_CLE", "Emissions|CH4", 2014, 2016),
            Err(EnsembleError::Parse { .. })
        ));
    }

    #[test]
    fn test_malformed_rows() {
        let missing_variant = "model,scenario,variable,2014\nGAINS,SSP2,Emissions|CH4,1\n";
        let result = ScenarioTable::from_table(
            Table::from_reader("scenarios", missing_variant.as_bytes()).unwrap(),
        );
        assert!(matches!(
            result,
            Err(EnsembleError::MalformedRow { row: 0, .. })
        ));

        let duplicated = "model,scenario,variable,2014\nGAINS,SSP2|a,CH4,1\nGAINS,SSP2|a,CH4,2\n";
        let result =
            ScenarioTable::from_table(Table::from_reader("scenarios", duplicated.as_bytes()).unwrap());
        assert!(matches!(
            result,
            Err(EnsembleError::MalformedRow { row: 1, .. })
        ));

        let no_variable = "model,scenario,2014\nGAINS,SSP2|a,1\n";
        let result =
            ScenarioTable::from_table(Table::from_reader("scenarios", no_variable.as_bytes()).unwrap());
        assert!(matches!(result, Err(EnsembleError::MissingColumn { .. })));
    }
}
