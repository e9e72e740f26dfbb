//! Readers for the tabular (CSV) inputs of an ensemble.
//!
//! Each input is read once into an owned structure which is then shared read-only
//! between workers.

use crate::errors::{EnsembleError, EnsembleResult};
use crate::model::TimeAxis;
use indexmap::IndexMap;
use ndarray::Array1;
use std::io::Read;
use std::path::{Path, PathBuf};

/// A CSV table kept as strings, with columns looked up by header name.
#[derive(Debug, Clone)]
pub struct Table {
    name: String,
    headers: Vec<String>,
    records: Vec<csv::StringRecord>,
}

fn csv_reader() -> csv::ReaderBuilder {
    let mut builder = csv::ReaderBuilder::new();
    builder.trim(csv::Trim::All).comment(Some(b'#'));
    builder
}

impl Table {
    /// Read a table from a file
    pub fn from_path<P: AsRef<Path>>(path: P) -> EnsembleResult<Self> {
        let path = path.as_ref();
        let to_error = |source| EnsembleError::Csv {
            path: path.to_path_buf(),
            source,
        };
        let mut reader = csv_reader().from_path(path).map_err(to_error)?;
        Self::from_csv(path.display().to_string(), &mut reader).map_err(to_error)
    }

    /// Read a table from any reader, `name` is only used in error messages
    pub fn from_reader<R: Read>(name: &str, reader: R) -> EnsembleResult<Self> {
        let mut reader = csv_reader().from_reader(reader);
        Self::from_csv(name.to_string(), &mut reader).map_err(|source| EnsembleError::Csv {
            path: PathBuf::from(name),
            source,
        })
    }

    fn from_csv<R: Read>(name: String, reader: &mut csv::Reader<R>) -> Result<Self, csv::Error> {
        let headers = reader.headers()?.iter().map(String::from).collect();
        let records = reader.records().collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            name,
            headers,
            records,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn records(&self) -> &[csv::StringRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.headers.iter().any(|h| h == column)
    }

    /// Position of a column
    pub fn column_index(&self, column: &str) -> EnsembleResult<usize> {
        self.headers
            .iter()
            .position(|h| h == column)
            .ok_or_else(|| EnsembleError::MissingColumn {
                table: self.name.clone(),
                column: column.to_string(),
            })
    }

    /// The cell at (row, column position); short rows yield an empty string
    pub fn cell(&self, row: usize, column: usize) -> &str {
        self.records[row].get(column).unwrap_or("")
    }

    /// All values of a column as strings
    pub fn column_str(&self, column: &str) -> EnsembleResult<Vec<&str>> {
        let idx = self.column_index(column)?;
        Ok((0..self.len()).map(|row| self.cell(row, idx)).collect())
    }

    /// All values of a column parsed as floats
    pub fn column_f64(&self, column: &str) -> EnsembleResult<Array1<f64>> {
        let idx = self.column_index(column)?;
        (0..self.len())
            .map(|row| self.parse_f64(self.cell(row, idx)))
            .collect::<EnsembleResult<Vec<_>>>()
            .map(Array1::from)
    }

    /// Parse a cell of this table
    pub fn parse_f64(&self, value: &str) -> EnsembleResult<f64> {
        value.parse::<f64>().map_err(|_| EnsembleError::Parse {
            table: self.name.clone(),
            value: value.to_string(),
        })
    }
}

/// Calibrated, constrained parameter sets.
///
/// The first column holds the configuration identifier, every other column a named
/// parameter with one value per configuration.
#[derive(Debug, Clone)]
pub struct CalibrationSet {
    ids: Vec<String>,
    parameters: IndexMap<String, Array1<f64>>,
}

impl CalibrationSet {
    pub fn load<P: AsRef<Path>>(path: P) -> EnsembleResult<Self> {
        Self::from_table(&Table::from_path(path)?)
    }

    pub fn from_table(table: &Table) -> EnsembleResult<Self> {
        if table.headers().is_empty() {
            return Err(EnsembleError::MissingColumn {
                table: table.name().to_string(),
                column: "config".to_string(),
            });
        }

        let ids = (0..table.len())
            .map(|row| table.cell(row, 0).to_string())
            .collect();
        let parameters = table
            .headers()
            .iter()
            .skip(1)
            .map(|name| Ok((name.clone(), table.column_f64(name)?)))
            .collect::<EnsembleResult<IndexMap<_, _>>>()?;

        Ok(Self { ids, parameters })
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Configuration identifiers, in table order
    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    pub fn parameters(&self) -> &IndexMap<String, Array1<f64>> {
        &self.parameters
    }

    /// Values of a parameter for every configuration
    pub fn column(&self, name: &str) -> EnsembleResult<&Array1<f64>> {
        self.parameters
            .get(name)
            .ok_or_else(|| EnsembleError::MissingColumn {
                table: "calibration".to_string(),
                column: name.to_string(),
            })
    }

    /// Keep only the first `n` configurations
    pub fn take(&self, n: usize) -> Self {
        let n = n.min(self.len());
        Self {
            ids: self.ids[..n].to_vec(),
            parameters: self
                .parameters
                .iter()
                .map(|(name, values)| (name.clone(), values.slice(ndarray::s![..n]).to_owned()))
                .collect(),
        }
    }
}

/// A (year, value) series such as the solar or monthly volcanic forcing record.
#[derive(Debug, Clone)]
pub struct AnnualSeries {
    years: Array1<f64>,
    values: Array1<f64>,
}

impl AnnualSeries {
    pub fn new(years: Array1<f64>, values: Array1<f64>) -> EnsembleResult<Self> {
        if years.len() != values.len() {
            return Err(EnsembleError::Shape(format!(
                "{} years but {} values",
                years.len(),
                values.len()
            )));
        }
        Ok(Self { years, values })
    }

    pub fn load<P: AsRef<Path>>(path: P, year_column: &str, value_column: &str) -> EnsembleResult<Self> {
        Self::from_table(&Table::from_path(path)?, year_column, value_column)
    }

    pub fn from_table(table: &Table, year_column: &str, value_column: &str) -> EnsembleResult<Self> {
        Self::new(table.column_f64(year_column)?, table.column_f64(value_column)?)
    }

    pub fn years(&self) -> &Array1<f64> {
        &self.years
    }

    pub fn values(&self) -> &Array1<f64> {
        &self.values
    }

    /// Value recorded for exactly `year`
    pub fn at(&self, year: f64) -> Option<f64> {
        self.years
            .iter()
            .position(|y| (y - year).abs() < 1e-9)
            .map(|i| self.values[i])
    }

    /// Mean of all values with `start <= year < end`, `None` if there are none
    pub fn mean_between(&self, start: f64, end: f64) -> Option<f64> {
        let (sum, count) = self
            .years
            .iter()
            .zip(self.values.iter())
            .filter(|(y, _)| start <= **y && **y < end)
            .fold((0.0, 0usize), |(sum, count), (_, v)| (sum + v, count + 1));

        if count == 0 {
            None
        } else {
            Some(sum / count as f64)
        }
    }
}

/// Default emissions for every specie, on the model timepoints.
///
/// Stored as a `timepoint` column followed by one column per specie.
#[derive(Debug, Clone)]
pub struct EmissionsTable {
    timepoints: Array1<f64>,
    species: IndexMap<String, Array1<f64>>,
}

impl EmissionsTable {
    pub fn load<P: AsRef<Path>>(path: P) -> EnsembleResult<Self> {
        Self::from_table(&Table::from_path(path)?)
    }

    pub fn from_table(table: &Table) -> EnsembleResult<Self> {
        let timepoints = table.column_f64("timepoint")?;
        let species = table
            .headers()
            .iter()
            .filter(|name| *name != "timepoint")
            .map(|name| Ok((name.clone(), table.column_f64(name)?)))
            .collect::<EnsembleResult<IndexMap<_, _>>>()?;

        Ok(Self {
            timepoints,
            species,
        })
    }

    pub fn timepoints(&self) -> &Array1<f64> {
        &self.timepoints
    }

    pub fn species(&self) -> impl Iterator<Item = &String> {
        self.species.keys()
    }

    pub fn specie(&self, name: &str) -> EnsembleResult<&Array1<f64>> {
        self.species
            .get(name)
            .ok_or_else(|| EnsembleError::MissingColumn {
                table: "baseline emissions".to_string(),
                column: name.to_string(),
            })
    }

    /// Check the table covers exactly the timepoints of `axis`
    pub fn check_axis(&self, axis: &TimeAxis) -> EnsembleResult<()> {
        let expected = axis.timepoints();
        let matches = expected.len() == self.timepoints.len()
            && expected
                .iter()
                .zip(self.timepoints.iter())
                .all(|(a, b)| (a - b).abs() < 1e-6);

        if !matches {
            return Err(EnsembleError::Shape(format!(
                "baseline emissions cover {} timepoints, the time axis {}-{} needs {}",
                self.timepoints.len(),
                axis.start(),
                axis.end(),
                expected.len()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use is_close::is_close;
    use ndarray::array;

    const CALIBRATION: &str = "\
,c1,kappa1,F_4xCO2
1299,8.0,1.2,7.5
2478,7.1,1.4,8.1
3117,6.5,0.9,7.9
";

    #[test]
    fn test_table_columns() {
        let table = Table::from_reader("test", "year , erf\n1750,0.1\n1751, 0.2\n".as_bytes()).unwrap();

        assert_eq!(table.len(), 2);
        assert_eq!(table.headers(), &["year".to_string(), "erf".to_string()]);
        assert_eq!(table.column_f64("erf").unwrap(), array![0.1, 0.2]);
        assert_eq!(table.column_str("year").unwrap(), vec!["1750", "1751"]);
        assert!(matches!(
            table.column_f64("missing"),
            Err(EnsembleError::MissingColumn { .. })
        ));
    }

    #[test]
    fn test_table_parse_error() {
        let table = Table::from_reader("test", "year,erf\n1750,abc\n".as_bytes()).unwrap();
        match table.column_f64("erf") {
            Err(EnsembleError::Parse { table, value }) => {
                assert_eq!(table, "test");
                assert_eq!(value, "abc");
            }
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn test_calibration_set() {
        let table = Table::from_reader("calibration", CALIBRATION.as_bytes()).unwrap();
        let calibration = CalibrationSet::from_table(&table).unwrap();

        assert_eq!(calibration.len(), 3);
        assert_eq!(calibration.ids(), &["1299", "2478", "3117"]);
        assert_eq!(calibration.column("kappa1").unwrap(), &array![1.2, 1.4, 0.9]);
        assert_eq!(
            calibration.parameters().keys().collect::<Vec<_>>(),
            vec!["c1", "kappa1", "F_4xCO2"]
        );

        match calibration.column("epsilon") {
            Err(EnsembleError::MissingColumn { column, .. }) => assert_eq!(column, "epsilon"),
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn test_calibration_take() {
        let table = Table::from_reader("calibration", CALIBRATION.as_bytes()).unwrap();
        let calibration = CalibrationSet::from_table(&table).unwrap();

        let subset = calibration.take(2);
        assert_eq!(subset.ids(), &["1299", "2478"]);
        assert_eq!(subset.column("c1").unwrap(), &array![8.0, 7.1]);

        assert_eq!(calibration.take(10).len(), 3);
    }

    #[test]
    fn test_annual_series() {
        let series = AnnualSeries::new(
            array![1749.04, 1749.54, 1750.04, 1750.54, 1750.96],
            array![1.0, 3.0, -1.0, -2.0, -3.0],
        )
        .unwrap();

        assert!(is_close!(series.mean_between(1749.0, 1750.0).unwrap(), 2.0));
        assert!(is_close!(series.mean_between(1750.0, 1751.0).unwrap(), -2.0));
        assert_eq!(series.mean_between(1800.0, 1801.0), None);
        assert_eq!(series.at(1749.54), Some(3.0));
        assert_eq!(series.at(1752.0), None);

        assert!(AnnualSeries::new(array![1.0], array![1.0, 2.0]).is_err());
    }

    #[test]
    fn test_emissions_table() {
        let table = Table::from_reader(
            "emissions",
            "timepoint,CO2 FFI,CH4\n1750.5,0.0,19.0\n1751.5,0.1,19.5\n".as_bytes(),
        )
        .unwrap();
        let emissions = EmissionsTable::from_table(&table).unwrap();

        assert_eq!(emissions.species().collect::<Vec<_>>(), vec!["CO2 FFI", "CH4"]);
        assert_eq!(emissions.specie("CH4").unwrap(), &array![19.0, 19.5]);
        assert!(emissions.specie("N2O").is_err());

        emissions.check_axis(&TimeAxis::new(1750, 1752)).unwrap();
        assert!(matches!(
            emissions.check_axis(&TimeAxis::new(1750, 1760)),
            Err(EnsembleError::Shape(_))
        ));
    }
}
