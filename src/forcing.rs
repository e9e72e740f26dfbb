//! Prescribed volcanic and solar forcing
//!
//! Both are built once on the model timebounds and then scaled per configuration by
//! the calibrated `scale Volcanic`, `solar_amplitude` and `solar_trend` parameters.

use ensmip_core::errors::{EnsembleError, EnsembleResult};
use ensmip_core::model::{TimeAxis, FORCING_SOLAR, FORCING_VOLCANIC};
use ensmip_core::tabular::{AnnualSeries, CalibrationSet};
use indexmap::IndexMap;
use ndarray::{Array1, Array2, Axis};

/// Last year with observed volcanic forcing
pub const HISTORY_END: i32 = 2020;
/// Number of timebounds over which volcanic forcing fades out after [`HISTORY_END`]
pub const VOLCANIC_RAMP_LENGTH: usize = 10;

/// `n` evenly spaced values from `start` to `end` inclusive, hitting both ends exactly
fn linspace(start: f64, end: f64, n: usize) -> Array1<f64> {
    if n == 1 {
        return Array1::from_elem(1, start);
    }
    Array1::from_shape_fn(n, |i| start + (end - start) * i as f64 / (n - 1) as f64)
}

/// Annual volcanic forcing on the timebounds of `axis`.
///
/// The value at timebound `year` is the mean of the monthly record over
/// `[year - 1, year)`. After [`HISTORY_END`] the last value fades linearly to zero over
/// [`VOLCANIC_RAMP_LENGTH`] timebounds, and stays zero afterwards.
pub fn volcanic_forcing(monthly: &AnnualSeries, axis: &TimeAxis) -> EnsembleResult<Array1<f64>> {
    let mut forcing = Array1::zeros(axis.n_timebounds());

    let mut last = None;
    for year in axis.start()..=axis.end().min(HISTORY_END) {
        let idx = (year - axis.start()) as usize;
        forcing[idx] = monthly
            .mean_between(f64::from(year - 1), f64::from(year))
            .ok_or_else(|| EnsembleError::NoData {
                table: "volcanic forcing".to_string(),
                window: format!("[{}, {})", year - 1, year),
            })?;
        last = Some(idx);
    }

    if let Some(last) = last {
        let ramp = linspace(1.0, 0.0, VOLCANIC_RAMP_LENGTH) * forcing[last];
        for (offset, value) in ramp.iter().enumerate() {
            if let Some(slot) = forcing.get_mut(last + 1 + offset) {
                *slot = *value;
            }
        }
    }
    Ok(forcing)
}

/// Solar forcing recorded for every timebound of `axis`
pub fn solar_forcing(series: &AnnualSeries, axis: &TimeAxis) -> EnsembleResult<Array1<f64>> {
    axis.timebounds()
        .iter()
        .map(|year| {
            series.at(*year).ok_or_else(|| EnsembleError::NoData {
                table: "solar forcing".to_string(),
                window: format!("year {}", year),
            })
        })
        .collect::<EnsembleResult<Vec<_>>>()
        .map(Array1::from)
}

/// Shape of the solar trend: a linear ramp from zero at the start of the axis to one at
/// [`HISTORY_END`], one afterwards
pub fn solar_trend_shape(axis: &TimeAxis) -> Array1<f64> {
    let mut shape = Array1::ones(axis.n_timebounds());
    let n_ramp = match axis.timebound_index(HISTORY_END) {
        Some(idx) => idx + 1,
        None if HISTORY_END > axis.end() => axis.n_timebounds(),
        None => 0,
    };
    shape
        .slice_mut(ndarray::s![..n_ramp])
        .assign(&linspace(0.0, 1.0, n_ramp));
    shape
}

/// Outer product of a timebound series with per-configuration scales, shape (timebounds, configs)
fn scale_by_config(series: &Array1<f64>, scale: &Array1<f64>) -> Array2<f64> {
    &series.view().insert_axis(Axis(1)) * &scale.view().insert_axis(Axis(0))
}

/// Prescribed forcing per configuration, keyed by agent
pub fn prescribed_forcing(
    volcanic: &Array1<f64>,
    solar: &Array1<f64>,
    solar_trend: &Array1<f64>,
    calibration: &CalibrationSet,
) -> EnsembleResult<IndexMap<String, Array2<f64>>> {
    let volcanic = scale_by_config(volcanic, calibration.column("scale Volcanic")?);
    let solar = scale_by_config(solar, calibration.column("solar_amplitude")?)
        + scale_by_config(solar_trend, calibration.column("solar_trend")?);

    let mut forcing = IndexMap::new();
    forcing.insert(FORCING_VOLCANIC.to_string(), volcanic);
    forcing.insert(FORCING_SOLAR.to_string(), solar);
    Ok(forcing)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ensmip_core::tabular::Table;
    use ndarray::array;

    /// Monthly record where every month of `year - 1` averages to `year - 1750`
    fn monthly(first_year: i32, last_year: i32) -> AnnualSeries {
        let mut years = Vec::new();
        let mut values = Vec::new();
        for year in first_year..=last_year {
            for month in 0..12 {
                years.push(f64::from(year) + (f64::from(month) + 0.5) / 12.0);
                values.push(f64::from(year + 1 - 1750) + if month % 2 == 0 { 0.5 } else { -0.5 });
            }
        }
        AnnualSeries::new(Array1::from(years), Array1::from(values)).unwrap()
    }

    #[test]
    fn test_volcanic_history_and_ramp() {
        let axis = TimeAxis::new(2000, 2040);
        let forcing = volcanic_forcing(&monthly(1999, 2019), &axis).unwrap();

        assert_eq!(forcing.len(), 41);
        assert_relative_eq!(forcing[0], 250.0);
        assert_relative_eq!(forcing[20], 270.0);
        // Ramp from the 2020 value down to zero
        assert_relative_eq!(forcing[21], 270.0);
        assert_relative_eq!(forcing[22], 270.0 * 8.0 / 9.0);
        assert_relative_eq!(forcing[30], 0.0);
        assert!(forcing.slice(ndarray::s![30..]).iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_volcanic_full_axis_indices() {
        let axis = TimeAxis::new(1750, 2101);
        let forcing = volcanic_forcing(&monthly(1749, 2019), &axis).unwrap();

        assert_eq!(forcing.len(), 352);
        assert_relative_eq!(forcing[270], 270.0);
        assert_relative_eq!(forcing[271], 270.0);
        assert_relative_eq!(forcing[280], 0.0);
        assert_eq!(forcing[281], 0.0);
    }

    #[test]
    fn test_volcanic_missing_year() {
        let axis = TimeAxis::new(2000, 2010);
        let result = volcanic_forcing(&monthly(2001, 2019), &axis);

        assert!(matches!(result, Err(EnsembleError::NoData { .. })));
    }

    #[test]
    fn test_solar_forcing() {
        let table = Table::from_reader("solar", "year,erf\n2000,0.1\n2001,0.2\n2002,0.3\n".as_bytes())
            .unwrap();
        let series = AnnualSeries::from_table(&table, "year", "erf").unwrap();

        let forcing = solar_forcing(&series, &TimeAxis::new(2000, 2002)).unwrap();
        assert_eq!(forcing, array![0.1, 0.2, 0.3]);

        assert!(matches!(
            solar_forcing(&series, &TimeAxis::new(2000, 2003)),
            Err(EnsembleError::NoData { .. })
        ));
    }

    #[test]
    fn test_solar_trend_shape() {
        let shape = solar_trend_shape(&TimeAxis::new(1750, 2101));
        assert_eq!(shape.len(), 352);
        assert_eq!(shape[0], 0.0);
        assert_relative_eq!(shape[135], 0.5);
        assert_eq!(shape[270], 1.0);
        assert!(shape.slice(ndarray::s![271..]).iter().all(|v| *v == 1.0));

        let short = solar_trend_shape(&TimeAxis::new(2030, 2040));
        assert!(short.iter().all(|v| *v == 1.0));
    }

    #[test]
    fn test_prescribed_forcing() {
        let table = Table::from_reader(
            "calibration",
            ",scale Volcanic,solar_amplitude,solar_trend\n1,1.0,1.0,0.0\n2,0.5,2.0,0.1\n".as_bytes(),
        )
        .unwrap();
        let calibration = CalibrationSet::from_table(&table).unwrap();

        let forcing = prescribed_forcing(
            &array![-1.0, -2.0],
            &array![0.1, 0.2],
            &array![0.0, 1.0],
            &calibration,
        )
        .unwrap();

        assert_eq!(forcing[FORCING_VOLCANIC], array![[-1.0, -0.5], [-2.0, -1.0]]);
        let solar = &forcing[FORCING_SOLAR];
        assert_relative_eq!(solar[[0, 0]], 0.1);
        assert_relative_eq!(solar[[0, 1]], 0.2);
        assert_relative_eq!(solar[[1, 1]], 0.5);
    }
}
