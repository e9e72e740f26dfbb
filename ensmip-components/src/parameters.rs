//! Calibrated parameters of the reference emulator
//!
//! One [`EmulatorParameters`] is resolved per configuration from the columns of the
//! calibrated, constrained parameter set.

use ensmip_core::errors::{EnsembleError, EnsembleResult};
use ensmip_core::model::RunSetup;
use serde::{Deserialize, Serialize};

/// Parameters of a single configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmulatorParameters {
    /// Heat capacity of the surface layer
    /// unit: W yr / (m^2 K)
    pub c1: f64,
    /// unit: W yr / (m^2 K)
    pub c2: f64,
    /// unit: W yr / (m^2 K)
    pub c3: f64,
    /// Climate feedback parameter
    /// unit: W / (m^2 K)
    pub kappa1: f64,
    /// Heat exchange between the surface and the upper ocean
    /// unit: W / (m^2 K)
    pub kappa2: f64,
    /// Heat exchange between the upper and the deep ocean
    /// unit: W / (m^2 K)
    pub kappa3: f64,
    /// Deep ocean heat uptake efficacy
    pub epsilon: f64,
    /// Forcing from a quadrupling of CO2
    /// unit: W / m^2
    pub f_4xco2: f64,
    /// Pre-industrial time-integrated airborne fraction
    /// unit: yr
    pub r0: f64,
    /// Sensitivity of the airborne fraction to cumulative uptake
    /// unit: yr / GtC
    pub r_u: f64,
    /// Sensitivity of the airborne fraction to temperature
    /// unit: yr / K
    pub r_t: f64,
    /// unit: ppm
    pub co2_concentration_1750: f64,
    pub scale_co2: f64,
    pub scale_ch4: f64,
    pub scale_n2o: f64,
    /// Aerosol-radiation interaction per unit sulfur emissions
    /// unit: W / m^2 / (Mt SO2 / yr)
    pub ari_sulfur: f64,
    /// unit: W / m^2 / (Mt BC / yr)
    pub ari_bc: f64,
    /// unit: W / m^2 / (Mt OC / yr)
    pub ari_oc: f64,
    /// Aerosol-cloud interaction scale
    /// unit: W / m^2
    pub beta: f64,
    /// Sulfur emissions at which the aerosol-cloud interaction saturates
    /// unit: Mt SO2 / yr
    pub shape_sulfur: f64,
}

/// Calibration column of every field, in field order
pub const CALIBRATION_COLUMNS: [&str; 20] = [
    "c1",
    "c2",
    "c3",
    "kappa1",
    "kappa2",
    "kappa3",
    "epsilon",
    "F_4xCO2",
    "r0",
    "rU",
    "rT",
    "co2_concentration_1750",
    "scale CO2",
    "scale CH4",
    "scale N2O",
    "ari Sulfur",
    "ari BC",
    "ari OC",
    "beta",
    "shape Sulfur",
];

impl EmulatorParameters {
    /// Resolve the parameters of configuration `config`
    pub fn from_setup(setup: &RunSetup, config: usize) -> EnsembleResult<Self> {
        let value = |name: &str| -> EnsembleResult<f64> {
            let values = setup.parameter(name)?;
            values.get(config).copied().ok_or_else(|| {
                EnsembleError::Shape(format!(
                    "parameter {} has no value for configuration {}",
                    name, config
                ))
            })
        };

        let parameters = Self {
            c1: value("c1")?,
            c2: value("c2")?,
            c3: value("c3")?,
            kappa1: value("kappa1")?,
            kappa2: value("kappa2")?,
            kappa3: value("kappa3")?,
            epsilon: value("epsilon")?,
            f_4xco2: value("F_4xCO2")?,
            r0: value("r0")?,
            r_u: value("rU")?,
            r_t: value("rT")?,
            co2_concentration_1750: value("co2_concentration_1750")?,
            scale_co2: value("scale CO2")?,
            scale_ch4: value("scale CH4")?,
            scale_n2o: value("scale N2O")?,
            ari_sulfur: value("ari Sulfur")?,
            ari_bc: value("ari BC")?,
            ari_oc: value("ari OC")?,
            beta: value("beta")?,
            shape_sulfur: value("shape Sulfur")?,
        };
        parameters.validate(config)?;
        Ok(parameters)
    }

    fn validate(&self, config: usize) -> EnsembleResult<()> {
        let positive = [
            ("c1", self.c1),
            ("c2", self.c2),
            ("c3", self.c3),
            ("kappa1", self.kappa1),
            ("co2_concentration_1750", self.co2_concentration_1750),
            ("shape Sulfur", self.shape_sulfur),
        ];
        for (name, value) in positive {
            if value.is_nan() || value <= 0.0 {
                return Err(EnsembleError::Model {
                    reason: format!(
                        "parameter {} of configuration {} must be positive, got {}",
                        name, config, value
                    ),
                });
            }
        }
        Ok(())
    }

    /// Forcing from a doubling of CO2
    pub fn f_2xco2(&self) -> f64 {
        self.f_4xco2 / 2.0
    }

    /// Equilibrium climate sensitivity
    pub fn ecs(&self) -> f64 {
        self.f_2xco2() / self.kappa1
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use ensmip_core::model::TimeAxis;
    use indexmap::IndexMap;
    use ndarray::Array1;

    /// A plausible set of calibrated values, used across the crate's tests
    pub(crate) fn calibration_values() -> Vec<(&'static str, f64)> {
        vec![
            ("c1", 4.0),
            ("c2", 10.0),
            ("c3", 75.0),
            ("kappa1", 1.2),
            ("kappa2", 2.5),
            ("kappa3", 0.75),
            ("epsilon", 1.3),
            ("F_4xCO2", 8.0),
            ("r0", 33.9),
            ("rU", 0.019),
            ("rT", 4.165),
            ("co2_concentration_1750", 278.3),
            ("scale CO2", 1.0),
            ("scale CH4", 1.0),
            ("scale N2O", 1.0),
            ("ari Sulfur", -0.0036),
            ("ari BC", 0.05),
            ("ari OC", -0.005),
            ("beta", 0.7),
            ("shape Sulfur", 80.0),
        ]
    }

    pub(crate) fn parameter_columns(n_configs: usize) -> IndexMap<String, Array1<f64>> {
        calibration_values()
            .into_iter()
            .map(|(name, value)| (name.to_string(), Array1::from_elem(n_configs, value)))
            .collect()
    }

    /// Parameters of a single configuration built from [`calibration_values`]
    pub(crate) fn test_parameters() -> EmulatorParameters {
        EmulatorParameters::from_setup(&setup(parameter_columns(2)), 0).unwrap()
    }

    fn setup(parameters: IndexMap<String, Array1<f64>>) -> RunSetup {
        RunSetup {
            time_axis: TimeAxis::new(1750, 1760),
            scenarios: vec!["SSP2|Baseline_CLE".to_string()],
            configs: vec!["1".to_string(), "2".to_string()],
            emissions: IndexMap::new(),
            forcing: IndexMap::new(),
            parameters,
        }
    }

    #[test]
    fn test_columns_match_fields() {
        let names: Vec<&str> = calibration_values().iter().map(|(name, _)| *name).collect();
        assert_eq!(names, CALIBRATION_COLUMNS.to_vec());
    }

    #[test]
    fn test_from_setup() {
        let mut columns = parameter_columns(2);
        columns["kappa1"][1] = 0.8;

        let parameters = EmulatorParameters::from_setup(&setup(columns), 1).unwrap();

        assert_eq!(parameters.kappa1, 0.8);
        assert_eq!(parameters.f_4xco2, 8.0);
        assert_eq!(parameters.shape_sulfur, 80.0);
        assert_eq!(parameters.f_2xco2(), 4.0);
        assert_eq!(parameters.ecs(), 5.0);
    }

    #[test]
    fn test_missing_column() {
        let mut columns = parameter_columns(2);
        columns.shift_remove("epsilon");

        let result = EmulatorParameters::from_setup(&setup(columns), 0);
        assert!(matches!(
            result,
            Err(EnsembleError::MissingParameter(name)) if name == "epsilon"
        ));
    }

    #[test]
    fn test_non_physical_value() {
        let mut columns = parameter_columns(2);
        columns["c1"][0] = 0.0;

        let result = EmulatorParameters::from_setup(&setup(columns), 0);
        assert!(matches!(result, Err(EnsembleError::Model { .. })));
    }
}
