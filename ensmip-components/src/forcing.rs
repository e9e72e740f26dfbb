//! Effective radiative forcing from concentrations, aerosol emissions and exogenous agents

use crate::gas_cycle::{GasCycleState, CH4_PREINDUSTRIAL, N2O_PREINDUSTRIAL};
use crate::parameters::EmulatorParameters;
use serde::{Deserialize, Serialize};

/// Efficacy of volcanic forcing relative to CO2
pub const VOLCANIC_EFFICACY: f64 = 0.6;

/// unit: W / m^2 / ppb^0.5
const CH4_SQRT_COEFFICIENT: f64 = 0.036;
/// unit: W / m^2 / ppb^0.5
const N2O_SQRT_COEFFICIENT: f64 = 0.12;

/// Aerosol precursor emissions of a single year
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AerosolEmissions {
    /// unit: Mt SO2 / yr
    pub sulfur: f64,
    /// unit: Mt BC / yr
    pub bc: f64,
    /// unit: Mt OC / yr
    pub oc: f64,
}

/// Forcing of every agent at one timebound
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ForcingBreakdown {
    pub co2: f64,
    pub ch4: f64,
    pub n2o: f64,
    pub aerosol_radiation: f64,
    pub aerosol_cloud: f64,
    pub volcanic: f64,
    pub solar: f64,
}

impl ForcingBreakdown {
    /// Total effective radiative forcing
    pub fn total(&self) -> f64 {
        self.co2
            + self.ch4
            + self.n2o
            + self.aerosol_radiation
            + self.aerosol_cloud
            + self.volcanic
            + self.solar
    }

    /// Forcing felt by the surface temperature, with volcanic forcing weighted by its efficacy
    pub fn efficacy_weighted(&self) -> f64 {
        self.total() - (1.0 - VOLCANIC_EFFICACY) * self.volcanic
    }
}

/// Forcing from greenhouse gas concentrations
pub fn greenhouse_gas_forcing(
    parameters: &EmulatorParameters,
    state: &GasCycleState,
) -> (f64, f64, f64) {
    let co2 = parameters.scale_co2 * parameters.f_2xco2()
        * (state.co2 / parameters.co2_concentration_1750).ln()
        / std::f64::consts::LN_2;
    let ch4 = parameters.scale_ch4
        * CH4_SQRT_COEFFICIENT
        * (state.ch4.sqrt() - CH4_PREINDUSTRIAL.sqrt());
    let n2o = parameters.scale_n2o
        * N2O_SQRT_COEFFICIENT
        * (state.n2o.sqrt() - N2O_PREINDUSTRIAL.sqrt());
    (co2, ch4, n2o)
}

/// Aerosol forcing relative to the emissions of the first year of the run
pub fn aerosol_forcing(
    parameters: &EmulatorParameters,
    emissions: &AerosolEmissions,
    reference: &AerosolEmissions,
) -> (f64, f64) {
    let radiation = parameters.ari_sulfur * (emissions.sulfur - reference.sulfur)
        + parameters.ari_bc * (emissions.bc - reference.bc)
        + parameters.ari_oc * (emissions.oc - reference.oc);

    let cloud_response = |sulfur: f64| (1.0 + sulfur.max(0.0) / parameters.shape_sulfur).ln();
    let cloud =
        -parameters.beta * (cloud_response(emissions.sulfur) - cloud_response(reference.sulfur));

    (radiation, cloud)
}

/// Forcing of every agent at a timebound
pub fn calculate(
    parameters: &EmulatorParameters,
    state: &GasCycleState,
    aerosols: &AerosolEmissions,
    reference: &AerosolEmissions,
    volcanic: f64,
    solar: f64,
) -> ForcingBreakdown {
    let (co2, ch4, n2o) = greenhouse_gas_forcing(parameters, state);
    let (aerosol_radiation, aerosol_cloud) = aerosol_forcing(parameters, aerosols, reference);

    ForcingBreakdown {
        co2,
        ch4,
        n2o,
        aerosol_radiation,
        aerosol_cloud,
        volcanic,
        solar,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parameters::tests::test_parameters;
    use approx::assert_relative_eq;

    #[test]
    fn test_preindustrial_is_zero() {
        let parameters = test_parameters();
        let state = GasCycleState::preindustrial(&parameters);
        let aerosols = AerosolEmissions {
            sulfur: 2.0,
            bc: 2.1,
            oc: 15.0,
        };

        let forcing = calculate(&parameters, &state, &aerosols, &aerosols, 0.0, 0.0);
        assert_eq!(forcing.total(), 0.0);
    }

    #[test]
    fn test_co2_doubling() {
        let parameters = test_parameters();
        let state = GasCycleState {
            co2: 2.0 * 278.3,
            ..GasCycleState::preindustrial(&parameters)
        };

        let (co2, ch4, n2o) = greenhouse_gas_forcing(&parameters, &state);
        assert_relative_eq!(co2, 4.0);
        assert_eq!(ch4, 0.0);
        assert_eq!(n2o, 0.0);
    }

    #[test]
    fn test_aerosols_cool() {
        let parameters = test_parameters();
        let reference = AerosolEmissions::default();
        let emissions = AerosolEmissions {
            sulfur: 100.0,
            ..reference
        };

        let (radiation, cloud) = aerosol_forcing(&parameters, &emissions, &reference);
        assert_relative_eq!(radiation, -0.36);
        assert_relative_eq!(cloud, -0.7 * (1.0 + 100.0_f64 / 80.0).ln());
    }

    #[test]
    fn test_volcanic_efficacy() {
        let forcing = ForcingBreakdown {
            co2: 1.0,
            volcanic: -2.0,
            solar: 0.1,
            ..Default::default()
        };

        assert_relative_eq!(forcing.total(), -0.9);
        assert_relative_eq!(forcing.efficacy_weighted(), 1.0 - 1.2 + 0.1);
    }
}
