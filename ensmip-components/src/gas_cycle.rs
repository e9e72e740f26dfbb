//! Greenhouse gas cycles
//!
//! CO2 uses a single box whose airborne fraction grows with cumulative uptake and
//! temperature. CH4 and N2O are one-box decays towards their pre-industrial
//! concentrations, driven by the anomaly of emissions relative to natural emissions.

use crate::parameters::EmulatorParameters;
use serde::{Deserialize, Serialize};

/// Mass of CO2 raising the atmospheric concentration by one ppm
/// unit: GtCO2 / ppm
pub const GTCO2_PER_PPM: f64 = 7.8;
/// unit: GtCO2 / GtC
pub const GTCO2_PER_GTC: f64 = 44.009 / 12.011;
/// Time horizon of the integrated impulse response
/// unit: yr
pub const IIRF_HORIZON: f64 = 100.0;

/// Atmospheric CH4 lifetime
/// unit: yr
pub const CH4_LIFETIME: f64 = 10.11702748;
/// Natural CH4 emissions that keep the pre-industrial concentration constant
/// unit: Mt CH4 / yr
pub const CH4_BASELINE_EMISSIONS: f64 = 19.019783117809567;
/// unit: ppb
pub const CH4_PREINDUSTRIAL: f64 = 729.2;
/// unit: Mt CH4 / ppb
pub const CH4_MT_PER_PPB: f64 = 2.75;

/// Atmospheric N2O lifetime
/// unit: yr
pub const N2O_LIFETIME: f64 = 109.0;
/// unit: Mt N2O / yr
pub const N2O_BASELINE_EMISSIONS: f64 = 0.08602230754;
/// unit: ppb
pub const N2O_PREINDUSTRIAL: f64 = 270.1;
/// unit: Mt N2O / ppb
pub const N2O_MT_PER_PPB: f64 = 4.79;

/// Emissions of a single year, in model units
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct GasEmissions {
    /// unit: GtCO2 / yr
    pub co2: f64,
    /// unit: Mt CH4 / yr
    pub ch4: f64,
    /// unit: Mt N2O / yr
    pub n2o: f64,
}

/// Concentrations and carbon pools at a timebound.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GasCycleState {
    /// unit: ppm
    pub co2: f64,
    /// unit: ppb
    pub ch4: f64,
    /// unit: ppb
    pub n2o: f64,
    /// CO2 taken up by land and ocean since the start of the run
    /// unit: GtC
    pub cumulative_uptake: f64,
}

impl GasCycleState {
    pub fn preindustrial(parameters: &EmulatorParameters) -> Self {
        Self {
            co2: parameters.co2_concentration_1750,
            ch4: CH4_PREINDUSTRIAL,
            n2o: N2O_PREINDUSTRIAL,
            cumulative_uptake: 0.0,
        }
    }
}

/// Fraction of CO2 emissions that stays in the atmosphere
pub fn airborne_fraction(
    parameters: &EmulatorParameters,
    cumulative_uptake: f64,
    temperature: f64,
) -> f64 {
    let iirf = parameters.r0 + parameters.r_u * cumulative_uptake + parameters.r_t * temperature;
    (iirf / IIRF_HORIZON).clamp(0.0, 1.0)
}

/// Exact one-year solution of `dA/dt = E / m - A / tau` for a concentration anomaly `A`
fn decay_step(anomaly: f64, emissions: f64, mass_per_unit: f64, lifetime: f64) -> f64 {
    let decay = (-1.0 / lifetime).exp();
    anomaly * decay + emissions / mass_per_unit * lifetime * (1.0 - decay)
}

/// Advance the gas cycle by one year.
///
/// `temperature` is the surface temperature anomaly at the start of the year.
pub fn step(
    parameters: &EmulatorParameters,
    state: &GasCycleState,
    emissions: &GasEmissions,
    temperature: f64,
) -> GasCycleState {
    let fraction = airborne_fraction(parameters, state.cumulative_uptake, temperature);
    let co2 = state.co2 + fraction * emissions.co2 / GTCO2_PER_PPM;
    let cumulative_uptake = state.cumulative_uptake + (1.0 - fraction) * emissions.co2 / GTCO2_PER_GTC;

    let ch4 = CH4_PREINDUSTRIAL
        + decay_step(
            state.ch4 - CH4_PREINDUSTRIAL,
            emissions.ch4 - CH4_BASELINE_EMISSIONS,
            CH4_MT_PER_PPB,
            CH4_LIFETIME,
        );
    let n2o = N2O_PREINDUSTRIAL
        + decay_step(
            state.n2o - N2O_PREINDUSTRIAL,
            emissions.n2o - N2O_BASELINE_EMISSIONS,
            N2O_MT_PER_PPB,
            N2O_LIFETIME,
        );

    GasCycleState {
        co2,
        // Concentrations cannot be driven below zero by strongly negative emissions
        ch4: ch4.max(0.0),
        n2o: n2o.max(0.0),
        cumulative_uptake,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parameters::tests::test_parameters as parameters;
    use approx::assert_relative_eq;

    fn natural_emissions() -> GasEmissions {
        GasEmissions {
            co2: 0.0,
            ch4: CH4_BASELINE_EMISSIONS,
            n2o: N2O_BASELINE_EMISSIONS,
        }
    }

    #[test]
    fn test_natural_emissions_are_steady() {
        let parameters = parameters();
        let mut state = GasCycleState::preindustrial(&parameters);

        for _ in 0..50 {
            state = step(&parameters, &state, &natural_emissions(), 0.0);
        }

        assert_relative_eq!(state.co2, 278.3);
        assert_relative_eq!(state.ch4, CH4_PREINDUSTRIAL);
        assert_relative_eq!(state.n2o, N2O_PREINDUSTRIAL);
        assert_eq!(state.cumulative_uptake, 0.0);
    }

    #[test]
    fn test_co2_accumulates() {
        let parameters = parameters();
        let state = GasCycleState::preindustrial(&parameters);
        let emissions = GasEmissions {
            co2: 39.0,
            ..natural_emissions()
        };

        let next = step(&parameters, &state, &emissions, 0.0);

        let fraction = 33.9 / IIRF_HORIZON;
        assert_relative_eq!(next.co2, 278.3 + fraction * 39.0 / GTCO2_PER_PPM);
        assert_relative_eq!(
            next.cumulative_uptake,
            (1.0 - fraction) * 39.0 / GTCO2_PER_GTC
        );
    }

    #[test]
    fn test_airborne_fraction_feedbacks() {
        let parameters = parameters();

        let base = airborne_fraction(&parameters, 0.0, 0.0);
        assert!(airborne_fraction(&parameters, 500.0, 0.0) > base);
        assert!(airborne_fraction(&parameters, 0.0, 2.0) > base);
        assert_eq!(airborne_fraction(&parameters, 1e6, 0.0), 1.0);
        assert_eq!(airborne_fraction(&parameters, 0.0, -100.0), 0.0);
    }

    #[test]
    fn test_ch4_relaxes_to_equilibrium() {
        let parameters = parameters();
        let mut state = GasCycleState::preindustrial(&parameters);
        let emissions = GasEmissions {
            ch4: CH4_BASELINE_EMISSIONS + 100.0,
            ..natural_emissions()
        };

        for _ in 0..500 {
            state = step(&parameters, &state, &emissions, 0.0);
        }

        // Equilibrium anomaly is E * tau / m
        let expected = CH4_PREINDUSTRIAL + 100.0 * CH4_LIFETIME / CH4_MT_PER_PPB;
        assert_relative_eq!(state.ch4, expected, max_relative = 1e-9);
    }

    #[test]
    fn test_concentrations_stay_positive() {
        let parameters = parameters();
        let state = GasCycleState::preindustrial(&parameters);
        let emissions = GasEmissions {
            ch4: -1e6,
            n2o: -1e6,
            ..natural_emissions()
        };

        let next = step(&parameters, &state, &emissions, 0.0);
        assert_eq!(next.ch4, 0.0);
        assert_eq!(next.n2o, 0.0);
    }
}
