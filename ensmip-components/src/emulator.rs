use crate::energy_balance::{ClimateState, ThreeLayerModel};
use crate::forcing::{self, AerosolEmissions, ForcingBreakdown};
use crate::gas_cycle::{self, GasCycleState, GasEmissions};
use crate::parameters::EmulatorParameters;
use ensmip_core::errors::{EnsembleError, EnsembleResult};
use ensmip_core::model::{
    ClimateModel, ModelOutputs, RunSetup, FORCING_SOLAR, FORCING_VOLCANIC, OUTPUT_CH4_CONCENTRATION,
    OUTPUT_ERF, OUTPUT_OHC, OUTPUT_TEMPERATURE,
};
use ndarray::{Array2, Array3};
use tracing::debug;

/// Emitted species read by the emulator
pub const SPECIES: [&str; 7] = ["CO2 FFI", "CO2 AFOLU", "CH4", "N2O", "Sulfur", "BC", "OC"];

/// Emissions of every species used by the emulator, shape (timepoints, scenarios)
#[derive(Debug, Clone)]
struct EmissionsInput {
    co2: Array2<f64>,
    ch4: Array2<f64>,
    n2o: Array2<f64>,
    sulfur: Array2<f64>,
    bc: Array2<f64>,
    oc: Array2<f64>,
}

impl EmissionsInput {
    fn from_setup(setup: &RunSetup) -> EnsembleResult<Self> {
        Ok(Self {
            co2: setup.emissions_of("CO2 FFI")? + setup.emissions_of("CO2 AFOLU")?,
            ch4: setup.emissions_of("CH4")?.clone(),
            n2o: setup.emissions_of("N2O")?.clone(),
            sulfur: setup.emissions_of("Sulfur")?.clone(),
            bc: setup.emissions_of("BC")?.clone(),
            oc: setup.emissions_of("OC")?.clone(),
        })
    }

    fn gases(&self, timepoint: usize, scenario: usize) -> GasEmissions {
        GasEmissions {
            co2: self.co2[[timepoint, scenario]],
            ch4: self.ch4[[timepoint, scenario]],
            n2o: self.n2o[[timepoint, scenario]],
        }
    }

    fn aerosols(&self, timepoint: usize, scenario: usize) -> AerosolEmissions {
        AerosolEmissions {
            sulfur: self.sulfur[[timepoint, scenario]],
            bc: self.bc[[timepoint, scenario]],
            oc: self.oc[[timepoint, scenario]],
        }
    }
}

/// A configured run of the [`ReferenceEmulator`]
#[derive(Debug, Clone)]
pub struct ConfiguredEmulator {
    setup: RunSetup,
    parameters: Vec<EmulatorParameters>,
    emissions: EmissionsInput,
    volcanic: Array2<f64>,
    solar: Array2<f64>,
}

impl ConfiguredEmulator {
    pub fn setup(&self) -> &RunSetup {
        &self.setup
    }

    pub fn parameters(&self) -> &[EmulatorParameters] {
        &self.parameters
    }
}

/// Time series of a single (scenario, configuration) pair on the model timebounds
#[derive(Debug, Clone, Default)]
struct Trajectory {
    temperature: Vec<f64>,
    erf: Vec<f64>,
    ocean_heat_content_change: Vec<f64>,
    ch4_concentration: Vec<f64>,
}

/// Emissions-driven reference emulator.
///
/// Couples the gas cycles, the forcing calculation and the three layer energy balance
/// model with an annual step. Each (scenario, configuration) pair is independent.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReferenceEmulator;

impl ReferenceEmulator {
    pub fn new() -> Self {
        Self
    }

    fn run_member(
        &self,
        handle: &ConfiguredEmulator,
        scenario: usize,
        config: usize,
    ) -> EnsembleResult<Trajectory> {
        let parameters = &handle.parameters[config];
        let energy_balance = ThreeLayerModel::from_parameters(parameters);
        let n_timepoints = handle.setup.time_axis.n_timepoints();

        let mut trajectory = Trajectory::default();
        let mut gases = GasCycleState::preindustrial(parameters);
        let mut climate = ClimateState::default();

        let reference = handle.emissions.aerosols(0, scenario);
        let forcing_at = |timebound: usize, gases: &GasCycleState, aerosols: &AerosolEmissions| {
            forcing::calculate(
                parameters,
                gases,
                aerosols,
                &reference,
                handle.volcanic[[timebound, config]],
                handle.solar[[timebound, config]],
            )
        };

        let mut forcing: ForcingBreakdown = forcing_at(0, &gases, &reference);
        trajectory.record(&climate, &forcing, &gases);

        for timepoint in 0..n_timepoints {
            gases = gas_cycle::step(
                parameters,
                &gases,
                &handle.emissions.gases(timepoint, scenario),
                climate.surface,
            );
            let next_forcing = forcing_at(
                timepoint + 1,
                &gases,
                &handle.emissions.aerosols(timepoint, scenario),
            );
            if !next_forcing.total().is_finite() {
                return Err(EnsembleError::Model {
                    reason: format!(
                        "non-finite forcing {:?} at timebound {} of scenario {} config {}",
                        next_forcing,
                        timepoint + 1,
                        handle.setup.scenarios[scenario],
                        handle.setup.configs[config]
                    ),
                });
            }

            let driving =
                0.5 * (forcing.efficacy_weighted() + next_forcing.efficacy_weighted());
            climate = energy_balance.step(&climate, driving)?;
            forcing = next_forcing;
            trajectory.record(&climate, &forcing, &gases);
        }

        Ok(trajectory)
    }
}

impl Trajectory {
    fn record(&mut self, climate: &ClimateState, forcing: &ForcingBreakdown, gases: &GasCycleState) {
        self.temperature.push(climate.surface);
        self.erf.push(forcing.total());
        self.ocean_heat_content_change
            .push(climate.ocean_heat_content_change);
        self.ch4_concentration.push(gases.ch4);
    }
}

impl ClimateModel for ReferenceEmulator {
    type Handle = ConfiguredEmulator;

    fn configure(&self, setup: RunSetup) -> EnsembleResult<ConfiguredEmulator> {
        setup.validate()?;

        let parameters = (0..setup.n_configs())
            .map(|config| EmulatorParameters::from_setup(&setup, config))
            .collect::<EnsembleResult<Vec<_>>>()?;
        let emissions = EmissionsInput::from_setup(&setup)?;
        let volcanic = setup.forcing_of(FORCING_VOLCANIC);
        let solar = setup.forcing_of(FORCING_SOLAR);

        Ok(ConfiguredEmulator {
            setup,
            parameters,
            emissions,
            volcanic,
            solar,
        })
    }

    fn run(&self, handle: ConfiguredEmulator) -> EnsembleResult<ModelOutputs> {
        let shape = (
            handle.setup.time_axis.n_timebounds(),
            handle.setup.n_scenarios(),
            handle.setup.n_configs(),
        );
        let mut temperature = Array3::zeros(shape);
        let mut erf = Array3::zeros(shape);
        let mut ohc = Array3::zeros(shape);
        let mut ch4 = Array3::zeros(shape);

        for scenario in 0..shape.1 {
            for config in 0..shape.2 {
                let trajectory = self.run_member(&handle, scenario, config)?;
                for timebound in 0..shape.0 {
                    let idx = [timebound, scenario, config];
                    temperature[idx] = trajectory.temperature[timebound];
                    erf[idx] = trajectory.erf[timebound];
                    ohc[idx] = trajectory.ocean_heat_content_change[timebound];
                    ch4[idx] = trajectory.ch4_concentration[timebound];
                }
            }
        }
        debug!(
            scenarios = shape.1,
            configs = shape.2,
            timebounds = shape.0,
            "reference emulator run complete"
        );

        let mut outputs = ModelOutputs::new();
        outputs.insert(OUTPUT_TEMPERATURE, temperature);
        outputs.insert(OUTPUT_ERF, erf);
        outputs.insert(OUTPUT_OHC, ohc);
        outputs.insert(OUTPUT_CH4_CONCENTRATION, ch4);
        Ok(outputs)
    }
}
