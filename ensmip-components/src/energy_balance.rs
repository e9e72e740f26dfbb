//! Three-layer energy balance model
//!
//! The surface layer receives the forcing and loses heat through the climate feedback
//! and exchange with the upper ocean, which in turn exchanges heat with the deep ocean:
//!
//! $$ C_1 \frac{dT_1}{dt} = F - \kappa_1 T_1 - \kappa_2 (T_1 - T_2) $$
//! $$ C_2 \frac{dT_2}{dt} = \kappa_2 (T_1 - T_2) - \epsilon \kappa_3 (T_2 - T_3) $$
//! $$ C_3 \frac{dT_3}{dt} = \kappa_3 (T_2 - T_3) $$
//!
//! Forcing is held constant over each annual step, which is integrated with RK4.

use crate::parameters::EmulatorParameters;
use ensmip_core::errors::{EnsembleError, EnsembleResult};
use ode_solvers::*;

type ModelState = Vector3<f64>;

/// Integration step within each year
const STEP_SIZE: f64 = 0.1;

/// Seconds in a year
/// unit: s
pub const SECONDS_PER_YEAR: f64 = 365.25 * 24.0 * 3600.0;
/// Surface area of the Earth
/// unit: m^2
pub const EARTH_AREA: f64 = 5.100656e14;

#[derive(Debug, Clone)]
struct ThreeLayerSystem {
    c1: f64,
    c2: f64,
    c3: f64,
    kappa1: f64,
    kappa2: f64,
    kappa3: f64,
    epsilon: f64,
    forcing: f64,
}

impl System<f64, ModelState> for ThreeLayerSystem {
    fn system(&self, _t: f64, y: &ModelState, dy: &mut ModelState) {
        let (t1, t2, t3) = (y[0], y[1], y[2]);

        dy[0] = (self.forcing - self.kappa1 * t1 - self.kappa2 * (t1 - t2)) / self.c1;
        dy[1] = (self.kappa2 * (t1 - t2) - self.epsilon * self.kappa3 * (t2 - t3)) / self.c2;
        dy[2] = self.kappa3 * (t2 - t3) / self.c3;
    }
}

/// Layer temperature anomalies and accumulated ocean heat
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ClimateState {
    /// Surface temperature anomaly
    /// unit: K
    pub surface: f64,
    /// unit: K
    pub upper_ocean: f64,
    /// unit: K
    pub deep_ocean: f64,
    /// Heat accumulated since the start of the run
    /// unit: J
    pub ocean_heat_content_change: f64,
}

#[derive(Debug, Clone)]
pub struct ThreeLayerModel {
    c1: f64,
    c2: f64,
    c3: f64,
    kappa1: f64,
    kappa2: f64,
    kappa3: f64,
    epsilon: f64,
}

impl ThreeLayerModel {
    pub fn from_parameters(parameters: &EmulatorParameters) -> Self {
        Self {
            c1: parameters.c1,
            c2: parameters.c2,
            c3: parameters.c3,
            kappa1: parameters.kappa1,
            kappa2: parameters.kappa2,
            kappa3: parameters.kappa3,
            epsilon: parameters.epsilon,
        }
    }

    /// Top of atmosphere energy imbalance
    /// unit: W / m^2
    pub fn toa_imbalance(&self, state: &ClimateState, forcing: f64) -> f64 {
        forcing - self.kappa1 * state.surface
            + (1.0 - self.epsilon) * self.kappa3 * (state.upper_ocean - state.deep_ocean)
    }

    /// Advance the model by one year under constant `forcing`
    pub fn step(&self, state: &ClimateState, forcing: f64) -> EnsembleResult<ClimateState> {
        let system = ThreeLayerSystem {
            c1: self.c1,
            c2: self.c2,
            c3: self.c3,
            kappa1: self.kappa1,
            kappa2: self.kappa2,
            kappa3: self.kappa3,
            epsilon: self.epsilon,
            forcing,
        };
        let y0 = ModelState::new(state.surface, state.upper_ocean, state.deep_ocean);

        let mut solver = Rk4::new(system, 0.0, y0, 1.0, STEP_SIZE);
        solver
            .integrate()
            .map_err(|e| EnsembleError::Model {
                reason: format!("energy balance integration failed: {:?}", e),
            })?;

        let (_, y_out) = solver.results().get();
        let y = y_out.last().ok_or_else(|| EnsembleError::Model {
            reason: "energy balance integration produced no output".to_string(),
        })?;

        let mut next = ClimateState {
            surface: y[0],
            upper_ocean: y[1],
            deep_ocean: y[2],
            ocean_heat_content_change: state.ocean_heat_content_change,
        };

        // Trapezoidal estimate of the heat absorbed over the year
        let imbalance =
            0.5 * (self.toa_imbalance(state, forcing) + self.toa_imbalance(&next, forcing));
        next.ocean_heat_content_change += imbalance * EARTH_AREA * SECONDS_PER_YEAR;

        if !(next.surface.is_finite()
            && next.upper_ocean.is_finite()
            && next.deep_ocean.is_finite()
            && next.ocean_heat_content_change.is_finite())
        {
            return Err(EnsembleError::Model {
                reason: format!("non-finite climate state {:?}", next),
            });
        }
        Ok(next)
    }
}
