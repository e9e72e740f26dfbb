//! Reference climate emulator for ensmip
//!
//! A small, deterministic, emissions-driven model that implements
//! [`ensmip_core::model::ClimateModel`] so scenario ensembles can be run end to end.
//!
//! # Module Organisation
//!
//! - `gas_cycle`: CO2, CH4 and N2O concentrations from emissions
//! - `forcing`: effective radiative forcing of every agent
//! - `energy_balance`: three layer energy balance model
//! - `emulator`: couples the above into [`ReferenceEmulator`]
//!
//! Calibrated parameters are resolved per configuration in `parameters`.

pub mod emulator;
pub mod energy_balance;
pub mod forcing;
pub mod gas_cycle;
pub mod parameters;

pub use emulator::ReferenceEmulator;
