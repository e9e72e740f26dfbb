//! Core building blocks for running a climate emulator over a scenario ensemble.
//!
//! An ensemble is a list of [`job::ScenarioJob`]s, each of which is handed to a worker
//! function by the [`dispatch`] module. The worker drives a [`model::ClimateModel`]
//! and stores its results as an [`output::ScenarioOutput`] archive.

pub mod config;
pub mod datasets;
pub mod dispatch;
pub mod errors;
pub mod job;
pub mod model;
pub mod output;
pub mod tabular;
