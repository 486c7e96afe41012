//! Constraint generation for unit commitment and ramp trajectories of dispatchable generators.
#![warn(missing_docs)]
pub mod error;
pub mod generator;
pub mod id;
pub mod input;
pub mod linked;
pub mod log;
pub mod model;
pub mod optimisation;
pub mod output;
pub mod problem;
pub mod requirements;
pub mod settings;
pub mod temporal;
pub mod units;

#[cfg(test)]
mod fixture;
