//! Schelling-style residential segregation on a discrete grid.
//!
//! [`GridPopulation`] owns the category assignment over the grid and is the
//! only place it mutates. [`SimulationDriver`] runs the relocation loop to a
//! fixed point or an iteration budget and reports a [`RunSummary`].
//! Randomness is threaded through explicitly, so runs built from the same
//! [`SimConfig`] reproduce exactly.

pub mod config;
pub mod grid;
pub mod sim;
pub mod vacancy;

pub use config::{SimConfig, SimConfigError};
pub use grid::{Category, Cell, GridPopulation, PopulationError, PopulationSnapshot};
pub use sim::{IterationReport, RunError, RunState, RunSummary, SimulationDriver};
pub use vacancy::VacancySet;
