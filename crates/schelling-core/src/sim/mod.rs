pub mod metrics;

pub use metrics::*;

use crate::grid::{Category, Cell, GridPopulation, PopulationError};
use rand::Rng;
use std::{error::Error, fmt};

#[derive(Debug, Clone, PartialEq)]
pub enum RunError {
    NoIterationBudget,
    Population(PopulationError),
}

impl fmt::Display for RunError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunError::NoIterationBudget => write!(f, "max_iterations must be positive"),
            RunError::Population(e) => write!(f, "{}", e),
        }
    }
}

impl From<PopulationError> for RunError {
    fn from(err: PopulationError) -> Self {
        RunError::Population(err)
    }
}

impl Error for RunError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            RunError::Population(e) => Some(e),
            _ => None,
        }
    }
}

/// Relocation loop over a [`GridPopulation`].
///
/// Each iteration fixes the agent set up front, then checks those agents
/// one by one against live state, so relocations applied earlier in an
/// iteration are visible to later satisfaction checks. The run ends at the
/// first zero-change iteration or when the budget runs out.
#[derive(Clone, Copy, Debug)]
pub struct SimulationDriver {
    max_iterations: usize,
}

impl SimulationDriver {
    pub fn new(max_iterations: usize) -> Self {
        Self { max_iterations }
    }

    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    /// Run to convergence or budget exhaustion, handing each
    /// [`IterationReport`] to `observer` as it is produced.
    pub fn try_run_with_observer<R, F>(
        &self,
        population: &mut GridPopulation,
        rng: &mut R,
        mut observer: F,
    ) -> Result<RunSummary, RunError>
    where
        R: Rng + ?Sized,
        F: FnMut(&IterationReport),
    {
        if self.max_iterations == 0 {
            return Err(RunError::NoIterationBudget);
        }

        let mut state = RunState::Running;
        let mut iterations = Vec::new();
        let mut total_relocations = 0;

        for index in 1..=self.max_iterations {
            let changes = Self::sweep(population, rng)?;
            total_relocations += changes;
            let report = IterationReport { index, changes };
            observer(&report);
            iterations.push(report);
            if changes == 0 {
                state = RunState::Converged;
                break;
            }
        }
        if state == RunState::Running {
            state = RunState::Exhausted;
        }

        Ok(RunSummary {
            schema_version: 1,
            max_iterations: self.max_iterations,
            state,
            iterations,
            total_relocations,
            final_satisfied: population.satisfied_count(),
            final_similarity: population.similarity_ratio(),
        })
    }

    pub fn try_run<R: Rng + ?Sized>(
        &self,
        population: &mut GridPopulation,
        rng: &mut R,
    ) -> Result<RunSummary, RunError> {
        self.try_run_with_observer(population, rng, |_| {})
    }

    pub fn run<R: Rng + ?Sized>(
        &self,
        population: &mut GridPopulation,
        rng: &mut R,
    ) -> RunSummary {
        self.try_run(population, rng).unwrap_or_else(|e| panic!("{e}"))
    }

    /// One pass over the agents present when the iteration starts, in
    /// row-major order. An unsatisfied agent moves to a random vacancy at
    /// once, so later checks in the same pass see the updated grid. A
    /// snapshot cell keeps its agent until its own entry comes up, so each
    /// lookup lands on a live agent and no agent is visited twice.
    fn sweep<R: Rng + ?Sized>(
        population: &mut GridPopulation,
        rng: &mut R,
    ) -> Result<usize, RunError> {
        let mut snapshot: Vec<(Cell, Category)> = population.agents().collect();
        snapshot.sort_unstable_by_key(|&(cell, _)| (cell.y, cell.x));

        let mut changes = 0;
        for (cell, _) in snapshot {
            if population.try_is_satisfied(cell)? {
                continue;
            }
            let dest = population
                .sample_vacancy(rng)
                .ok_or(PopulationError::NoVacantCell)?;
            population.try_relocate(cell, dest)?;
            changes += 1;
        }
        Ok(changes)
    }
}
