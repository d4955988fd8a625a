use rand::SeedableRng;
use rand_chacha::ChaCha12Rng;
use serde::{Deserialize, Serialize};
use std::{error::Error, fmt};

/// Construction-time parameters for a segregation run.
///
/// Checked once by [`SimConfig::validate`]; every field stays fixed for the
/// lifetime of the populations and drivers built from it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SimConfig {
    /// Grid width in cells.
    pub width: u32,
    /// Grid height in cells.
    pub height: u32,
    /// Fraction of cells left vacant at initialization, in `[0, 1)`.
    pub empty_ratio: f64,
    /// Minimum fraction of same-category occupied neighbors an agent
    /// tolerates, in `[0, 1]`.
    pub similarity_threshold: f64,
    /// Number of agent categories, numbered `1..=nr_categories`.
    pub nr_categories: u32,
    /// Iteration budget for the relocation loop.
    pub max_iterations: usize,
    /// Seed for the run's random source.
    pub seed: u64,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            width: 20,
            height: 20,
            empty_ratio: 0.3,
            similarity_threshold: 0.3,
            nr_categories: 2,
            max_iterations: 100,
            seed: 42,
        }
    }
}

impl SimConfig {
    pub fn validate(&self) -> Result<(), SimConfigError> {
        if self.width == 0 || self.height == 0 {
            return Err(SimConfigError::ZeroArea);
        }
        self.total_cells()?;
        if !(0.0..1.0).contains(&self.empty_ratio) {
            return Err(SimConfigError::EmptyRatioOutOfRange(self.empty_ratio));
        }
        if !(0.0..=1.0).contains(&self.similarity_threshold) {
            return Err(SimConfigError::SimilarityThresholdOutOfRange(
                self.similarity_threshold,
            ));
        }
        if self.nr_categories == 0 {
            return Err(SimConfigError::NoCategories);
        }
        if self.max_iterations == 0 {
            return Err(SimConfigError::NoIterationBudget);
        }
        Ok(())
    }

    /// Total number of grid cells, guarding against address-space overflow.
    pub fn total_cells(&self) -> Result<usize, SimConfigError> {
        (self.width as usize)
            .checked_mul(self.height as usize)
            .ok_or(SimConfigError::AreaOverflow)
    }

    /// Seeded generator used for every random decision of a run.
    pub fn rng(&self) -> ChaCha12Rng {
        ChaCha12Rng::seed_from_u64(self.seed)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SimConfigError {
    ZeroArea,
    AreaOverflow,
    EmptyRatioOutOfRange(f64),
    SimilarityThresholdOutOfRange(f64),
    NoCategories,
    NoIterationBudget,
}

impl fmt::Display for SimConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SimConfigError::ZeroArea => write!(f, "width and height must both be positive"),
            SimConfigError::AreaOverflow => write!(f, "width * height overflows usize"),
            SimConfigError::EmptyRatioOutOfRange(v) => {
                write!(f, "empty_ratio ({v}) must be in [0, 1)")
            }
            SimConfigError::SimilarityThresholdOutOfRange(v) => {
                write!(f, "similarity_threshold ({v}) must be in [0, 1]")
            }
            SimConfigError::NoCategories => write!(f, "nr_categories must be at least 1"),
            SimConfigError::NoIterationBudget => write!(f, "max_iterations must be positive"),
        }
    }
}

impl Error for SimConfigError {}
